//! Redline command-line front end
//!
//! Drives edit suggestions for the entities declared in `redline.toml`
//! against a SQLite store.

use anyhow::Result;
use clap::{Parser, Subcommand};
use redline_logging::{init_logging, LogConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod cli;

use cli::config::{default_config_path, default_store_path, logs_dir, redline_home, RedlineConfig};
use cli::context::Workspace;

#[derive(Parser, Debug)]
#[command(name = "redline", about = "Review suggested edits to stored records")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.redline/redline.toml)
    #[arg(long, global = true, env = "REDLINE_CONFIG")]
    config: Option<PathBuf>,

    /// Store database (default: ~/.redline/store.db)
    #[arg(long, global = true, env = "REDLINE_STORE")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show resolved home, config and store paths
    Config {
        #[arg(long)]
        json: bool,
    },

    /// Show the derived shadow schema of an entity
    Schema {
        entity: String,
        #[arg(long)]
        json: bool,
    },

    /// Create a source record
    Create {
        entity: String,
        /// Attribute values as a JSON object
        #[arg(long)]
        data: String,
        #[arg(long)]
        json: bool,
    },

    /// Propose an edit to a source record
    Propose {
        entity: String,
        /// Id of the record being edited
        origin: String,
        #[arg(long)]
        actor: String,
        /// Suggested values as a JSON object; must include "reason"
        #[arg(long)]
        data: String,
        #[arg(long)]
        json: bool,
    },

    /// List edit suggestions of a source record, newest first
    List {
        entity: String,
        origin: String,
        /// pending, published or rejected
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Show what an edit suggestion would change
    Diff {
        entity: String,
        shadow: String,
        #[arg(long)]
        json: bool,
    },

    /// Apply an edit suggestion to its record
    Publish {
        entity: String,
        shadow: String,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        json: bool,
    },

    /// Decline an edit suggestion
    Reject {
        entity: String,
        shadow: String,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        json: bool,
    },
}

fn command_wants_json(command: &Commands) -> bool {
    match command {
        Commands::Config { json }
        | Commands::Schema { json, .. }
        | Commands::Create { json, .. }
        | Commands::Propose { json, .. }
        | Commands::List { json, .. }
        | Commands::Diff { json, .. }
        | Commands::Publish { json, .. }
        | Commands::Reject { json, .. } => *json,
    }
}

fn show_config(config_path: &Path, store_path: &Path, json: bool) -> Result<()> {
    let loaded = if config_path.exists() {
        Some(RedlineConfig::load(config_path)?)
    } else {
        None
    };
    let actors: Vec<String> = loaded
        .iter()
        .flat_map(|c| c.actors.iter().map(|a| a.username.clone()))
        .collect();
    let registered: Vec<String> = loaded
        .iter()
        .flat_map(|c| c.suggestions.iter().map(|s| s.entity.clone()))
        .collect();

    if json {
        return cli::output::print_json(&serde_json::json!({
            "home": redline_home(),
            "config": config_path,
            "config_exists": loaded.is_some(),
            "store": store_path,
            "logs": logs_dir(),
            "actors": actors,
            "suggestions": registered,
        }));
    }

    println!("Home:    {}", redline_home().display());
    println!(
        "Config:  {}{}",
        config_path.display(),
        if loaded.is_some() { "" } else { " (missing)" }
    );
    println!("Store:   {}", store_path.display());
    println!("Logs:    {}", logs_dir().display());
    if loaded.is_some() {
        println!("Actors:  {}", actors.join(", "));
        println!("Suggestable: {}", registered.join(", "));
    }
    Ok(())
}

fn run_command(cli: Cli) -> Result<()> {
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let store_path = cli.store.unwrap_or_else(default_store_path);

    if let Commands::Config { json } = cli.command {
        return show_config(&config_path, &store_path, json);
    }

    let ws = Workspace::open(&config_path, &store_path)?;
    match cli.command {
        Commands::Config { .. } => Ok(()),
        Commands::Schema { entity, json } => cli::schema::run(&ws, &entity, json),
        Commands::Create { entity, data, json } => {
            cli::create::run(&ws, cli::create::CreateArgs { entity, data, json })
        }
        Commands::Propose {
            entity,
            origin,
            actor,
            data,
            json,
        } => cli::suggest::propose(
            &ws,
            cli::suggest::ProposeArgs {
                entity,
                origin,
                actor,
                data,
                json,
            },
        ),
        Commands::List {
            entity,
            origin,
            status,
            json,
        } => cli::suggest::list(
            &ws,
            cli::suggest::ListArgs {
                entity,
                origin,
                status,
                json,
            },
        ),
        Commands::Diff {
            entity,
            shadow,
            json,
        } => cli::suggest::diff(&ws, &entity, &shadow, json),
        Commands::Publish {
            entity,
            shadow,
            actor,
            json,
        } => cli::suggest::publish(&ws, &entity, &shadow, &actor, json),
        Commands::Reject {
            entity,
            shadow,
            actor,
            reason,
            json,
        } => cli::suggest::reject(
            &ws,
            cli::suggest::RejectArgs {
                entity,
                shadow,
                actor,
                reason,
                json,
            },
        ),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(LogConfig {
        app_name: "redline",
        verbose: cli.verbose,
    }) {
        eprintln!("Warning: failed to initialize logging: {:#}", err);
    }

    let json_mode = command_wants_json(&cli.command);
    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if json_mode {
                cli::error::print_json_error(&err);
            } else {
                eprintln!("{:?}", err);
            }
            ExitCode::from(cli::error::exit_status(&err))
        }
    }
}
