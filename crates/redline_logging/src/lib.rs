//! Tracing setup and home-directory helpers for Redline binaries.
//!
//! Every CLI invocation is a short process, so logs go to one file per day,
//! `<home>/logs/<app>-YYYY-MM-DD.log`, opened in append mode. Only the newest
//! [`KEEP_DAYS`] files are kept; older ones are pruned when logging starts.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable overriding the Redline home directory.
pub const HOME_ENV: &str = "REDLINE_HOME";

/// Dated log files kept per application.
pub const KEEP_DAYS: usize = 7;

const FILE_FILTER: &str = "redline=info,redline_schema=info,redline_store=info";
const VERBOSE_CONSOLE_FILTER: &str = "redline=debug,redline_schema=debug,redline_store=debug";
const CONSOLE_FILTER: &str = "warn";

pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Show debug output on stderr instead of warnings only
    pub verbose: bool,
}

/// Install a subscriber writing to today's log file and to stderr.
///
/// `RUST_LOG` overrides the file filter.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let dir = ensure_logs_dir()?;
    let path = dir.join(log_file_name(config.app_name, Local::now().date_naive()));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    let file_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(FILE_FILTER));
    let console_filter = EnvFilter::new(if config.verbose {
        VERBOSE_CONSOLE_FILTER
    } else {
        CONSOLE_FILTER
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if let Err(err) = prune_old_logs(&dir, config.app_name, KEEP_DAYS) {
        warn!(dir = %dir.display(), error = %err, "Failed to prune old log files");
    }
    Ok(())
}

/// `$REDLINE_HOME` if set and non-blank, else `~/.redline` (or `./.redline`
/// without a home directory).
pub fn redline_home() -> PathBuf {
    match std::env::var(HOME_ENV) {
        Ok(home) if !home.trim().is_empty() => PathBuf::from(home),
        _ => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".redline"),
    }
}

pub fn logs_dir() -> PathBuf {
    redline_home().join("logs")
}

pub fn ensure_logs_dir() -> Result<PathBuf> {
    let dir = logs_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create logs directory {}", dir.display()))?;
    Ok(dir)
}

fn log_file_name(app: &str, day: NaiveDate) -> String {
    format!("{}-{}.log", app, day.format("%Y-%m-%d"))
}

fn log_file_day(app: &str, file_name: &str) -> Option<NaiveDate> {
    let day = file_name
        .strip_prefix(app)?
        .strip_prefix('-')?
        .strip_suffix(".log")?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Remove all but the newest `keep` dated logs of `app`. Returns how many were removed.
fn prune_old_logs(dir: &Path, app: &str, keep: usize) -> io::Result<usize> {
    let mut dated: Vec<(NaiveDate, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(day) = name.to_str().and_then(|name| log_file_day(app, name)) {
            dated.push((day, entry.path()));
        }
    }

    dated.sort_by(|a, b| b.0.cmp(&a.0));
    let stale = dated.into_iter().skip(keep).collect::<Vec<_>>();
    for (_, path) in &stale {
        fs::remove_file(path)?;
    }
    Ok(stale.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_log_file_name_round_trips_the_day() {
        let name = log_file_name("redline", day("2026-03-09"));
        assert_eq!(name, "redline-2026-03-09.log");
        assert_eq!(log_file_day("redline", &name), Some(day("2026-03-09")));
    }

    #[test]
    fn test_foreign_files_are_not_log_days() {
        assert_eq!(log_file_day("redline", "redline.log"), None);
        assert_eq!(log_file_day("redline", "redline-latest.log"), None);
        assert_eq!(log_file_day("redline", "other-2026-03-09.log"), None);
        assert_eq!(log_file_day("redline", "redline-2026-03-09.log.bak"), None);
    }

    #[test]
    fn test_prune_keeps_newest_days_only() {
        let dir = tempfile::tempdir().unwrap();
        for d in ["2026-01-01", "2026-01-03", "2026-01-02", "2026-01-04"] {
            fs::write(dir.path().join(log_file_name("redline", day(d))), "x").unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "keep me").unwrap();
        fs::write(dir.path().join(log_file_name("other", day("2020-01-01"))), "x").unwrap();

        let removed = prune_old_logs(dir.path(), "redline", 2).unwrap();
        assert_eq!(removed, 2);

        let mut left: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(
            left,
            vec![
                "notes.txt",
                "other-2020-01-01.log",
                "redline-2026-01-03.log",
                "redline-2026-01-04.log",
            ]
        );
    }
}
