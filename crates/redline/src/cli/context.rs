//! Command context
//!
//! Loads `redline.toml`, builds the registry and opens the SQLite store.

use crate::cli::config::RedlineConfig;
use crate::cli::error::UsageError;
use anyhow::{Context, Result};
use redline_schema::{Actor, Registration, ReviewDesk};
use redline_store::{Record, RecordId, SqliteStore, Store};
use serde_json::Value as Json;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub struct Workspace {
    pub config: RedlineConfig,
    pub desk: ReviewDesk<SqliteStore>,
}

impl Workspace {
    pub fn open(config_path: &Path, store_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Err(UsageError::config_not_found(config_path).into());
        }
        let config = RedlineConfig::load(config_path)?;
        let registry = config.build_registry()?;
        let store = SqliteStore::open(store_path)
            .with_context(|| format!("Failed to open store {}", store_path.display()))?;

        debug!(
            config = %config_path.display(),
            store = %store_path.display(),
            registrations = registry.registrations().count(),
            "Workspace opened"
        );

        Ok(Self {
            config,
            desk: ReviewDesk::new(Arc::new(registry), store),
        })
    }

    pub fn registration(&self, entity: &str) -> Result<&Registration> {
        self.desk
            .registry()
            .registration(entity)
            .ok_or_else(|| UsageError::unregistered_entity(entity).into())
    }

    /// Resolve a configured actor and make sure it exists as a record of
    /// `actor_entity`, so suggestion descriptions can name it.
    pub fn actor(&self, username: &str, actor_entity: &str) -> Result<Actor> {
        let actor = self
            .config
            .actor(username)
            .ok_or_else(|| UsageError::unknown_actor(username))?;

        let store = self.desk.store();
        let id = RecordId::from(actor.id.clone());
        if store.get(actor_entity, &id)?.is_none() {
            store.insert(Record::with_id(actor_entity, id).with("username", actor.username.as_str()))?;
        }
        Ok(actor)
    }
}

pub fn parse_id(raw: &str) -> Result<RecordId> {
    RecordId::parse(raw).map_err(|e| UsageError::invalid_id(raw, &e.to_string()).into())
}

pub fn parse_data(raw: &str) -> Result<Json> {
    let data: Json =
        serde_json::from_str(raw).map_err(|e| UsageError::invalid_data(&e.to_string()))?;
    if !data.is_object() {
        return Err(UsageError::invalid_data("expected a JSON object").into());
    }
    Ok(data)
}
