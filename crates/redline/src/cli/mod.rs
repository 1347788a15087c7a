//! CLI module for Redline
//!
//! Every command loads `redline.toml`, builds the registry once and opens
//! the SQLite store. Writes are committed as they happen.

pub mod config;
pub mod context;
pub mod create;
pub mod error;
pub mod output;
pub mod schema;
pub mod suggest;
