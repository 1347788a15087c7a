//! Storage contract for Redline.
//!
//! The suggestion core never talks to a database directly. It needs exactly
//! what the [`Store`] trait offers:
//!
//! - create/read/update/delete on typed records
//! - filtering by exact-match predicates, ordering and "first matching" reads
//! - many-to-many membership (add/remove/replace/list)
//!
//! Pivot rows of custom through-relations are ordinary records, so they are
//! created, filtered and deleted through the same record operations.
//!
//! Two engines implement it: [`SqliteStore`] for durable databases and
//! [`MemoryStore`] for in-process use.
//!
//! # Usage
//!
//! ```rust,ignore
//! use redline_store::{Filter, Query, Record, SqliteStore, Store};
//!
//! let store = SqliteStore::open("store.db")?;
//! store.insert(Record::new("Tag").with("name", "rust"))?;
//! let tags = store.query("Tag", &Query::from(Filter::all().eq("name", "rust")))?;
//! ```

mod error;
mod memory;
mod query;
mod sqlite;
mod value;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use query::{Filter, Order, Query, RelationKey};
pub use redline_ids::RecordId;
pub use sqlite::SqliteStore;
pub use value::{Record, Value};

/// Synchronous storage engine.
///
/// All operations block on storage I/O. Read-modify-write safety is the
/// engine's responsibility: callers performing a status check followed by a
/// write rely on the engine serialising writes to the same row.
pub trait Store {
    /// Insert a new record. Fails with [`StoreError::Duplicate`] if the identity is taken.
    fn insert(&self, record: Record) -> Result<()>;

    /// Insert or replace a record by identity.
    fn save(&self, record: &Record) -> Result<()>;

    /// Read a record by identity.
    fn get(&self, entity: &str, id: &RecordId) -> Result<Option<Record>>;

    /// Delete a record by identity. Returns whether it existed.
    fn delete(&self, entity: &str, id: &RecordId) -> Result<bool>;

    /// Filtered, ordered read.
    fn query(&self, entity: &str, query: &Query) -> Result<Vec<Record>>;

    /// First record matching the query, if any.
    fn first(&self, entity: &str, query: &Query) -> Result<Option<Record>> {
        let limited = query.clone().limit(1);
        Ok(self.query(entity, &limited)?.into_iter().next())
    }

    /// Number of records matching the filter.
    fn count(&self, entity: &str, filter: &Filter) -> Result<usize> {
        Ok(self.query(entity, &Query::from(filter.clone()))?.len())
    }

    /// Delete every record matching the filter. Returns how many were removed.
    fn delete_where(&self, entity: &str, filter: &Filter) -> Result<usize> {
        let mut removed = 0;
        for record in self.query(entity, &Query::from(filter.clone()))? {
            if self.delete(entity, &record.id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Members of a relation for one owner, in insertion order.
    fn members(&self, relation: &RelationKey, owner: &RecordId) -> Result<Vec<RecordId>>;

    /// Append members, skipping ones already present.
    fn add_members(&self, relation: &RelationKey, owner: &RecordId, members: &[RecordId]) -> Result<()>;

    /// Remove members if present.
    fn remove_members(&self, relation: &RelationKey, owner: &RecordId, members: &[RecordId]) -> Result<()>;

    /// Replace the membership set wholesale.
    fn set_members(&self, relation: &RelationKey, owner: &RecordId, members: &[RecordId]) -> Result<()>;

    /// Remove every member for one owner.
    fn clear_members(&self, relation: &RelationKey, owner: &RecordId) -> Result<()> {
        self.set_members(relation, owner, &[])
    }
}
