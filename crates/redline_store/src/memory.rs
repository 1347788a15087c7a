//! In-process storage engine.
//!
//! Used by unit tests and embedders that do not need durability. A single
//! `RwLock` serialises every write.

use crate::error::{Result, StoreError};
use crate::query::{Filter, Query, RelationKey};
use crate::value::Record;
use crate::Store;
use redline_ids::RecordId;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<RecordId, Row>,
    next_seq: u64,
}

#[derive(Debug)]
struct Row {
    seq: u64,
    record: Record,
}

impl Table {
    fn upsert(&mut self, record: Record) {
        match self.rows.get_mut(&record.id) {
            Some(row) => row.record = record,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.rows.insert(record.id.clone(), Row { seq, record });
            }
        }
    }

    fn ordered(&self) -> Vec<&Record> {
        let mut rows: Vec<&Row> = self.rows.values().collect();
        rows.sort_by_key(|row| row.seq);
        rows.into_iter().map(|row| &row.record).collect()
    }
}

#[derive(Debug, Default)]
struct Tables {
    records: BTreeMap<String, Table>,
    relations: BTreeMap<RelationKey, BTreeMap<RecordId, Vec<RecordId>>>,
}

/// In-memory [`Store`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty, purely in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.inner
            .read()
            .map_err(|_| StoreError::poisoned("memory store read lock"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.inner
            .write()
            .map_err(|_| StoreError::poisoned("memory store write lock"))
    }
}

impl Store for MemoryStore {
    fn insert(&self, record: Record) -> Result<()> {
        let mut tables = self.write()?;
        let table = tables.records.entry(record.entity.clone()).or_default();
        if table.rows.contains_key(&record.id) {
            return Err(StoreError::duplicate(format!("{} {}", record.entity, record.id)));
        }
        table.upsert(record);
        Ok(())
    }

    fn save(&self, record: &Record) -> Result<()> {
        let mut tables = self.write()?;
        tables
            .records
            .entry(record.entity.clone())
            .or_default()
            .upsert(record.clone());
        Ok(())
    }

    fn get(&self, entity: &str, id: &RecordId) -> Result<Option<Record>> {
        let tables = self.read()?;
        Ok(tables
            .records
            .get(entity)
            .and_then(|table| table.rows.get(id))
            .map(|row| row.record.clone()))
    }

    fn delete(&self, entity: &str, id: &RecordId) -> Result<bool> {
        let mut tables = self.write()?;
        let removed = tables
            .records
            .get_mut(entity)
            .map(|table| table.rows.remove(id).is_some())
            .unwrap_or(false);

        if removed {
            // Membership rows owned by the deleted record go with it.
            for (relation, owners) in tables.relations.iter_mut() {
                if relation.entity == entity {
                    owners.remove(id);
                }
            }
        }
        Ok(removed)
    }

    fn query(&self, entity: &str, query: &Query) -> Result<Vec<Record>> {
        let tables = self.read()?;
        let Some(table) = tables.records.get(entity) else {
            return Ok(Vec::new());
        };

        let mut records: Vec<Record> = table
            .ordered()
            .into_iter()
            .filter(|record| query.filter.matches(record))
            .cloned()
            .collect();
        query.sort(&mut records);
        if let Some(limit) = query.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    fn count(&self, entity: &str, filter: &Filter) -> Result<usize> {
        let tables = self.read()?;
        Ok(tables
            .records
            .get(entity)
            .map(|table| table.rows.values().filter(|row| filter.matches(&row.record)).count())
            .unwrap_or(0))
    }

    fn members(&self, relation: &RelationKey, owner: &RecordId) -> Result<Vec<RecordId>> {
        let tables = self.read()?;
        Ok(tables
            .relations
            .get(relation)
            .and_then(|owners| owners.get(owner))
            .cloned()
            .unwrap_or_default())
    }

    fn add_members(&self, relation: &RelationKey, owner: &RecordId, members: &[RecordId]) -> Result<()> {
        let mut tables = self.write()?;
        let current = tables
            .relations
            .entry(relation.clone())
            .or_default()
            .entry(owner.clone())
            .or_default();
        for member in members {
            if !current.contains(member) {
                current.push(member.clone());
            }
        }
        Ok(())
    }

    fn remove_members(&self, relation: &RelationKey, owner: &RecordId, members: &[RecordId]) -> Result<()> {
        let mut tables = self.write()?;
        if let Some(current) = tables
            .relations
            .get_mut(relation)
            .and_then(|owners| owners.get_mut(owner))
        {
            current.retain(|member| !members.contains(member));
        }
        Ok(())
    }

    fn set_members(&self, relation: &RelationKey, owner: &RecordId, members: &[RecordId]) -> Result<()> {
        let mut tables = self.write()?;
        let mut deduped: Vec<RecordId> = Vec::with_capacity(members.len());
        for member in members {
            if !deduped.contains(member) {
                deduped.push(member.clone());
            }
        }
        tables
            .relations
            .entry(relation.clone())
            .or_default()
            .insert(owner.clone(), deduped);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &str) -> Record {
        Record::new("Tag").with("name", name)
    }

    #[test]
    fn test_insert_rejects_duplicate_identity() {
        let store = MemoryStore::new();
        let record = tag("rust");
        store.insert(record.clone()).unwrap();
        let err = store.insert(record).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[test]
    fn test_save_replaces_in_place() {
        let store = MemoryStore::new();
        let first = tag("a");
        let second = tag("b");
        store.insert(first.clone()).unwrap();
        store.insert(second.clone()).unwrap();

        let mut updated = first.clone();
        updated.set("name", "a2");
        store.save(&updated).unwrap();

        let all = store.query("Tag", &Query::new()).unwrap();
        assert_eq!(all.len(), 2);
        // Insertion order is preserved across updates.
        assert_eq!(all[0].get_text("name"), Some("a2"));
        assert_eq!(all[1].id, second.id);
    }
}
