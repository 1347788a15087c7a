//! Diff Engine.
//!
//! Compares a shadow with its origin over the tracked attributes. Read-only.

use crate::error::SuggestResult;
use crate::record::ShadowRecord;
use crate::schema::{ManyToManyAttribute, ShadowSchema};
use redline_store::{Filter, Query, Record, RecordId, Store, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Value of one tracked attribute on one side of a diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(Value),
    /// Ordered members of a many-to-many relation
    Members(Vec<RecordId>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Scalar(value) => write!(f, "{}", value),
            FieldValue::Members(ids) => {
                let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                write!(f, "[{}]", ids.join(", "))
            }
        }
    }
}

/// One differing attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub attribute: String,
    pub old: FieldValue,
    pub new: FieldValue,
}

/// Field-level delta between a shadow and its origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub changed_attributes: Vec<String>,
    pub changes: Vec<Change>,
    pub origin: Record,
    pub shadow: Record,
}

impl ChangeRecord {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn change(&self, attribute: &str) -> Option<&Change> {
        self.changes.iter().find(|c| c.attribute == attribute)
    }
}

/// Diff `shadow` against `origin` in enumeration order: scalar, foreign,
/// then many-to-many.
pub fn diff_against_origin(
    store: &dyn Store,
    schema: &ShadowSchema,
    shadow: &ShadowRecord,
    origin: &Record,
) -> SuggestResult<ChangeRecord> {
    let mut changes = Vec::new();

    for attribute in schema.tracked.direct() {
        let old = origin.get(attribute);
        let new = shadow.get(attribute);
        if old != new {
            debug!(attribute = attribute, "Attribute differs from origin");
            changes.push(Change {
                attribute: attribute.to_string(),
                old: FieldValue::Scalar(old.clone()),
                new: FieldValue::Scalar(new.clone()),
            });
        }
    }

    for relation in &schema.relations {
        let old = origin_members(store, schema, relation, &origin.id)?;
        let new = shadow_members(store, schema, relation, shadow.id())?;
        if old != new {
            debug!(attribute = %relation.name, old = old.len(), new = new.len(), "Relation differs from origin");
            changes.push(Change {
                attribute: relation.name.clone(),
                old: FieldValue::Members(old),
                new: FieldValue::Members(new),
            });
        }
    }

    Ok(ChangeRecord {
        changed_attributes: changes.iter().map(|c| c.attribute.clone()).collect(),
        changes,
        origin: origin.clone(),
        shadow: shadow.record().clone(),
    })
}

/// Members of a relation owned by a source record.
pub fn origin_members(
    store: &dyn Store,
    schema: &ShadowSchema,
    relation: &ManyToManyAttribute,
    origin: &RecordId,
) -> SuggestResult<Vec<RecordId>> {
    match &relation.through {
        Some(binding) => pivot_members(
            store,
            &binding.source_through,
            &binding.self_attribute,
            &binding.target_attribute,
            origin,
        ),
        None => Ok(store.members(&schema.source_relation_key(&relation.name), origin)?),
    }
}

/// Members of a relation owned by a shadow record.
pub fn shadow_members(
    store: &dyn Store,
    schema: &ShadowSchema,
    relation: &ManyToManyAttribute,
    shadow: &RecordId,
) -> SuggestResult<Vec<RecordId>> {
    match &relation.through {
        Some(binding) => pivot_members(
            store,
            &binding.shadow_through,
            &binding.self_attribute,
            &binding.target_attribute,
            shadow,
        ),
        None => Ok(store.members(&schema.relation_key(&relation.name), shadow)?),
    }
}

/// Pivot rows owned by `owner`, in insertion order.
pub(crate) fn pivot_rows(
    store: &dyn Store,
    pivot: &str,
    self_attribute: &str,
    owner: &RecordId,
) -> SuggestResult<Vec<Record>> {
    let filter = Filter::all().eq(self_attribute, owner.clone());
    Ok(store.query(pivot, &Query::from(filter))?)
}

fn pivot_members(
    store: &dyn Store,
    pivot: &str,
    self_attribute: &str,
    target_attribute: &str,
    owner: &RecordId,
) -> SuggestResult<Vec<RecordId>> {
    Ok(pivot_rows(store, pivot, self_attribute, owner)?
        .iter()
        .filter_map(|row| row.get_ref(target_attribute).cloned())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_display() {
        let id = RecordId::new();
        assert_eq!(FieldValue::Scalar(Value::from("x")).to_string(), "x");
        assert_eq!(
            FieldValue::Members(vec![id.clone()]).to_string(),
            format!("[{}]", id)
        );
        assert_eq!(FieldValue::Members(vec![]).to_string(), "[]");
    }
}
