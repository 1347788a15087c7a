//! Scoped Accessor: shadow records of one origin instance.

use crate::diff::{origin_members, pivot_rows};
use crate::error::{SuggestError, SuggestResult};
use crate::intake::{NewSuggestion, PivotRow};
use crate::record::ShadowRecord;
use crate::registry::{Registration, Registry};
use crate::schema::{
    ReviewStatus, ShadowSchema, TrackedAttributes, ACTOR, BOOKKEEPING_ATTRIBUTES, CREATED_AT,
    ORIGIN, REASON, REJECT_REASON, REVIEW_STATUS, SHADOW_IDENTITY, UPDATED_AT,
};
use chrono::Utc;
use redline_store::{Filter, Order, Query, Record, RecordId, Store, Value};
use std::collections::BTreeMap;
use tracing::info;

fn list_query(filter: Filter, status: Option<ReviewStatus>) -> Query {
    let filter = match status {
        Some(status) => filter.eq(REVIEW_STATUS, status.code()),
        None => filter,
    };
    Query::from(filter).order_by(Order::desc(CREATED_AT))
}

/// Create/list operations scoped to one source instance.
pub struct ScopedAccessor<'a> {
    store: &'a dyn Store,
    registry: &'a Registry,
    registration: &'a Registration,
    origin: Record,
}

impl<'a> ScopedAccessor<'a> {
    pub fn new(
        store: &'a dyn Store,
        registry: &'a Registry,
        registration: &'a Registration,
        origin: Record,
    ) -> Self {
        Self {
            store,
            registry,
            registration,
            origin,
        }
    }

    pub fn origin(&self) -> &Record {
        &self.origin
    }

    pub fn schema(&self) -> &ShadowSchema {
        &self.registration.schema
    }

    /// Tracked-attribute partition, for building input forms.
    pub fn tracked(&self) -> &TrackedAttributes {
        &self.registration.schema.tracked
    }

    fn scope(&self) -> Filter {
        Filter::all().eq(ORIGIN, self.origin.id.clone())
    }

    /// Shadows of this origin, newest first.
    pub fn list(&self, status: Option<ReviewStatus>) -> SuggestResult<Vec<ShadowRecord>> {
        let records = self
            .store
            .query(&self.schema().name, &list_query(self.scope(), status))?;
        Ok(records.into_iter().map(ShadowRecord::from_record).collect())
    }

    pub fn count(&self) -> SuggestResult<usize> {
        Ok(self.store.count(&self.schema().name, &self.scope())?)
    }

    /// Most recently created shadow, by `created_at`.
    pub fn latest(&self) -> SuggestResult<Option<ShadowRecord>> {
        let query = list_query(self.scope(), None);
        Ok(self
            .store
            .first(&self.schema().name, &query)?
            .map(ShadowRecord::from_record))
    }

    /// A shadow of this origin by identity.
    pub fn get(&self, id: &RecordId) -> SuggestResult<ShadowRecord> {
        self.store
            .get(&self.schema().name, id)?
            .filter(|r| r.get_ref(ORIGIN) == Some(&self.origin.id))
            .map(ShadowRecord::from_record)
            .ok_or_else(|| {
                SuggestError::not_found(format!(
                    "edit suggestion {} for {} {}",
                    id,
                    self.schema().source,
                    self.origin.id
                ))
            })
    }

    /// Create a PENDING shadow of this origin.
    ///
    /// Tracked values, members and pivot rows not supplied are copied from
    /// the origin, so a suggestion created with no changes diffs empty.
    pub fn create(&self, new: NewSuggestion) -> SuggestResult<ShadowRecord> {
        let schema = self.schema();
        self.validate(&new)?;

        let id = new.id.clone().unwrap_or_default();
        if self.store.get(&schema.name, &id)?.is_some() {
            return Err(SuggestError::conflict(format!(
                "edit suggestion {} already exists",
                id
            )));
        }

        let mut record = Record::with_id(schema.name.as_str(), id);
        for attr in &schema.attributes {
            if let Some(default) = &attr.default {
                record.set(attr.name.as_str(), default.clone());
            }
        }
        for attribute in schema.tracked.direct() {
            record.set(attribute, self.origin.get(attribute).clone());
        }
        for (attribute, value) in &new.values {
            record.set(attribute.as_str(), value.clone());
        }

        let now = Utc::now();
        record.set(ACTOR, new.actor.clone().map(RecordId::from));
        record.set(ORIGIN, self.origin.id.clone());
        record.set(CREATED_AT, now);
        record.set(UPDATED_AT, now);
        record.set(REASON, new.reason.trim());
        record.set(REVIEW_STATUS, ReviewStatus::Pending.code());
        record.set(REJECT_REASON, "");

        self.registry.before_write(self.store, &record)?;
        self.store.insert(record.clone())?;

        for relation in &schema.relations {
            match &relation.through {
                None => {
                    let members = match new.members.get(&relation.name) {
                        Some(members) => members.clone(),
                        None => origin_members(self.store, schema, relation, &self.origin.id)?,
                    };
                    self.store
                        .set_members(&schema.relation_key(&relation.name), &record.id, &members)?;
                }
                Some(binding) => {
                    let rows = match (new.pivots.get(&relation.name), new.members.get(&relation.name)) {
                        (Some(rows), _) => rows.clone(),
                        (None, Some(members)) => members.iter().cloned().map(PivotRow::new).collect(),
                        (None, None) => pivot_rows(
                            self.store,
                            &binding.source_through,
                            &binding.self_attribute,
                            &self.origin.id,
                        )?
                        .iter()
                        .filter_map(|row| {
                            let member = row.get_ref(&binding.target_attribute)?.clone();
                            let values: BTreeMap<String, Value> = binding
                                .pivot_attributes
                                .iter()
                                .filter(|c| **c != binding.target_attribute)
                                .map(|c| (c.clone(), row.get(c).clone()))
                                .collect();
                            Some(PivotRow { member, values })
                        })
                        .collect(),
                    };
                    for row in rows {
                        self.store.insert(pivot_record(
                            &binding.shadow_through,
                            &binding.self_attribute,
                            &binding.target_attribute,
                            &record.id,
                            row,
                        ))?;
                    }
                }
            }
        }

        info!(
            source = %schema.source,
            origin = %self.origin.id,
            shadow = %record.id,
            "Created edit suggestion"
        );
        Ok(ShadowRecord::from_record(record))
    }

    fn validate(&self, new: &NewSuggestion) -> SuggestResult<()> {
        let schema = self.schema();
        if new.reason.trim().is_empty() {
            return Err(SuggestError::validation("reason is required"));
        }

        for attribute in new.values.keys() {
            let is_base = schema.attribute(attribute).is_some()
                && !schema.tracked.contains(attribute)
                && attribute.as_str() != SHADOW_IDENTITY
                && !BOOKKEEPING_ATTRIBUTES.contains(&attribute.as_str());
            let is_direct = schema.tracked.direct().any(|a| a == attribute.as_str());
            if !is_direct && !is_base {
                return Err(SuggestError::validation(format!(
                    "{} is not a writable attribute of {}",
                    attribute, schema.name
                )));
            }
        }

        for relation in new.members.keys() {
            if schema.relation(relation).is_none() {
                return Err(SuggestError::validation(format!(
                    "{} is not a relation of {}",
                    relation, schema.name
                )));
            }
        }
        for relation in new.pivots.keys() {
            let has_through = schema
                .relation(relation)
                .map(|r| r.through.is_some())
                .unwrap_or(false);
            if !has_through {
                return Err(SuggestError::validation(format!(
                    "{} is not a through relation of {}",
                    relation, schema.name
                )));
            }
        }
        Ok(())
    }
}

/// Build a pivot row record owned by `owner`.
pub(crate) fn pivot_record(
    pivot: &str,
    self_attribute: &str,
    target_attribute: &str,
    owner: &RecordId,
    row: PivotRow,
) -> Record {
    let mut record = Record::new(pivot)
        .with(self_attribute, owner.clone())
        .with(target_attribute, row.member);
    for (column, value) in row.values {
        if column != self_attribute && column != target_attribute {
            record.set(column, value);
        }
    }
    record
}

/// Every shadow of one source entity, regardless of origin.
pub struct UnscopedAccessor<'a> {
    store: &'a dyn Store,
    registration: &'a Registration,
}

impl<'a> UnscopedAccessor<'a> {
    pub fn new(store: &'a dyn Store, registration: &'a Registration) -> Self {
        Self {
            store,
            registration,
        }
    }

    pub fn tracked(&self) -> &TrackedAttributes {
        &self.registration.schema.tracked
    }

    pub fn list(&self, status: Option<ReviewStatus>) -> SuggestResult<Vec<ShadowRecord>> {
        let records = self.store.query(
            &self.registration.schema.name,
            &list_query(Filter::all(), status),
        )?;
        Ok(records.into_iter().map(ShadowRecord::from_record).collect())
    }

    pub fn count(&self, status: Option<ReviewStatus>) -> SuggestResult<usize> {
        let filter = match status {
            Some(status) => Filter::all().eq(REVIEW_STATUS, status.code()),
            None => Filter::all(),
        };
        Ok(self.store.count(&self.registration.schema.name, &filter)?)
    }

    pub fn get(&self, id: &RecordId) -> SuggestResult<ShadowRecord> {
        self.store
            .get(&self.registration.schema.name, id)?
            .map(ShadowRecord::from_record)
            .ok_or_else(|| SuggestError::not_found(format!("edit suggestion {}", id)))
    }
}
