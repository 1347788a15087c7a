//! The review desk: one entry point over a registry and a store.
//!
//! Every shadow write made through the desk passes the registry's write
//! interceptors, so the Lifecycle Guard sees all of them.

use crate::accessor::{pivot_record, ScopedAccessor, UnscopedAccessor};
use crate::diff::{diff_against_origin, pivot_rows, shadow_members, ChangeRecord};
use crate::entity::Actor;
use crate::error::{SuggestError, SuggestResult};
use crate::intake::PivotRow;
use crate::record::ShadowRecord;
use crate::registry::{Registration, Registry};
use crate::schema::{ManyToManyAttribute, ShadowSchema, ORIGIN};
use crate::transition::{self, registration_for, write_shadow};
use redline_store::{Filter, Query, Record, RecordId, Store};
use std::sync::Arc;
use tracing::info;

/// Review operations against one store.
pub struct ReviewDesk<S: Store> {
    registry: Arc<Registry>,
    store: S,
}

impl<S: Store> ReviewDesk<S> {
    pub fn new(registry: Arc<Registry>, store: S) -> Self {
        Self { registry, store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn registration(&self, source: &str) -> SuggestResult<&Registration> {
        Ok(self.registry.require(source)?)
    }

    /// Shadow schema of a registered source entity.
    pub fn schema(&self, source: &str) -> SuggestResult<&ShadowSchema> {
        Ok(&self.registration(source)?.schema)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Scoped accessor for the source record `origin_id` of `source`.
    pub fn suggestions(&self, source: &str, origin_id: &RecordId) -> SuggestResult<ScopedAccessor<'_>> {
        let registration = self.registration(source)?;
        let origin = self
            .store
            .get(source, origin_id)?
            .ok_or_else(|| SuggestError::not_found(format!("{} {}", source, origin_id)))?;
        Ok(ScopedAccessor::new(&self.store, &self.registry, registration, origin))
    }

    /// Scoped accessor for an already loaded source record.
    pub fn suggestions_for(&self, origin: &Record) -> SuggestResult<ScopedAccessor<'_>> {
        let registration = self.registration(&origin.entity)?;
        Ok(ScopedAccessor::new(
            &self.store,
            &self.registry,
            registration,
            origin.clone(),
        ))
    }

    /// Every shadow of `source`, regardless of origin.
    pub fn all_suggestions(&self, source: &str) -> SuggestResult<UnscopedAccessor<'_>> {
        Ok(UnscopedAccessor::new(&self.store, self.registration(source)?))
    }

    // ========================================================================
    // Shadow records
    // ========================================================================

    pub fn load_shadow(&self, source: &str, id: &RecordId) -> SuggestResult<ShadowRecord> {
        self.all_suggestions(source)?.get(id)
    }

    /// Persist local edits to a shadow. Refused once it has been reviewed.
    pub fn save_shadow(&self, shadow: &mut ShadowRecord) -> SuggestResult<()> {
        registration_for(&self.registry, shadow)?;
        write_shadow(&self.store, &self.registry, shadow)
    }

    pub fn origin_of(&self, shadow: &ShadowRecord) -> SuggestResult<Record> {
        let registration = registration_for(&self.registry, shadow)?;
        let origin_id = shadow
            .origin_id()
            .ok_or_else(|| SuggestError::validation("edit suggestion has no origin"))?;
        self.store
            .get(&registration.schema.source, origin_id)?
            .ok_or_else(|| {
                SuggestError::not_found(format!("{} {}", registration.schema.source, origin_id))
            })
    }

    /// Field-level delta between a shadow and its origin.
    pub fn diff(&self, shadow: &ShadowRecord) -> SuggestResult<ChangeRecord> {
        let registration = registration_for(&self.registry, shadow)?;
        let origin = self.origin_of(shadow)?;
        diff_against_origin(&self.store, &registration.schema, shadow, &origin)
    }

    pub fn publish(&self, shadow: &mut ShadowRecord, actor: &Actor) -> SuggestResult<Record> {
        transition::publish(&self.store, &self.registry, shadow, actor)
    }

    pub fn reject(&self, shadow: &mut ShadowRecord, actor: &Actor, reason: &str) -> SuggestResult<()> {
        transition::reject(&self.store, &self.registry, shadow, actor, reason)
    }

    /// `Edit suggestion by {actor} for "{origin}"`.
    pub fn describe(&self, shadow: &ShadowRecord) -> SuggestResult<String> {
        let registration = registration_for(&self.registry, shadow)?;
        let origin = self.origin_of(shadow)?;
        let origin_display = registration.source.display(&origin);

        let actor_entity = &registration.schema.actor_entity;
        let actor_display = match shadow.actor_id() {
            None => "unknown".to_string(),
            Some(id) => match (self.store.get(actor_entity, id)?, self.registry.entity(actor_entity)) {
                (Some(record), Some(schema)) => schema.display(&record),
                (Some(record), None) => record
                    .get_text("username")
                    .map(str::to_string)
                    .unwrap_or_else(|| id.to_string()),
                (None, _) => id.to_string(),
            },
        };

        Ok(format!(
            "Edit suggestion by {} for \"{}\"",
            actor_display, origin_display
        ))
    }

    // ========================================================================
    // Relations
    // ========================================================================

    fn relation<'r>(
        registration: &'r Registration,
        name: &str,
    ) -> SuggestResult<&'r ManyToManyAttribute> {
        registration.schema.relation(name).ok_or_else(|| {
            SuggestError::validation(format!(
                "{} is not a relation of {}",
                name, registration.schema.name
            ))
        })
    }

    fn plain_relation<'r>(
        registration: &'r Registration,
        name: &str,
    ) -> SuggestResult<&'r ManyToManyAttribute> {
        let relation = Self::relation(registration, name)?;
        if relation.through.is_some() {
            return Err(SuggestError::validation(format!(
                "{} uses a through entity; edit its pivot rows instead",
                name
            )));
        }
        Ok(relation)
    }

    /// Member records of a shadow relation, resolved in the target entity.
    pub fn members(&self, shadow: &ShadowRecord, relation: &str) -> SuggestResult<Vec<Record>> {
        let registration = registration_for(&self.registry, shadow)?;
        let relation = Self::relation(registration, relation)?;
        let ids = shadow_members(&self.store, &registration.schema, relation, shadow.id())?;

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.store.get(&relation.target, &id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub fn add_members(&self, shadow: &ShadowRecord, relation: &str, members: &[RecordId]) -> SuggestResult<()> {
        let registration = registration_for(&self.registry, shadow)?;
        Self::plain_relation(registration, relation)?;
        self.registry.before_write(&self.store, shadow.record())?;
        Ok(self
            .store
            .add_members(&registration.schema.relation_key(relation), shadow.id(), members)?)
    }

    pub fn remove_members(&self, shadow: &ShadowRecord, relation: &str, members: &[RecordId]) -> SuggestResult<()> {
        let registration = registration_for(&self.registry, shadow)?;
        Self::plain_relation(registration, relation)?;
        self.registry.before_write(&self.store, shadow.record())?;
        Ok(self
            .store
            .remove_members(&registration.schema.relation_key(relation), shadow.id(), members)?)
    }

    pub fn set_members(&self, shadow: &ShadowRecord, relation: &str, members: &[RecordId]) -> SuggestResult<()> {
        let registration = registration_for(&self.registry, shadow)?;
        Self::plain_relation(registration, relation)?;
        self.registry.before_write(&self.store, shadow.record())?;
        Ok(self
            .store
            .set_members(&registration.schema.relation_key(relation), shadow.id(), members)?)
    }

    /// Append a pivot row to a through relation of a shadow.
    pub fn add_pivot(&self, shadow: &ShadowRecord, relation: &str, row: PivotRow) -> SuggestResult<Record> {
        let registration = registration_for(&self.registry, shadow)?;
        let binding = Self::relation(registration, relation)?
            .through
            .as_ref()
            .ok_or_else(|| SuggestError::validation(format!("{} has no through entity", relation)))?;
        self.registry.before_write(&self.store, shadow.record())?;

        let record = pivot_record(
            &binding.shadow_through,
            &binding.self_attribute,
            &binding.target_attribute,
            shadow.id(),
            row,
        );
        self.store.insert(record.clone())?;
        Ok(record)
    }

    /// Pivot rows of a through relation of a shadow, in insertion order.
    pub fn pivots(&self, shadow: &ShadowRecord, relation: &str) -> SuggestResult<Vec<Record>> {
        let registration = registration_for(&self.registry, shadow)?;
        let binding = Self::relation(registration, relation)?
            .through
            .as_ref()
            .ok_or_else(|| SuggestError::validation(format!("{} has no through entity", relation)))?;
        pivot_rows(&self.store, &binding.shadow_through, &binding.self_attribute, shadow.id())
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    /// Remove a shadow with its pivot rows and memberships.
    pub fn delete_shadow(&self, shadow: &ShadowRecord) -> SuggestResult<bool> {
        let registration = registration_for(&self.registry, shadow)?;
        let schema = &registration.schema;

        for relation in &schema.relations {
            match &relation.through {
                Some(binding) => {
                    let owned = Filter::all().eq(binding.self_attribute.as_str(), shadow.id().clone());
                    self.store.delete_where(&binding.shadow_through, &owned)?;
                }
                None => self
                    .store
                    .clear_members(&schema.relation_key(&relation.name), shadow.id())?,
            }
        }
        Ok(self.store.delete(&schema.name, shadow.id())?)
    }

    /// Delete a source record; its shadows go with it. Returns how many
    /// shadows were removed.
    pub fn delete_source(&self, source: &str, origin_id: &RecordId) -> SuggestResult<usize> {
        let registration = self.registration(source)?;
        let schema = &registration.schema;

        let shadows = self
            .store
            .query(&schema.name, &Query::from(Filter::all().eq(ORIGIN, origin_id.clone())))?;
        let mut removed = 0;
        for shadow in shadows.into_iter().map(ShadowRecord::from_record) {
            if self.delete_shadow(&shadow)? {
                removed += 1;
            }
        }

        for relation in &schema.relations {
            match &relation.through {
                Some(binding) => {
                    let owned = Filter::all().eq(binding.self_attribute.as_str(), origin_id.clone());
                    self.store.delete_where(&binding.source_through, &owned)?;
                }
                None => self
                    .store
                    .clear_members(&schema.source_relation_key(&relation.name), origin_id)?,
            }
        }
        let existed = self.store.delete(source, origin_id)?;

        info!(
            source = source,
            origin = %origin_id,
            existed = existed,
            shadows = removed,
            "Deleted source record"
        );
        Ok(removed)
    }
}
