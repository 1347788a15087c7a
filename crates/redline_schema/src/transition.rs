//! Publish/Reject transitions.
//!
//! Both run the authorization predicate first, then refuse if the persisted
//! shadow has already left PENDING. Neither rolls back a partial publish;
//! wrap calls in a storage transaction where atomicity matters.

use crate::diff::{pivot_rows, shadow_members};
use crate::entity::{Actor, EntitySchema};
use crate::error::{SuggestError, SuggestResult};
use crate::record::ShadowRecord;
use crate::registry::{Registration, Registry};
use crate::schema::{ReviewStatus, UPDATED_AT};
use chrono::Utc;
use redline_store::{Filter, Record, Store};
use tracing::{info, warn};

/// Run write interceptors, stamp `updated_at` and persist a shadow.
pub(crate) fn write_shadow(
    store: &dyn Store,
    registry: &Registry,
    shadow: &mut ShadowRecord,
) -> SuggestResult<()> {
    registry.before_write(store, shadow.record())?;
    shadow.set(UPDATED_AT, Utc::now());
    store.save(shadow.record())?;
    Ok(())
}

pub(crate) fn registration_for<'r>(
    registry: &'r Registry,
    shadow: &ShadowRecord,
) -> SuggestResult<&'r Registration> {
    registry.registration_for_shadow(shadow.entity()).ok_or_else(|| {
        SuggestError::not_found(format!("{} is not a registered shadow entity", shadow.entity()))
    })
}

/// Authorization first, then the persisted status.
fn authorize(
    store: &dyn Store,
    registration: &Registration,
    shadow: &ShadowRecord,
    actor: &Actor,
    action: &str,
) -> SuggestResult<()> {
    if !registration.config.is_authorized(shadow, actor) {
        warn!(
            shadow = %shadow.id(),
            actor = %actor.username,
            action = action,
            "Review action denied"
        );
        return Err(SuggestError::permission_denied(format!(
            "User not allowed to {} the edit suggestion",
            action
        )));
    }

    let persisted = store
        .get(&registration.schema.name, shadow.id())?
        .map(ShadowRecord::from_record)
        .ok_or_else(|| SuggestError::not_found(format!("edit suggestion {}", shadow.id())))?;
    if !persisted.is_pending() {
        return Err(SuggestError::permission_denied(format!(
            "Edit suggestion {} has already been reviewed",
            shadow.id()
        )));
    }
    Ok(())
}

/// Copy the shadow's tracked values onto its origin and mark it published.
/// Returns the updated origin.
pub fn publish(
    store: &dyn Store,
    registry: &Registry,
    shadow: &mut ShadowRecord,
    actor: &Actor,
) -> SuggestResult<Record> {
    let registration = registration_for(registry, shadow)?;
    authorize(store, registration, shadow, actor, "publish")?;

    let schema = &registration.schema;
    let origin_id = shadow
        .origin_id()
        .cloned()
        .ok_or_else(|| SuggestError::validation("edit suggestion has no origin"))?;
    let mut origin = store
        .get(&schema.source, &origin_id)?
        .ok_or_else(|| SuggestError::not_found(format!("{} {}", schema.source, origin_id)))?;

    for attribute in schema.tracked.direct() {
        origin.set(attribute, shadow.get(attribute).clone());
    }

    for relation in &schema.relations {
        match &relation.through {
            None => {
                let members = shadow_members(store, schema, relation, shadow.id())?;
                store.set_members(&schema.source_relation_key(&relation.name), &origin.id, &members)?;
            }
            Some(binding) => {
                // Replace, never merge.
                let owned = Filter::all().eq(binding.self_attribute.as_str(), origin.id.clone());
                store.delete_where(&binding.source_through, &owned)?;

                for row in pivot_rows(store, &binding.shadow_through, &binding.self_attribute, shadow.id())? {
                    let mut copy = Record::new(binding.source_through.as_str())
                        .with(binding.self_attribute.as_str(), origin.id.clone());
                    for column in &binding.pivot_attributes {
                        copy.set(column.as_str(), row.get(column).clone());
                    }
                    if let Some(pivot) = registry.entity(&binding.source_through) {
                        stamp_save_times(&mut copy, pivot, true);
                    }
                    store.insert(copy)?;
                }
            }
        }
    }

    // The shadow's copies of auto_now attributes are stale by now.
    stamp_save_times(&mut origin, &registration.source, false);
    store.save(&origin)?;

    shadow.set_status(ReviewStatus::Published);
    write_shadow(store, registry, shadow)?;

    info!(
        source = %schema.source,
        origin = %origin.id,
        shadow = %shadow.id(),
        actor = %actor.username,
        "Published edit suggestion"
    );
    registration.config.notify_publish(shadow, actor);
    Ok(origin)
}

/// Stamp `auto_now` attributes, and `auto_now_add` ones on new rows, as a save does.
fn stamp_save_times(record: &mut Record, entity: &EntitySchema, created: bool) {
    let now = Utc::now();
    for attr in &entity.attributes {
        if attr.auto_now || (created && attr.auto_now_add) {
            record.set(attr.name.as_str(), now);
        }
    }
}

/// Mark the shadow rejected with `reason`. The origin is untouched.
pub fn reject(
    store: &dyn Store,
    registry: &Registry,
    shadow: &mut ShadowRecord,
    actor: &Actor,
    reason: &str,
) -> SuggestResult<()> {
    let registration = registration_for(registry, shadow)?;
    authorize(store, registration, shadow, actor, "reject")?;

    shadow.set_status(ReviewStatus::Rejected);
    shadow.set_reject_reason(reason);
    write_shadow(store, registry, shadow)?;

    info!(
        source = %registration.schema.source,
        shadow = %shadow.id(),
        actor = %actor.username,
        "Rejected edit suggestion"
    );
    registration.config.notify_reject(shadow, actor, reason);
    Ok(())
}
