//! Lifecycle Guard: pre-write interception of shadow records.

use crate::error::{SuggestError, SuggestResult};
use crate::record::ShadowRecord;
use redline_store::{Record, RecordId, Store};
use tracing::warn;

/// Pre-write hook scoped to one entity type.
pub trait WriteInterceptor: Send + Sync {
    /// Entity whose writes are intercepted.
    fn entity(&self) -> &str;

    /// Called before `record` is written. An error aborts the write.
    fn before_write(&self, store: &dyn Store, record: &Record) -> SuggestResult<()>;
}

/// Refuses writes to a shadow once its review status has left PENDING.
#[derive(Debug, Clone)]
pub struct LifecycleGuard {
    shadow_entity: String,
}

impl LifecycleGuard {
    pub fn new(shadow_entity: impl Into<String>) -> Self {
        Self {
            shadow_entity: shadow_entity.into(),
        }
    }

    /// Check the persisted version of a shadow by identity.
    ///
    /// A missing record is a first-time creation and passes.
    pub fn check(&self, store: &dyn Store, id: &RecordId) -> SuggestResult<()> {
        let Some(persisted) = store.get(&self.shadow_entity, id)? else {
            return Ok(());
        };

        let persisted = ShadowRecord::from_record(persisted);
        if persisted.is_pending() {
            return Ok(());
        }

        let status = persisted
            .status()
            .map(|s| s.as_str())
            .unwrap_or("unknown");
        warn!(
            entity = %self.shadow_entity,
            id = %id,
            status = status,
            "Refused write to a reviewed edit suggestion"
        );
        Err(SuggestError::permission_denied(
            "Edit suggestion cannot be modified once the status changed",
        ))
    }
}

impl WriteInterceptor for LifecycleGuard {
    fn entity(&self) -> &str {
        &self.shadow_entity
    }

    fn before_write(&self, store: &dyn Store, record: &Record) -> SuggestResult<()> {
        self.check(store, &record.id)
    }
}
