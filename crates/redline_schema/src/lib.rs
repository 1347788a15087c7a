//! Edit suggestions for stored records.
//!
//! A source entity registered here gets a derived *shadow schema*. Shadow
//! records hold proposed edits to one origin record; a reviewer publishes
//! them (copying the values back, relations and pivot rows included) or
//! rejects them with a reason. Once reviewed, a shadow can no longer change.
//!
//! # Flow
//!
//! 1. Describe source entities ([`EntitySchema`], or the [`Entity`] trait).
//! 2. Register them at startup with a [`RegistryBuilder`] and a
//!    [`ShadowConfig`]; [`RegistryBuilder::finish`] yields a read-only
//!    [`Registry`].
//! 3. Drive suggestions through a [`ReviewDesk`] over any [`Store`]:
//!
//! ```rust,ignore
//! let desk = ReviewDesk::new(registry, MemoryStore::new());
//! let shadow = desk
//!     .suggestions("Article", &article_id)?
//!     .create(NewSuggestion::new("typo").by(&alice).set("title", "Fixed"))?;
//! let changes = desk.diff(&shadow)?;
//! desk.publish(&mut shadow.clone(), &reviewer)?;
//! ```
//!
//! [`Store`]: redline_store::Store

pub mod accessor;
pub mod attribute;
pub mod builder;
pub mod config;
pub mod desk;
pub mod diff;
pub mod entity;
pub mod error;
pub mod guard;
pub mod intake;
pub mod record;
pub mod registry;
pub mod schema;
pub mod transform;
pub mod transition;

pub use accessor::{ScopedAccessor, UnscopedAccessor};
pub use attribute::{AttributeDescriptor, AttributeKind, ForeignKeySpec, OnDelete, RelationTarget};
pub use builder::build;
pub use config::{BaseCapability, RelationSpec, ShadowConfig, ShadowName, ThroughSpec};
pub use desk::ReviewDesk;
pub use diff::{diff_against_origin, Change, ChangeRecord, FieldValue};
pub use entity::{Actor, Entity, EntitySchema};
pub use error::{ConfigError, SuggestError, SuggestResult};
pub use guard::{LifecycleGuard, WriteInterceptor};
pub use intake::{NewSuggestion, PivotRow};
pub use record::ShadowRecord;
pub use registry::{Registration, Registry, RegistryBuilder};
pub use schema::{ReviewStatus, ShadowSchema, TrackedAttributes};
pub use transform::{FieldTransformer, FileStorage};
