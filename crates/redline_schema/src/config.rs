//! Per-entity shadow configuration.
//!
//! Supplied once per source entity type when it is declared suggestable.
//! Everything the builder and the review transitions need to know about the
//! registration lives here; nothing is read from globals.

use crate::attribute::{AttributeDescriptor, RelationTarget};
use crate::entity::{Actor, EntitySchema, DEFAULT_ACTOR_ENTITY};
use crate::record::ShadowRecord;
use crate::transform::FileStorage;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Decides whether an actor may publish or reject a shadow record.
pub type AuthorizationPredicate = Arc<dyn Fn(&ShadowRecord, &Actor) -> bool + Send + Sync>;

/// Called after a successful publish.
pub type PublishHook = Arc<dyn Fn(&ShadowRecord, &Actor) + Send + Sync>;

/// Called after a successful reject, with the reason.
pub type RejectHook = Arc<dyn Fn(&ShadowRecord, &Actor, &str) + Send + Sync>;

/// Custom naming for the shadow schema.
#[derive(Clone)]
pub enum ShadowName {
    /// Exact name
    Fixed(String),
    /// Name computed from the source type name
    Derived(fn(&str) -> String),
}

impl ShadowName {
    pub fn resolve(&self, source: &str) -> String {
        match self {
            ShadowName::Fixed(name) => name.clone(),
            ShadowName::Derived(f) => f(source),
        }
    }
}

impl fmt::Debug for ShadowName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShadowName::Fixed(name) => f.debug_tuple("Fixed").field(name).finish(),
            ShadowName::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

/// Pivot entity of a many-to-many relation with supplementary columns.
#[derive(Debug, Clone)]
pub struct ThroughSpec {
    /// The pivot entity used by the source type
    pub entity: EntitySchema,
    /// Pivot attribute referencing the owning side
    pub self_attribute: String,
    /// Pivot attribute referencing the member side
    pub target_attribute: String,
}

/// Many-to-many relation mirrored onto the shadow.
#[derive(Debug, Clone)]
pub struct RelationSpec {
    pub name: String,
    pub target: RelationTarget,
    pub through: Option<ThroughSpec>,
}

impl RelationSpec {
    pub fn new(name: impl Into<String>, target: impl Into<RelationTarget>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            through: None,
        }
    }

    pub fn through(
        mut self,
        entity: EntitySchema,
        self_attribute: impl Into<String>,
        target_attribute: impl Into<String>,
    ) -> Self {
        self.through = Some(ThroughSpec {
            entity,
            self_attribute: self_attribute.into(),
            target_attribute: target_attribute.into(),
        });
        self
    }
}

/// Shared behaviour contributed to a shadow schema (a mixin).
///
/// Its attributes are present on the shadow but are not tracked: they are
/// never diffed against, nor published onto, the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseCapability {
    pub name: String,
    pub attributes: Vec<AttributeDescriptor>,
}

impl BaseCapability {
    pub fn new(name: impl Into<String>, attributes: Vec<AttributeDescriptor>) -> Self {
        Self {
            name: name.into(),
            attributes,
        }
    }
}

/// Configuration of one suggestable source entity.
#[derive(Clone)]
pub struct ShadowConfig {
    pub(crate) authorization: AuthorizationPredicate,
    pub(crate) on_publish: Option<PublishHook>,
    pub(crate) on_reject: Option<RejectHook>,
    pub excluded_attributes: BTreeSet<String>,
    pub extra_relations: Vec<RelationSpec>,
    pub actor_entity: String,
    pub display_name: Option<String>,
    pub bases: Vec<BaseCapability>,
    pub cascade_on_source_delete: bool,
    pub custom_name: Option<ShadowName>,
    pub namespace: Option<String>,
    pub inherit: bool,
    pub file_storage: FileStorage,
}

impl ShadowConfig {
    /// Create a configuration guarded by `authorization`.
    pub fn new<F>(authorization: F) -> Self
    where
        F: Fn(&ShadowRecord, &Actor) -> bool + Send + Sync + 'static,
    {
        Self {
            authorization: Arc::new(authorization),
            on_publish: None,
            on_reject: None,
            excluded_attributes: BTreeSet::new(),
            extra_relations: Vec::new(),
            actor_entity: DEFAULT_ACTOR_ENTITY.to_string(),
            display_name: None,
            bases: Vec::new(),
            cascade_on_source_delete: false,
            custom_name: None,
            namespace: None,
            inherit: false,
            file_storage: FileStorage::default(),
        }
    }

    /// Only staff actors may publish or reject.
    pub fn staff_only() -> Self {
        Self::new(|_, actor| actor.staff)
    }

    pub fn on_publish<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ShadowRecord, &Actor) + Send + Sync + 'static,
    {
        self.on_publish = Some(Arc::new(hook));
        self
    }

    pub fn on_reject<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ShadowRecord, &Actor, &str) + Send + Sync + 'static,
    {
        self.on_reject = Some(Arc::new(hook));
        self
    }

    pub fn exclude(mut self, attributes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.excluded_attributes
            .extend(attributes.into_iter().map(Into::into));
        self
    }

    pub fn with_relation(mut self, relation: RelationSpec) -> Self {
        self.extra_relations.push(relation);
        self
    }

    pub fn with_actor_entity(mut self, entity: impl Into<String>) -> Self {
        self.actor_entity = entity.into();
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_base(mut self, base: BaseCapability) -> Self {
        self.bases.push(base);
        self
    }

    pub fn cascade_on_source_delete(mut self, cascade: bool) -> Self {
        self.cascade_on_source_delete = cascade;
        self
    }

    pub fn with_name(mut self, name: ShadowName) -> Self {
        self.custom_name = Some(name);
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Propagate a declaration made on an abstract entity to its subtypes.
    pub fn inherit(mut self) -> Self {
        self.inherit = true;
        self
    }

    pub fn with_file_storage(mut self, file_storage: FileStorage) -> Self {
        self.file_storage = file_storage;
        self
    }

    /// Evaluate the authorization predicate.
    pub fn is_authorized(&self, shadow: &ShadowRecord, actor: &Actor) -> bool {
        (self.authorization)(shadow, actor)
    }

    pub(crate) fn notify_publish(&self, shadow: &ShadowRecord, actor: &Actor) {
        if let Some(hook) = &self.on_publish {
            hook(shadow, actor);
        }
    }

    pub(crate) fn notify_reject(&self, shadow: &ShadowRecord, actor: &Actor, reason: &str) {
        if let Some(hook) = &self.on_reject {
            hook(shadow, actor, reason);
        }
    }
}

impl fmt::Debug for ShadowConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShadowConfig")
            .field("excluded_attributes", &self.excluded_attributes)
            .field("extra_relations", &self.extra_relations)
            .field("actor_entity", &self.actor_entity)
            .field("display_name", &self.display_name)
            .field("bases", &self.bases)
            .field("cascade_on_source_delete", &self.cascade_on_source_delete)
            .field("custom_name", &self.custom_name)
            .field("namespace", &self.namespace)
            .field("inherit", &self.inherit)
            .field("file_storage", &self.file_storage)
            .field("on_publish", &self.on_publish.is_some())
            .field("on_reject", &self.on_reject.is_some())
            .finish()
    }
}
