//! Derived shadow schemas and review status.

use crate::attribute::AttributeDescriptor;
use crate::entity::EntitySchema;
use redline_store::RelationKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Proposing actor (nullable reference to the actor entity).
pub const ACTOR: &str = "actor";
/// The source instance the shadow proposes to change.
pub const ORIGIN: &str = "origin";
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";
/// Why the edit is proposed.
pub const REASON: &str = "reason";
pub const REVIEW_STATUS: &str = "review_status";
pub const REJECT_REASON: &str = "reject_reason";

/// Bookkeeping attributes present on every shadow, in declaration order.
pub const BOOKKEEPING_ATTRIBUTES: [&str; 7] = [
    ACTOR,
    ORIGIN,
    CREATED_AT,
    UPDATED_AT,
    REASON,
    REVIEW_STATUS,
    REJECT_REASON,
];

/// Identity attribute of every shadow and through clone.
pub const SHADOW_IDENTITY: &str = "id";

/// Capability contributed to every shadow schema (diffing against the origin).
pub const SHARED_CAPABILITY: &str = "EditSuggestionChanges";

/// Where a shadow record is in its lifecycle.
///
/// PENDING moves to PUBLISHED or REJECTED; both are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Published,
    Rejected,
}

impl ReviewStatus {
    /// Stored integer code.
    pub fn code(&self) -> i64 {
        match self {
            ReviewStatus::Pending => 0,
            ReviewStatus::Published => 1,
            ReviewStatus::Rejected => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ReviewStatus::Pending),
            1 => Some(ReviewStatus::Published),
            2 => Some(ReviewStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Published => "published",
            ReviewStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" | "under_review" | "under review" => Some(ReviewStatus::Pending),
            "published" => Some(ReviewStatus::Published),
            "rejected" => Some(ReviewStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReviewStatus::Pending)
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Names of the attributes a shadow mirrors from its source, by bucket.
///
/// Enumeration order is declaration order within each bucket; diffing and
/// publishing walk scalar, then foreign, then many-to-many.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedAttributes {
    pub scalar: Vec<String>,
    pub foreign: Vec<String>,
    pub many_to_many: Vec<String>,
}

impl TrackedAttributes {
    /// Scalar and foreign names, in enumeration order.
    pub fn direct(&self) -> impl Iterator<Item = &str> {
        self.scalar
            .iter()
            .chain(self.foreign.iter())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scalar.iter().any(|n| n == name)
            || self.foreign.iter().any(|n| n == name)
            || self.many_to_many.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.scalar.len() + self.foreign.len() + self.many_to_many.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pivot entities of a through relation on both sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThroughBinding {
    /// Pivot entity owned by source records
    pub source_through: String,
    /// Cloned pivot entity owned by shadow records
    pub shadow_through: String,
    /// Pivot attribute referencing the owner
    pub self_attribute: String,
    /// Pivot attribute referencing the member
    pub target_attribute: String,
    /// Every pivot attribute copied on publish (target included, owner excluded)
    pub pivot_attributes: Vec<String>,
}

/// A many-to-many relation on the shadow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManyToManyAttribute {
    pub name: String,
    /// Resolved member entity; never the shadow itself
    pub target: String,
    pub through: Option<ThroughBinding>,
    pub related_name: String,
}

/// Metadata of a shadow schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowMeta {
    pub ordering: Vec<String>,
    pub latest_by: String,
    pub display_name: String,
    pub cascade_on_source_delete: bool,
}

/// The derived schema of one suggestable source entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowSchema {
    pub name: String,
    pub namespace: String,
    /// Source entity name
    pub source: String,
    /// Identity, tracked, base and bookkeeping attributes, in that order
    pub attributes: Vec<AttributeDescriptor>,
    pub relations: Vec<ManyToManyAttribute>,
    /// Cloned pivot entities owned by the shadow
    pub through_entities: Vec<EntitySchema>,
    pub tracked: TrackedAttributes,
    pub meta: ShadowMeta,
    /// Shared capability first, then configured bases
    pub capabilities: Vec<String>,
    pub actor_entity: String,
}

impl ShadowSchema {
    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&ManyToManyAttribute> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Membership key of a plain relation on the shadow side.
    pub fn relation_key(&self, relation: &str) -> RelationKey {
        RelationKey::new(self.name.as_str(), relation)
    }

    /// Membership key of the same relation on the source side.
    pub fn source_relation_key(&self, relation: &str) -> RelationKey {
        RelationKey::new(self.source.as_str(), relation)
    }

    /// Plain entity schema, for migration generation and display.
    pub fn entity_schema(&self) -> EntitySchema {
        let mut schema = EntitySchema::new(self.name.as_str(), self.attributes.clone())
            .with_namespace(self.namespace.as_str())
            .with_display_name(self.meta.display_name.as_str());
        schema.ordering = self.meta.ordering.clone();
        schema.latest_by = Some(self.meta.latest_by.clone());
        schema
    }

    /// The shadow schema followed by its through clones.
    pub fn all_entity_schemas(&self) -> Vec<EntitySchema> {
        let mut schemas = vec![self.entity_schema()];
        schemas.extend(self.through_entities.iter().cloned());
        schemas
    }
}
