//! Attribute descriptors.
//!
//! A descriptor is the storage-level description of one attribute of an
//! entity: its kind plus the flags that matter when a shadow copy of it is
//! derived (identity, uniqueness, indexing, auto-populated timestamps,
//! relation behaviour).

use redline_store::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a foreign reference points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationTarget {
    /// The entity declaring the attribute
    #[serde(rename = "self")]
    SelfRef,
    /// A named entity
    Entity(String),
}

impl RelationTarget {
    pub fn entity(name: impl Into<String>) -> Self {
        Self::Entity(name.into())
    }

    /// Resolve `self` against the declaring entity.
    pub fn resolve(&self, declaring: &str) -> String {
        match self {
            RelationTarget::SelfRef => declaring.to_string(),
            RelationTarget::Entity(name) => name.clone(),
        }
    }
}

impl From<&str> for RelationTarget {
    fn from(value: &str) -> Self {
        if value == "self" {
            RelationTarget::SelfRef
        } else {
            RelationTarget::Entity(value.to_string())
        }
    }
}

impl fmt::Display for RelationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationTarget::SelfRef => write!(f, "self"),
            RelationTarget::Entity(name) => write!(f, "{}", name),
        }
    }
}

/// What happens to the referencing record when its target is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDelete {
    #[default]
    Cascade,
    NoAction,
    SetNull,
    Protect,
}

impl OnDelete {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cascade => "cascade",
            Self::NoAction => "no_action",
            Self::SetNull => "set_null",
            Self::Protect => "protect",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cascade" => Some(Self::Cascade),
            "no_action" | "do_nothing" => Some(Self::NoAction),
            "set_null" => Some(Self::SetNull),
            "protect" => Some(Self::Protect),
            _ => None,
        }
    }
}

/// Foreign reference details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeySpec {
    pub target: RelationTarget,
    pub on_delete: OnDelete,
    /// Whether the storage layer enforces the reference
    pub db_constraint: bool,
    /// Name of the reverse accessor on the target
    pub related_name: Option<String>,
    /// Cardinality-one exclusivity (one-to-one)
    pub one_to_one: bool,
}

impl ForeignKeySpec {
    pub fn new(target: impl Into<RelationTarget>) -> Self {
        Self {
            target: target.into(),
            on_delete: OnDelete::Cascade,
            db_constraint: true,
            related_name: None,
            one_to_one: false,
        }
    }
}

/// Storage kind of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttributeKind {
    /// Auto-incrementing 32-bit identity
    AutoIdentity,
    /// Auto-incrementing 64-bit identity
    BigAutoIdentity,
    /// Ordering proxy maintained relative to a parent
    OrderWithRespectTo,
    Integer,
    BigInteger,
    Real,
    Boolean,
    /// Bounded (`max_length`) or unbounded text
    Text { max_length: Option<usize> },
    Timestamp,
    Date,
    /// Stored file content
    File { upload_to: Option<String> },
    ForeignKey(ForeignKeySpec),
}

impl AttributeKind {
    pub fn is_relation(&self) -> bool {
        matches!(self, AttributeKind::ForeignKey(_))
    }

    pub fn foreign_key(&self) -> Option<&ForeignKeySpec> {
        match self {
            AttributeKind::ForeignKey(spec) => Some(spec),
            _ => None,
        }
    }

    /// Short label for tables and logs.
    pub fn label(&self) -> String {
        match self {
            AttributeKind::AutoIdentity => "auto".to_string(),
            AttributeKind::BigAutoIdentity => "big_auto".to_string(),
            AttributeKind::OrderWithRespectTo => "order_wrt".to_string(),
            AttributeKind::Integer => "integer".to_string(),
            AttributeKind::BigInteger => "big_integer".to_string(),
            AttributeKind::Real => "real".to_string(),
            AttributeKind::Boolean => "boolean".to_string(),
            AttributeKind::Text { max_length: Some(n) } => format!("text({})", n),
            AttributeKind::Text { max_length: None } => "long_text".to_string(),
            AttributeKind::Timestamp => "timestamp".to_string(),
            AttributeKind::Date => "date".to_string(),
            AttributeKind::File { .. } => "file".to_string(),
            AttributeKind::ForeignKey(spec) => format!("fk -> {}", spec.target),
        }
    }
}

/// One attribute of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub name: String,
    #[serde(flatten)]
    pub kind: AttributeKind,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default)]
    pub nullable: bool,
    /// May be left empty on input
    #[serde(default)]
    pub optional: bool,
    /// Participates in serialization
    #[serde(default = "default_true")]
    pub serialize: bool,
    /// Populated with the current time on every write
    #[serde(default)]
    pub auto_now: bool,
    /// Populated with the current time on creation
    #[serde(default)]
    pub auto_now_add: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

fn default_true() -> bool {
    true
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            primary_key: false,
            unique: false,
            indexed: false,
            nullable: false,
            optional: false,
            serialize: true,
            auto_now: false,
            auto_now_add: false,
            default: None,
        }
    }

    /// The conventional auto-incrementing `id` identity.
    pub fn identity(name: impl Into<String>) -> Self {
        let mut attr = Self::new(name, AttributeKind::AutoIdentity);
        attr.primary_key = true;
        attr.unique = true;
        attr.serialize = false;
        attr
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::Integer)
    }

    pub fn real(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::Real)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::Boolean)
    }

    pub fn text(name: impl Into<String>, max_length: usize) -> Self {
        Self::new(name, AttributeKind::Text { max_length: Some(max_length) })
    }

    pub fn long_text(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::Text { max_length: None })
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::Timestamp)
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::File { upload_to: None })
    }

    pub fn foreign_key(name: impl Into<String>, target: impl Into<RelationTarget>) -> Self {
        Self::new(name, AttributeKind::ForeignKey(ForeignKeySpec::new(target)))
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self.optional = true;
        self
    }

    pub fn auto_now(mut self) -> Self {
        self.auto_now = true;
        self
    }

    pub fn auto_now_add(mut self) -> Self {
        self.auto_now_add = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Set the delete behaviour of a foreign reference. No-op for other kinds.
    pub fn on_delete(mut self, on_delete: OnDelete) -> Self {
        if let AttributeKind::ForeignKey(spec) = &mut self.kind {
            spec.on_delete = on_delete;
        }
        self
    }

    /// Mark a foreign reference as one-to-one. No-op for other kinds.
    pub fn one_to_one(mut self) -> Self {
        if let AttributeKind::ForeignKey(spec) = &mut self.kind {
            spec.one_to_one = true;
            self.unique = true;
        }
        self
    }

    /// Set the reverse accessor name of a foreign reference. No-op for other kinds.
    pub fn related_name(mut self, name: impl Into<String>) -> Self {
        if let AttributeKind::ForeignKey(spec) = &mut self.kind {
            spec.related_name = Some(name.into());
        }
        self
    }

    pub fn is_relation(&self) -> bool {
        self.kind.is_relation()
    }

    pub fn foreign_key_spec(&self) -> Option<&ForeignKeySpec> {
        self.kind.foreign_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_primary_and_unique() {
        let id = AttributeDescriptor::identity("id");
        assert!(id.primary_key);
        assert!(id.unique);
        assert_eq!(id.kind, AttributeKind::AutoIdentity);
    }

    #[test]
    fn test_relation_target_from_str() {
        assert_eq!(RelationTarget::from("self"), RelationTarget::SelfRef);
        assert_eq!(RelationTarget::from("Tag"), RelationTarget::entity("Tag"));
        assert_eq!(RelationTarget::SelfRef.resolve("Article"), "Article");
    }

    #[test]
    fn test_fk_builders_only_touch_relations() {
        let fk = AttributeDescriptor::foreign_key("author", "User")
            .on_delete(OnDelete::Protect)
            .one_to_one();
        let spec = fk.foreign_key_spec().unwrap();
        assert_eq!(spec.on_delete, OnDelete::Protect);
        assert!(spec.one_to_one);
        assert!(fk.unique);

        let text = AttributeDescriptor::text("title", 64).on_delete(OnDelete::Protect);
        assert!(text.foreign_key_spec().is_none());
    }

    #[test]
    fn test_on_delete_parse() {
        assert_eq!(OnDelete::parse("DO_NOTHING"), Some(OnDelete::NoAction));
        assert_eq!(OnDelete::parse("cascade"), Some(OnDelete::Cascade));
        assert_eq!(OnDelete::parse("explode"), None);
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(AttributeDescriptor::text("t", 10).kind.label(), "text(10)");
        assert_eq!(AttributeDescriptor::long_text("t").kind.label(), "long_text");
        assert_eq!(
            AttributeDescriptor::foreign_key("a", "self").kind.label(),
            "fk -> self"
        );
    }
}
