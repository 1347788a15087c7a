//! Entity schemas and the capability every suggestable entity implements.

use crate::attribute::AttributeDescriptor;
use redline_ids::ActorId;
use redline_store::Record;
use serde::{Deserialize, Serialize};

/// Default namespace for entities that do not declare one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Default entity type of suggestion authors.
pub const DEFAULT_ACTOR_ENTITY: &str = "User";

/// Runtime description of an entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    /// Type name (e.g. "Article")
    pub name: String,

    /// Namespace (application label) the type lives in
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Human-readable name (e.g. "article")
    pub display_name: String,

    /// Attribute used when rendering an instance as text
    #[serde(default)]
    pub display_attribute: Option<String>,

    /// Ordered attributes, identity included
    pub attributes: Vec<AttributeDescriptor>,

    /// Template entity that is never stored itself
    #[serde(default)]
    pub is_abstract: bool,

    /// Ancestor type names, nearest first
    #[serde(default)]
    pub parents: Vec<String>,

    /// Default ordering (`-attribute` for descending)
    #[serde(default)]
    pub ordering: Vec<String>,

    /// Attribute used for "latest" lookups
    #[serde(default)]
    pub latest_by: Option<String>,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl EntitySchema {
    pub fn new(name: impl Into<String>, attributes: Vec<AttributeDescriptor>) -> Self {
        let name = name.into();
        Self {
            display_name: name.to_lowercase(),
            name,
            namespace: default_namespace(),
            display_attribute: None,
            attributes,
            is_abstract: false,
            parents: Vec::new(),
            ordering: Vec::new(),
            latest_by: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_display_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.display_attribute = Some(attribute.into());
        self
    }

    pub fn abstract_template(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parents.push(parent.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// The primary identity attribute, if declared.
    pub fn identity(&self) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.primary_key)
    }

    /// Whether `other` is this entity or one of its ancestors.
    pub fn is_or_inherits(&self, other: &str) -> bool {
        self.name == other || self.parents.iter().any(|p| p == other)
    }

    /// Render an instance for humans: the display attribute, else `Entity id`.
    pub fn display(&self, record: &Record) -> String {
        self.display_attribute
            .as_deref()
            .map(|attr| record.get(attr))
            .filter(|value| !value.is_null())
            .map(|value| value.to_string())
            .unwrap_or_else(|| format!("{} {}", self.name, record.id))
    }
}

/// Capability implemented by every statically declared suggestable entity.
///
/// The shadow schema builder consumes the descriptors uniformly; no
/// reflection over the implementing type takes place.
pub trait Entity {
    /// Type name used for storage and registration.
    fn entity_name() -> &'static str;

    /// Ordered attribute descriptors, identity included.
    fn describe_attributes() -> Vec<AttributeDescriptor>;

    /// Full schema. Override to set namespace, display name or ancestry.
    fn schema() -> EntitySchema {
        EntitySchema::new(Self::entity_name(), Self::describe_attributes())
    }
}

/// The acting user of a request: author of a suggestion or its reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub username: String,
    #[serde(default)]
    pub staff: bool,
}

impl Actor {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: ActorId::new(),
            username: username.into(),
            staff: false,
        }
    }

    pub fn staff(username: impl Into<String>) -> Self {
        Self {
            staff: true,
            ..Self::new(username)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tag;

    impl Entity for Tag {
        fn entity_name() -> &'static str {
            "Tag"
        }

        fn describe_attributes() -> Vec<AttributeDescriptor> {
            vec![
                AttributeDescriptor::identity("id"),
                AttributeDescriptor::text("name", 126),
            ]
        }
    }

    #[test]
    fn test_entity_capability_builds_schema() {
        let schema = Tag::schema();
        assert_eq!(schema.name, "Tag");
        assert_eq!(schema.display_name, "tag");
        assert_eq!(schema.namespace, DEFAULT_NAMESPACE);
        assert_eq!(schema.identity().map(|a| a.name.as_str()), Some("id"));
        assert!(schema.attribute("name").is_some());
    }

    #[test]
    fn test_display_falls_back_to_identity() {
        let schema = Tag::schema().with_display_attribute("name");
        let named = Record::new("Tag").with("name", "rust");
        assert_eq!(schema.display(&named), "rust");

        let unnamed = Record::new("Tag");
        assert_eq!(schema.display(&unnamed), format!("Tag {}", unnamed.id));
    }

    #[test]
    fn test_is_or_inherits() {
        let schema = EntitySchema::new("Article", vec![]).with_parent("Publishable");
        assert!(schema.is_or_inherits("Article"));
        assert!(schema.is_or_inherits("Publishable"));
        assert!(!schema.is_or_inherits("Tag"));
    }
}
