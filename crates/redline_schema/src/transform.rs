//! Field Transformer.
//!
//! Turns a source attribute into one that is safe on a shadow schema. Many
//! shadows (pending, published, rejected) coexist with the live record, so
//! nothing copied here may claim identity, uniqueness or exclusive ownership
//! of a related record.

use crate::attribute::{AttributeDescriptor, AttributeKind, OnDelete, RelationTarget};
use serde::{Deserialize, Serialize};

/// Max length of a file path kept in [`FileStorage::Path`] mode.
pub const FILE_PATH_MAX_LENGTH: usize = 100;

/// How file attributes are represented on a shadow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStorage {
    /// Bounded path string
    Path,
    /// Unbounded text
    #[default]
    Text,
}

/// Reverse accessor name for a relation copied onto the shadow of `source`.
pub fn related_name_for(name: &str, source: &str) -> String {
    format!("{}_{}", name, source)
}

/// Transforms attributes of one source entity.
#[derive(Debug, Clone)]
pub struct FieldTransformer {
    source_entity: String,
    file_storage: FileStorage,
}

impl FieldTransformer {
    pub fn new(source_entity: impl Into<String>) -> Self {
        Self {
            source_entity: source_entity.into(),
            file_storage: FileStorage::default(),
        }
    }

    pub fn with_file_storage(mut self, file_storage: FileStorage) -> Self {
        self.file_storage = file_storage;
        self
    }

    pub fn source_entity(&self) -> &str {
        &self.source_entity
    }

    /// Produce the shadow-safe copy of `attribute`.
    pub fn transform(&self, attribute: &AttributeDescriptor) -> AttributeDescriptor {
        if attribute.is_relation() {
            return self.transform_relation(attribute);
        }

        let mut out = attribute.clone();

        out.kind = match &attribute.kind {
            AttributeKind::AutoIdentity | AttributeKind::OrderWithRespectTo => AttributeKind::Integer,
            AttributeKind::BigAutoIdentity => AttributeKind::BigInteger,
            // Only the path travels; the payload stays with the source.
            AttributeKind::File { .. } => match self.file_storage {
                FileStorage::Path => AttributeKind::Text {
                    max_length: Some(FILE_PATH_MAX_LENGTH),
                },
                FileStorage::Text => AttributeKind::Text { max_length: None },
            },
            other => other.clone(),
        };

        // Shadows own their own timestamps.
        out.auto_now = false;
        out.auto_now_add = false;

        if out.primary_key || out.unique {
            out.primary_key = false;
            out.unique = false;
            out.indexed = true;
            out.serialize = true;
        }

        out
    }

    fn transform_relation(&self, attribute: &AttributeDescriptor) -> AttributeDescriptor {
        let mut out = attribute.clone();

        if let AttributeKind::ForeignKey(spec) = &mut out.kind {
            // `self` must mean the source type, never the shadow type.
            if spec.target == RelationTarget::SelfRef {
                spec.target = RelationTarget::Entity(self.source_entity.clone());
            }
            spec.one_to_one = false;
            spec.db_constraint = false;
            spec.on_delete = OnDelete::NoAction;
            spec.related_name = Some(related_name_for(&attribute.name, &self.source_entity));
        }

        out.nullable = true;
        out.optional = true;
        out.primary_key = false;
        out.unique = false;
        out.indexed = true;
        out.serialize = true;
        out.auto_now = false;
        out.auto_now_add = false;
        out
    }
}
