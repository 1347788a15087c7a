//! Configuration for the Redline CLI
//!
//! Paths resolve under `~/.redline/` (or `$REDLINE_HOME`). The entities and
//! their suggestion settings are declared in `redline.toml`.

use anyhow::{bail, Context, Result};
use redline_ids::ActorId;
use redline_schema::{
    Actor, AttributeDescriptor, AttributeKind, EntitySchema, FileStorage, ForeignKeySpec, OnDelete,
    Registry, RegistryBuilder, RelationSpec, ShadowConfig, ShadowName,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub use redline_logging::{logs_dir, redline_home};

const DEFAULT_ACCESSOR: &str = "edit_suggestions";
const DEFAULT_TEXT_LENGTH: usize = 255;

pub fn default_config_path() -> PathBuf {
    redline_home().join("redline.toml")
}

pub fn default_store_path() -> PathBuf {
    redline_home().join("store.db")
}

/// Contents of `redline.toml`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RedlineConfig {
    #[serde(default)]
    pub actors: Vec<ActorConfig>,
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
    #[serde(default)]
    pub suggestions: Vec<SuggestionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    pub id: ActorId,
    pub username: String,
    #[serde(default)]
    pub staff: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub display_attribute: Option<String>,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeConfig {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default)]
    pub auto_now: bool,
    #[serde(default)]
    pub auto_now_add: bool,
    /// Target entity of a `foreign_key` (`self` for the declaring entity)
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub on_delete: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionConfig {
    pub entity: String,
    #[serde(default)]
    pub accessor: Option<String>,
    #[serde(default)]
    pub excluded: Vec<String>,
    /// Usernames allowed to publish or reject besides staff actors
    #[serde(default)]
    pub reviewers: Vec<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub custom_name: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub cascade_on_source_delete: bool,
    #[serde(default)]
    pub inherit: bool,
    /// `path` or `text`
    #[serde(default)]
    pub file_storage: Option<String>,
    #[serde(default)]
    pub extra_relations: Vec<RelationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationConfig {
    pub name: String,
    pub target: String,
    #[serde(default)]
    pub through: Option<String>,
    #[serde(default)]
    pub self_attribute: Option<String>,
    #[serde(default)]
    pub target_attribute: Option<String>,
}

impl RedlineConfig {
    /// Load a config file. A missing file is an error: there is nothing to review without entities.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn actor(&self, username: &str) -> Option<Actor> {
        self.actors
            .iter()
            .find(|a| a.username == username)
            .map(|a| Actor {
                id: a.id.clone(),
                username: a.username.clone(),
                staff: a.staff,
            })
    }

    pub fn entity_schemas(&self) -> Result<Vec<EntitySchema>> {
        self.entities.iter().map(EntityConfig::to_schema).collect()
    }

    /// Declare every `[[suggestions]]` block, then finalize each entity.
    pub fn build_registry(&self) -> Result<Registry> {
        let schemas = self.entity_schemas()?;
        let mut builder = RegistryBuilder::new();

        for suggestion in &self.suggestions {
            let owner = schemas
                .iter()
                .find(|s| s.name == suggestion.entity)
                .with_context(|| {
                    format!("[[suggestions]] names unknown entity {}", suggestion.entity)
                })?;
            let accessor = suggestion
                .accessor
                .clone()
                .unwrap_or_else(|| DEFAULT_ACCESSOR.to_string());
            builder.declare(owner, accessor, suggestion.shadow_config(&schemas)?);
        }

        for schema in &schemas {
            builder
                .finalize(schema)
                .with_context(|| format!("Failed to register edit suggestions for {}", schema.name))?;
        }
        Ok(builder.finish())
    }
}

impl EntityConfig {
    pub fn to_schema(&self) -> Result<EntitySchema> {
        let mut attributes = self
            .attributes
            .iter()
            .map(|a| a.to_descriptor())
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Invalid attributes for entity {}", self.name))?;

        if !attributes.iter().any(|a| a.primary_key) {
            match attributes.iter_mut().find(|a| a.name == "id") {
                Some(id) => {
                    id.primary_key = true;
                    id.unique = true;
                }
                None => attributes.insert(0, AttributeDescriptor::identity("id")),
            }
        }

        let mut schema = EntitySchema::new(self.name.as_str(), attributes);
        if let Some(namespace) = &self.namespace {
            schema = schema.with_namespace(namespace.as_str());
        }
        if let Some(display_name) = &self.display_name {
            schema = schema.with_display_name(display_name.as_str());
        }
        if let Some(attribute) = &self.display_attribute {
            schema = schema.with_display_attribute(attribute.as_str());
        }
        if self.is_abstract {
            schema = schema.abstract_template();
        }
        for parent in &self.parents {
            schema = schema.with_parent(parent.as_str());
        }
        Ok(schema)
    }
}

impl AttributeConfig {
    pub fn to_descriptor(&self) -> Result<AttributeDescriptor> {
        let kind = match self.kind.as_str() {
            "auto" => AttributeKind::AutoIdentity,
            "big_auto" => AttributeKind::BigAutoIdentity,
            "integer" => AttributeKind::Integer,
            "big_integer" => AttributeKind::BigInteger,
            "real" => AttributeKind::Real,
            "boolean" => AttributeKind::Boolean,
            "text" => AttributeKind::Text {
                max_length: Some(self.max_length.unwrap_or(DEFAULT_TEXT_LENGTH)),
            },
            "long_text" => AttributeKind::Text { max_length: None },
            "timestamp" => AttributeKind::Timestamp,
            "date" => AttributeKind::Date,
            "file" => AttributeKind::File { upload_to: None },
            "foreign_key" => {
                let target = self
                    .target
                    .as_deref()
                    .with_context(|| format!("{}: foreign_key needs a target", self.name))?;
                let mut spec = ForeignKeySpec::new(target);
                if let Some(on_delete) = &self.on_delete {
                    spec.on_delete = OnDelete::parse(on_delete).with_context(|| {
                        format!("{}: unknown on_delete '{}'", self.name, on_delete)
                    })?;
                }
                AttributeKind::ForeignKey(spec)
            }
            other => bail!("{}: unknown attribute kind '{}'", self.name, other),
        };

        let mut descriptor = AttributeDescriptor::new(self.name.as_str(), kind);
        descriptor.primary_key = self.primary_key;
        descriptor.unique = self.unique || self.primary_key;
        descriptor.nullable = self.nullable;
        descriptor.indexed = self.indexed;
        descriptor.auto_now = self.auto_now;
        descriptor.auto_now_add = self.auto_now_add;
        Ok(descriptor)
    }
}

impl SuggestionConfig {
    /// Typed configuration for the core. Staff actors and listed reviewers
    /// may publish or reject.
    pub fn shadow_config(&self, schemas: &[EntitySchema]) -> Result<ShadowConfig> {
        let reviewers: BTreeSet<String> = self.reviewers.iter().cloned().collect();
        let mut config = ShadowConfig::new(move |_, actor| {
            actor.staff || reviewers.contains(&actor.username)
        })
        .exclude(self.excluded.iter().cloned())
        .cascade_on_source_delete(self.cascade_on_source_delete);

        if let Some(display_name) = &self.display_name {
            config = config.with_display_name(display_name.as_str());
        }
        if let Some(name) = &self.custom_name {
            config = config.with_name(ShadowName::Fixed(name.clone()));
        }
        if let Some(namespace) = &self.namespace {
            config = config.with_namespace(namespace.as_str());
        }
        if self.inherit {
            config = config.inherit();
        }
        if let Some(mode) = &self.file_storage {
            config = config.with_file_storage(match mode.as_str() {
                "path" => FileStorage::Path,
                "text" => FileStorage::Text,
                other => bail!("unknown file_storage '{}' (expected path or text)", other),
            });
        }

        for relation in &self.extra_relations {
            config = config.with_relation(relation.to_spec(schemas)?);
        }
        Ok(config)
    }
}

impl RelationConfig {
    pub fn to_spec(&self, schemas: &[EntitySchema]) -> Result<RelationSpec> {
        let spec = RelationSpec::new(self.name.as_str(), self.target.as_str());
        let Some(through) = &self.through else {
            return Ok(spec);
        };

        let entity = schemas
            .iter()
            .find(|s| s.name == *through)
            .with_context(|| format!("{}: through entity {} is not declared", self.name, through))?;
        let (Some(self_attribute), Some(target_attribute)) =
            (&self.self_attribute, &self.target_attribute)
        else {
            bail!(
                "{}: a through relation needs self_attribute and target_attribute",
                self.name
            );
        };
        Ok(spec.through(entity.clone(), self_attribute.as_str(), target_attribute.as_str()))
    }
}
