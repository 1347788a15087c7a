//! Registration Manager.
//!
//! Declarations are attached to entity types during startup. When an entity
//! type is finalized, every declaration that applies to it is built into a
//! shadow schema and registered. Once [`RegistryBuilder::finish`] returns,
//! the [`Registry`] is read-only and can be shared by reference.
//!
//! ```rust,ignore
//! let mut builder = RegistryBuilder::new();
//! builder.register(&article_schema, "edit_suggestions", ShadowConfig::staff_only())?;
//! let registry = Arc::new(builder.finish());
//! ```

use crate::builder;
use crate::config::ShadowConfig;
use crate::entity::{Entity, EntitySchema};
use crate::error::{ConfigError, SuggestResult};
use crate::guard::{LifecycleGuard, WriteInterceptor};
use crate::schema::ShadowSchema;
use redline_store::{Record, Store};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

type Result<T> = std::result::Result<T, ConfigError>;

/// A source entity registered for edit suggestions.
#[derive(Debug, Clone)]
pub struct Registration {
    pub source: EntitySchema,
    /// Name of the accessor exposed on the source entity
    pub accessor: String,
    pub schema: Arc<ShadowSchema>,
    pub config: ShadowConfig,
}

/// A pending declaration, not yet applied to a finalized entity.
#[derive(Debug, Clone)]
struct Declaration {
    owner: String,
    owner_is_abstract: bool,
    accessor: String,
    config: ShadowConfig,
}

impl Declaration {
    fn applies_to(&self, entity: &EntitySchema) -> bool {
        if entity.is_abstract {
            return false;
        }
        if entity.name == self.owner {
            return true;
        }
        let inherits = entity.parents.iter().any(|p| *p == self.owner);
        inherits && (self.owner_is_abstract || self.config.inherit)
    }
}

/// Collects declarations during startup.
#[derive(Default)]
pub struct RegistryBuilder {
    declarations: Vec<Declaration>,
    entities: BTreeMap<String, EntitySchema>,
    registrations: BTreeMap<String, Registration>,
    interceptors: Vec<Arc<dyn WriteInterceptor>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a shadow configuration to `owner`. Nothing is built until the
    /// owner (or, for templates, a subtype) is finalized.
    pub fn declare(&mut self, owner: &EntitySchema, accessor: impl Into<String>, config: ShadowConfig) {
        if owner.is_abstract && !config.inherit {
            warn!(
                entity = %owner.name,
                "Edit suggestions declared on abstract entity without inherit; \
                 only concrete subtypes will be registered"
            );
        }
        self.declarations.push(Declaration {
            owner: owner.name.clone(),
            owner_is_abstract: owner.is_abstract,
            accessor: accessor.into(),
            config,
        });
    }

    /// Finalize an entity type, registering every declaration that applies
    /// to it. Returns the shadow schemas registered for it.
    pub fn finalize(&mut self, entity: &EntitySchema) -> Result<Vec<Arc<ShadowSchema>>> {
        self.check_not_derived(entity)?;
        self.entities.insert(entity.name.clone(), entity.clone());

        let applicable: Vec<Declaration> = self
            .declarations
            .iter()
            .filter(|d| d.applies_to(entity))
            .cloned()
            .collect();

        if applicable.is_empty() {
            debug!(entity = %entity.name, "No edit suggestion declarations apply");
        }

        let mut registered = Vec::with_capacity(applicable.len());
        for declaration in applicable {
            registered.push(self.install(entity, declaration.accessor, declaration.config)?);
        }
        Ok(registered)
    }

    /// Declare and finalize a concrete entity in one step.
    pub fn register(
        &mut self,
        entity: &EntitySchema,
        accessor: impl Into<String>,
        config: ShadowConfig,
    ) -> Result<Arc<ShadowSchema>> {
        if entity.is_abstract {
            return Err(ConfigError::AbstractEntity(entity.name.clone()));
        }
        self.check_not_derived(entity)?;
        self.entities.insert(entity.name.clone(), entity.clone());
        self.install(entity, accessor.into(), config)
    }

    /// Register a statically declared entity type.
    pub fn register_entity<E: Entity>(
        &mut self,
        accessor: impl Into<String>,
        config: ShadowConfig,
    ) -> Result<Arc<ShadowSchema>> {
        self.register(&E::schema(), accessor, config)
    }

    /// Make an entity known without declaring suggestions on it
    /// (actor types, relation targets, pivot entities).
    pub fn add_entity(&mut self, entity: EntitySchema) -> Result<()> {
        self.check_not_derived(&entity)?;
        self.entities.insert(entity.name.clone(), entity);
        Ok(())
    }

    /// A plain entity may not reuse the name of a shadow or through clone.
    fn check_not_derived(&self, entity: &EntitySchema) -> Result<()> {
        let derived = self
            .registrations
            .values()
            .flat_map(|r| r.schema.all_entity_schemas())
            .find(|derived| same_name(derived, &entity.namespace, &entity.name));
        match derived {
            Some(derived) => Err(ConfigError::NameConflict {
                name: entity.name.clone(),
                entity: derived.name,
            }),
            None => Ok(()),
        }
    }

    /// Every entity a new shadow schema adds must have a name not yet taken
    /// by a known entity, an earlier shadow or clone, or a sibling clone.
    fn check_derived_names(&self, schema: &ShadowSchema) -> Result<()> {
        let derived = schema.all_entity_schemas();
        for (i, candidate) in derived.iter().enumerate() {
            let taken = self
                .entities
                .values()
                .chain(&derived[..i])
                .map(|e| (e.namespace.as_str(), e.name.clone()))
                .chain(self.registrations.values().map(|r| {
                    (r.schema.namespace.as_str(), r.schema.name.clone())
                }))
                .find(|(namespace, name)| same_name(candidate, namespace, name));
            if let Some((_, existing)) = taken {
                return Err(ConfigError::NameConflict {
                    name: candidate.name.clone(),
                    entity: existing,
                });
            }
        }
        Ok(())
    }

    fn install(
        &mut self,
        entity: &EntitySchema,
        accessor: String,
        config: ShadowConfig,
    ) -> Result<Arc<ShadowSchema>> {
        if self.registrations.contains_key(&entity.name) {
            return Err(ConfigError::MultipleRegistrations {
                entity: format!("{}.{}", entity.namespace, entity.name),
            });
        }

        let schema = builder::build(entity, &config)?;
        self.check_derived_names(&schema)?;

        self.interceptors
            .push(Arc::new(LifecycleGuard::new(schema.name.as_str())));

        for through in &schema.through_entities {
            self.entities.insert(through.name.clone(), through.clone());
        }
        for spec in config.extra_relations.iter().filter_map(|r| r.through.as_ref()) {
            self.entities
                .entry(spec.entity.name.clone())
                .or_insert_with(|| spec.entity.clone());
        }

        let schema = Arc::new(schema);
        info!(
            source = %entity.name,
            shadow = %schema.name,
            accessor = %accessor,
            tracked = schema.tracked.len(),
            "Registered edit suggestions"
        );

        self.registrations.insert(
            entity.name.clone(),
            Registration {
                source: entity.clone(),
                accessor,
                schema: Arc::clone(&schema),
                config,
            },
        );
        Ok(schema)
    }

    /// Close registration.
    pub fn finish(self) -> Registry {
        Registry {
            entities: self.entities,
            registrations: self.registrations,
            interceptors: self.interceptors,
        }
    }
}

/// Entity names are unique per namespace, ignoring case.
fn same_name(entity: &EntitySchema, namespace: &str, name: &str) -> bool {
    entity.namespace == namespace && entity.name.to_lowercase() == name.to_lowercase()
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("declarations", &self.declarations.len())
            .field("registrations", &self.registrations.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Read-only registry of shadow schemas.
pub struct Registry {
    entities: BTreeMap<String, EntitySchema>,
    registrations: BTreeMap<String, Registration>,
    interceptors: Vec<Arc<dyn WriteInterceptor>>,
}

impl Registry {
    /// Registration of a source entity.
    pub fn registration(&self, source: &str) -> Option<&Registration> {
        self.registrations.get(source)
    }

    /// Like [`Registry::registration`], failing on unregistered types.
    pub fn require(&self, source: &str) -> Result<&Registration> {
        self.registration(source)
            .ok_or_else(|| ConfigError::UnknownEntity(source.to_string()))
    }

    /// Registration owning a shadow entity.
    pub fn registration_for_shadow(&self, shadow: &str) -> Option<&Registration> {
        self.registrations.values().find(|r| r.schema.name == shadow)
    }

    pub fn registrations(&self) -> impl Iterator<Item = &Registration> {
        self.registrations.values()
    }

    /// Name of the shadow accessor on a source entity, if it has one.
    pub fn accessor_name(&self, source: &str) -> Option<&str> {
        self.registration(source).map(|r| r.accessor.as_str())
    }

    /// Any known entity schema: finalized sources, added entities, through clones.
    pub fn entity(&self, name: &str) -> Option<&EntitySchema> {
        self.entities.get(name)
    }

    /// Every derived schema (shadows and through clones), for migration generation.
    pub fn shadow_schemas(&self) -> Vec<EntitySchema> {
        self.registrations
            .values()
            .flat_map(|r| r.schema.all_entity_schemas())
            .collect()
    }

    pub fn interceptors(&self) -> &[Arc<dyn WriteInterceptor>] {
        &self.interceptors
    }

    /// Run every interceptor scoped to the record's entity.
    pub fn before_write(&self, store: &dyn Store, record: &Record) -> SuggestResult<()> {
        self.interceptors
            .iter()
            .filter(|i| i.entity() == record.entity)
            .try_for_each(|i| i.before_write(store, record))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("entities", &self.entities.keys().collect::<Vec<_>>())
            .field("registrations", &self.registrations.keys().collect::<Vec<_>>())
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}
