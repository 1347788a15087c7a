//! Shadow Schema Builder.
//!
//! Derives the complete shadow schema of a source entity from its attribute
//! descriptors and its [`ShadowConfig`]. Runs once per registration at
//! startup; the result is immutable afterwards.

use crate::attribute::{AttributeDescriptor, AttributeKind, OnDelete};
use crate::config::{BaseCapability, ShadowConfig, ShadowName, ThroughSpec};
use crate::entity::EntitySchema;
use crate::error::ConfigError;
use crate::schema::{
    ManyToManyAttribute, ShadowMeta, ShadowSchema, ThroughBinding, TrackedAttributes, ACTOR,
    BOOKKEEPING_ATTRIBUTES, CREATED_AT, ORIGIN, REASON, REJECT_REASON, REVIEW_STATUS,
    SHADOW_IDENTITY, SHARED_CAPABILITY, UPDATED_AT,
};
use crate::transform::{related_name_for, FieldTransformer};
use std::collections::BTreeSet;
use tracing::{debug, warn};

type Result<T> = std::result::Result<T, ConfigError>;

/// Default shadow name for an entity type.
pub fn default_shadow_name(entity: &str) -> String {
    format!("EditSuggestion{}", entity)
}

/// Name of the shadow schema derived from `source` under `config`.
pub fn shadow_name(source: &str, config: &ShadowConfig) -> String {
    config
        .custom_name
        .as_ref()
        .map(|name| name.resolve(source))
        .unwrap_or_else(|| default_shadow_name(source))
}

/// Name of a cloned pivot entity. Fixed names only apply to the shadow itself.
fn through_clone_name(through: &str, config: &ShadowConfig) -> String {
    match &config.custom_name {
        Some(ShadowName::Derived(f)) => f(through),
        _ => default_shadow_name(through),
    }
}

fn is_reserved(name: &str) -> bool {
    name == SHADOW_IDENTITY || BOOKKEEPING_ATTRIBUTES.contains(&name)
}

/// Build the shadow schema of `source`.
pub fn build(source: &EntitySchema, config: &ShadowConfig) -> Result<ShadowSchema> {
    let name = shadow_name(&source.name, config);
    let namespace = config
        .namespace
        .clone()
        .unwrap_or_else(|| source.namespace.clone());

    if namespace == source.namespace && name.to_lowercase() == source.name.to_lowercase() {
        return Err(ConfigError::NameConflict {
            name,
            entity: source.name.clone(),
        });
    }

    for excluded in &config.excluded_attributes {
        if source.attribute(excluded).is_none() {
            warn!(
                entity = %source.name,
                attribute = %excluded,
                "Excluded attribute does not exist on the source entity"
            );
        }
    }

    let relation_names: BTreeSet<&str> = config
        .extra_relations
        .iter()
        .map(|r| r.name.as_str())
        .collect();

    let transformer =
        FieldTransformer::new(source.name.as_str()).with_file_storage(config.file_storage);

    let mut attributes = vec![AttributeDescriptor::identity(SHADOW_IDENTITY)];
    let mut tracked = TrackedAttributes::default();

    for attr in &source.attributes {
        if attr.primary_key
            || config.excluded_attributes.contains(&attr.name)
            || relation_names.contains(attr.name.as_str())
        {
            continue;
        }
        if is_reserved(&attr.name) {
            return Err(ConfigError::AttributeConflict {
                attribute: attr.name.clone(),
                entity: source.name.clone(),
            });
        }

        let shadow_attr = transformer.transform(attr);
        if shadow_attr.is_relation() {
            tracked.foreign.push(shadow_attr.name.clone());
        } else {
            tracked.scalar.push(shadow_attr.name.clone());
        }
        debug!(entity = %source.name, attribute = %attr.name, kind = %shadow_attr.kind.label(), "Tracking attribute");
        attributes.push(shadow_attr);
    }

    let mut relations = Vec::with_capacity(config.extra_relations.len());
    let mut through_entities = Vec::new();

    for spec in &config.extra_relations {
        if spec.name.trim().is_empty() {
            return Err(ConfigError::InvalidRelation(format!(
                "{}: relation name must not be empty",
                source.name
            )));
        }
        if is_reserved(&spec.name) {
            return Err(ConfigError::AttributeConflict {
                attribute: spec.name.clone(),
                entity: source.name.clone(),
            });
        }
        if relations
            .iter()
            .any(|r: &ManyToManyAttribute| r.name == spec.name)
        {
            return Err(ConfigError::InvalidRelation(format!(
                "{}.{} declared more than once",
                source.name, spec.name
            )));
        }

        let through = match &spec.through {
            Some(through) => {
                let (clone, binding) = clone_through(&name, &namespace, &spec.name, through, config)?;
                through_entities.push(clone);
                Some(binding)
            }
            None => None,
        };

        tracked.many_to_many.push(spec.name.clone());
        relations.push(ManyToManyAttribute {
            name: spec.name.clone(),
            // `self` is the source entity, never the shadow.
            target: spec.target.resolve(&source.name),
            through,
            related_name: related_name_for(&spec.name, &source.name),
        });
    }

    let base_attributes = validate_bases(&config.bases, &attributes, &relations)?;
    attributes.extend(base_attributes);
    attributes.extend(bookkeeping_attributes(source, config));

    let mut capabilities = vec![SHARED_CAPABILITY.to_string()];
    capabilities.extend(config.bases.iter().map(|b| b.name.clone()));

    let display_name = config
        .display_name
        .clone()
        .unwrap_or_else(|| format!("edit suggestion {}", source.display_name));

    let schema = ShadowSchema {
        name,
        namespace,
        source: source.name.clone(),
        attributes,
        relations,
        through_entities,
        tracked,
        meta: ShadowMeta {
            ordering: vec![format!("-{}", CREATED_AT)],
            latest_by: CREATED_AT.to_string(),
            display_name,
            cascade_on_source_delete: config.cascade_on_source_delete,
        },
        capabilities,
        actor_entity: config.actor_entity.clone(),
    };

    debug!(
        source = %schema.source,
        shadow = %schema.name,
        attributes = schema.attributes.len(),
        relations = schema.relations.len(),
        "Built shadow schema"
    );
    Ok(schema)
}

/// Clone a pivot entity so its owning side references the shadow.
fn clone_through(
    shadow: &str,
    namespace: &str,
    relation: &str,
    through: &ThroughSpec,
    config: &ShadowConfig,
) -> Result<(EntitySchema, ThroughBinding)> {
    let pivot = &through.entity;

    for side in [&through.self_attribute, &through.target_attribute] {
        let is_fk = pivot
            .attribute(side)
            .map(AttributeDescriptor::is_relation)
            .unwrap_or(false);
        if !is_fk {
            return Err(ConfigError::InvalidRelation(format!(
                "{}: through entity {} has no foreign key '{}'",
                relation, pivot.name, side
            )));
        }
    }
    if through.self_attribute == through.target_attribute {
        return Err(ConfigError::InvalidRelation(format!(
            "{}: owner and member sides of {} must differ",
            relation, pivot.name
        )));
    }

    let clone_name = through_clone_name(&pivot.name, config);
    let transformer =
        FieldTransformer::new(pivot.name.as_str()).with_file_storage(config.file_storage);

    let mut attributes = vec![AttributeDescriptor::identity(SHADOW_IDENTITY)];
    let mut pivot_attributes = Vec::new();

    for attr in pivot.attributes.iter().filter(|a| !a.primary_key) {
        if attr.name == through.self_attribute {
            attributes.push(owner_reference(&attr.name, shadow));
            continue;
        }
        pivot_attributes.push(attr.name.clone());
        attributes.push(transformer.transform(attr));
    }

    let schema = EntitySchema::new(clone_name.as_str(), attributes)
        .with_namespace(namespace)
        .with_display_name(format!("edit suggestion {}", pivot.display_name));

    let binding = ThroughBinding {
        source_through: pivot.name.clone(),
        shadow_through: clone_name,
        self_attribute: through.self_attribute.clone(),
        target_attribute: through.target_attribute.clone(),
        pivot_attributes,
    };
    Ok((schema, binding))
}

/// Soft reference from a pivot clone to its owning shadow. Rows die with it.
fn owner_reference(name: &str, shadow: &str) -> AttributeDescriptor {
    let mut attr = AttributeDescriptor::foreign_key(name, shadow)
        .nullable()
        .indexed()
        .on_delete(OnDelete::Cascade);
    if let AttributeKind::ForeignKey(spec) = &mut attr.kind {
        spec.db_constraint = false;
    }
    attr
}

fn validate_bases(
    bases: &[BaseCapability],
    attributes: &[AttributeDescriptor],
    relations: &[ManyToManyAttribute],
) -> Result<Vec<AttributeDescriptor>> {
    let mut names = BTreeSet::new();
    let mut taken: BTreeSet<String> = attributes
        .iter()
        .map(|a| a.name.clone())
        .chain(relations.iter().map(|r| r.name.clone()))
        .chain(BOOKKEEPING_ATTRIBUTES.iter().map(|n| n.to_string()))
        .collect();
    let mut out = Vec::new();

    for base in bases {
        if base.name.trim().is_empty() {
            return Err(ConfigError::InvalidBases(
                "base capability name must not be empty".to_string(),
            ));
        }
        if base.name == SHARED_CAPABILITY || !names.insert(base.name.as_str()) {
            return Err(ConfigError::InvalidBases(format!(
                "base capability '{}' listed more than once",
                base.name
            )));
        }
        for attr in &base.attributes {
            if !taken.insert(attr.name.clone()) {
                return Err(ConfigError::InvalidBases(format!(
                    "attribute '{}' of base '{}' is already defined",
                    attr.name, base.name
                )));
            }
            out.push(attr.clone());
        }
    }
    Ok(out)
}

fn bookkeeping_attributes(source: &EntitySchema, config: &ShadowConfig) -> Vec<AttributeDescriptor> {
    vec![
        AttributeDescriptor::foreign_key(ACTOR, config.actor_entity.as_str())
            .nullable()
            .on_delete(OnDelete::NoAction)
            .related_name(related_name_for("edit_suggestions", &source.name)),
        AttributeDescriptor::foreign_key(ORIGIN, source.name.as_str()).on_delete(OnDelete::Cascade),
        AttributeDescriptor::timestamp(CREATED_AT).auto_now_add(),
        AttributeDescriptor::timestamp(UPDATED_AT).auto_now(),
        AttributeDescriptor::long_text(REASON),
        AttributeDescriptor::integer(REVIEW_STATUS)
            .indexed()
            .with_default(0i64),
        AttributeDescriptor::long_text(REJECT_REASON).with_default(""),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelationSpec;
    use crate::transform::FileStorage;

    fn article() -> EntitySchema {
        EntitySchema::new(
            "Article",
            vec![
                AttributeDescriptor::identity("id"),
                AttributeDescriptor::text("title", 120),
                AttributeDescriptor::text("slug", 50).unique(),
                AttributeDescriptor::foreign_key("author", "User"),
                AttributeDescriptor::file("cover"),
                AttributeDescriptor::timestamp("published").auto_now_add(),
            ],
        )
        .with_namespace("blog")
    }

    fn tag_link() -> EntitySchema {
        EntitySchema::new(
            "ArticleTag",
            vec![
                AttributeDescriptor::identity("id"),
                AttributeDescriptor::foreign_key("article", "Article"),
                AttributeDescriptor::foreign_key("tag", "Tag"),
                AttributeDescriptor::integer("weight"),
            ],
        )
    }

    fn config() -> ShadowConfig {
        ShadowConfig::staff_only()
    }

    // ========================================================================
    // Attributes and partition
    // ========================================================================

    #[test]
    fn test_identity_and_excluded_never_tracked() {
        let schema = build(&article(), &config().exclude(["cover"])).unwrap();

        assert_eq!(schema.name, "EditSuggestionArticle");
        assert_eq!(schema.tracked.scalar, vec!["title", "slug", "published"]);
        assert_eq!(schema.tracked.foreign, vec!["author"]);
        assert!(schema.tracked.many_to_many.is_empty());
        assert!(schema.attribute("cover").is_none());

        // Only the shadow's own identity is primary.
        let primaries: Vec<&str> = schema
            .attributes
            .iter()
            .filter(|a| a.primary_key)
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(primaries, vec![SHADOW_IDENTITY]);
    }

    #[test]
    fn test_bookkeeping_attributes_present() {
        let schema = build(&article(), &config()).unwrap();
        for name in BOOKKEEPING_ATTRIBUTES {
            assert!(schema.attribute(name).is_some(), "missing {}", name);
        }

        let origin = schema.attribute(ORIGIN).unwrap().foreign_key_spec().unwrap();
        assert_eq!(origin.on_delete, OnDelete::Cascade);
        assert_eq!(origin.target.resolve(""), "Article");

        let actor = schema.attribute(ACTOR).unwrap();
        assert!(actor.nullable);
        assert_eq!(
            actor.foreign_key_spec().unwrap().related_name.as_deref(),
            Some("edit_suggestions_Article")
        );
        assert_eq!(
            schema.attribute(REVIEW_STATUS).unwrap().default,
            Some(redline_store::Value::Integer(0))
        );
    }

    #[test]
    fn test_meta_defaults() {
        let schema = build(&article(), &config()).unwrap();
        assert_eq!(schema.meta.ordering, vec!["-created_at"]);
        assert_eq!(schema.meta.latest_by, "created_at");
        assert_eq!(schema.meta.display_name, "edit suggestion article");
        assert_eq!(schema.namespace, "blog");
        assert_eq!(schema.capabilities, vec![SHARED_CAPABILITY]);
    }

    #[test]
    fn test_file_storage_mode_applies() {
        let schema = build(&article(), &config().with_file_storage(FileStorage::Path)).unwrap();
        assert_eq!(
            schema.attribute("cover").unwrap().kind,
            AttributeKind::Text { max_length: Some(100) }
        );
    }

    #[test]
    fn test_bookkeeping_collision_is_rejected() {
        let mut source = article();
        source.attributes.push(AttributeDescriptor::long_text("reason"));

        let err = build(&source, &config()).unwrap_err();
        assert!(matches!(err, ConfigError::AttributeConflict { .. }));

        // Excluding it resolves the conflict.
        assert!(build(&source, &config().exclude(["reason"])).is_ok());
    }

    // ========================================================================
    // Naming
    // ========================================================================

    #[test]
    fn test_custom_name_collision() {
        let cfg = config().with_name(ShadowName::Fixed("ARTICLE".into()));
        let err = build(&article(), &cfg).unwrap_err();
        assert!(matches!(err, ConfigError::NameConflict { .. }));

        // Same name in another namespace is fine.
        let cfg = config()
            .with_name(ShadowName::Fixed("Article".into()))
            .with_namespace("suggestions");
        assert_eq!(build(&article(), &cfg).unwrap().name, "Article");
    }

    #[test]
    fn test_derived_name() {
        fn proposal(source: &str) -> String {
            format!("{}Proposal", source)
        }
        let cfg = config()
            .with_name(ShadowName::Derived(proposal))
            .with_relation(RelationSpec::new("tags", "Tag").through(tag_link(), "article", "tag"));
        let schema = build(&article(), &cfg).unwrap();
        assert_eq!(schema.name, "ArticleProposal");
        assert_eq!(schema.through_entities[0].name, "ArticleTagProposal");
    }

    // ========================================================================
    // Relations
    // ========================================================================

    #[test]
    fn test_self_relation_targets_source() {
        let cfg = config().with_relation(RelationSpec::new("related", "self"));
        let schema = build(&article(), &cfg).unwrap();
        let relation = schema.relation("related").unwrap();
        assert_eq!(relation.target, "Article");
        assert_eq!(relation.related_name, "related_Article");
        assert_eq!(schema.tracked.many_to_many, vec!["related"]);
    }

    #[test]
    fn test_through_clone_owned_by_shadow() {
        let cfg = config().with_relation(
            RelationSpec::new("tags", "Tag").through(tag_link(), "article", "tag"),
        );
        let schema = build(&article(), &cfg).unwrap();

        let binding = schema.relation("tags").unwrap().through.clone().unwrap();
        assert_eq!(binding.source_through, "ArticleTag");
        assert_eq!(binding.shadow_through, "EditSuggestionArticleTag");
        assert_eq!(binding.pivot_attributes, vec!["tag", "weight"]);

        let clone = &schema.through_entities[0];
        assert_eq!(clone.namespace, "blog");
        let owner = clone.attribute("article").unwrap().foreign_key_spec().unwrap();
        assert_eq!(owner.target.resolve(""), "EditSuggestionArticle");
        assert_eq!(owner.on_delete, OnDelete::Cascade);
        assert!(!owner.db_constraint);

        let member = clone.attribute("tag").unwrap().foreign_key_spec().unwrap();
        assert_eq!(member.on_delete, OnDelete::NoAction);
        assert_eq!(clone.identity().map(|a| a.name.as_str()), Some(SHADOW_IDENTITY));
    }

    #[test]
    fn test_through_requires_foreign_keys() {
        let cfg = config().with_relation(
            RelationSpec::new("tags", "Tag").through(tag_link(), "article", "weight"),
        );
        assert!(matches!(
            build(&article(), &cfg).unwrap_err(),
            ConfigError::InvalidRelation(_)
        ));
    }

    #[test]
    fn test_duplicate_relation_rejected() {
        let cfg = config()
            .with_relation(RelationSpec::new("tags", "Tag"))
            .with_relation(RelationSpec::new("tags", "Tag"));
        assert!(matches!(
            build(&article(), &cfg).unwrap_err(),
            ConfigError::InvalidRelation(_)
        ));
    }

    // ========================================================================
    // Bases
    // ========================================================================

    #[test]
    fn test_bases_contribute_untracked_attributes() {
        let base = BaseCapability::new("Moderated", vec![AttributeDescriptor::boolean("flagged")]);
        let schema = build(&article(), &config().with_base(base)).unwrap();
        assert!(schema.attribute("flagged").is_some());
        assert!(!schema.tracked.contains("flagged"));
        assert_eq!(schema.capabilities, vec![SHARED_CAPABILITY, "Moderated"]);
    }

    #[test]
    fn test_invalid_bases() {
        let dup = config()
            .with_base(BaseCapability::new("Moderated", vec![]))
            .with_base(BaseCapability::new("Moderated", vec![]));
        assert!(matches!(
            build(&article(), &dup).unwrap_err(),
            ConfigError::InvalidBases(_)
        ));

        let clash = config().with_base(BaseCapability::new(
            "Titled",
            vec![AttributeDescriptor::text("title", 10)],
        ));
        assert!(matches!(
            build(&article(), &clash).unwrap_err(),
            ConfigError::InvalidBases(_)
        ));

        let unnamed = config().with_base(BaseCapability::new(" ", vec![]));
        assert!(matches!(
            build(&article(), &unnamed).unwrap_err(),
            ConfigError::InvalidBases(_)
        ));
    }
}
