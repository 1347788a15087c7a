//! Schema command - Show the derived shadow schema of an entity

use crate::cli::context::Workspace;
use crate::cli::output::{print_json, print_table};
use anyhow::Result;
use redline_schema::{AttributeDescriptor, ShadowSchema, TrackedAttributes};

pub fn run(ws: &Workspace, entity: &str, json: bool) -> Result<()> {
    let registration = ws.registration(entity)?;
    let schema = &registration.schema;

    if json {
        // The entity schemas are what a migration generator consumes.
        return print_json(&serde_json::json!({
            "accessor": registration.accessor,
            "shadow": &**schema,
            "entities": schema.all_entity_schemas(),
        }));
    }

    println!(
        "{} -> {}.{} (accessor: {})",
        schema.source, schema.namespace, schema.name, registration.accessor
    );
    println!();
    print_table(&["ATTRIBUTE", "KIND", "FLAGS", "TRACKED"], attribute_rows(schema));

    if !schema.relations.is_empty() {
        println!();
        let rows = schema
            .relations
            .iter()
            .map(|relation| {
                let (through, columns) = match &relation.through {
                    Some(binding) => (
                        format!("{} (from {})", binding.shadow_through, binding.source_through),
                        binding.pivot_attributes.join(", "),
                    ),
                    None => ("-".to_string(), "-".to_string()),
                };
                vec![relation.name.clone(), relation.target.clone(), through, columns]
            })
            .collect();
        print_table(&["RELATION", "TARGET", "THROUGH", "PIVOT COLUMNS"], rows);
    }

    println!();
    println!(
        "{} tracked: {} scalar, {} foreign, {} many-to-many",
        schema.tracked.len(),
        schema.tracked.scalar.len(),
        schema.tracked.foreign.len(),
        schema.tracked.many_to_many.len()
    );
    println!("Capabilities: {}", schema.capabilities.join(", "));
    Ok(())
}

fn attribute_rows(schema: &ShadowSchema) -> Vec<Vec<String>> {
    schema
        .attributes
        .iter()
        .map(|attr| {
            vec![
                attr.name.clone(),
                attr.kind.label(),
                flags(attr),
                tracked_as(&schema.tracked, &attr.name).to_string(),
            ]
        })
        .collect()
}

fn flags(attr: &AttributeDescriptor) -> String {
    let mut flags = Vec::new();
    if attr.primary_key {
        flags.push("pk");
    }
    if attr.unique {
        flags.push("unique");
    }
    if attr.indexed {
        flags.push("indexed");
    }
    if attr.nullable {
        flags.push("null");
    }
    if attr.auto_now {
        flags.push("auto_now");
    }
    if attr.auto_now_add {
        flags.push("auto_now_add");
    }
    if attr.default.is_some() {
        flags.push("default");
    }
    flags.join(" ")
}

fn tracked_as(tracked: &TrackedAttributes, name: &str) -> &'static str {
    if tracked.scalar.iter().any(|a| a == name) {
        "scalar"
    } else if tracked.foreign.iter().any(|a| a == name) {
        "foreign"
    } else {
        "-"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redline_schema::{build, EntitySchema, ShadowConfig};

    fn shadow() -> ShadowSchema {
        let source = EntitySchema::new(
            "Article",
            vec![
                AttributeDescriptor::identity("id"),
                AttributeDescriptor::text("slug", 50).unique(),
                AttributeDescriptor::foreign_key("author", "User").nullable(),
            ],
        );
        build(&source, &ShadowConfig::staff_only()).unwrap()
    }

    #[test]
    fn test_flags_of_transformed_unique() {
        let schema = shadow();
        let slug = schema.attribute("slug").unwrap();
        assert_eq!(flags(slug), "indexed");
    }

    #[test]
    fn test_rows_mark_tracked_kinds() {
        let schema = shadow();
        let rows = attribute_rows(&schema);
        let tracked = |name: &str| {
            rows.iter()
                .find(|row| row[0] == name)
                .map(|row| row[3].clone())
                .unwrap()
        };
        assert_eq!(tracked("slug"), "scalar");
        assert_eq!(tracked("author"), "foreign");
        assert_eq!(tracked("review_status"), "-");
    }
}
