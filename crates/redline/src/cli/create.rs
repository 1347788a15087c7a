//! Create command - Insert a source record
//!
//! Keys of `--data` are attributes of the entity or, for registered
//! entities, names of its extra relations:
//! - plain relations take an array of member ids
//! - through relations take an array of `{"pk": <member id>, <pivot columns>...}`

use crate::cli::context::{parse_data, Workspace};
use crate::cli::output::{print_json, record_to_json};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use redline_schema::intake::coerce;
use redline_schema::{EntitySchema, Registration};
use redline_store::{Record, RecordId, Store};
use serde_json::{Map, Value as Json};
use tracing::info;

#[derive(Debug)]
pub struct CreateArgs {
    pub entity: String,
    pub data: String,
    pub json: bool,
}

pub fn run(ws: &Workspace, args: CreateArgs) -> Result<()> {
    let registry = ws.desk.registry();
    let schema = registry
        .entity(&args.entity)
        .with_context(|| format!("Entity {} is not declared in redline.toml", args.entity))?;
    if schema.is_abstract {
        bail!("{} is abstract and has no records of its own", schema.name);
    }
    let data = parse_data(&args.data)?;
    let object = data.as_object().context("--data must be a JSON object")?;

    let registration = registry.registration(&schema.name);
    let record = build_record(schema, registration, object)?;
    let store = ws.desk.store();
    store.insert(record.clone())?;

    if let Some(registration) = registration {
        write_relations(ws, registration, &record.id, object)?;
    }

    info!(entity = %schema.name, id = %record.id, "Created source record");

    if args.json {
        return print_json(&record_to_json(&record));
    }
    println!("Created {} {}", schema.name, record.id);
    Ok(())
}

/// Attribute values of a new record; relation keys are left for later.
fn build_record(
    schema: &EntitySchema,
    registration: Option<&Registration>,
    object: &Map<String, Json>,
) -> Result<Record> {
    let mut record = Record::new(schema.name.as_str());
    let now = Utc::now();
    for attr in &schema.attributes {
        if let Some(default) = &attr.default {
            record.set(attr.name.as_str(), default.clone());
        }
        if attr.auto_now || attr.auto_now_add {
            record.set(attr.name.as_str(), now);
        }
    }

    for (key, raw) in object {
        let is_relation = registration
            .map(|r| r.schema.relation(key).is_some())
            .unwrap_or(false);
        if is_relation {
            continue;
        }
        match schema.attribute(key) {
            Some(attr) if attr.primary_key => {
                bail!("{} is the identity of {} and is assigned automatically", key, schema.name)
            }
            Some(attr) => record.set(key.as_str(), coerce(attr, raw)?),
            None => bail!("{} is not an attribute of {}", key, schema.name),
        }
    }
    Ok(record)
}

fn member_id(relation: &str, raw: &Json) -> Result<RecordId> {
    let text = raw
        .as_str()
        .with_context(|| format!("{}: member ids must be strings", relation))?;
    RecordId::parse(text).with_context(|| format!("{}: invalid member id", relation))
}

fn write_relations(
    ws: &Workspace,
    registration: &Registration,
    owner: &RecordId,
    object: &Map<String, Json>,
) -> Result<()> {
    let store = ws.desk.store();
    let schema = &registration.schema;

    for relation in &schema.relations {
        let Some(raw) = object.get(&relation.name) else {
            continue;
        };
        let items = raw
            .as_array()
            .with_context(|| format!("{}: expected an array", relation.name))?;

        match &relation.through {
            None => {
                let members = items
                    .iter()
                    .map(|item| member_id(&relation.name, item))
                    .collect::<Result<Vec<_>>>()?;
                store.set_members(&schema.source_relation_key(&relation.name), owner, &members)?;
            }
            Some(binding) => {
                let pivot_schema = ws.desk.registry().entity(&binding.source_through);
                for item in items {
                    let row = item
                        .as_object()
                        .with_context(|| format!("{}: pivot rows must be objects", relation.name))?;
                    let member = member_id(
                        &relation.name,
                        row.get("pk").unwrap_or(&Json::Null),
                    )?;

                    let mut pivot = Record::new(binding.source_through.as_str())
                        .with(binding.self_attribute.as_str(), owner.clone())
                        .with(binding.target_attribute.as_str(), member);
                    for (column, raw) in row {
                        if column == "pk"
                            || *column == binding.self_attribute
                            || *column == binding.target_attribute
                        {
                            continue;
                        }
                        let attr = pivot_schema
                            .and_then(|s| s.attribute(column))
                            .with_context(|| {
                                format!("{} is not a column of {}", column, binding.source_through)
                            })?;
                        pivot.set(column.as_str(), coerce(attr, raw)?);
                    }
                    store.insert(pivot)?;
                }
            }
        }
    }
    Ok(())
}
