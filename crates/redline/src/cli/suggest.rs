//! Suggestion commands - propose, list, diff, publish and reject

use crate::cli::context::{parse_data, parse_id, Workspace};
use crate::cli::output::{
    format_ago, print_json, print_table, print_table_colored, record_to_json, status_color,
    truncate, value_to_json,
};
use anyhow::{Context, Result};
use redline_schema::{ChangeRecord, FieldValue, NewSuggestion, ReviewStatus, ShadowRecord};
use serde_json::{json, Value as Json};
use tracing::info;

#[derive(Debug)]
pub struct ProposeArgs {
    pub entity: String,
    pub origin: String,
    pub actor: String,
    pub data: String,
    pub json: bool,
}

pub fn propose(ws: &Workspace, args: ProposeArgs) -> Result<()> {
    let registration = ws.registration(&args.entity)?;
    let origin_id = parse_id(&args.origin)?;
    let actor = ws.actor(&args.actor, &registration.schema.actor_entity)?;
    let data = parse_data(&args.data)?;

    let new = NewSuggestion::from_json(&registration.schema, Some(&actor), &data)?;
    let shadow = ws.desk.suggestions(&args.entity, &origin_id)?.create(new)?;

    info!(entity = %args.entity, shadow = %shadow.id(), actor = %actor.username, "Proposed edit suggestion");

    if args.json {
        return print_json(&shadow_json(ws, &shadow)?);
    }
    println!("{}", ws.desk.describe(&shadow)?);
    println!("  id: {}", shadow.id());
    let changes = ws.desk.diff(&shadow)?;
    if changes.is_empty() {
        println!("  (no changes against the current record)");
    } else {
        println!("  changes: {}", changes.changed_attributes.join(", "));
    }
    Ok(())
}

#[derive(Debug)]
pub struct ListArgs {
    pub entity: String,
    pub origin: String,
    pub status: Option<String>,
    pub json: bool,
}

pub fn list(ws: &Workspace, args: ListArgs) -> Result<()> {
    ws.registration(&args.entity)?;
    let origin_id = parse_id(&args.origin)?;
    let status = args
        .status
        .as_deref()
        .map(|s| {
            ReviewStatus::parse(s)
                .with_context(|| format!("Unknown status '{}' (pending, published, rejected)", s))
        })
        .transpose()?;

    let shadows = ws.desk.suggestions(&args.entity, &origin_id)?.list(status)?;

    if args.json {
        let items = shadows
            .iter()
            .map(|shadow| shadow_json(ws, shadow))
            .collect::<Result<Vec<_>>>()?;
        return print_json(&items);
    }

    if shadows.is_empty() {
        println!("No edit suggestions for {} {}.", args.entity, origin_id);
        return Ok(());
    }

    let rows = shadows
        .iter()
        .map(|shadow| {
            let status = shadow.status();
            vec![
                (shadow.id().to_string(), None),
                (
                    status.map(|s| s.as_str().to_string()).unwrap_or_else(|| "?".to_string()),
                    status_color(status),
                ),
                (author(ws, shadow), None),
                (truncate(shadow.reason().unwrap_or("")), None),
                (shadow.created_at().map(format_ago).unwrap_or_default(), None),
            ]
        })
        .collect();
    print_table_colored(&["ID", "STATUS", "BY", "REASON", "CREATED"], rows);
    println!();
    println!("{} edit suggestions", shadows.len());
    Ok(())
}

pub fn diff(ws: &Workspace, entity: &str, shadow_id: &str, json: bool) -> Result<()> {
    let shadow = ws.desk.load_shadow(entity, &parse_id(shadow_id)?)?;
    let changes = ws.desk.diff(&shadow)?;

    if json {
        return print_json(&change_json(&shadow, &changes));
    }

    println!("{}", ws.desk.describe(&shadow)?);
    if changes.is_empty() {
        println!("No changes.");
        return Ok(());
    }
    let rows = changes
        .changes
        .iter()
        .map(|change| {
            vec![
                change.attribute.clone(),
                truncate(&change.old.to_string()),
                truncate(&change.new.to_string()),
            ]
        })
        .collect();
    print_table(&["ATTRIBUTE", "CURRENT", "SUGGESTED"], rows);
    Ok(())
}

pub fn publish(ws: &Workspace, entity: &str, shadow_id: &str, actor: &str, json: bool) -> Result<()> {
    let registration = ws.registration(entity)?;
    let mut shadow = ws.desk.load_shadow(entity, &parse_id(shadow_id)?)?;
    let actor = ws.actor(actor, &registration.schema.actor_entity)?;

    let origin = ws.desk.publish(&mut shadow, &actor)?;

    if json {
        return print_json(&json!({
            "shadow": shadow_json(ws, &shadow)?,
            "origin": record_to_json(&origin),
        }));
    }
    println!(
        "Published {} to {} {}",
        shadow.id(),
        entity,
        registration.source.display(&origin)
    );
    Ok(())
}

#[derive(Debug)]
pub struct RejectArgs {
    pub entity: String,
    pub shadow: String,
    pub actor: String,
    pub reason: String,
    pub json: bool,
}

pub fn reject(ws: &Workspace, args: RejectArgs) -> Result<()> {
    let registration = ws.registration(&args.entity)?;
    let mut shadow = ws.desk.load_shadow(&args.entity, &parse_id(&args.shadow)?)?;
    let actor = ws.actor(&args.actor, &registration.schema.actor_entity)?;

    ws.desk.reject(&mut shadow, &actor, &args.reason)?;

    if args.json {
        return print_json(&shadow_json(ws, &shadow)?);
    }
    println!("Rejected {}: {}", shadow.id(), args.reason);
    Ok(())
}

fn author(ws: &Workspace, shadow: &ShadowRecord) -> String {
    let Some(id) = shadow.actor_id() else {
        return "-".to_string();
    };
    ws.config
        .actors
        .iter()
        .find(|a| a.id.as_str() == id.as_str())
        .map(|a| a.username.clone())
        .unwrap_or_else(|| id.to_string())
}

fn shadow_json(ws: &Workspace, shadow: &ShadowRecord) -> Result<Json> {
    let mut value = record_to_json(shadow.record());
    if let Some(object) = value.as_object_mut() {
        object.insert(
            "status".to_string(),
            json!(shadow.status().map(|s| s.as_str())),
        );
        object.insert("description".to_string(), json!(ws.desk.describe(shadow)?));
    }
    Ok(value)
}

fn field_json(value: &FieldValue) -> Json {
    match value {
        FieldValue::Scalar(value) => value_to_json(value),
        FieldValue::Members(ids) => Json::Array(ids.iter().map(|id| json!(id.as_str())).collect()),
    }
}

fn change_json(shadow: &ShadowRecord, changes: &ChangeRecord) -> Json {
    json!({
        "shadow": shadow.id().as_str(),
        "origin": changes.origin.id.as_str(),
        "status": shadow.status().map(|s| s.as_str()),
        "changed_attributes": changes.changed_attributes,
        "changes": changes
            .changes
            .iter()
            .map(|c| json!({
                "attribute": c.attribute,
                "old": field_json(&c.old),
                "new": field_json(&c.new),
            }))
            .collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use redline_schema::Change;
    use redline_store::{Record, RecordId, Value};

    #[test]
    fn test_change_json_is_plain() {
        let origin = Record::new("Article").with("title", "Hello");
        let shadow = ShadowRecord::from_record(
            Record::new("EditSuggestionArticle")
                .with("title", "Hello, world")
                .with("review_status", 0i64),
        );
        let member = RecordId::new();
        let changes = ChangeRecord {
            changed_attributes: vec!["title".to_string(), "labels".to_string()],
            changes: vec![
                Change {
                    attribute: "title".to_string(),
                    old: FieldValue::Scalar(Value::from("Hello")),
                    new: FieldValue::Scalar(Value::from("Hello, world")),
                },
                Change {
                    attribute: "labels".to_string(),
                    old: FieldValue::Members(vec![]),
                    new: FieldValue::Members(vec![member.clone()]),
                },
            ],
            origin: origin.clone(),
            shadow: shadow.record().clone(),
        };

        let json = change_json(&shadow, &changes);
        assert_eq!(json["status"], json!("pending"));
        assert_eq!(json["origin"], json!(origin.id.as_str()));
        assert_eq!(json["changes"][0]["old"], json!("Hello"));
        assert_eq!(json["changes"][0]["new"], json!("Hello, world"));
        assert_eq!(json["changes"][1]["new"], json!([member.as_str()]));
    }
}
