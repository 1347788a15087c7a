//! Inbound suggestion data.
//!
//! [`NewSuggestion`] is what the Scoped Accessor creates a shadow from. It is
//! built either programmatically or from untyped key/value input with
//! [`NewSuggestion::from_json`], which maps keys using the tracked-attribute
//! partition and ignores everything else.

use crate::attribute::{AttributeDescriptor, AttributeKind};
use crate::entity::Actor;
use crate::error::{SuggestError, SuggestResult};
use crate::schema::{ShadowSchema, REASON};
use chrono::{DateTime, NaiveDate, Utc};
use redline_ids::ActorId;
use redline_store::{RecordId, Value};
use serde_json::Value as Json;
use std::collections::BTreeMap;

/// Key carrying the member id of a pivot row in inbound data.
pub const PIVOT_MEMBER_KEY: &str = "pk";

/// One pivot row of a through relation: the member plus supplementary columns.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotRow {
    pub member: RecordId,
    pub values: BTreeMap<String, Value>,
}

impl PivotRow {
    pub fn new(member: RecordId) -> Self {
        Self {
            member,
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(attribute.into(), value.into());
        self
    }
}

/// Data for a new shadow record.
///
/// Tracked values, members and pivot rows left unset are copied from the
/// origin on creation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewSuggestion {
    pub id: Option<RecordId>,
    pub actor: Option<ActorId>,
    pub reason: String,
    pub values: BTreeMap<String, Value>,
    pub members: BTreeMap<String, Vec<RecordId>>,
    pub pivots: BTreeMap<String, Vec<PivotRow>>,
}

impl NewSuggestion {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            ..Self::default()
        }
    }

    /// Use a pre-assigned identity.
    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn by(mut self, actor: &Actor) -> Self {
        self.actor = Some(actor.id.clone());
        self
    }

    pub fn set(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(attribute.into(), value.into());
        self
    }

    /// Members of a plain many-to-many relation.
    pub fn members(mut self, relation: impl Into<String>, members: Vec<RecordId>) -> Self {
        self.members.insert(relation.into(), members);
        self
    }

    /// Append a pivot row to a through relation.
    pub fn pivot(mut self, relation: impl Into<String>, row: PivotRow) -> Self {
        self.pivots.entry(relation.into()).or_default().push(row);
        self
    }

    /// Map raw inbound data onto the tracked attributes of `schema`.
    pub fn from_json(schema: &ShadowSchema, actor: Option<&Actor>, data: &Json) -> SuggestResult<Self> {
        let object = data
            .as_object()
            .ok_or_else(|| SuggestError::validation("suggestion data must be a JSON object"))?;

        let reason = object
            .get(REASON)
            .and_then(Json::as_str)
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| SuggestError::validation("reason is required"))?;

        let mut new = NewSuggestion::new(reason);
        new.actor = actor.map(|a| a.id.clone());

        for name in schema.tracked.direct() {
            let (Some(raw), Some(attr)) = (object.get(name), schema.attribute(name)) else {
                continue;
            };
            new.values.insert(name.to_string(), coerce(attr, raw)?);
        }

        for relation in &schema.relations {
            let Some(raw) = object.get(&relation.name) else {
                continue;
            };
            let items = raw.as_array().ok_or_else(|| {
                SuggestError::validation(format!("{} must be an array", relation.name))
            })?;

            match &relation.through {
                None => {
                    let members = items
                        .iter()
                        .map(|item| parse_ref(&relation.name, item))
                        .collect::<SuggestResult<Vec<_>>>()?;
                    new.members.insert(relation.name.clone(), members);
                }
                Some(binding) => {
                    let pivot_schema = schema
                        .through_entities
                        .iter()
                        .find(|e| e.name == binding.shadow_through);
                    let mut rows = Vec::with_capacity(items.len());
                    for item in items {
                        let fields = item.as_object().ok_or_else(|| {
                            SuggestError::validation(format!(
                                "{} entries must be objects with a '{}' key",
                                relation.name, PIVOT_MEMBER_KEY
                            ))
                        })?;
                        let member_raw = fields.get(PIVOT_MEMBER_KEY).ok_or_else(|| {
                            SuggestError::validation(format!(
                                "{} entry is missing '{}'",
                                relation.name, PIVOT_MEMBER_KEY
                            ))
                        })?;
                        let mut row = PivotRow::new(parse_ref(&relation.name, member_raw)?);

                        for column in binding
                            .pivot_attributes
                            .iter()
                            .filter(|c| **c != binding.target_attribute)
                        {
                            let Some(raw) = fields.get(column) else {
                                continue;
                            };
                            let value = match pivot_schema.and_then(|p| p.attribute(column)) {
                                Some(attr) => coerce(attr, raw)?,
                                None => json_to_value(raw),
                            };
                            row.values.insert(column.clone(), value);
                        }
                        rows.push(row);
                    }
                    new.pivots.insert(relation.name.clone(), rows);
                }
            }
        }

        Ok(new)
    }
}

fn parse_ref(attribute: &str, raw: &Json) -> SuggestResult<RecordId> {
    let text = match raw {
        Json::String(s) => s.as_str(),
        _ => {
            return Err(SuggestError::validation(format!(
                "{}: expected a record id string",
                attribute
            )))
        }
    };
    RecordId::parse(text)
        .map_err(|e| SuggestError::validation(format!("{}: {}", attribute, e)))
}

/// Convert a raw input value according to the attribute's kind.
pub fn coerce(attr: &AttributeDescriptor, raw: &Json) -> SuggestResult<Value> {
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let invalid = |expected: &str| {
        SuggestError::validation(format!("{}: expected {}, got {}", attr.name, expected, raw))
    };

    match &attr.kind {
        AttributeKind::AutoIdentity
        | AttributeKind::BigAutoIdentity
        | AttributeKind::OrderWithRespectTo
        | AttributeKind::Integer
        | AttributeKind::BigInteger => raw
            .as_i64()
            .or_else(|| raw.as_str().and_then(|s| s.trim().parse().ok()))
            .map(Value::Integer)
            .ok_or_else(|| invalid("an integer")),
        AttributeKind::Real => raw
            .as_f64()
            .or_else(|| raw.as_str().and_then(|s| s.trim().parse().ok()))
            .map(Value::Real)
            .ok_or_else(|| invalid("a number")),
        AttributeKind::Boolean => raw.as_bool().map(Value::Bool).ok_or_else(|| invalid("a boolean")),
        AttributeKind::Text { max_length } => {
            let text = raw.as_str().ok_or_else(|| invalid("a string"))?;
            if let Some(max) = max_length {
                if text.chars().count() > *max {
                    return Err(SuggestError::validation(format!(
                        "{}: longer than {} characters",
                        attr.name, max
                    )));
                }
            }
            Ok(Value::Text(text.to_string()))
        }
        AttributeKind::File { .. } => raw
            .as_str()
            .map(|s| Value::Text(s.to_string()))
            .ok_or_else(|| invalid("a file path")),
        AttributeKind::Timestamp => raw
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|ts| Value::Timestamp(ts.with_timezone(&Utc)))
            .ok_or_else(|| invalid("an RFC 3339 timestamp")),
        AttributeKind::Date => raw
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .map(|d| Value::Text(d.to_string()))
            .ok_or_else(|| invalid("a YYYY-MM-DD date")),
        AttributeKind::ForeignKey(_) => parse_ref(&attr.name, raw).map(Value::Ref),
    }
}

/// Best-effort conversion for values with no known attribute.
pub fn json_to_value(raw: &Json) -> Value {
    match raw {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => n
            .as_i64()
            .map(Value::Integer)
            .or_else(|| n.as_f64().map(Value::Real))
            .unwrap_or(Value::Null),
        Json::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}
