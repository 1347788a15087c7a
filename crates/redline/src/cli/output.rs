//! Terminal and JSON renderings shared by the CLI commands.

use chrono::{DateTime, Utc};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use redline_schema::ReviewStatus;
use redline_store::{Record, Value};
use serde_json::{json, Map, Value as Json};

const CELL_MAX_CHARS: usize = 60;

/// Relative-age units, largest first, with their length in seconds.
const AGE_UNITS: [(&str, i64); 4] = [("day", 86_400), ("hour", 3_600), ("minute", 60), ("second", 1)];

/// Ages at or past this many seconds are shown as an absolute date.
const ABSOLUTE_AFTER_SECS: i64 = 7 * 86_400;

/// Age of `time` such as "3 hours ago"; a week or older prints `%Y-%m-%d %H:%M`.
pub fn format_ago(time: &DateTime<Utc>) -> String {
    format_ago_from(time, Utc::now())
}

fn format_ago_from(time: &DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = (now - *time).num_seconds();
    if age < 0 {
        return "just now".to_string();
    }
    if age >= ABSOLUTE_AFTER_SECS {
        return time.format("%Y-%m-%d %H:%M").to_string();
    }
    let (unit, count) = AGE_UNITS
        .iter()
        .map(|(unit, size)| (*unit, age / size))
        .find(|(_, count)| *count > 0)
        .unwrap_or(("second", 0));
    let suffix = if count == 1 { "" } else { "s" };
    format!("{count} {unit}{suffix} ago")
}

/// Shorten long cell content to one line.
pub fn truncate(text: &str) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= CELL_MAX_CHARS {
        return single_line;
    }
    let kept: String = single_line.chars().take(CELL_MAX_CHARS - 3).collect();
    format!("{}...", kept)
}

pub fn status_color(status: Option<ReviewStatus>) -> Option<Color> {
    match status {
        Some(ReviewStatus::Pending) => Some(Color::Yellow),
        Some(ReviewStatus::Published) => Some(Color::Green),
        Some(ReviewStatus::Rejected) => Some(Color::Red),
        None => None,
    }
}

/// A stored value as plain JSON (no type tags).
pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => json!(b),
        Value::Integer(i) => json!(i),
        Value::Real(r) => json!(r),
        Value::Text(s) => json!(s),
        Value::Timestamp(ts) => json!(ts.to_rfc3339()),
        Value::Ref(id) => json!(id.as_str()),
    }
}

/// A record as a flat JSON object with its `id` first.
pub fn record_to_json(record: &Record) -> Json {
    let mut object = Map::new();
    object.insert("id".to_string(), json!(record.id.as_str()));
    for (attribute, value) in &record.values {
        if attribute != "id" {
            object.insert(attribute.clone(), value_to_json(value));
        }
    }
    Json::Object(object)
}

fn styled_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(|h| Cell::new(h).fg(Color::Cyan)));
    table
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut table = styled_table(headers);
    for row in rows {
        table.add_row(row);
    }
    println!("{table}");
}

/// Like [`print_table`], but each cell may carry a foreground color.
pub fn print_table_colored(headers: &[&str], rows: Vec<Vec<(String, Option<Color>)>>) {
    let mut table = styled_table(headers);
    for row in rows {
        table.add_row(
            row.into_iter()
                .map(|(text, color)| color.into_iter().fold(Cell::new(text), Cell::fg)),
        );
    }
    println!("{table}");
}

/// Print a value as pretty JSON.
pub fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
