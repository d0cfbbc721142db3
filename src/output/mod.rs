mod json;
mod table;
mod yaml;

pub use json::JsonFormatter;
pub use table::TableFormatter;
pub use yaml::YamlFormatter;

use chrono::{DateTime, Utc};
use kube::api::DynamicObject;
use serde_json::Value;
use std::time::Duration;

use crate::cli::OutputFormat;
use resultsctl::results::resources::{ColumnSource, ResourceSchema};

/// Placeholder for cells without a value
const NONE: &str = "---";

#[derive(Debug, Clone)]
pub struct QueryResult {
    /// Kind shown when there are no rows
    pub kind: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl QueryResult {
    /// One row per object, one column per schema column
    pub fn from_objects(schema: &ResourceSchema, objects: &[DynamicObject], now: DateTime<Utc>) -> Self {
        let rows = objects
            .iter()
            .map(|obj| {
                let value = serde_json::to_value(obj).unwrap_or(Value::Null);
                schema
                    .columns
                    .iter()
                    .map(|col| cell(&value, col.source, now))
                    .collect()
            })
            .collect();
        Self {
            kind: schema.kind.clone(),
            columns: schema.columns.iter().map(|c| c.header.clone()).collect(),
            rows,
        }
    }

    pub fn format(&self, no_headers: bool) -> String {
        TableFormatter::format(self, no_headers)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Render a single object in full
pub fn format_object(obj: &DynamicObject, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => JsonFormatter::format(obj),
        OutputFormat::Yaml | OutputFormat::Table => YamlFormatter::format(obj),
    }
}

fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |v, key| v.get(key))
}

fn timestamp(value: &Value, path: &str) -> Option<DateTime<Utc>> {
    lookup(value, path)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Whole seconds, rendered like `2m 5s`
fn human(duration: chrono::TimeDelta) -> String {
    let secs = duration.num_seconds().max(0) as u64;
    humantime::format_duration(Duration::from_secs(secs)).to_string()
}

fn cell(value: &Value, source: ColumnSource, now: DateTime<Utc>) -> String {
    let rendered = match source {
        ColumnSource::Path(path) => lookup(value, path).and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }),
        ColumnSource::Age(path) => timestamp(value, path).map(|t| format!("{} ago", human(now - t))),
        ColumnSource::Duration(start, end) => match (timestamp(value, start), timestamp(value, end)) {
            (Some(start), Some(end)) => Some(human(end - start)),
            _ => None,
        },
        ColumnSource::Status => lookup(value, "status.conditions")
            .and_then(Value::as_array)
            .and_then(|conds| {
                conds
                    .iter()
                    .find(|c| c.get("type").and_then(Value::as_str) == Some("Succeeded"))
            })
            .and_then(|c| c.get("reason").and_then(Value::as_str))
            .map(String::from),
    };
    rendered
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| NONE.to_string())
}
