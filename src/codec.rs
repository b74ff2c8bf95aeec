// Task list blob encoding

use crate::models::Task;
use eyre::{Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{info, warn};

/// Serialize the full list as a JSON array, preserving order
pub fn encode(tasks: &[Task]) -> Result<String> {
    serde_json::to_string(tasks).context("Failed to serialize task list")
}

/// Decode a persisted task list blob
///
/// Never fails: a blob that is not a JSON array decodes to an empty list.
/// Elements that don't parse as a task, have blank text, or repeat an
/// earlier id are skipped with a warning.
pub fn decode(blob: &str) -> Vec<Task> {
    let items = match serde_json::from_str::<Value>(blob) {
        Ok(Value::Array(items)) => items,
        Ok(other) => {
            warn!(kind = value_kind(&other), "Task blob is not an array, starting empty");
            return Vec::new();
        }
        Err(e) => {
            warn!(error = ?e, "Failed to parse task blob, starting empty");
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    let mut tasks = Vec::with_capacity(items.len());

    for (index, item) in items.into_iter().enumerate() {
        let task: Task = match serde_json::from_value(item) {
            Ok(t) => t,
            Err(e) => {
                warn!(index, error = ?e, "Failed to parse task, skipping");
                continue;
            }
        };

        if task.text.trim().is_empty() {
            warn!(index, id = task.id, "Task has empty text, skipping");
            continue;
        }

        if !seen.insert(task.id) {
            warn!(index, id = task.id, "Duplicate task id, keeping first");
            continue;
        }

        tasks.push(task);
    }

    info!(count = tasks.len(), "Loaded tasks from blob");
    tasks
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
