// Data models for the task list

use chrono::{SecondsFormat, Utc};
use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category assigned when the caller leaves it blank
pub const DEFAULT_CATEGORY: &str = "personal";

/// A single to-do entry
///
/// Field names are persisted in camelCase so blobs stay readable by the
/// browser app that writes the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_category")]
    pub category: String,
    /// ISO-8601 calendar date (`YYYY-MM-DD`), stored as `""` when unset
    #[serde(default, with = "due_date_format")]
    pub due_date: Option<String>,
    /// Older blobs call this field `timestamp`; empty when a record never had one
    #[serde(default, alias = "timestamp")]
    pub created_at: String,
}

impl Task {
    /// Sort key for due-date ordering; a missing date compares as `""`
    pub fn due_key(&self) -> &str {
        self.due_date.as_deref().unwrap_or("")
    }
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

mod due_date_format {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        let value: Option<String> = Option::deserialize(deserializer)?;
        Ok(value.filter(|s| !s.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

impl FromStr for Priority {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(eyre!("Invalid priority: {} (expected low, medium or high)", other)),
        }
    }
}

/// Active/total tally derived from the current list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskCount {
    pub active: usize,
    pub total: usize,
}

impl fmt::Display for TaskCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.total, self.active) {
            (0, _) => write!(f, "No tasks"),
            (_, 1) => write!(f, "1 task remaining"),
            (_, n) => write!(f, "{} tasks remaining", n),
        }
    }
}

/// Helper function to get current timestamp in milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current time as an ISO-8601 UTC string with millisecond precision
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        Task {
            id: 1_704_067_200_000,
            text: "Buy milk".to_string(),
            completed: false,
            priority: Priority::High,
            category: "errand".to_string(),
            due_date: Some("2024-01-10".to_string()),
            created_at: "2024-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn test_now_ms() {
        let ts = now_ms();
        // Should be reasonable timestamp (after year 2020)
        assert!(ts > 1_600_000_000_000);
    }

    #[test]
    fn test_now_iso_format() {
        let ts = now_iso();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), "2024-01-01T00:00:00.000Z".len());
    }

    #[test]
    fn test_task_serializes_camel_case() {
        let json = serde_json::to_string(&sample_task()).unwrap();
        assert!(json.contains("\"dueDate\":\"2024-01-10\""));
        assert!(json.contains("\"createdAt\":\"2024-01-01T00:00:00.000Z\""));
        assert!(json.contains("\"priority\":\"high\""));
    }

    #[test]
    fn test_missing_due_date_written_as_empty_string() {
        let mut task = sample_task();
        task.due_date = None;
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"dueDate\":\"\""));

        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back.due_date, None);
        assert_eq!(back.due_key(), "");
    }

    #[test]
    fn test_legacy_timestamp_and_defaults() {
        let json = r#"{"id":5,"text":"Old","timestamp":"2023-05-01T12:00:00.000Z"}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.created_at, "2023-05-01T12:00:00.000Z");
        assert!(!task.completed);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.category, DEFAULT_CATEGORY);
        assert_eq!(task.due_date, None);
    }

    #[test]
    fn test_missing_creation_time_is_empty() {
        let json = r#"{"id":1,"text":"No stamp","completed":true,"priority":"low","category":"work","dueDate":""}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.created_at, "");
        assert!(task.completed);

        let back: Task = serde_json::from_str(&serde_json::to_string(&task).unwrap()).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn test_priority_parse_and_display() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!(" low ".parse::<Priority>().unwrap(), Priority::Low);
        assert!("urgent".parse::<Priority>().is_err());
        assert_eq!(Priority::Medium.to_string(), "medium");
    }

    #[test]
    fn test_task_count_display() {
        assert_eq!(TaskCount { active: 0, total: 0 }.to_string(), "No tasks");
        assert_eq!(TaskCount { active: 1, total: 3 }.to_string(), "1 task remaining");
        assert_eq!(TaskCount { active: 0, total: 2 }.to_string(), "0 tasks remaining");
        assert_eq!(TaskCount { active: 4, total: 4 }.to_string(), "4 tasks remaining");
    }
}
