//! Task identifiers
//!
//! ID Format:
//! - Generated task IDs: `t-{7-char-hash}` (e.g., `t-9d3e5f2`)
//!
//! The hash is derived from title + creation timestamp, so the same title
//! created twice yields two different IDs. The graph treats IDs as opaque:
//! any non-empty token without whitespace parses, which lets IDs from an
//! external task system flow through unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Task ID must not be empty")]
    Empty,

    #[error("Invalid task ID '{0}': IDs must not contain whitespace")]
    Whitespace(String),
}

/// Generates a 7-character hash from title and timestamp
fn generate_hash(title: &str, timestamp: DateTime<Utc>) -> String {
    let input = format!("{}{}", title, timestamp.timestamp_nanos_opt().unwrap_or(0));
    let hash = blake3::hash(input.as_bytes());
    let hex = hash.to_hex();
    hex[..7].to_string()
}

/// Opaque task identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(String);

impl TaskId {
    /// Generates a new `t-{hash}` ID from title and timestamp
    pub fn generate(title: &str, timestamp: DateTime<Utc>) -> Self {
        Self(format!("t-{}", generate_hash(title, timestamp)))
    }

    /// Returns the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl FromStr for TaskId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        if s.chars().any(char::is_whitespace) {
            return Err(IdError::Whitespace(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for TaskId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn generated_id_format() {
        let id = TaskId::generate("Write parser", Utc::now());
        let s = id.to_string();

        assert!(s.starts_with("t-"));
        assert_eq!(s.len(), 9);
        assert!(s[2..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn same_title_different_time_differs() {
        let t1 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 1).unwrap();

        assert_ne!(TaskId::generate("Same", t1), TaskId::generate("Same", t2));
        assert_eq!(TaskId::generate("Same", t1), TaskId::generate("Same", t1));
    }

    #[test]
    fn parse_opaque_ids() {
        let id: TaskId = "JIRA-1234".parse().unwrap();
        assert_eq!(id.as_str(), "JIRA-1234");

        let id: TaskId = "  t-abc1234 ".parse().unwrap();
        assert_eq!(id.as_str(), "t-abc1234");
    }

    #[test]
    fn parse_rejects_bad_ids() {
        assert_eq!("".parse::<TaskId>(), Err(IdError::Empty));
        assert_eq!("   ".parse::<TaskId>(), Err(IdError::Empty));
        assert!(matches!(
            "two words".parse::<TaskId>(),
            Err(IdError::Whitespace(_))
        ));
    }

    #[test]
    fn serde_as_plain_string() {
        let id: TaskId = "t-1234567".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"t-1234567\"");

        let parsed: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);

        assert!(serde_json::from_str::<TaskId>("\"\"").is_err());
    }
}
