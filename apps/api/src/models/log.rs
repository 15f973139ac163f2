use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }

    /// Outcome of a run that attempted `attempted` items and produced `generated`.
    pub fn from_counts(attempted: usize, generated: usize) -> Self {
        if generated == 0 {
            RunStatus::Failed
        } else if generated < attempted {
            RunStatus::Partial
        } else {
            RunStatus::Success
        }
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(RunStatus::Success),
            "partial" => Ok(RunStatus::Partial),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status '{other}'")),
        }
    }
}

/// Append-only audit record of one scheduled run for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: RunStatus,
    pub generated_count: u32,
    pub posted_count: u32,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLogEntry {
    pub user_id: Uuid,
    pub run_id: String,
    pub status: RunStatus,
    pub generated_count: u32,
    pub posted_count: u32,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl NewLogEntry {
    pub fn into_entry(self, id: Uuid, timestamp: DateTime<Utc>) -> LogEntry {
        LogEntry {
            id,
            user_id: self.user_id,
            run_id: self.run_id,
            timestamp,
            status: self.status,
            generated_count: self.generated_count,
            posted_count: self.posted_count,
            errors: self.errors,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct LogRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: String,
    pub generated_count: i32,
    pub posted_count: i32,
    pub errors: Vec<String>,
}

impl TryFrom<LogRow> for LogEntry {
    type Error = String;

    fn try_from(row: LogRow) -> Result<Self, Self::Error> {
        Ok(LogEntry {
            id: row.id,
            user_id: row.user_id,
            run_id: row.run_id,
            timestamp: row.timestamp,
            status: row.status.parse()?,
            generated_count: row.generated_count.max(0) as u32,
            posted_count: row.posted_count.max(0) as u32,
            errors: row.errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_from_counts() {
        assert_eq!(RunStatus::from_counts(3, 3), RunStatus::Success);
        assert_eq!(RunStatus::from_counts(3, 1), RunStatus::Partial);
        assert_eq!(RunStatus::from_counts(3, 0), RunStatus::Failed);
        assert_eq!(RunStatus::from_counts(0, 0), RunStatus::Failed);
    }

    #[test]
    fn test_run_status_wire_format() {
        assert_eq!(serde_json::to_string(&RunStatus::Partial).unwrap(), r#""partial""#);
        assert_eq!("failed".parse::<RunStatus>().unwrap(), RunStatus::Failed);
    }
}
