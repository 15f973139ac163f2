use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle of a draft. `posted` and `failed` are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Scheduled,
    Posted,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Posted => "posted",
            PostStatus::Failed => "failed",
        }
    }

    pub fn can_transition_to(self, next: PostStatus) -> bool {
        use PostStatus::*;
        match (self, next) {
            (a, b) if a == b => true,
            (Draft, Scheduled | Posted | Failed) => true,
            (Scheduled, Posted | Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "scheduled" => Ok(PostStatus::Scheduled),
            "posted" => Ok(PostStatus::Posted),
            "failed" => Ok(PostStatus::Failed),
            other => Err(format!("unknown post status '{other}'")),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("cannot move a {from} post to {to}")]
pub struct TransitionError {
    pub from: PostStatus,
    pub to: PostStatus,
}

/// Where a draft's topic came from. Serialized as `manual` or `reddit:r/<sub>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DraftSource {
    Manual,
    Reddit(String),
    /// Legacy or foreign tags, kept verbatim.
    Other(String),
}

impl fmt::Display for DraftSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftSource::Manual => f.write_str("manual"),
            DraftSource::Reddit(sub) => write!(f, "reddit:r/{sub}"),
            DraftSource::Other(tag) => f.write_str(tag),
        }
    }
}

impl From<String> for DraftSource {
    fn from(raw: String) -> Self {
        if raw == "manual" {
            return DraftSource::Manual;
        }
        match raw.strip_prefix("reddit:") {
            Some(rest) if !rest.is_empty() => {
                let sub = rest.strip_prefix("r/").unwrap_or(rest);
                DraftSource::Reddit(sub.to_string())
            }
            _ => DraftSource::Other(raw),
        }
    }
}

impl From<DraftSource> for String {
    fn from(source: DraftSource) -> Self {
        source.to_string()
    }
}

/// Engagement metadata attached to a draft. All scores are within [0, 1].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizedMeta {
    pub hooks: Vec<String>,
    pub emotional_score: f64,
    pub engagement_prediction: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone_adjustments: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftPost {
    pub id: Uuid,
    pub user_id: Uuid,
    pub source: DraftSource,
    pub topic: String,
    pub raw_generation: String,
    pub optimized_text: String,
    pub optimized_meta: OptimizedMeta,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
    pub linkedin_post_id: Option<String>,
}

/// A draft that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDraft {
    pub user_id: Uuid,
    pub source: DraftSource,
    pub topic: String,
    pub raw_generation: String,
    pub optimized_text: String,
    pub optimized_meta: OptimizedMeta,
}

impl NewDraft {
    pub fn into_draft(self, id: Uuid, created_at: DateTime<Utc>) -> DraftPost {
        DraftPost {
            id,
            user_id: self.user_id,
            source: self.source,
            topic: self.topic,
            raw_generation: self.raw_generation,
            optimized_text: self.optimized_text,
            optimized_meta: self.optimized_meta,
            status: PostStatus::Draft,
            created_at,
            posted_at: None,
            linkedin_post_id: None,
        }
    }
}

/// Partial edit coming from the review screen.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DraftPatch {
    pub optimized_text: Option<String>,
    pub status: Option<PostStatus>,
    pub linkedin_post_id: Option<String>,
}

impl DraftPost {
    /// Applies an edit, enforcing the status lifecycle.
    /// Entering `posted` stamps `posted_at` unless it is already set.
    pub fn apply(&mut self, patch: DraftPatch, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if let Some(next) = patch.status {
            self.transition(next, now)?;
        }
        if let Some(text) = patch.optimized_text {
            self.optimized_text = text;
        }
        if let Some(external_id) = patch.linkedin_post_id {
            self.linkedin_post_id = Some(external_id);
        }
        Ok(())
    }

    pub fn transition(&mut self, next: PostStatus, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next == PostStatus::Posted && self.posted_at.is_none() {
            self.posted_at = Some(now);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DraftRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub source: String,
    pub topic: String,
    pub raw_generation: String,
    pub optimized_text: String,
    pub optimized_meta: Json<OptimizedMeta>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
    pub linkedin_post_id: Option<String>,
}

impl TryFrom<DraftRow> for DraftPost {
    type Error = String;

    fn try_from(row: DraftRow) -> Result<Self, Self::Error> {
        Ok(DraftPost {
            id: row.id,
            user_id: row.user_id,
            source: DraftSource::from(row.source),
            topic: row.topic,
            raw_generation: row.raw_generation,
            optimized_text: row.optimized_text,
            optimized_meta: row.optimized_meta.0,
            status: row.status.parse()?,
            created_at: row.created_at,
            posted_at: row.posted_at,
            linkedin_post_id: row.linkedin_post_id,
        })
    }
}
