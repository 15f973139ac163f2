use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Aggregate style profile learned from a user's historical posts.
/// Recomputed outside this service; read-only input to tone adaptation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LearnedTone {
    pub user_id: Uuid,
    /// Average post length in characters.
    pub avg_length: i32,
    pub preferred_hooks: Vec<String>,
    pub sentence_complexity: f64,
    /// Ratio of sentences carrying an emoji.
    pub emoji_usage: f64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl LearnedTone {
    /// Baseline profile created on first sign-in.
    pub fn default_for(user_id: Uuid) -> Self {
        Self {
            user_id,
            avg_length: 850,
            preferred_hooks: vec!["question".into(), "stat".into(), "story".into()],
            sentence_complexity: 1.2,
            emoji_usage: 0.12,
            created_at: Utc::now(),
        }
    }

    /// Serialized form embedded in the adaptation prompt. Identity and
    /// bookkeeping fields are left out; the model only needs the style numbers.
    pub fn to_prompt_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&serde_json::json!({
            "avg_length": self.avg_length,
            "preferred_hooks": self.preferred_hooks,
            "sentence_complexity": self.sentence_complexity,
            "emoji_usage": self.emoji_usage,
        }))
    }
}
