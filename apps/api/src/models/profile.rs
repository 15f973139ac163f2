use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

/// Voice a post is written in. Closed set offered by the settings form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tone {
    #[default]
    #[serde(rename = "Expert + Conversational")]
    ExpertConversational,
    #[serde(rename = "Formal & Authoritative")]
    FormalAuthoritative,
    #[serde(rename = "Friendly & Casual")]
    FriendlyCasual,
    #[serde(rename = "Storyteller")]
    Storyteller,
}

impl Tone {
    pub const ALL: [Tone; 4] = [
        Tone::ExpertConversational,
        Tone::FormalAuthoritative,
        Tone::FriendlyCasual,
        Tone::Storyteller,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Tone::ExpertConversational => "Expert + Conversational",
            Tone::FormalAuthoritative => "Formal & Authoritative",
            Tone::FriendlyCasual => "Friendly & Casual",
            Tone::Storyteller => "Storyteller",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Tone {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tone::ALL
            .into_iter()
            .find(|t| t.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ProfileError::UnknownTone(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostingMode {
    Auto,
    #[default]
    Manual,
}

impl PostingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostingMode::Auto => "auto",
            PostingMode::Manual => "manual",
        }
    }
}

impl FromStr for PostingMode {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(PostingMode::Auto),
            "manual" => Ok(PostingMode::Manual),
            other => Err(ProfileError::UnknownPostingMode(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ProfileError {
    #[error("niche #{0} is blank")]
    BlankNiche(usize),

    #[error("niche '{0}' is listed more than once")]
    DuplicateNiche(String),

    #[error("preferred_time_utc '{0}' is not a valid HH:mm time")]
    InvalidTime(String),

    #[error("unknown tone '{0}'")]
    UnknownTone(String),

    #[error("unknown posting mode '{0}'")]
    UnknownPostingMode(String),
}

/// A user's posting configuration. One per user; replaced wholesale on update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    #[serde(default)]
    pub name: String,
    /// Order is the user's own ordering; entries are unique.
    pub niches: Vec<String>,
    pub tone: Tone,
    pub posting_mode: PostingMode,
    pub preferred_time_utc: String,
    pub linkedin_connected: bool,
}

impl Profile {
    /// Profile created the first time a user signs in.
    pub fn default_for(user_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            niches: vec!["AI".to_string(), "SEO".to_string(), "Web Design".to_string()],
            tone: Tone::default(),
            posting_mode: PostingMode::default(),
            preferred_time_utc: "10:00".to_string(),
            linkedin_connected: false,
        }
    }

    /// Checks the invariants enforced by the settings form.
    pub fn validate(&self) -> Result<(), ProfileError> {
        let mut seen: Vec<String> = Vec::with_capacity(self.niches.len());
        for (idx, niche) in self.niches.iter().enumerate() {
            let trimmed = niche.trim();
            if trimmed.is_empty() {
                return Err(ProfileError::BlankNiche(idx + 1));
            }
            let key = trimmed.to_lowercase();
            if seen.contains(&key) {
                return Err(ProfileError::DuplicateNiche(trimmed.to_string()));
            }
            seen.push(key);
        }

        if parse_preferred_time(&self.preferred_time_utc).is_none() {
            return Err(ProfileError::InvalidTime(self.preferred_time_utc.clone()));
        }
        Ok(())
    }

    /// Trims niche entries in place. Ordering is preserved.
    pub fn normalize(&mut self) {
        for niche in &mut self.niches {
            *niche = niche.trim().to_string();
        }
        self.name = self.name.trim().to_string();
        self.preferred_time_utc = self.preferred_time_utc.trim().to_string();
    }

    /// Hour of day (UTC) the user wants automated posts around.
    pub fn preferred_hour(&self) -> Option<u32> {
        parse_preferred_time(&self.preferred_time_utc).map(|(h, _)| h)
    }
}

/// Parses `H:mm` / `HH:mm` into (hour, minute).
pub fn parse_preferred_time(raw: &str) -> Option<(u32, u32)> {
    let (hours, minutes) = raw.split_once(':')?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return None;
    }
    if !hours.bytes().chain(minutes.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let h: u32 = hours.parse().ok()?;
    let m: u32 = minutes.parse().ok()?;
    (h < 24 && m < 60).then_some((h, m))
}

#[derive(Debug, Clone, FromRow)]
pub struct ProfileRow {
    pub user_id: Uuid,
    pub name: String,
    pub niches: Vec<String>,
    pub tone: String,
    pub posting_mode: String,
    pub preferred_time_utc: String,
    pub linkedin_connected: bool,
    #[allow(dead_code)]
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = ProfileError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        Ok(Profile {
            user_id: row.user_id,
            name: row.name,
            niches: row.niches,
            tone: row.tone.parse()?,
            posting_mode: row.posting_mode.parse()?,
            preferred_time_utc: row.preferred_time_utc,
            linkedin_connected: row.linkedin_connected,
        })
    }
}
