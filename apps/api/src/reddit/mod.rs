//! Reddit feed client — pulls the "hot" listing of a subreddit as topic candidates.
//!
//! Uses the public JSON listing endpoint; no OAuth is needed for hot listings.

pub mod handlers;
pub mod ingest;

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const REDDIT_BASE_URL: &str = "https://www.reddit.com";
const MAX_SUBREDDIT_LEN: usize = 21;

#[derive(Debug, Error)]
pub enum RedditError {
    #[error("invalid subreddit name '{0}'")]
    InvalidSubreddit(String),

    #[error("failed to reach Reddit: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Reddit returned status {status} for r/{subreddit}")]
    Status { status: u16, subreddit: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing {
    pub kind: String,
    pub data: RedditListingData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData {
    #[serde(default)]
    pub children: Vec<RedditListingChild>,
    pub after: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild {
    pub kind: String,
    pub data: RedditPostData,
}

/// The subset of a listing item used for topic extraction.
/// Every field is optional: the feed is external and items vary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedditPostData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub selftext: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub created_utc: Option<f64>,
    #[serde(default)]
    pub stickied: bool,
}

/// Strips `r/` prefixes and checks Reddit's naming rules (1–21 chars, `[A-Za-z0-9_]`).
pub fn normalize_subreddit(raw: &str) -> Result<String, RedditError> {
    let trimmed = raw.trim().trim_start_matches('/');
    let name = trimmed.strip_prefix("r/").unwrap_or(trimmed).trim_end_matches('/');

    let valid = !name.is_empty()
        && name.len() <= MAX_SUBREDDIT_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(RedditError::InvalidSubreddit(raw.to_string()));
    }
    Ok(name.to_string())
}

#[derive(Clone)]
pub struct RedditClient {
    http: Client,
    base_url: String,
    hot_limit: usize,
}

impl RedditClient {
    pub fn new(user_agent: &str, hot_limit: usize) -> Result<Self, RedditError> {
        Self::with_base_url(user_agent, hot_limit, REDDIT_BASE_URL)
    }

    pub fn with_base_url(
        user_agent: &str,
        hot_limit: usize,
        base_url: &str,
    ) -> Result<Self, RedditError> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            hot_limit,
        })
    }

    pub fn hot_limit(&self) -> usize {
        self.hot_limit
    }

    /// Fetches the hot listing as untyped JSON, exactly as Reddit returned it.
    pub async fn fetch_hot_raw(&self, subreddit: &str) -> Result<serde_json::Value, RedditError> {
        let subreddit = normalize_subreddit(subreddit)?;
        let url = format!("{}/r/{}/hot.json", self.base_url, subreddit);
        debug!("Fetching {url} (limit {})", self.hot_limit);

        let response = self
            .http
            .get(&url)
            .query(&[("limit", self.hot_limit.to_string())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RedditError::Status {
                status: status.as_u16(),
                subreddit,
            });
        }
        Ok(response.json().await?)
    }

    /// Fetches the hot listing and decodes it.
    pub async fn fetch_hot(&self, subreddit: &str) -> Result<RedditListing, RedditError> {
        let raw = self.fetch_hot_raw(subreddit).await?;
        // A listing that does not decode is treated as an upstream failure.
        serde_json::from_value(raw).map_err(|_| RedditError::Status {
            status: 502,
            subreddit: subreddit.to_string(),
        })
    }
}
