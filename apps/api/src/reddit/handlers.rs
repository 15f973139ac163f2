//! Axum route handlers for the Reddit feed.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::draft::DraftPost;
use crate::reddit::ingest::ingest_subreddit;
use crate::reddit::normalize_subreddit;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SubredditQuery {
    pub subreddit: Option<String>,
}

#[derive(Deserialize)]
pub struct IngestRequest {
    pub user_id: Uuid,
    pub subreddit: String,
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub subreddit: String,
    pub drafts: Vec<DraftPost>,
    pub failures: Vec<String>,
}

/// GET /api/reddit?subreddit=
///
/// Proxies the hot listing untouched.
pub async fn handle_hot_listing(
    State(state): State<AppState>,
    Query(params): Query<SubredditQuery>,
) -> Result<Json<Value>, AppError> {
    let subreddit = params
        .subreddit
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::Validation("subreddit parameter is required".to_string()))?;
    Ok(Json(state.reddit.fetch_hot_raw(&subreddit).await?))
}

/// POST /api/v1/drafts/reddit
///
/// One pipeline run per hot item; every success is stored as a draft.
/// Failed items and rejected writes are reported without failing the request.
pub async fn handle_ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    let subreddit = normalize_subreddit(&req.subreddit)?;
    let session = state.sessions.require(req.user_id).await?;
    let profile = session
        .profile()
        .await
        .ok_or_else(|| AppError::NotFound(format!("No profile for user {}", req.user_id)))?;
    let learned_tone = session.learned_tone().await;

    let outcome = ingest_subreddit(
        &state.reddit,
        state.llm.as_ref(),
        &profile,
        learned_tone.as_ref(),
        &subreddit,
    )
    .await;

    let mut failures = outcome.failures;
    let mut drafts = Vec::with_capacity(outcome.drafts.len());
    for draft in outcome.drafts {
        let topic = draft.topic.clone();
        match session.add_draft(draft).await {
            Ok(saved) => drafts.push(saved),
            Err(e) => failures.push(format!("{topic}: {e}")),
        }
    }

    Ok(Json(IngestResponse {
        subreddit,
        drafts,
        failures,
    }))
}
