//! Axum route handlers for the Generation API.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::pipeline::{run_pipeline, GeneratedPost, PostBrief};
use crate::models::draft::{DraftPost, DraftSource};
use crate::models::learned_tone::LearnedTone;
use crate::models::profile::Profile;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub topic: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub niche: Option<String>,
    pub profile: Profile,
    #[serde(default)]
    pub learned_tone: Option<LearnedTone>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateDraftRequest {
    pub user_id: Uuid,
    pub topic: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub niche: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/generate
///
/// Stateless: runs the pipeline against the profile in the body and returns
/// the result without storing anything.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GeneratedPost>, AppError> {
    let brief = PostBrief::for_profile(
        &req.topic,
        req.context.as_deref(),
        req.niche.as_deref(),
        &req.profile,
    )?;
    let post = run_pipeline(state.llm.as_ref(), &brief, req.learned_tone.as_ref()).await?;
    Ok(Json(post))
}

/// POST /api/v1/drafts/generate
///
/// Uses the session's profile and learned tone, then stores the result as a
/// `manual` draft.
pub async fn handle_generate_draft(
    State(state): State<AppState>,
    Json(req): Json<GenerateDraftRequest>,
) -> Result<(StatusCode, Json<DraftPost>), AppError> {
    let session = state.sessions.require(req.user_id).await?;
    let profile = session
        .profile()
        .await
        .ok_or_else(|| AppError::NotFound(format!("No profile for user {}", req.user_id)))?;
    let learned_tone = session.learned_tone().await;

    let brief = PostBrief::for_profile(
        &req.topic,
        req.context.as_deref(),
        req.niche.as_deref(),
        &profile,
    )?;
    let post = run_pipeline(state.llm.as_ref(), &brief, learned_tone.as_ref()).await?;

    let draft = session
        .add_draft(post.into_new_draft(req.user_id, DraftSource::Manual, &req.topic))
        .await?;
    Ok((StatusCode::CREATED, Json(draft)))
}
