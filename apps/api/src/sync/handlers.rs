//! Axum route handlers for sessions, profile, drafts, logs and stats.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::draft::{DraftPatch, DraftPost};
use crate::models::log::{LogEntry, NewLogEntry};
use crate::models::profile::Profile;
use crate::state::AppState;
use crate::sync::session::{DashboardStats, Mirror};

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct SignInRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize)]
pub struct UpdateDraftRequest {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub patch: DraftPatch,
}

#[derive(Deserialize)]
pub struct PostDraftRequest {
    pub user_id: Uuid,
}

// ────────────────────────────────────────────────────────────────────────────
// Session
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/session
pub async fn handle_sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<Mirror>, AppError> {
    let session = state.sessions.sign_in(req.user_id, &req.name).await?;
    Ok(Json(session.snapshot().await))
}

/// GET /api/v1/session
///
/// Signed-out users get the empty mirror, not an error.
pub async fn handle_get_session(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Json<Mirror> {
    Json(state.sessions.snapshot(params.user_id).await)
}

/// DELETE /api/v1/session
pub async fn handle_sign_out(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> StatusCode {
    state.sessions.sign_out(params.user_id).await;
    StatusCode::NO_CONTENT
}

// ────────────────────────────────────────────────────────────────────────────
// Profile / drafts / logs
// ────────────────────────────────────────────────────────────────────────────

/// PUT /api/v1/profile
pub async fn handle_update_profile(
    State(state): State<AppState>,
    Json(profile): Json<Profile>,
) -> Result<Json<Profile>, AppError> {
    let session = state.sessions.require(profile.user_id).await?;
    Ok(Json(session.update_profile(profile).await?))
}

/// PATCH /api/v1/drafts/:id
pub async fn handle_update_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDraftRequest>,
) -> Result<Json<DraftPost>, AppError> {
    let session = state.sessions.require(req.user_id).await?;
    Ok(Json(session.update_draft(id, req.patch).await?))
}

/// POST /api/v1/drafts/:id/post
pub async fn handle_post_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<PostDraftRequest>,
) -> Result<Json<DraftPost>, AppError> {
    let session = state.sessions.require(req.user_id).await?;
    Ok(Json(session.post_draft(id).await?))
}

/// DELETE /api/v1/drafts/:id
pub async fn handle_remove_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    let session = state.sessions.require(params.user_id).await?;
    session.remove_draft(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/logs
pub async fn handle_add_log(
    State(state): State<AppState>,
    Json(entry): Json<NewLogEntry>,
) -> Result<(StatusCode, Json<LogEntry>), AppError> {
    let session = state.sessions.require(entry.user_id).await?;
    let saved = session.add_log(entry).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

/// GET /api/v1/stats
pub async fn handle_stats(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<DashboardStats>, AppError> {
    let session = state.sessions.require(params.user_id).await?;
    Ok(Json(session.stats().await))
}
