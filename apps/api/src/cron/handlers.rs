//! Axum route handler for the scheduled-run entrypoint.

use axum::{
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::cron::{run_scheduled, CronSummary, RunOptions};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CronQuery {
    #[serde(default)]
    pub respect_schedule: bool,
}

/// GET|POST /api/cron/daily-post
///
/// Requires `Authorization: Bearer <CRON_SECRET>` when a secret is configured.
pub async fn handle_daily_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CronQuery>,
) -> Result<Json<CronSummary>, AppError> {
    if let Some(secret) = &state.config.cron_secret {
        let presented = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented != Some(secret.as_str()) {
            return Err(AppError::Unauthorized);
        }
    }

    let options = RunOptions {
        posts_per_profile: state.config.cron_posts_per_profile,
        respect_schedule: params.respect_schedule,
        now: Utc::now(),
    };
    let summary = run_scheduled(
        state.repo.as_ref(),
        &state.reddit,
        state.llm.as_ref(),
        options,
    )
    .await?;
    Ok(Json(summary))
}
