//! Scheduled run: one pass over every `auto` profile.
//!
//! Per profile: pick today's niche, turn it into a subreddit, pull hot items,
//! generate a bounded number of drafts and store them as `draft`, then append
//! one log entry. A failing profile is logged and the run moves on.

pub mod handlers;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::LanguageModel;
use crate::models::learned_tone::LearnedTone;
use crate::models::log::{NewLogEntry, RunStatus};
use crate::models::profile::Profile;
use crate::reddit::ingest::{fetch_candidates, generate_from_candidates};
use crate::reddit::RedditClient;
use crate::sync::repository::Repository;

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub posts_per_profile: usize,
    /// Only process profiles whose preferred hour is the current UTC hour.
    pub respect_schedule: bool,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CronSummary {
    pub run_id: String,
    pub processed: usize,
    /// Profiles that got at least one draft.
    pub succeeded: usize,
    pub failed: usize,
}

/// Rotates through the niche list one step per UTC day.
pub fn pick_niche(profile: &Profile, now: DateTime<Utc>) -> Option<&str> {
    if profile.niches.is_empty() {
        return None;
    }
    let day = now.date_naive().num_days_from_ce().unsigned_abs() as usize;
    Some(profile.niches[day % profile.niches.len()].as_str())
}

/// "Web Design" -> "WebDesign". `None` when nothing usable is left.
pub fn subreddit_for_niche(niche: &str) -> Option<String> {
    let name: String = niche.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    (!name.is_empty()).then_some(name)
}

pub async fn run_scheduled(
    repo: &dyn Repository,
    reddit: &RedditClient,
    model: &dyn LanguageModel,
    options: RunOptions,
) -> Result<CronSummary, AppError> {
    let run_id = format!("run_{}", Uuid::new_v4());
    let current_hour = options.now.hour();

    let profiles: Vec<Profile> = repo
        .auto_profiles()
        .await?
        .into_iter()
        .filter(|p| !options.respect_schedule || p.preferred_hour() == Some(current_hour))
        .collect();
    info!("Scheduled run {run_id}: {} auto profiles", profiles.len());

    let mut summary = CronSummary {
        run_id: run_id.clone(),
        processed: 0,
        succeeded: 0,
        failed: 0,
    };

    for profile in &profiles {
        let entry = run_profile(repo, reddit, model, profile, &run_id, &options).await;
        summary.processed += 1;
        if entry.status == RunStatus::Failed {
            summary.failed += 1;
        } else {
            summary.succeeded += 1;
        }

        if let Err(e) = repo.insert_log(entry).await {
            warn!("Could not record run {run_id} for user {}: {e}", profile.user_id);
        }
    }

    info!(
        "Scheduled run {run_id} done: {} processed, {} succeeded, {} failed",
        summary.processed, summary.succeeded, summary.failed
    );
    Ok(summary)
}

/// Never fails: every problem ends up in the returned log entry.
async fn run_profile(
    repo: &dyn Repository,
    reddit: &RedditClient,
    model: &dyn LanguageModel,
    profile: &Profile,
    run_id: &str,
    options: &RunOptions,
) -> NewLogEntry {
    let failed = |error: String| {
        warn!("Run {run_id} for user {}: {error}", profile.user_id);
        NewLogEntry {
            user_id: profile.user_id,
            run_id: run_id.to_string(),
            status: RunStatus::Failed,
            generated_count: 0,
            posted_count: 0,
            errors: vec![error],
        }
    };

    let Some(niche) = pick_niche(profile, options.now) else {
        return failed("profile has no niches".to_string());
    };
    let Some(subreddit) = subreddit_for_niche(niche) else {
        return failed(format!("niche '{niche}' does not map to a subreddit"));
    };

    let mut candidates = match fetch_candidates(reddit, &subreddit).await {
        Ok(candidates) => candidates,
        Err(e) => return failed(e.to_string()),
    };
    candidates.truncate(options.posts_per_profile);
    if candidates.is_empty() {
        return failed(format!("r/{subreddit} returned no usable topics"));
    }

    let learned_tone: Option<LearnedTone> = match repo.load_learned_tone(profile.user_id).await {
        Ok(tone) => tone,
        Err(e) => {
            warn!("No learned tone for {}, skipping adaptation: {e}", profile.user_id);
            None
        }
    };

    let outcome = generate_from_candidates(
        model,
        profile,
        learned_tone.as_ref(),
        Some(niche),
        &candidates,
    )
    .await;

    let mut errors = outcome.failures;
    let mut stored = 0usize;
    for draft in outcome.drafts {
        let topic = draft.topic.clone();
        match repo.insert_draft(draft).await {
            Ok(_) => stored += 1,
            Err(e) => errors.push(format!("{topic}: {e}")),
        }
    }

    NewLogEntry {
        user_id: profile.user_id,
        run_id: run_id.to_string(),
        status: RunStatus::from_counts(candidates.len(), stored),
        generated_count: stored as u32,
        posted_count: 0,
        errors,
    }
}
