//! Topic ingestion — turns a subreddit's hot listing into generated drafts.
//!
//! Each candidate runs through the generation pipeline independently; one
//! failed item never takes its siblings down. A failed feed fetch yields no
//! drafts at all.

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::generation::pipeline::{run_pipeline, GenerationError, PostBrief};
use crate::llm_client::LanguageModel;
use crate::models::draft::{DraftSource, NewDraft};
use crate::models::learned_tone::LearnedTone;
use crate::models::profile::Profile;
use crate::reddit::{normalize_subreddit, RedditClient, RedditError, RedditListing};

/// A feed item with a usable title.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicCandidate {
    pub title: String,
    pub body: Option<String>,
    pub subreddit: String,
}

/// Drafts produced by a fan-out plus the reasons for any items that failed.
#[derive(Debug, Default)]
pub struct IngestOutcome {
    pub drafts: Vec<NewDraft>,
    pub failures: Vec<String>,
}

/// Keeps at most `limit` items that carry a non-blank title.
pub fn candidates_from_listing(
    listing: &RedditListing,
    subreddit: &str,
    limit: usize,
) -> Vec<TopicCandidate> {
    listing
        .data
        .children
        .iter()
        .filter_map(|child| {
            let title = child.data.title.as_deref()?.trim();
            if title.is_empty() {
                return None;
            }
            let body = child
                .data
                .selftext
                .as_deref()
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .map(str::to_string);
            Some(TopicCandidate {
                title: title.to_string(),
                body,
                subreddit: subreddit.to_string(),
            })
        })
        .take(limit)
        .collect()
}

pub async fn fetch_candidates(
    reddit: &RedditClient,
    subreddit: &str,
) -> Result<Vec<TopicCandidate>, RedditError> {
    let subreddit = normalize_subreddit(subreddit)?;
    let listing = reddit.fetch_hot(&subreddit).await?;
    Ok(candidates_from_listing(&listing, &subreddit, reddit.hot_limit()))
}

/// Runs the pipeline once per candidate, concurrently, isolating failures.
pub async fn generate_from_candidates(
    model: &dyn LanguageModel,
    profile: &Profile,
    learned_tone: Option<&LearnedTone>,
    niche: Option<&str>,
    candidates: &[TopicCandidate],
) -> IngestOutcome {
    let runs = candidates.iter().map(|candidate| async move {
        let brief =
            PostBrief::for_profile(&candidate.title, candidate.body.as_deref(), niche, profile)?;
        let post = run_pipeline(model, &brief, learned_tone).await?;
        Ok::<_, GenerationError>(post.into_new_draft(
            profile.user_id,
            DraftSource::Reddit(candidate.subreddit.clone()),
            &candidate.title,
        ))
    });

    let mut outcome = IngestOutcome::default();
    for (candidate, result) in candidates.iter().zip(join_all(runs).await) {
        match result {
            Ok(draft) => outcome.drafts.push(draft),
            Err(e) => {
                warn!("Skipping feed item {:?}: {e}", candidate.title);
                outcome.failures.push(format!("{}: {e}", candidate.title));
            }
        }
    }
    outcome
}

/// Fetch + fan-out. A feed failure produces an empty outcome, never a partial one.
pub async fn ingest_subreddit(
    reddit: &RedditClient,
    model: &dyn LanguageModel,
    profile: &Profile,
    learned_tone: Option<&LearnedTone>,
    subreddit: &str,
) -> IngestOutcome {
    let candidates = match fetch_candidates(reddit, subreddit).await {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!("Feed fetch for r/{subreddit} failed: {e}");
            return IngestOutcome {
                drafts: Vec::new(),
                failures: vec![e.to_string()],
            };
        }
    };

    info!(
        "Ingesting {} candidates from r/{subreddit} for user {}",
        candidates.len(),
        profile.user_id
    );
    generate_from_candidates(model, profile, learned_tone, None, &candidates).await
}
