//! Post generation pipeline: generate → optimize for engagement → adapt to learned tone.
//!
//! Each stage is one templated model call. Stages run strictly in order and a
//! failure in any stage aborts the run; callers never see a partial result.
//! There is no retry here. Callers may rerun the whole pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::generation::prompts::{
    ADAPT_PROMPT_TEMPLATE, ADAPT_SYSTEM_TEMPLATE, CONTEXT_BLOCK_TEMPLATE, GENERATE_PROMPT_TEMPLATE,
    GENERATE_SYSTEM, OPTIMIZE_PROMPT_TEMPLATE, OPTIMIZE_SYSTEM_TEMPLATE,
};
use crate::llm_client::prompts::{fill_template, JSON_ONLY_RULES, PRESERVE_FACTS_INSTRUCTION};
use crate::llm_client::{complete_json, LanguageModel, LlmError};
use crate::models::draft::{DraftSource, NewDraft, OptimizedMeta};
use crate::models::learned_tone::LearnedTone;
use crate::models::profile::{Profile, Tone};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Generate,
    Optimize,
    AdaptTone,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Generate => "generate",
            Stage::Optimize => "optimize",
            Stage::AdaptTone => "adapt-tone",
        })
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("topic cannot be empty")]
    EmptyTopic,

    #[error("profile has no niches to target")]
    NoNiches,

    #[error("niche '{0}' is not one of the profile's niches")]
    UnknownNiche(String),

    #[error("{stage} stage failed: {source}")]
    Model {
        stage: Stage,
        #[source]
        source: LlmError,
    },

    #[error("{stage} stage returned an invalid result: {reason}")]
    InvalidOutput { stage: Stage, reason: String },

    #[error("failed to serialize learned tone: {0}")]
    ToneSerialization(#[from] serde_json::Error),
}

impl GenerationError {
    /// True when the caller's input was rejected before any model call.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            GenerationError::EmptyTopic | GenerationError::NoNiches | GenerationError::UnknownNiche(_)
        )
    }

    fn from_llm(stage: Stage, err: LlmError) -> Self {
        match err {
            // Output that does not deserialize into the contract is a shape failure.
            LlmError::Parse(e) => GenerationError::InvalidOutput {
                stage,
                reason: e.to_string(),
            },
            LlmError::EmptyContent => GenerationError::InvalidOutput {
                stage,
                reason: "empty output".to_string(),
            },
            other => GenerationError::Model { stage, source: other },
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Inputs and stage outputs
// ────────────────────────────────────────────────────────────────────────────

/// Everything stage 1 needs, already validated against the profile.
#[derive(Debug, Clone)]
pub struct PostBrief<'a> {
    pub topic: &'a str,
    pub context: Option<&'a str>,
    pub niche: String,
    pub tone: Tone,
}

impl<'a> PostBrief<'a> {
    /// Resolves the target niche: the requested one when it belongs to the
    /// profile, otherwise every niche joined with ", ".
    pub fn for_profile(
        topic: &'a str,
        context: Option<&'a str>,
        requested_niche: Option<&str>,
        profile: &Profile,
    ) -> Result<Self, GenerationError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(GenerationError::EmptyTopic);
        }
        if profile.niches.is_empty() {
            return Err(GenerationError::NoNiches);
        }

        let niche = match requested_niche.map(str::trim).filter(|n| !n.is_empty()) {
            Some(wanted) => profile
                .niches
                .iter()
                .find(|n| n.eq_ignore_ascii_case(wanted))
                .cloned()
                .ok_or_else(|| GenerationError::UnknownNiche(wanted.to_string()))?,
            None => profile.niches.join(", "),
        };

        Ok(Self {
            topic,
            context: context.map(str::trim).filter(|c| !c.is_empty()),
            niche,
            tone: profile.tone,
        })
    }
}

/// Stage 2 contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementOptimization {
    pub optimized_text: String,
    pub optimized_meta: EngagementMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementMeta {
    pub hooks: Vec<String>,
    pub emotional_score: f64,
    pub engagement_prediction: f64,
}

/// Stage 3 contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToneAdaptation {
    pub final_post: String,
    pub score: f64,
    #[serde(default)]
    pub adjustments: Vec<String>,
}

/// Result of a full pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedPost {
    pub raw_generation: String,
    pub optimized_text: String,
    pub optimized_meta: OptimizedMeta,
}

impl GeneratedPost {
    pub fn into_new_draft(self, user_id: Uuid, source: DraftSource, topic: &str) -> NewDraft {
        NewDraft {
            user_id,
            source,
            topic: topic.trim().to_string(),
            raw_generation: self.raw_generation,
            optimized_text: self.optimized_text,
            optimized_meta: self.optimized_meta,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stages
// ────────────────────────────────────────────────────────────────────────────

pub fn build_generate_prompt(brief: &PostBrief<'_>) -> String {
    let context_block = brief
        .context
        .map(|c| fill_template(CONTEXT_BLOCK_TEMPLATE, &[("context", c)]))
        .unwrap_or_default();

    fill_template(
        GENERATE_PROMPT_TEMPLATE,
        &[
            ("topic", brief.topic),
            ("context_block", &context_block),
            ("niche", &brief.niche),
            ("tone", brief.tone.label()),
        ],
    )
}

/// Stage 1: plain-text first draft.
pub async fn generate_draft(
    model: &dyn LanguageModel,
    brief: &PostBrief<'_>,
) -> Result<String, GenerationError> {
    let prompt = build_generate_prompt(brief);
    let text = model
        .complete(&prompt, GENERATE_SYSTEM)
        .await
        .map_err(|e| GenerationError::from_llm(Stage::Generate, e))?;

    let text = text.trim();
    if text.is_empty() {
        return Err(GenerationError::InvalidOutput {
            stage: Stage::Generate,
            reason: "empty post".to_string(),
        });
    }
    Ok(text.to_string())
}

/// Stage 2: engagement rewrite with scored metadata.
pub async fn optimize_for_engagement(
    model: &dyn LanguageModel,
    draft: &str,
) -> Result<EngagementOptimization, GenerationError> {
    let prompt = fill_template(
        OPTIMIZE_PROMPT_TEMPLATE,
        &[("preserve_facts", PRESERVE_FACTS_INSTRUCTION), ("draft", draft)],
    );
    let system = fill_template(OPTIMIZE_SYSTEM_TEMPLATE, &[("json_rules", JSON_ONLY_RULES)]);

    let result: EngagementOptimization = complete_json(model, &prompt, &system)
        .await
        .map_err(|e| GenerationError::from_llm(Stage::Optimize, e))?;

    require_text(Stage::Optimize, "optimizedText", &result.optimized_text)?;
    require_unit(
        Stage::Optimize,
        "emotionalScore",
        result.optimized_meta.emotional_score,
    )?;
    require_unit(
        Stage::Optimize,
        "engagementPrediction",
        result.optimized_meta.engagement_prediction,
    )?;
    Ok(result)
}

/// Stage 3: nudge word choice and length toward the learned tone.
pub async fn adapt_tone(
    model: &dyn LanguageModel,
    post: &str,
    learned_tone: &LearnedTone,
) -> Result<ToneAdaptation, GenerationError> {
    let tone_json = learned_tone.to_prompt_json()?;
    let prompt = fill_template(
        ADAPT_PROMPT_TEMPLATE,
        &[("learned_tone_json", &tone_json), ("post", post)],
    );
    let system = fill_template(ADAPT_SYSTEM_TEMPLATE, &[("json_rules", JSON_ONLY_RULES)]);

    let result: ToneAdaptation = complete_json(model, &prompt, &system)
        .await
        .map_err(|e| GenerationError::from_llm(Stage::AdaptTone, e))?;

    require_text(Stage::AdaptTone, "finalPost", &result.final_post)?;
    require_unit(Stage::AdaptTone, "score", result.score)?;
    Ok(result)
}

/// Runs all stages in order. Stage 3 is skipped without a learned tone and
/// stage 2's text becomes final.
pub async fn run_pipeline(
    model: &dyn LanguageModel,
    brief: &PostBrief<'_>,
    learned_tone: Option<&LearnedTone>,
) -> Result<GeneratedPost, GenerationError> {
    info!("Generating post: topic={:?} niche={:?}", preview(brief.topic), brief.niche);

    let result = run_stages(model, brief, learned_tone).await;
    if let Err(e) = &result {
        warn!("Post generation aborted for topic {:?}: {e}", preview(brief.topic));
    }
    result
}

async fn run_stages(
    model: &dyn LanguageModel,
    brief: &PostBrief<'_>,
    learned_tone: Option<&LearnedTone>,
) -> Result<GeneratedPost, GenerationError> {
    let raw_generation = generate_draft(model, brief).await?;
    let optimized = optimize_for_engagement(model, &raw_generation).await?;

    let mut optimized_meta = OptimizedMeta {
        hooks: optimized.optimized_meta.hooks,
        emotional_score: optimized.optimized_meta.emotional_score,
        engagement_prediction: optimized.optimized_meta.engagement_prediction,
        tone_score: None,
        tone_adjustments: None,
    };

    let optimized_text = match learned_tone {
        Some(tone) => {
            let adapted = adapt_tone(model, &optimized.optimized_text, tone).await?;
            optimized_meta.tone_score = Some(adapted.score);
            optimized_meta.tone_adjustments = Some(adapted.adjustments);
            adapted.final_post
        }
        None => optimized.optimized_text,
    };

    Ok(GeneratedPost {
        raw_generation,
        optimized_text,
        optimized_meta,
    })
}

fn require_text(stage: Stage, field: &str, value: &str) -> Result<(), GenerationError> {
    if value.trim().is_empty() {
        return Err(GenerationError::InvalidOutput {
            stage,
            reason: format!("{field} is empty"),
        });
    }
    Ok(())
}

fn require_unit(stage: Stage, field: &str, value: f64) -> Result<(), GenerationError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(GenerationError::InvalidOutput {
            stage,
            reason: format!("{field}={value} is outside [0, 1]"),
        });
    }
    Ok(())
}

fn preview(text: &str) -> String {
    text.chars().take(60).collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
