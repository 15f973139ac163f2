//! Test doubles shared by unit and router tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::llm_client::{LanguageModel, LlmError};
use crate::reddit::RedditClient;

type Responder = Box<dyn Fn(&str, &str) -> Result<String, LlmError> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub system: String,
}

/// Language model that replays canned replies (or answers through a closure)
/// and records every prompt it receives.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    responder: Option<Responder>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedModel {
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_results(replies.into_iter().map(|r| Ok(r.into())).collect())
    }

    pub fn with_results(results: Vec<Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(results.into()),
            responder: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn responding<F>(f: F) -> Self
    where
        F: Fn(&str, &str) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            replies: Mutex::new(VecDeque::new()),
            responder: Some(Box::new(f)),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answers every stage of the generation pipeline. Any prompt containing
    /// `FAIL` gets a provider error instead.
    pub fn pipeline() -> Self {
        Self::responding(|prompt, system| {
            if prompt.contains("FAIL") {
                return Err(LlmError::Api {
                    status: 500,
                    message: "scripted failure".to_string(),
                });
            }
            if system.contains("growth strategist") {
                Ok(optimize_reply("Optimized post", 0.6, 0.7))
            } else if system.contains("established voice") {
                Ok(adapt_reply("Adapted post", 0.8))
            } else {
                Ok("Raw post".to_string())
            }
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.prompt).collect()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(RecordedCall {
            prompt: prompt.to_string(),
            system: system.to_string(),
        });
        if let Some(responder) = &self.responder {
            return responder(prompt, system);
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyContent))
    }
}

/// Stage 2 reply in the shape the optimize prompt asks for.
pub fn optimize_reply(text: &str, emotional: f64, engagement: f64) -> String {
    json!({
        "optimizedText": text,
        "optimizedMeta": {
            "hooks": ["question"],
            "emotionalScore": emotional,
            "engagementPrediction": engagement,
        }
    })
    .to_string()
}

/// Stage 3 reply in the shape the adapt prompt asks for.
pub fn adapt_reply(text: &str, score: f64) -> String {
    json!({
        "finalPost": text,
        "score": score,
        "adjustments": ["Shortened the intro"],
    })
    .to_string()
}

/// Serves `listing` for every `/r/<sub>/hot.json` on a loopback port and
/// returns a client pointed at it, limited to five items.
pub async fn fake_reddit(listing: Value) -> RedditClient {
    let app = Router::new().route(
        "/r/:sub/hot.json",
        get(move || {
            let listing = listing.clone();
            async move { Json(listing) }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    RedditClient::with_base_url("linkflow-tests", 5, &format!("http://{addr}")).unwrap()
}

/// A hot listing with one self post per title.
pub fn hot_listing(titles: &[&str]) -> Value {
    let children: Vec<Value> = titles
        .iter()
        .map(|t| json!({"kind": "t3", "data": {"title": t, "selftext": ""}}))
        .collect();
    json!({"kind": "Listing", "data": {"children": children, "after": null}})
}
