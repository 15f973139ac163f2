use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::LanguageModel;
use crate::reddit::RedditClient;
use crate::sync::changes::ChangeFeed;
use crate::sync::repository::Repository;
use crate::sync::session::SessionRegistry;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    /// Every model call goes through this; `LlmClient` in production.
    pub llm: Arc<dyn LanguageModel>,
    pub reddit: RedditClient,
    pub sessions: SessionRegistry,
    pub config: Config,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn Repository>,
        llm: Arc<dyn LanguageModel>,
        reddit: RedditClient,
        changes: ChangeFeed,
        config: Config,
    ) -> Self {
        let sessions = SessionRegistry::new(repo.clone(), changes);
        Self {
            repo,
            llm,
            reddit,
            sessions,
            config,
        }
    }
}
