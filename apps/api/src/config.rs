use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub anthropic_api_key: String,
    pub reddit_user_agent: String,
    /// Number of "hot" items pulled per feed fetch.
    pub reddit_hot_limit: usize,
    /// Drafts generated per auto profile on each scheduled run.
    pub cron_posts_per_profile: usize,
    /// Bearer token required by the cron entrypoint. `None` leaves it open.
    pub cron_secret: Option<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            reddit_user_agent: std::env::var("REDDIT_USER_AGENT")
                .unwrap_or_else(|_| format!("linkflow/{}", env!("CARGO_PKG_VERSION"))),
            reddit_hot_limit: bounded_env("REDDIT_HOT_LIMIT", 5, 1, 25)?,
            cron_posts_per_profile: bounded_env("CRON_POSTS_PER_PROFILE", 1, 1, 5)?,
            cron_secret: std::env::var("CRON_SECRET")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn bounded_env(key: &str, default: usize, min: usize, max: usize) -> Result<usize> {
    let value = match std::env::var(key) {
        Ok(raw) => raw
            .parse::<usize>()
            .with_context(|| format!("{key} must be a positive integer"))?,
        Err(_) => default,
    };
    if !(min..=max).contains(&value) {
        anyhow::bail!("{key} must be between {min} and {max}, got {value}");
    }
    Ok(value)
}

#[cfg(test)]
impl Config {
    /// Configuration used by router tests; nothing here is dialed.
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/linkflow_test".to_string(),
            redis_url: "redis://127.0.0.1/".to_string(),
            anthropic_api_key: "test-key".to_string(),
            reddit_user_agent: "linkflow-tests".to_string(),
            reddit_hot_limit: 5,
            cron_posts_per_profile: 1,
            cron_secret: None,
            port: 0,
            rust_log: "debug".to_string(),
        }
    }
}
