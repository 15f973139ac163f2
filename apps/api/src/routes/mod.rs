pub mod health;

use axum::{
    routing::{get, patch, post, put},
    Router,
};

use crate::cron::handlers as cron;
use crate::generation::handlers as generation;
use crate::reddit::handlers as reddit;
use crate::state::AppState;
use crate::sync::handlers as sync;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Stateless entrypoints
        .route("/api/generate", post(generation::handle_generate))
        .route("/api/reddit", get(reddit::handle_hot_listing))
        .route(
            "/api/cron/daily-post",
            get(cron::handle_daily_post).post(cron::handle_daily_post),
        )
        // Session-scoped API
        .route(
            "/api/v1/session",
            post(sync::handle_sign_in)
                .get(sync::handle_get_session)
                .delete(sync::handle_sign_out),
        )
        .route("/api/v1/profile", put(sync::handle_update_profile))
        .route(
            "/api/v1/drafts/generate",
            post(generation::handle_generate_draft),
        )
        .route("/api/v1/drafts/reddit", post(reddit::handle_ingest))
        .route(
            "/api/v1/drafts/:id",
            patch(sync::handle_update_draft).delete(sync::handle_remove_draft),
        )
        .route("/api/v1/drafts/:id/post", post(sync::handle_post_draft))
        .route("/api/v1/logs", post(sync::handle_add_log))
        .route("/api/v1/stats", get(sync::handle_stats))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::config::Config;
    use crate::reddit::RedditClient;
    use crate::sync::changes::ChangeFeed;
    use crate::sync::memory::MemoryRepository;
    use crate::test_support::{fake_reddit, hot_listing, ScriptedModel};

    fn app_with(config: Config) -> Router {
        // Port 9 refuses connections, so every feed fetch is an upstream failure.
        let reddit = RedditClient::with_base_url("linkflow-tests", 5, "http://127.0.0.1:9").unwrap();
        app_on(reddit, config)
    }

    fn app_on(reddit: RedditClient, config: Config) -> Router {
        let changes = ChangeFeed::local();
        let repo = Arc::new(MemoryRepository::new(changes.clone()));
        let state = AppState::new(
            repo,
            Arc::new(ScriptedModel::pipeline()),
            reddit,
            changes,
            config,
        );
        build_router(state)
    }

    fn app() -> Router {
        app_with(Config::for_tests())
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => request
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn profile_json(user_id: Uuid) -> Value {
        json!({
            "user_id": user_id,
            "name": "Ada",
            "niches": ["AI", "SEO"],
            "tone": "Storyteller",
            "posting_mode": "manual",
            "preferred_time_utc": "09:30",
            "linkedin_connected": false
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "linkflow-api");
    }

    #[tokio::test]
    async fn test_generate_returns_pipeline_result() {
        let body = json!({"topic": "AI future", "profile": profile_json(Uuid::new_v4())});
        let (status, body) = send(&app(), Method::POST, "/api/generate", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["raw_generation"], "Raw post");
        assert_eq!(body["optimized_text"], "Optimized post");
        assert!(body["optimized_meta"].get("tone_score").is_none());
    }

    #[tokio::test]
    async fn test_generate_with_learned_tone_runs_third_stage() {
        let user = Uuid::new_v4();
        let body = json!({
            "topic": "AI future",
            "profile": profile_json(user),
            "learned_tone": {
                "user_id": user,
                "avg_length": 600,
                "preferred_hooks": ["story"],
                "sentence_complexity": 1.0,
                "emoji_usage": 0.0
            }
        });
        let (status, body) = send(&app(), Method::POST, "/api/generate", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["optimized_text"], "Adapted post");
        assert_eq!(body["optimized_meta"]["tone_score"], 0.8);
    }

    #[tokio::test]
    async fn test_generate_errors_map_to_status_codes() {
        let app = app();
        let blank = json!({"topic": "  ", "profile": profile_json(Uuid::new_v4())});
        let (status, body) = send(&app, Method::POST, "/api/generate", Some(blank)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let failing = json!({"topic": "FAIL", "profile": profile_json(Uuid::new_v4())});
        let (status, body) = send(&app, Method::POST, "/api/generate", Some(failing)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "GENERATION_FAILED");
        assert_eq!(body["error"], "Failed to generate content");
    }

    #[tokio::test]
    async fn test_reddit_proxy_errors() {
        let app = app();
        let (status, body) = send(&app, Method::GET, "/api/reddit", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = send(&app, Method::GET, "/api/reddit?subreddit=business", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_session_routes_require_sign_in() {
        let app = app();
        let user = Uuid::new_v4();
        let (status, _) = send(&app, Method::GET, &format!("/api/v1/stats?user_id={user}"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let body = json!({"user_id": user, "topic": "Anything"});
        let (status, _) = send(&app, Method::POST, "/api/v1/drafts/generate", Some(body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&app, Method::GET, &format!("/api/v1/session?user_id={user}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["profile"].is_null());
        assert_eq!(body["drafts"], json!([]));
    }

    #[tokio::test]
    async fn test_draft_lifecycle_through_the_api() {
        let app = app();
        let user = Uuid::new_v4();

        let (status, mirror) = send(
            &app,
            Method::POST,
            "/api/v1/session",
            Some(json!({"user_id": user, "name": "Ada"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mirror["profile"]["tone"], "Expert + Conversational");
        assert_eq!(mirror["learned_tone"]["avg_length"], 850);

        let (status, draft) = send(
            &app,
            Method::POST,
            "/api/v1/drafts/generate",
            Some(json!({"user_id": user, "topic": "Shipping Rust"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(draft["source"], "manual");
        assert_eq!(draft["status"], "draft");
        // Default learned tone exists, so all three stages ran.
        assert_eq!(draft["optimized_text"], "Adapted post");
        let id = draft["id"].as_str().unwrap().to_string();

        let (status, edited) = send(
            &app,
            Method::PATCH,
            &format!("/api/v1/drafts/{id}"),
            Some(json!({"user_id": user, "optimized_text": "Edited"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(edited["optimized_text"], "Edited");

        let (status, posted) = send(
            &app,
            Method::POST,
            &format!("/api/v1/drafts/{id}/post"),
            Some(json!({"user_id": user})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(posted["status"], "posted");
        assert!(posted["posted_at"].is_string());

        let (status, body) = send(
            &app,
            Method::PATCH,
            &format!("/api/v1/drafts/{id}"),
            Some(json!({"user_id": user, "status": "draft"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");

        let (status, stats) = send(&app, Method::GET, &format!("/api/v1/stats?user_id={user}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats, json!({"total": 1, "posted": 1, "unposted": 0}));

        let (status, _) = send(
            &app,
            Method::DELETE,
            &format!("/api/v1/drafts/{id}?user_id={user}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, Method::DELETE, &format!("/api/v1/session?user_id={user}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, mirror) = send(&app, Method::GET, &format!("/api/v1/session?user_id={user}"), None).await;
        assert!(mirror["profile"].is_null());
        assert!(mirror["learned_tone"].is_null());
    }

    #[tokio::test]
    async fn test_profile_update_validates() {
        let app = app();
        let user = Uuid::new_v4();
        send(&app, Method::POST, "/api/v1/session", Some(json!({"user_id": user}))).await;

        let mut profile = profile_json(user);
        profile["preferred_time_utc"] = json!("25:00");
        let (status, _) = send(&app, Method::PUT, "/api/v1/profile", Some(profile)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, saved) = send(&app, Method::PUT, "/api/v1/profile", Some(profile_json(user))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["niches"], json!(["AI", "SEO"]));
        assert_eq!(saved["tone"], "Storyteller");
    }

    #[tokio::test]
    async fn test_add_log_appends() {
        let app = app();
        let user = Uuid::new_v4();
        send(&app, Method::POST, "/api/v1/session", Some(json!({"user_id": user}))).await;

        let entry = json!({
            "user_id": user,
            "run_id": "run_manual",
            "status": "partial",
            "generated_count": 2,
            "posted_count": 1,
            "errors": ["one item failed"]
        });
        let (status, saved) = send(&app, Method::POST, "/api/v1/logs", Some(entry)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(saved["status"], "partial");

        let (_, mirror) = send(&app, Method::GET, &format!("/api/v1/session?user_id={user}"), None).await;
        assert_eq!(mirror["logs"][0]["run_id"], "run_manual");
    }

    #[tokio::test]
    async fn test_reddit_ingest_feed_failure_yields_no_drafts() {
        let app = app();
        let user = Uuid::new_v4();
        send(&app, Method::POST, "/api/v1/session", Some(json!({"user_id": user}))).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/drafts/reddit",
            Some(json!({"user_id": user, "subreddit": "r/business"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["subreddit"], "business");
        assert_eq!(body["drafts"], json!([]));
        assert_eq!(body["failures"].as_array().unwrap().len(), 1);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/drafts/reddit",
            Some(json!({"user_id": user, "subreddit": "no spaces"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reddit_proxy_returns_listing_unchanged() {
        let listing = hot_listing(&["Pricing lessons", "Hiring a first salesperson"]);
        let app = app_on(fake_reddit(listing.clone()).await, Config::for_tests());

        let (status, body) = send(&app, Method::GET, "/api/reddit?subreddit=business", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, listing);
    }

    #[tokio::test]
    async fn test_reddit_ingest_stores_one_draft_per_item() {
        let listing = hot_listing(&["one", "two", "three", "four", "five"]);
        let app = app_on(fake_reddit(listing).await, Config::for_tests());
        let user = Uuid::new_v4();
        send(&app, Method::POST, "/api/v1/session", Some(json!({"user_id": user}))).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/drafts/reddit",
            Some(json!({"user_id": user, "subreddit": "business"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["failures"], json!([]));
        assert_eq!(body["drafts"].as_array().unwrap().len(), 5);

        let (_, mirror) = send(&app, Method::GET, &format!("/api/v1/session?user_id={user}"), None).await;
        let drafts = mirror["drafts"].as_array().unwrap();
        assert_eq!(drafts.len(), 5);
        assert!(drafts.iter().all(|d| d["source"] == "reddit:r/business"));

        let (_, stats) = send(&app, Method::GET, &format!("/api/v1/stats?user_id={user}"), None).await;
        assert_eq!(stats, json!({"total": 5, "posted": 0, "unposted": 5}));
    }

    #[tokio::test]
    async fn test_cron_requires_secret_when_configured() {
        let mut config = Config::for_tests();
        config.cron_secret = Some("s3cret".to_string());
        let app = app_with(config);

        let (status, _) = send(&app, Method::POST, "/api/cron/daily-post", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .method(Method::GET)
            .uri("/api/cron/daily-post")
            .header("authorization", "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let summary: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(summary["processed"], 0);
        assert!(summary["run_id"].as_str().unwrap().starts_with("run_"));
    }
}
