//! Persistence for profiles, drafts, learned tones and logs, scoped by user.
//!
//! `Repository` is the single seam between the service and its store.
//! Every successful write publishes a `ChangeEvent` so signed-in sessions reload.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::draft::{DraftPost, DraftRow, NewDraft, PostStatus};
use crate::models::learned_tone::LearnedTone;
use crate::models::log::{LogEntry, LogRow, NewLogEntry};
use crate::models::profile::{PostingMode, Profile, ProfileRow};
use crate::sync::changes::{ChangeEvent, ChangeFeed, Table};

/// Carried in `AppState` as `Arc<dyn Repository>`.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn load_profile(&self, user_id: Uuid) -> Result<Option<Profile>, AppError>;

    /// Full-replace upsert. Returns the stored row.
    async fn upsert_profile(&self, profile: &Profile) -> Result<Profile, AppError>;

    /// Profiles with `posting_mode = auto`.
    async fn auto_profiles(&self) -> Result<Vec<Profile>, AppError>;

    /// Newest first; soft-removed drafts are excluded.
    async fn list_drafts(&self, user_id: Uuid) -> Result<Vec<DraftPost>, AppError>;

    async fn get_draft(&self, user_id: Uuid, id: Uuid) -> Result<Option<DraftPost>, AppError>;

    async fn insert_draft(&self, draft: NewDraft) -> Result<DraftPost, AppError>;

    /// Writes the mutable columns of an existing draft, but only while its
    /// stored status is still `expected`. A draft that moved on in the
    /// meantime is a `Conflict`. Returns the stored row.
    async fn update_draft(
        &self,
        draft: &DraftPost,
        expected: PostStatus,
    ) -> Result<DraftPost, AppError>;

    /// Soft delete. Returns false when nothing matched.
    async fn remove_draft(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError>;

    async fn load_learned_tone(&self, user_id: Uuid) -> Result<Option<LearnedTone>, AppError>;

    async fn upsert_learned_tone(&self, tone: &LearnedTone) -> Result<LearnedTone, AppError>;

    /// Newest first.
    async fn list_logs(&self, user_id: Uuid) -> Result<Vec<LogEntry>, AppError>;

    async fn insert_log(&self, entry: NewLogEntry) -> Result<LogEntry, AppError>;
}

pub(crate) fn stale_status(id: Uuid, expected: PostStatus, current: PostStatus) -> AppError {
    AppError::Conflict(format!(
        "Draft {id} changed concurrently: expected {}, found {}",
        expected.as_str(),
        current.as_str()
    ))
}

fn corrupt_row(table: Table, reason: impl std::fmt::Display) -> AppError {
    AppError::Internal(anyhow::anyhow!("corrupt {table} row: {reason}"))
}

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL implementation
// ────────────────────────────────────────────────────────────────────────────

const PROFILE_COLUMNS: &str = "user_id, name, niches, tone, posting_mode, preferred_time_utc, \
                               linkedin_connected, updated_at";
const DRAFT_COLUMNS: &str = "id, user_id, source, topic, raw_generation, optimized_text, \
                             optimized_meta, status, created_at, posted_at, linkedin_post_id";
const LOG_COLUMNS: &str =
    "id, user_id, run_id, timestamp, status, generated_count, posted_count, errors";

pub struct PgRepository {
    pool: PgPool,
    changes: ChangeFeed,
}

impl PgRepository {
    pub fn new(pool: PgPool, changes: ChangeFeed) -> Self {
        Self { pool, changes }
    }

    async fn notify(&self, user_id: Uuid, table: Table) {
        self.changes.publish(ChangeEvent { user_id, table }).await;
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn load_profile(&self, user_id: Uuid) -> Result<Option<Profile>, AppError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Profile::try_from)
            .transpose()
            .map_err(|e| corrupt_row(Table::Profiles, e))
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<Profile, AppError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            r#"
            INSERT INTO profiles
                (user_id, name, niches, tone, posting_mode, preferred_time_utc, linkedin_connected)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO UPDATE SET
                name = EXCLUDED.name,
                niches = EXCLUDED.niches,
                tone = EXCLUDED.tone,
                posting_mode = EXCLUDED.posting_mode,
                preferred_time_utc = EXCLUDED.preferred_time_utc,
                linkedin_connected = EXCLUDED.linkedin_connected,
                updated_at = now()
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(profile.user_id)
        .bind(&profile.name)
        .bind(&profile.niches)
        .bind(profile.tone.label())
        .bind(profile.posting_mode.as_str())
        .bind(&profile.preferred_time_utc)
        .bind(profile.linkedin_connected)
        .fetch_one(&self.pool)
        .await?;

        let stored = Profile::try_from(row).map_err(|e| corrupt_row(Table::Profiles, e))?;
        self.notify(stored.user_id, Table::Profiles).await;
        Ok(stored)
    }

    async fn auto_profiles(&self) -> Result<Vec<Profile>, AppError> {
        let rows = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE posting_mode = $1 ORDER BY user_id"
        ))
        .bind(PostingMode::Auto.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| Profile::try_from(r).map_err(|e| corrupt_row(Table::Profiles, e)))
            .collect()
    }

    async fn list_drafts(&self, user_id: Uuid) -> Result<Vec<DraftPost>, AppError> {
        let rows = sqlx::query_as::<_, DraftRow>(&format!(
            "SELECT {DRAFT_COLUMNS} FROM drafts \
             WHERE user_id = $1 AND removed_at IS NULL \
             ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| DraftPost::try_from(r).map_err(|e| corrupt_row(Table::Drafts, e)))
            .collect()
    }

    async fn get_draft(&self, user_id: Uuid, id: Uuid) -> Result<Option<DraftPost>, AppError> {
        let row = sqlx::query_as::<_, DraftRow>(&format!(
            "SELECT {DRAFT_COLUMNS} FROM drafts \
             WHERE id = $1 AND user_id = $2 AND removed_at IS NULL"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(DraftPost::try_from)
            .transpose()
            .map_err(|e| corrupt_row(Table::Drafts, e))
    }

    async fn insert_draft(&self, draft: NewDraft) -> Result<DraftPost, AppError> {
        let draft = draft.into_draft(Uuid::new_v4(), Utc::now());
        let row = sqlx::query_as::<_, DraftRow>(&format!(
            r#"
            INSERT INTO drafts
                (id, user_id, source, topic, raw_generation, optimized_text,
                 optimized_meta, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {DRAFT_COLUMNS}
            "#
        ))
        .bind(draft.id)
        .bind(draft.user_id)
        .bind(draft.source.to_string())
        .bind(&draft.topic)
        .bind(&draft.raw_generation)
        .bind(&draft.optimized_text)
        .bind(Json(&draft.optimized_meta))
        .bind(draft.status.as_str())
        .bind(draft.created_at)
        .fetch_one(&self.pool)
        .await?;

        let stored = DraftPost::try_from(row).map_err(|e| corrupt_row(Table::Drafts, e))?;
        self.notify(stored.user_id, Table::Drafts).await;
        Ok(stored)
    }

    async fn update_draft(
        &self,
        draft: &DraftPost,
        expected: PostStatus,
    ) -> Result<DraftPost, AppError> {
        let row = sqlx::query_as::<_, DraftRow>(&format!(
            r#"
            UPDATE drafts SET
                optimized_text = $3,
                optimized_meta = $4,
                status = $5,
                posted_at = $6,
                linkedin_post_id = $7
            WHERE id = $1 AND user_id = $2 AND removed_at IS NULL AND status = $8
            RETURNING {DRAFT_COLUMNS}
            "#
        ))
        .bind(draft.id)
        .bind(draft.user_id)
        .bind(&draft.optimized_text)
        .bind(Json(&draft.optimized_meta))
        .bind(draft.status.as_str())
        .bind(draft.posted_at)
        .bind(&draft.linkedin_post_id)
        .bind(expected.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            // Distinguish a lost race from a missing row.
            return match self.get_draft(draft.user_id, draft.id).await? {
                Some(current) => Err(stale_status(draft.id, expected, current.status)),
                None => Err(AppError::NotFound(format!("Draft {} not found", draft.id))),
            };
        };

        let stored = DraftPost::try_from(row).map_err(|e| corrupt_row(Table::Drafts, e))?;
        self.notify(stored.user_id, Table::Drafts).await;
        Ok(stored)
    }

    async fn remove_draft(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE drafts SET removed_at = now() \
             WHERE id = $1 AND user_id = $2 AND removed_at IS NULL",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            self.notify(user_id, Table::Drafts).await;
        }
        Ok(removed)
    }

    async fn load_learned_tone(&self, user_id: Uuid) -> Result<Option<LearnedTone>, AppError> {
        Ok(sqlx::query_as::<_, LearnedTone>(
            "SELECT user_id, avg_length, preferred_hooks, sentence_complexity, emoji_usage, created_at \
             FROM learned_tones WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn upsert_learned_tone(&self, tone: &LearnedTone) -> Result<LearnedTone, AppError> {
        let stored = sqlx::query_as::<_, LearnedTone>(
            r#"
            INSERT INTO learned_tones
                (user_id, avg_length, preferred_hooks, sentence_complexity, emoji_usage, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                avg_length = EXCLUDED.avg_length,
                preferred_hooks = EXCLUDED.preferred_hooks,
                sentence_complexity = EXCLUDED.sentence_complexity,
                emoji_usage = EXCLUDED.emoji_usage,
                created_at = EXCLUDED.created_at
            RETURNING user_id, avg_length, preferred_hooks, sentence_complexity, emoji_usage, created_at
            "#,
        )
        .bind(tone.user_id)
        .bind(tone.avg_length)
        .bind(&tone.preferred_hooks)
        .bind(tone.sentence_complexity)
        .bind(tone.emoji_usage)
        .bind(tone.created_at)
        .fetch_one(&self.pool)
        .await?;

        self.notify(stored.user_id, Table::LearnedTones).await;
        Ok(stored)
    }

    async fn list_logs(&self, user_id: Uuid) -> Result<Vec<LogEntry>, AppError> {
        let rows = sqlx::query_as::<_, LogRow>(&format!(
            "SELECT {LOG_COLUMNS} FROM logs WHERE user_id = $1 ORDER BY timestamp DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| LogEntry::try_from(r).map_err(|e| corrupt_row(Table::Logs, e)))
            .collect()
    }

    async fn insert_log(&self, entry: NewLogEntry) -> Result<LogEntry, AppError> {
        let entry = entry.into_entry(Uuid::new_v4(), Utc::now());
        let row = sqlx::query_as::<_, LogRow>(&format!(
            r#"
            INSERT INTO logs
                (id, user_id, run_id, timestamp, status, generated_count, posted_count, errors)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {LOG_COLUMNS}
            "#
        ))
        .bind(entry.id)
        .bind(entry.user_id)
        .bind(&entry.run_id)
        .bind(entry.timestamp)
        .bind(entry.status.as_str())
        .bind(entry.generated_count as i32)
        .bind(entry.posted_count as i32)
        .bind(&entry.errors)
        .fetch_one(&self.pool)
        .await?;

        let stored = LogEntry::try_from(row).map_err(|e| corrupt_row(Table::Logs, e))?;
        self.notify(stored.user_id, Table::Logs).await;
        Ok(stored)
    }
}
