//! In-memory `Repository` used by tests. Publishes change events like the
//! PostgreSQL implementation and can be told to reject writes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::draft::{DraftPost, NewDraft, PostStatus};
use crate::models::learned_tone::LearnedTone;
use crate::models::log::{LogEntry, NewLogEntry};
use crate::models::profile::{PostingMode, Profile};
use crate::sync::changes::{ChangeEvent, ChangeFeed, Table};
use crate::sync::repository::{stale_status, Repository};

/// Rows are kept newest first, matching the ordering of the SQL reads.
#[derive(Default)]
struct Tables {
    profiles: HashMap<Uuid, Profile>,
    drafts: Vec<(DraftPost, bool)>,
    learned_tones: HashMap<Uuid, LearnedTone>,
    logs: Vec<LogEntry>,
}

pub struct MemoryRepository {
    tables: RwLock<Tables>,
    changes: ChangeFeed,
    reject_writes: AtomicBool,
    slow_reads: AtomicBool,
}

impl MemoryRepository {
    pub fn new(changes: ChangeFeed) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            changes,
            reject_writes: AtomicBool::new(false),
            slow_reads: AtomicBool::new(false),
        }
    }

    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Makes `get_draft` yield once after reading, like a network round
    /// trip, so concurrent callers interleave.
    pub fn slow_reads(&self, slow: bool) {
        self.slow_reads.store(slow, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), AppError> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(AppError::Internal(anyhow::anyhow!("write rejected")));
        }
        Ok(())
    }

    async fn notify(&self, user_id: Uuid, table: Table) {
        self.changes.publish(ChangeEvent { user_id, table }).await;
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn load_profile(&self, user_id: Uuid) -> Result<Option<Profile>, AppError> {
        Ok(self.tables.read().await.profiles.get(&user_id).cloned())
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<Profile, AppError> {
        self.check_writable()?;
        self.tables
            .write()
            .await
            .profiles
            .insert(profile.user_id, profile.clone());
        self.notify(profile.user_id, Table::Profiles).await;
        Ok(profile.clone())
    }

    async fn auto_profiles(&self) -> Result<Vec<Profile>, AppError> {
        let tables = self.tables.read().await;
        let mut profiles: Vec<Profile> = tables
            .profiles
            .values()
            .filter(|p| p.posting_mode == PostingMode::Auto)
            .cloned()
            .collect();
        profiles.sort_by_key(|p| p.user_id);
        Ok(profiles)
    }

    async fn list_drafts(&self, user_id: Uuid) -> Result<Vec<DraftPost>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .drafts
            .iter()
            .filter(|(d, removed)| d.user_id == user_id && !removed)
            .map(|(d, _)| d.clone())
            .collect())
    }

    async fn get_draft(&self, user_id: Uuid, id: Uuid) -> Result<Option<DraftPost>, AppError> {
        let found = self
            .tables
            .read()
            .await
            .drafts
            .iter()
            .find(|(d, removed)| d.id == id && d.user_id == user_id && !removed)
            .map(|(d, _)| d.clone());
        if self.slow_reads.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        Ok(found)
    }

    async fn insert_draft(&self, draft: NewDraft) -> Result<DraftPost, AppError> {
        self.check_writable()?;
        let stored = draft.into_draft(Uuid::new_v4(), Utc::now());
        self.tables.write().await.drafts.insert(0, (stored.clone(), false));
        self.notify(stored.user_id, Table::Drafts).await;
        Ok(stored)
    }

    async fn update_draft(
        &self,
        draft: &DraftPost,
        expected: PostStatus,
    ) -> Result<DraftPost, AppError> {
        self.check_writable()?;
        {
            let mut tables = self.tables.write().await;
            let slot = tables
                .drafts
                .iter_mut()
                .find(|(d, removed)| d.id == draft.id && d.user_id == draft.user_id && !removed)
                .ok_or_else(|| AppError::NotFound(format!("Draft {} not found", draft.id)))?;
            if slot.0.status != expected {
                return Err(stale_status(draft.id, expected, slot.0.status));
            }
            slot.0 = draft.clone();
        }
        self.notify(draft.user_id, Table::Drafts).await;
        Ok(draft.clone())
    }

    async fn remove_draft(&self, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        self.check_writable()?;
        let removed = {
            let mut tables = self.tables.write().await;
            match tables
                .drafts
                .iter_mut()
                .find(|(d, removed)| d.id == id && d.user_id == user_id && !removed)
            {
                Some(slot) => {
                    slot.1 = true;
                    true
                }
                None => false,
            }
        };
        if removed {
            self.notify(user_id, Table::Drafts).await;
        }
        Ok(removed)
    }

    async fn load_learned_tone(&self, user_id: Uuid) -> Result<Option<LearnedTone>, AppError> {
        Ok(self.tables.read().await.learned_tones.get(&user_id).cloned())
    }

    async fn upsert_learned_tone(&self, tone: &LearnedTone) -> Result<LearnedTone, AppError> {
        self.check_writable()?;
        self.tables
            .write()
            .await
            .learned_tones
            .insert(tone.user_id, tone.clone());
        self.notify(tone.user_id, Table::LearnedTones).await;
        Ok(tone.clone())
    }

    async fn list_logs(&self, user_id: Uuid) -> Result<Vec<LogEntry>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .logs
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_log(&self, entry: NewLogEntry) -> Result<LogEntry, AppError> {
        self.check_writable()?;
        let stored = entry.into_entry(Uuid::new_v4(), Utc::now());
        self.tables.write().await.logs.insert(0, stored.clone());
        self.notify(stored.user_id, Table::Logs).await;
        Ok(stored)
    }
}
