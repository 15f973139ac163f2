//! Per-user in-memory mirrors of the four tables.
//!
//! Signing in bulk-loads profile, drafts, learned tone and logs, creating the
//! default profile and learned tone when they are missing. A watcher task then
//! listens on the change feed and replaces the whole mirror whenever one of
//! the user's rows changes. Writes go to the repository first and only touch
//! the mirror once the stored row comes back.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::draft::{DraftPatch, DraftPost, NewDraft, PostStatus};
use crate::models::learned_tone::LearnedTone;
use crate::models::log::{LogEntry, NewLogEntry};
use crate::models::profile::Profile;
use crate::sync::changes::ChangeFeed;
use crate::sync::repository::Repository;

/// Snapshot of everything the dashboard shows for one user.
/// The default value is what a signed-out reader sees.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Mirror {
    pub profile: Option<Profile>,
    pub drafts: Vec<DraftPost>,
    pub learned_tone: Option<LearnedTone>,
    pub logs: Vec<LogEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total: usize,
    pub posted: usize,
    pub unposted: usize,
}

impl DashboardStats {
    pub fn from_drafts(drafts: &[DraftPost]) -> Self {
        let total = drafts.len();
        let posted = drafts
            .iter()
            .filter(|d| d.status == PostStatus::Posted)
            .count();
        Self {
            total,
            posted,
            unposted: total - posted,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Loading
// ────────────────────────────────────────────────────────────────────────────

async fn fetch_mirror(repo: &dyn Repository, user_id: Uuid) -> Result<Mirror, AppError> {
    let (profile, drafts, learned_tone, logs) = tokio::try_join!(
        repo.load_profile(user_id),
        repo.list_drafts(user_id),
        repo.load_learned_tone(user_id),
        repo.list_logs(user_id),
    )?;
    Ok(Mirror {
        profile,
        drafts,
        learned_tone,
        logs,
    })
}

/// Initial load on sign-in. Missing profile / learned tone rows are created.
async fn load_with_defaults(
    repo: &dyn Repository,
    user_id: Uuid,
    name: &str,
) -> Result<Mirror, AppError> {
    let mut mirror = fetch_mirror(repo, user_id).await?;

    if mirror.profile.is_none() {
        info!("Creating default profile for user {user_id}");
        let created = repo
            .upsert_profile(&Profile::default_for(user_id, name))
            .await?;
        mirror.profile = Some(created);
    }
    if mirror.learned_tone.is_none() {
        info!("Creating default learned tone for user {user_id}");
        let created = repo
            .upsert_learned_tone(&LearnedTone::default_for(user_id))
            .await?;
        mirror.learned_tone = Some(created);
    }
    Ok(mirror)
}

async fn refresh(repo: &dyn Repository, user_id: Uuid, mirror: &RwLock<Mirror>) {
    match fetch_mirror(repo, user_id).await {
        Ok(fresh) => {
            *mirror.write().await = fresh;
            debug!("Reloaded mirror for user {user_id}");
        }
        Err(e) => warn!("Reload for user {user_id} failed, keeping previous state: {e}"),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Session
// ────────────────────────────────────────────────────────────────────────────

pub struct SyncSession {
    user_id: Uuid,
    repo: Arc<dyn Repository>,
    mirror: Arc<RwLock<Mirror>>,
    watcher: JoinHandle<()>,
}

impl SyncSession {
    /// Subscribes before loading so no write between the two is missed.
    pub async fn start(
        repo: Arc<dyn Repository>,
        changes: &ChangeFeed,
        user_id: Uuid,
        name: &str,
    ) -> Result<Self, AppError> {
        let mut events = changes.subscribe();
        let initial = load_with_defaults(repo.as_ref(), user_id, name).await?;
        let mirror = Arc::new(RwLock::new(initial));

        let watcher = {
            let repo = repo.clone();
            let mirror = mirror.clone();
            tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(event) if event.user_id == user_id => {
                            debug!("{} changed for user {user_id}", event.table);
                            refresh(repo.as_ref(), user_id, &mirror).await;
                        }
                        Ok(_) => {}
                        // Missed events may have been ours.
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Change watcher for {user_id} lagged by {skipped} events");
                            refresh(repo.as_ref(), user_id, &mirror).await;
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            })
        };

        Ok(Self {
            user_id,
            repo,
            mirror,
            watcher,
        })
    }

    pub async fn snapshot(&self) -> Mirror {
        self.mirror.read().await.clone()
    }

    pub async fn stats(&self) -> DashboardStats {
        DashboardStats::from_drafts(&self.mirror.read().await.drafts)
    }

    pub async fn profile(&self) -> Option<Profile> {
        self.mirror.read().await.profile.clone()
    }

    pub async fn learned_tone(&self) -> Option<LearnedTone> {
        self.mirror.read().await.learned_tone.clone()
    }

    pub async fn reload(&self) {
        refresh(self.repo.as_ref(), self.user_id, &self.mirror).await;
    }

    /// Full replace from the settings form.
    pub async fn update_profile(&self, mut profile: Profile) -> Result<Profile, AppError> {
        self.check_owner(profile.user_id)?;
        profile.validate()?;
        profile.normalize();

        let saved = self
            .repo
            .upsert_profile(&profile)
            .await
            .inspect_err(|e| warn!("Profile update for {} rejected: {e}", self.user_id))?;
        self.mirror.write().await.profile = Some(saved.clone());
        Ok(saved)
    }

    pub async fn add_draft(&self, draft: NewDraft) -> Result<DraftPost, AppError> {
        self.check_owner(draft.user_id)?;
        let saved = self
            .repo
            .insert_draft(draft)
            .await
            .inspect_err(|e| warn!("Draft insert for {} rejected: {e}", self.user_id))?;
        // The watcher may already have reloaded it in.
        let mut mirror = self.mirror.write().await;
        if !mirror.drafts.iter().any(|d| d.id == saved.id) {
            mirror.drafts.insert(0, saved.clone());
        }
        Ok(saved)
    }

    pub async fn update_draft(&self, id: Uuid, patch: DraftPatch) -> Result<DraftPost, AppError> {
        let mut draft = self
            .repo
            .get_draft(self.user_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Draft {id} not found")))?;
        let previous = draft.status;
        draft.apply(patch, Utc::now())?;

        let saved = self
            .repo
            .update_draft(&draft, previous)
            .await
            .inspect_err(|e| warn!("Draft {id} update rejected: {e}"))?;
        let mut mirror = self.mirror.write().await;
        match mirror.drafts.iter_mut().find(|d| d.id == id) {
            Some(slot) => *slot = saved.clone(),
            None => mirror.drafts.insert(0, saved.clone()),
        }
        Ok(saved)
    }

    /// Marks a draft as posted. Publishing itself happens elsewhere.
    pub async fn post_draft(&self, id: Uuid) -> Result<DraftPost, AppError> {
        self.update_draft(
            id,
            DraftPatch {
                status: Some(PostStatus::Posted),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn remove_draft(&self, id: Uuid) -> Result<(), AppError> {
        let removed = self
            .repo
            .remove_draft(self.user_id, id)
            .await
            .inspect_err(|e| warn!("Draft {id} removal rejected: {e}"))?;
        if !removed {
            return Err(AppError::NotFound(format!("Draft {id} not found")));
        }
        self.mirror.write().await.drafts.retain(|d| d.id != id);
        Ok(())
    }

    pub async fn add_log(&self, entry: NewLogEntry) -> Result<LogEntry, AppError> {
        self.check_owner(entry.user_id)?;
        let saved = self
            .repo
            .insert_log(entry)
            .await
            .inspect_err(|e| warn!("Log insert for {} rejected: {e}", self.user_id))?;
        let mut mirror = self.mirror.write().await;
        if !mirror.logs.iter().any(|l| l.id == saved.id) {
            mirror.logs.insert(0, saved.clone());
        }
        Ok(saved)
    }

    async fn clear(&self) {
        self.watcher.abort();
        *self.mirror.write().await = Mirror::default();
    }

    fn check_owner(&self, user_id: Uuid) -> Result<(), AppError> {
        if user_id != self.user_id {
            return Err(AppError::Validation(format!(
                "row belongs to user {user_id}, session is {}",
                self.user_id
            )));
        }
        Ok(())
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Registry
// ────────────────────────────────────────────────────────────────────────────

/// Active sessions keyed by user id.
#[derive(Clone)]
pub struct SessionRegistry {
    repo: Arc<dyn Repository>,
    changes: ChangeFeed,
    sessions: Arc<RwLock<HashMap<Uuid, Arc<SyncSession>>>>,
}

impl SessionRegistry {
    pub fn new(repo: Arc<dyn Repository>, changes: ChangeFeed) -> Self {
        Self {
            repo,
            changes,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Signing in again reuses the live session after a reload.
    pub async fn sign_in(&self, user_id: Uuid, name: &str) -> Result<Arc<SyncSession>, AppError> {
        if let Some(existing) = self.get(user_id).await {
            existing.reload().await;
            return Ok(existing);
        }

        let session = Arc::new(SyncSession::start(self.repo.clone(), &self.changes, user_id, name).await?);
        let mut sessions = self.sessions.write().await;
        // A concurrent sign-in may have won the race.
        let session = sessions.entry(user_id).or_insert(session).clone();
        info!("User {user_id} signed in ({} active sessions)", sessions.len());
        Ok(session)
    }

    pub async fn get(&self, user_id: Uuid) -> Option<Arc<SyncSession>> {
        self.sessions.read().await.get(&user_id).cloned()
    }

    /// Session-scoped operations are unavailable while signed out.
    pub async fn require(&self, user_id: Uuid) -> Result<Arc<SyncSession>, AppError> {
        self.get(user_id).await.ok_or(AppError::Unauthorized)
    }

    pub async fn snapshot(&self, user_id: Uuid) -> Mirror {
        match self.get(user_id).await {
            Some(session) => session.snapshot().await,
            None => Mirror::default(),
        }
    }

    /// Returns whether a session was active.
    pub async fn sign_out(&self, user_id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&user_id);
        match removed {
            Some(session) => {
                session.clear().await;
                info!("User {user_id} signed out");
                true
            }
            None => false,
        }
    }
}
