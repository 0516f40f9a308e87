//! Post queue store
//!
//! A passive record of scheduled posts. The store validates and persists
//! posts, lists and removes them for their owner, and exposes a guarded
//! status transition for the external worker that actually publishes them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auth::Session;
use crate::cache::{keys, CacheService};
use crate::db::Database;
use crate::error::{Result, SparkError, ValidationErrors};
use crate::types::{
    MediaType, PostType, QueueDraft, QueueStatus, QueuedPost, SocialPlatform,
};

/// Shape of a post, checked for both scheduled and immediate delivery
pub struct PostShape<'a> {
    pub content: &'a str,
    pub platforms: &'a [SocialPlatform],
    pub media_url: Option<&'a str>,
    pub media_type: Option<MediaType>,
    pub post_type: PostType,
}

impl PostShape<'_> {
    /// Collect every violated invariant, in a stable order
    pub fn violations(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::default();

        if self.content.trim().is_empty() {
            errors.push("content required");
        }
        if self.platforms.is_empty() {
            errors.push("at least one platform required");
        }

        let has_url = self.media_url.is_some_and(|u| !u.trim().is_empty());
        match (has_url, self.media_type) {
            (false, Some(_)) => errors.push("media type requires media url"),
            (true, None) => errors.push("media url requires media type"),
            _ => {}
        }

        if self.post_type == PostType::Reel {
            if self.media_type != Some(MediaType::Video) {
                errors.push("reel requires video");
            }
            if self.platforms.iter().any(|p| !p.supports_reels()) {
                errors.push("reels only available for Facebook/Instagram");
            }
        }

        errors
    }
}

impl QueueDraft {
    fn shape(&self) -> PostShape<'_> {
        PostShape {
            content: &self.content,
            platforms: &self.platforms,
            media_url: self.media_url.as_deref(),
            media_type: self.media_type,
            post_type: self.post_type,
        }
    }

    /// Check every queue invariant, reporting all violations at once
    pub fn validate(&self, now: DateTime<Utc>) -> std::result::Result<(), ValidationErrors> {
        let mut errors = self.shape().violations();
        if self.scheduled_at <= now {
            errors.push("scheduled time must be in the future");
        }
        errors.into_result()
    }
}

/// Per-status counts for one user's queue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: i64,
    pub scheduled: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub next_scheduled_at: Option<DateTime<Utc>>,
}

impl QueueStats {
    pub fn total(&self) -> i64 {
        self.pending + self.scheduled + self.processing + self.completed + self.failed
    }

    fn add(&mut self, status: QueueStatus, n: i64) {
        match status {
            QueueStatus::Pending => self.pending += n,
            QueueStatus::Scheduled => self.scheduled += n,
            QueueStatus::Processing => self.processing += n,
            QueueStatus::Completed => self.completed += n,
            QueueStatus::Failed => self.failed += n,
        }
    }
}

#[derive(Clone)]
pub struct QueueStore {
    db: Arc<Database>,
    cache: CacheService,
    list_ttl: u64,
}

impl QueueStore {
    /// `list_ttl` is the staleness window of cached listings, in seconds
    pub fn new(db: Arc<Database>, cache: CacheService, list_ttl: u64) -> Self {
        Self {
            db,
            cache,
            list_ttl,
        }
    }

    fn list_key(uid: &str) -> String {
        keys::for_user(keys::SOCIAL_QUEUE, uid)
    }

    /// Validate and persist a post, returning its id
    pub async fn enqueue(&self, session: &Session, draft: QueueDraft) -> Result<String> {
        self.enqueue_at(session, draft, Utc::now()).await
    }

    pub async fn enqueue_at(
        &self,
        session: &Session,
        draft: QueueDraft,
        now: DateTime<Utc>,
    ) -> Result<String> {
        draft.validate(now)?;

        let post = QueuedPost::from_draft(session.uid(), draft, now);
        self.db.insert_queued_post(&post).await?;
        self.cache.invalidate(&Self::list_key(session.uid()));

        info!(
            post_id = %post.id,
            status = %post.status,
            scheduled_at = %post.scheduled_at,
            "Queued post"
        );

        Ok(post.id)
    }

    /// The caller's posts, earliest schedule first
    pub async fn list(&self, session: &Session) -> Result<Vec<QueuedPost>> {
        let uid = session.uid();
        self.cache
            .get_or_load(&Self::list_key(uid), self.list_ttl, || {
                self.db.list_queued_posts(uid)
            })
            .await
    }

    pub async fn get(&self, session: &Session, id: &str) -> Result<Option<QueuedPost>> {
        self.db.get_queued_post(session.uid(), id).await
    }

    /// Delete a post in any status. Unknown ids are a no-op.
    pub async fn remove(&self, session: &Session, id: &str) -> Result<bool> {
        let removed = self.db.delete_queued_post(session.uid(), id).await?;
        if removed {
            self.cache.invalidate(&Self::list_key(session.uid()));
            info!(post_id = %id, "Removed queued post");
        } else {
            warn!(post_id = %id, "Queued post not found, nothing removed");
        }
        Ok(removed)
    }

    pub async fn stats(&self, session: &Session) -> Result<QueueStats> {
        let mut stats = QueueStats::default();
        for (status, n) in self.db.queue_status_counts(session.uid()).await? {
            stats.add(status, n);
        }

        stats.next_scheduled_at = self
            .db
            .list_queued_posts(session.uid())
            .await?
            .into_iter()
            .filter(|p| p.status == QueueStatus::Scheduled)
            .map(|p| p.scheduled_at)
            .min();

        Ok(stats)
    }

    /// Move a post forward in its lifecycle
    ///
    /// Used by the external worker. Backward or same-state moves are
    /// rejected, as is a move from a status the post has already left.
    pub async fn transition_status(&self, id: &str, to: QueueStatus) -> Result<QueuedPost> {
        let mut post = self
            .db
            .get_queued_post_by_id(id)
            .await?
            .ok_or_else(|| SparkError::InvalidInput(format!("queued post {} not found", id)))?;

        if !post.status.can_transition_to(to) {
            return Err(SparkError::InvalidInput(format!(
                "invalid status transition: {} -> {}",
                post.status, to
            )));
        }

        if !self.db.update_queue_status(id, post.status, to).await? {
            return Err(SparkError::InvalidInput(format!(
                "status of queued post {} changed concurrently",
                id
            )));
        }

        debug!(post_id = %id, from = %post.status, to = %to, "Queue status updated");
        self.cache.invalidate(&Self::list_key(&post.uid));
        post.status = to;
        Ok(post)
    }

    /// Scheduled posts whose time has passed, oldest first
    pub async fn due(&self, now: DateTime<Utc>) -> Result<Vec<QueuedPost>> {
        self.db.due_queued_posts(now).await
    }
}
