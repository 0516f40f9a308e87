//! Database operations for DailySpark
//!
//! Two document collections live here: `queue` (one row per scheduled post)
//! and `users` (profile and settings per uid). Every write is a single
//! statement or a single transaction, so each document changes atomically.

use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::Path;

use crate::error::{DbError, Result};
use crate::types::{QueueStatus, QueuedPost, UserDocument, UserProfile, UserSettings};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database and run migrations
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // mode=rwc creates the file on first use
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn insert_queued_post(&self, post: &QueuedPost) -> Result<()> {
        let platforms = serde_json::to_string(&post.platforms)
            .map_err(|e| DbError::Corrupt(format!("platforms: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO queue (id, uid, content, platforms, media_url, media_type,
                               post_type, scheduled_at, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.uid)
        .bind(&post.content)
        .bind(platforms)
        .bind(&post.media_url)
        .bind(post.media_type.map(|t| t.as_str()))
        .bind(post.post_type.as_str())
        .bind(post.scheduled_at.timestamp_millis())
        .bind(post.status.as_str())
        .bind(post.created_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// All posts owned by `uid`, earliest schedule first
    pub async fn list_queued_posts(&self, uid: &str) -> Result<Vec<QueuedPost>> {
        let rows = sqlx::query(
            r#"
            SELECT id, uid, content, platforms, media_url, media_type,
                   post_type, scheduled_at, status, created_at
            FROM queue WHERE uid = ?
            ORDER BY scheduled_at ASC, created_at ASC
            "#,
        )
        .bind(uid)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(row_to_queued_post).collect()
    }

    /// A post by id, only if it belongs to `uid`
    pub async fn get_queued_post(&self, uid: &str, id: &str) -> Result<Option<QueuedPost>> {
        let row = sqlx::query(
            r#"
            SELECT id, uid, content, platforms, media_url, media_type,
                   post_type, scheduled_at, status, created_at
            FROM queue WHERE id = ? AND uid = ?
            "#,
        )
        .bind(id)
        .bind(uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.as_ref().map(row_to_queued_post).transpose()
    }

    pub async fn get_queued_post_by_id(&self, id: &str) -> Result<Option<QueuedPost>> {
        let row = sqlx::query(
            r#"
            SELECT id, uid, content, platforms, media_url, media_type,
                   post_type, scheduled_at, status, created_at
            FROM queue WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.as_ref().map(row_to_queued_post).transpose()
    }

    /// Returns whether a row was deleted
    pub async fn delete_queued_post(&self, uid: &str, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM queue WHERE id = ? AND uid = ?")
            .bind(id)
            .bind(uid)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Compare-and-set on status. Returns false if the row was not in `from`.
    pub async fn update_queue_status(
        &self,
        id: &str,
        from: QueueStatus,
        to: QueueStatus,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE queue SET status = ? WHERE id = ? AND status = ?")
            .bind(to.as_str())
            .bind(id)
            .bind(from.as_str())
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Scheduled posts whose time has come, across all users
    pub async fn due_queued_posts(&self, now: DateTime<Utc>) -> Result<Vec<QueuedPost>> {
        let rows = sqlx::query(
            r#"
            SELECT id, uid, content, platforms, media_url, media_type,
                   post_type, scheduled_at, status, created_at
            FROM queue WHERE status = 'scheduled' AND scheduled_at <= ?
            ORDER BY scheduled_at ASC
            "#,
        )
        .bind(now.timestamp_millis())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(row_to_queued_post).collect()
    }

    pub async fn queue_status_counts(&self, uid: &str) -> Result<Vec<(QueueStatus, i64)>> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS n FROM queue WHERE uid = ? GROUP BY status",
        )
        .bind(uid)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter()
            .map(|r| {
                let status: String = r.get("status");
                let status = status
                    .parse()
                    .map_err(|_| DbError::Corrupt(format!("unknown status '{}'", status)))?;
                Ok((status, r.get::<i64, _>("n")))
            })
            .collect()
    }

    pub async fn get_user_document(&self, uid: &str) -> Result<Option<UserDocument>> {
        let row = sqlx::query("SELECT profile, settings FROM users WHERE uid = ?")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let profile = row
            .get::<Option<String>, _>("profile")
            .map(|raw| serde_json::from_str::<UserProfile>(&raw))
            .transpose()
            .map_err(|e| DbError::Corrupt(format!("profile of {}: {}", uid, e)))?;
        let settings: UserSettings = serde_json::from_str(&row.get::<String, _>("settings"))
            .map_err(|e| DbError::Corrupt(format!("settings of {}: {}", uid, e)))?;

        Ok(Some(UserDocument { profile, settings }))
    }

    /// Replace the profile half of the user document
    pub async fn upsert_user_profile(&self, uid: &str, profile: &UserProfile) -> Result<()> {
        let raw = serde_json::to_string(profile)
            .map_err(|e| DbError::Corrupt(format!("profile: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO users (uid, profile, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(uid) DO UPDATE SET profile = excluded.profile, updated_at = excluded.updated_at
            "#,
        )
        .bind(uid)
        .bind(raw)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Merge `update` into the stored settings inside one transaction
    pub async fn merge_user_settings(&self, uid: &str, update: UserSettings) -> Result<UserSettings> {
        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        let current: Option<String> = sqlx::query("SELECT settings FROM users WHERE uid = ?")
            .bind(uid)
            .fetch_optional(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?
            .map(|r| r.get("settings"));

        let mut settings: UserSettings = match current {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| DbError::Corrupt(format!("settings of {}: {}", uid, e)))?,
            None => UserSettings::default(),
        };
        settings.merge(update);

        let raw = serde_json::to_string(&settings)
            .map_err(|e| DbError::Corrupt(format!("settings: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO users (uid, settings, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(uid) DO UPDATE SET settings = excluded.settings, updated_at = excluded.updated_at
            "#,
        )
        .bind(uid)
        .bind(raw)
        .bind(Utc::now().timestamp_millis())
        .execute(&mut *tx)
        .await
        .map_err(DbError::SqlxError)?;

        tx.commit().await.map_err(DbError::SqlxError)?;

        Ok(settings)
    }
}

fn millis_to_datetime(ms: i64, column: &str) -> std::result::Result<DateTime<Utc>, DbError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| DbError::Corrupt(format!("{} out of range: {}", column, ms)))
}

fn row_to_queued_post(row: &SqliteRow) -> Result<QueuedPost> {
    let id: String = row.get("id");
    let corrupt = |what: &str, e: &dyn std::fmt::Display| {
        DbError::Corrupt(format!("queue/{} {}: {}", id, what, e))
    };

    let platforms = serde_json::from_str(&row.get::<String, _>("platforms"))
        .map_err(|e| corrupt("platforms", &e))?;
    let media_type = row
        .get::<Option<String>, _>("media_type")
        .map(|s| s.parse())
        .transpose()
        .map_err(|e| corrupt("media_type", &e))?;
    let post_type = row
        .get::<String, _>("post_type")
        .parse()
        .map_err(|e| corrupt("post_type", &e))?;
    let status = row
        .get::<String, _>("status")
        .parse()
        .map_err(|e| corrupt("status", &e))?;

    Ok(QueuedPost {
        uid: row.get("uid"),
        content: row.get("content"),
        platforms,
        media_url: row.get("media_url"),
        media_type,
        post_type,
        scheduled_at: millis_to_datetime(row.get("scheduled_at"), "scheduled_at")?,
        status,
        created_at: millis_to_datetime(row.get("created_at"), "created_at")?,
        id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SparkError;
    use crate::types::{MediaType, PostType, QueueDraft, SocialPlatform, Theme};
    use chrono::Duration;
    use tempfile::TempDir;

    async fn setup() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
        (db, temp_dir)
    }

    fn post_for(uid: &str, hours_ahead: i64) -> QueuedPost {
        let now = Utc::now();
        let draft = QueueDraft::new(
            "Test post content",
            vec![SocialPlatform::Linkedin, SocialPlatform::X],
            now + Duration::hours(hours_ahead),
        );
        QueuedPost::from_draft(uid, draft, now)
    }

    #[tokio::test]
    async fn test_database_initialization_with_invalid_path() {
        #[cfg(unix)]
        let invalid_path = "/tmp/test\0invalid.db";

        #[cfg(windows)]
        let invalid_path = "C:\\invalid<>path\\test.db";

        let result = Database::new(invalid_path).await;
        assert!(matches!(result, Err(SparkError::Database(_))));
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trip() {
        let (db, _dir) = setup().await;
        let now = Utc::now();
        let draft = QueueDraft::new("Reel time", vec![SocialPlatform::Instagram], now + Duration::days(1))
            .with_media("https://cdn.example.com/clip.mp4", MediaType::Video)
            .with_post_type(PostType::Reel);
        let post = QueuedPost::from_draft("u1", draft, now);

        db.insert_queued_post(&post).await.unwrap();
        let loaded = db.get_queued_post("u1", &post.id).await.unwrap().unwrap();

        assert_eq!(loaded.content, "Reel time");
        assert_eq!(loaded.platforms, vec![SocialPlatform::Instagram]);
        assert_eq!(loaded.media_type, Some(MediaType::Video));
        assert_eq!(loaded.post_type, PostType::Reel);
        assert_eq!(loaded.status, QueueStatus::Scheduled);
        assert_eq!(
            loaded.scheduled_at.timestamp_millis(),
            post.scheduled_at.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn test_get_is_scoped_to_owner() {
        let (db, _dir) = setup().await;
        let post = post_for("owner", 1);
        db.insert_queued_post(&post).await.unwrap();

        assert!(db.get_queued_post("intruder", &post.id).await.unwrap().is_none());
        assert!(!db.delete_queued_post("intruder", &post.id).await.unwrap());
        assert!(db.get_queued_post_by_id(&post.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_orders_by_schedule() {
        let (db, _dir) = setup().await;
        let late = post_for("u1", 48);
        let soon = post_for("u1", 1);
        let other = post_for("u2", 2);
        for p in [&late, &soon, &other] {
            db.insert_queued_post(p).await.unwrap();
        }

        let listed = db.list_queued_posts("u1").await.unwrap();
        let ids: Vec<_> = listed.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec![soon.id.as_str(), late.id.as_str()]);
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let (db, _dir) = setup().await;
        let post = post_for("u1", 1);
        db.insert_queued_post(&post).await.unwrap();

        assert!(db.delete_queued_post("u1", &post.id).await.unwrap());
        assert!(!db.delete_queued_post("u1", &post.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_status_compare_and_set() {
        let (db, _dir) = setup().await;
        let post = post_for("u1", 1);
        db.insert_queued_post(&post).await.unwrap();

        assert!(db
            .update_queue_status(&post.id, QueueStatus::Scheduled, QueueStatus::Processing)
            .await
            .unwrap());
        // Second worker loses the race
        assert!(!db
            .update_queue_status(&post.id, QueueStatus::Scheduled, QueueStatus::Processing)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_due_posts_only_scheduled_and_past() {
        let (db, _dir) = setup().await;
        let past = post_for("u1", -1);
        let future = post_for("u1", 5);
        let mut pending = post_for("u2", -2);
        pending.status = QueueStatus::Pending;
        for p in [&past, &future, &pending] {
            db.insert_queued_post(p).await.unwrap();
        }

        let due = db.due_queued_posts(Utc::now()).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, past.id);
    }

    #[tokio::test]
    async fn test_status_counts() {
        let (db, _dir) = setup().await;
        for _ in 0..2 {
            db.insert_queued_post(&post_for("u1", 1)).await.unwrap();
        }
        let mut pending = post_for("u1", 1);
        pending.status = QueueStatus::Pending;
        db.insert_queued_post(&pending).await.unwrap();

        let mut counts = db.queue_status_counts("u1").await.unwrap();
        counts.sort_by_key(|(s, _)| s.as_str());
        assert_eq!(
            counts,
            vec![(QueueStatus::Pending, 1), (QueueStatus::Scheduled, 2)]
        );
    }

    #[tokio::test]
    async fn test_check_constraint_rejects_empty_content() {
        let (db, _dir) = setup().await;
        let mut post = post_for("u1", 1);
        post.content = String::new();
        assert!(db.insert_queued_post(&post).await.is_err());
    }

    #[tokio::test]
    async fn test_corrupt_row_is_reported() {
        let (db, _dir) = setup().await;
        let post = post_for("u1", 1);
        db.insert_queued_post(&post).await.unwrap();
        sqlx::query("UPDATE queue SET platforms = 'not json' WHERE id = ?")
            .bind(&post.id)
            .execute(db.pool())
            .await
            .unwrap();

        let result = db.list_queued_posts("u1").await;
        assert!(matches!(
            result,
            Err(SparkError::Database(DbError::Corrupt(_)))
        ));
    }

    #[tokio::test]
    async fn test_user_document_missing() {
        let (db, _dir) = setup().await;
        assert!(db.get_user_document("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_settings_merge_persists() {
        let (db, _dir) = setup().await;

        db.merge_user_settings(
            "u1",
            UserSettings {
                ai_prompt: Some("Be bold".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let merged = db
            .merge_user_settings(
                "u1",
                UserSettings {
                    theme: Some(Theme::Light),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(merged.ai_prompt.as_deref(), Some("Be bold"));

        let doc = db.get_user_document("u1").await.unwrap().unwrap();
        assert_eq!(doc.settings, merged);
        assert!(doc.profile.is_none());
    }

    #[tokio::test]
    async fn test_profile_upsert_keeps_settings() {
        let (db, _dir) = setup().await;
        db.merge_user_settings(
            "u1",
            UserSettings {
                ai_prompt: Some("Keep me".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let profile = UserProfile {
            display_name: Some("Ana".to_string()),
            photo_url: None,
            last_updated: Some(Utc::now()),
        };
        db.upsert_user_profile("u1", &profile).await.unwrap();

        let doc = db.get_user_document("u1").await.unwrap().unwrap();
        assert_eq!(doc.profile.unwrap().display_name.as_deref(), Some("Ana"));
        assert_eq!(doc.settings.ai_prompt.as_deref(), Some("Keep me"));
    }
}
