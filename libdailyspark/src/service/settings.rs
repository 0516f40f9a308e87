//! Per-user profile and settings document

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::auth::Session;
use crate::cache::{keys, CacheService, TTL_LONG};
use crate::db::Database;
use crate::error::{Result, SparkError, ValidationErrors};
use crate::types::{UserDocument, UserProfile, UserSettings};

/// Longest custom instruction accepted for generation
pub const MAX_AI_PROMPT_CHARS: usize = 2000;

/// New profile values. The stored profile is replaced as a whole; empty
/// strings clear a field.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct SettingsService {
    db: Arc<Database>,
    cache: CacheService,
    settings_ttl: u64,
}

impl SettingsService {
    pub fn new(db: Arc<Database>, cache: CacheService, settings_ttl: u64) -> Self {
        Self {
            db,
            cache,
            settings_ttl,
        }
    }

    fn settings_key(uid: &str) -> String {
        keys::for_user(keys::USER_SETTINGS, uid)
    }

    fn profile_key(uid: &str) -> String {
        keys::for_user(keys::USER_PROFILE, uid)
    }

    /// The whole `users/{uid}` document, read from the store
    pub async fn document(&self, session: &Session) -> Result<UserDocument> {
        Ok(self
            .db
            .get_user_document(session.uid())
            .await?
            .unwrap_or_default())
    }

    pub async fn profile(&self, session: &Session) -> Result<UserProfile> {
        let uid = session.uid();
        self.cache
            .get_or_load(&Self::profile_key(uid), TTL_LONG, || async move {
                Ok(self
                    .db
                    .get_user_document(uid)
                    .await?
                    .and_then(|doc| doc.profile)
                    .unwrap_or_default())
            })
            .await
    }

    pub async fn update_profile(&self, session: &Session, update: ProfileUpdate) -> Result<UserProfile> {
        let profile = UserProfile {
            display_name: non_empty(update.display_name),
            photo_url: non_empty(update.photo_url),
            last_updated: Some(Utc::now()),
        };

        self.db.upsert_user_profile(session.uid(), &profile).await?;
        self.cache.invalidate(&Self::profile_key(session.uid()));
        info!(uid = %session.uid(), "Profile updated");

        Ok(profile)
    }

    /// Settings through the cache, within the configured staleness window
    pub async fn settings(&self, session: &Session) -> Result<UserSettings> {
        let uid = session.uid();
        self.cache
            .get_or_load(&Self::settings_key(uid), self.settings_ttl, || async move {
                Ok(self
                    .db
                    .get_user_document(uid)
                    .await?
                    .map(|doc| doc.settings)
                    .unwrap_or_default())
            })
            .await
    }

    /// The custom generation instruction, always read from the store
    pub async fn ai_prompt(&self, session: &Session) -> Result<Option<String>> {
        Ok(self
            .db
            .get_user_document(session.uid())
            .await?
            .and_then(|doc| doc.settings.ai_prompt)
            .filter(|p| !p.trim().is_empty()))
    }

    /// Merge `update` into the stored settings and return the result
    pub async fn save_settings(&self, session: &Session, update: UserSettings) -> Result<UserSettings> {
        if update == UserSettings::default() {
            return Err(ValidationErrors::single("settings required").into());
        }
        if let Some(prompt) = &update.ai_prompt {
            let chars = prompt.chars().count();
            if chars > MAX_AI_PROMPT_CHARS {
                return Err(SparkError::Validation(ValidationErrors::single(format!(
                    "ai prompt must be at most {} characters (got {})",
                    MAX_AI_PROMPT_CHARS, chars
                ))));
            }
        }

        let merged = self.db.merge_user_settings(session.uid(), update).await?;
        self.cache.invalidate(&Self::settings_key(session.uid()));
        info!(uid = %session.uid(), "Settings saved");

        Ok(merged)
    }
}
