//! Core types for DailySpark

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::SparkError;

const MIB: u64 = 1024 * 1024;

/// Target social network
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SocialPlatform {
    Linkedin,
    X,
    Facebook,
    Instagram,
}

impl SocialPlatform {
    pub const ALL: [SocialPlatform; 4] = [
        SocialPlatform::Linkedin,
        SocialPlatform::X,
        SocialPlatform::Facebook,
        SocialPlatform::Instagram,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linkedin => "linkedin",
            Self::X => "x",
            Self::Facebook => "facebook",
            Self::Instagram => "instagram",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Linkedin => "LinkedIn",
            Self::X => "X",
            Self::Facebook => "Facebook",
            Self::Instagram => "Instagram",
        }
    }

    /// Largest image the platform accepts, if it publishes a cap
    pub fn image_size_limit(&self) -> Option<u64> {
        match self {
            Self::Linkedin => Some(8 * MIB),
            Self::X => Some(5 * MIB),
            Self::Facebook | Self::Instagram => None,
        }
    }

    /// Largest video the platform accepts, if it publishes a cap
    pub fn video_size_limit(&self) -> Option<u64> {
        match self {
            Self::Linkedin => Some(200 * MIB),
            Self::X => Some(512 * MIB),
            Self::Facebook | Self::Instagram => None,
        }
    }

    /// Soft character guidance shown next to the composer
    pub fn character_hint(&self) -> Option<usize> {
        match self {
            Self::Linkedin => Some(1300),
            Self::X => Some(280),
            Self::Facebook | Self::Instagram => None,
        }
    }

    /// Whether reels can be published here
    pub fn supports_reels(&self) -> bool {
        matches!(self, Self::Facebook | Self::Instagram)
    }
}

impl std::fmt::Display for SocialPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SocialPlatform {
    type Err = SparkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linkedin" => Ok(Self::Linkedin),
            "x" | "twitter" => Ok(Self::X),
            "facebook" => Ok(Self::Facebook),
            "instagram" => Ok(Self::Instagram),
            other => Err(SparkError::InvalidInput(format!(
                "Unknown platform '{}'. Valid options: linkedin, x, facebook, instagram",
                other
            ))),
        }
    }
}

/// Parse a comma-separated platform list, dropping duplicates but keeping order
pub fn parse_platforms(input: &[String]) -> Result<Vec<SocialPlatform>, SparkError> {
    let mut platforms = Vec::new();
    for raw in input.iter().flat_map(|s| s.split(',')) {
        if raw.trim().is_empty() {
            continue;
        }
        let platform: SocialPlatform = raw.parse()?;
        if !platforms.contains(&platform) {
            platforms.push(platform);
        }
    }
    Ok(platforms)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    /// Classify a MIME string; anything other than image/* or video/* is `None`
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim().to_lowercase();
        if mime.starts_with("image/") {
            Some(Self::Image)
        } else if mime.starts_with("video/") {
            Some(Self::Video)
        } else {
            None
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = SparkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            other => Err(SparkError::InvalidInput(format!(
                "Unknown media type '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    #[default]
    Post,
    Reel,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Reel => "reel",
        }
    }
}

impl std::fmt::Display for PostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PostType {
    type Err = SparkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "post" => Ok(Self::Post),
            "reel" => Ok(Self::Reel),
            other => Err(SparkError::InvalidInput(format!(
                "Unknown post type '{}'",
                other
            ))),
        }
    }
}

/// Lifecycle of a queued post. Transitions only move forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Scheduled,
    Processing,
    Completed,
    Failed,
}

impl QueueStatus {
    pub const ALL: [QueueStatus; 5] = [
        QueueStatus::Pending,
        QueueStatus::Scheduled,
        QueueStatus::Processing,
        QueueStatus::Completed,
        QueueStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scheduled => "scheduled",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn can_transition_to(&self, next: QueueStatus) -> bool {
        use QueueStatus::*;
        matches!(
            (self, next),
            (Pending, Scheduled)
                | (Pending, Processing)
                | (Pending, Failed)
                | (Scheduled, Processing)
                | (Scheduled, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QueueStatus {
    type Err = SparkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "scheduled" => Ok(Self::Scheduled),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(SparkError::InvalidInput(format!(
                "Unknown queue status '{}'",
                other
            ))),
        }
    }
}

/// A post persisted in the queue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueuedPost {
    pub id: String,
    pub uid: String,
    pub content: String,
    pub platforms: Vec<SocialPlatform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    pub post_type: PostType,
    pub scheduled_at: DateTime<Utc>,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
}

impl QueuedPost {
    /// Build a record from an already validated draft
    pub fn from_draft(uid: &str, draft: QueueDraft, now: DateTime<Utc>) -> Self {
        let status = if draft.await_confirmation {
            QueueStatus::Pending
        } else {
            QueueStatus::Scheduled
        };

        Self {
            id: Uuid::new_v4().to_string(),
            uid: uid.to_string(),
            content: draft.content,
            platforms: draft.platforms,
            media_url: draft.media_url,
            media_type: draft.media_type,
            post_type: draft.post_type,
            scheduled_at: draft.scheduled_at,
            status,
            created_at: now,
        }
    }
}

/// Fields a caller supplies to enqueue a post
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueDraft {
    pub content: String,
    pub platforms: Vec<SocialPlatform>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub media_type: Option<MediaType>,
    #[serde(default)]
    pub post_type: PostType,
    pub scheduled_at: DateTime<Utc>,
    /// Store as `pending` instead of `scheduled`
    #[serde(default)]
    pub await_confirmation: bool,
}

impl QueueDraft {
    pub fn new(
        content: impl Into<String>,
        platforms: Vec<SocialPlatform>,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            content: content.into(),
            platforms,
            media_url: None,
            media_type: None,
            post_type: PostType::Post,
            scheduled_at,
            await_confirmation: false,
        }
    }

    pub fn with_media(mut self, url: impl Into<String>, media_type: MediaType) -> Self {
        self.media_url = Some(url.into());
        self.media_type = Some(media_type);
        self
    }

    pub fn with_post_type(mut self, post_type: PostType) -> Self {
        self.post_type = post_type;
        self
    }
}

/// Profile half of the per-user document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub post_published: bool,
    pub post_failed: bool,
    pub daily_summary: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            post_published: true,
            post_failed: true,
            daily_summary: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Theme {
    type Err = SparkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dark" => Ok(Self::Dark),
            "light" => Ok(Self::Light),
            other => Err(SparkError::InvalidInput(format!(
                "Unknown theme '{}'. Valid options: dark, light",
                other
            ))),
        }
    }
}

/// Settings half of the per-user document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications: Option<NotificationSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
}

impl UserSettings {
    /// Merge `update` over `self`; fields the update leaves unset are kept
    pub fn merge(&mut self, update: UserSettings) {
        if update.ai_prompt.is_some() {
            self.ai_prompt = update.ai_prompt;
        }
        if update.notifications.is_some() {
            self.notifications = update.notifications;
        }
        if update.theme.is_some() {
            self.theme = update.theme;
        }
    }
}

/// `users/{uid}` document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserDocument {
    pub profile: Option<UserProfile>,
    pub settings: UserSettings,
}
