//! DailySpark - compose, improve and schedule social posts
//!
//! This library holds the queue, settings store, media checks and content
//! generation shared by the `spark-*` command line tools.

pub mod auth;
pub mod blob;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod generation;
pub mod logging;
pub mod media;
pub mod publisher;
pub mod scheduling;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use auth::Session;
pub use config::Config;
pub use db::Database;
pub use error::{OperationResult, Result, SparkError};
pub use types::{MediaType, PostType, QueueDraft, QueueStatus, QueuedPost, SocialPlatform};
