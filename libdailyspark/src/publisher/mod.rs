//! Immediate-publish collaborator
//!
//! A [`Publisher`] takes a post that should go out right away. The crate does
//! not talk to social networks itself; [`JsonLinesPublisher`] hands each
//! request to an external sender as one JSON object per line, in the same
//! spirit as piping into another tool.
//!
//! # Example
//!
//! ```
//! use libdailyspark::publisher::{JsonLinesPublisher, Publisher, PublishRequest};
//! use libdailyspark::types::{PostType, SocialPlatform};
//!
//! # async fn example() -> libdailyspark::Result<()> {
//! let publisher = JsonLinesPublisher::stdout();
//! let request = PublishRequest {
//!     uid: "local".to_string(),
//!     content: "Shipping today".to_string(),
//!     platforms: vec![SocialPlatform::Linkedin],
//!     media_url: None,
//!     media_type: None,
//!     post_type: PostType::Post,
//! };
//! let receipt = publisher.publish(&request).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use crate::error::{Result, SparkError, UpstreamError};
use crate::types::{MediaType, PostType, SocialPlatform};

pub mod mock;

/// A post to deliver now
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub uid: String,
    pub content: String,
    pub platforms: Vec<SocialPlatform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    pub post_type: PostType,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    fn name(&self) -> &str;

    /// Hand the request off and return a receipt id
    ///
    /// Failures carry the downstream message, which is shown verbatim.
    async fn publish(&self, request: &PublishRequest) -> Result<String>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    id: &'a str,
    requested_at: String,
    #[serde(flatten)]
    request: &'a PublishRequest,
}

/// Writes each request as a JSON line to stdout or an append-only file
pub struct JsonLinesPublisher {
    out: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesPublisher {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Append to `path`, creating it if needed
    pub fn append_to(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                SparkError::InvalidInput(format!(
                    "Cannot open outbox {}: {}",
                    path.display(),
                    e
                ))
            })?;
        Ok(Self::new(Box::new(file)))
    }

    fn failure(&self, message: String) -> SparkError {
        SparkError::Upstream(UpstreamError::Service {
            provider: self.name().to_string(),
            message,
        })
    }
}

#[async_trait]
impl Publisher for JsonLinesPublisher {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn publish(&self, request: &PublishRequest) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let envelope = Envelope {
            id: &id,
            requested_at: Utc::now().to_rfc3339(),
            request,
        };
        let line = serde_json::to_string(&envelope)
            .map_err(|e| self.failure(format!("Failed to encode post: {}", e)))?;

        let mut out = self
            .out
            .lock()
            .map_err(|_| self.failure("Outbox lock poisoned".to_string()))?;
        writeln!(out, "{}", line)
            .and_then(|_| out.flush())
            .map_err(|e| self.failure(format!("Failed to write post: {}", e)))?;

        Ok(id)
    }
}
