//! Configurable publisher for tests
//!
//! Records every request it receives and can be told to fail with a given
//! upstream error or to wait before answering.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{Result, UpstreamError};
use crate::publisher::{PublishRequest, Publisher};

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub name: String,

    /// Returned from every publish when set
    pub error: Option<UpstreamError>,

    /// Simulated network latency
    pub delay: Duration,

    pub published: Arc<Mutex<Vec<PublishRequest>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            error: None,
            delay: Duration::from_millis(0),
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

pub struct MockPublisher {
    config: MockConfig,
}

impl MockPublisher {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    pub fn success() -> Self {
        Self::new(MockConfig::default())
    }

    pub fn failure(error: UpstreamError) -> Self {
        Self::new(MockConfig {
            error: Some(error),
            ..Default::default()
        })
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self::new(MockConfig {
            delay,
            ..Default::default()
        })
    }

    /// Requests that were accepted
    pub fn published(&self) -> Vec<PublishRequest> {
        self.config.published.lock().unwrap().clone()
    }

    /// Shared handle to the accepted requests, usable after the mock moves
    pub fn published_handle(&self) -> Arc<Mutex<Vec<PublishRequest>>> {
        Arc::clone(&self.config.published)
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn publish(&self, request: &PublishRequest) -> Result<String> {
        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if let Some(error) = &self.config.error {
            return Err(error.clone().into());
        }

        self.config.published.lock().unwrap().push(request.clone());
        Ok(format!("{}:mock-{}", self.config.name, uuid::Uuid::new_v4()))
    }
}
