//! Canned generators for tests

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::{Result, UpstreamError};
use crate::generation::{GeneratedImage, ImageGenerator, ImageSize, TextGenerator};

/// Text generator that always answers the same way and records its prompts
#[derive(Clone)]
pub struct MockTextGenerator {
    name: String,
    response: std::result::Result<String, UpstreamError>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockTextGenerator {
    pub fn replying(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            response: Ok(text.to_string()),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(name: &str, error: UpstreamError) -> Self {
        Self {
            name: name.to_string(),
            response: Err(error),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn rate_limited(name: &str, message: &str) -> Self {
        Self::failing(
            name,
            UpstreamError::RateLimit {
                provider: name.to_string(),
                message: message.to_string(),
            },
        )
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.response.clone().map_err(Into::into)
    }
}

pub struct MockImageGenerator {
    image: GeneratedImage,
}

impl MockImageGenerator {
    pub fn new(url: &str, revised_prompt: Option<&str>) -> Self {
        Self {
            image: GeneratedImage {
                url: url.to_string(),
                revised_prompt: revised_prompt.map(str::to_string),
            },
        }
    }
}

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    fn name(&self) -> &str {
        "mock-image"
    }

    async fn generate(&self, _prompt: &str, _size: ImageSize) -> Result<GeneratedImage> {
        Ok(self.image.clone())
    }
}
