//! Content improvement through an ordered list of providers
//!
//! Providers are tried in configuration order and the first success wins.
//! A failure is logged and the next provider is tried; when all fail, the
//! last error is returned unchanged so its rate-limit flag survives.

use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::Session;
use crate::config::GenerationConfig;
use crate::error::{ConfigError, Result, SparkError, ValidationErrors};
use crate::generation::{
    extract_visual_suggestion, CommandGenerator, GeneratedImage, ImageGenerator, ImageSize,
    TextGenerator,
};
use crate::service::settings::SettingsService;

/// Rewritten post text and the image idea found in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Improvement {
    pub content: String,
    pub visual_suggestion: Option<String>,
    pub provider: String,
    pub original_length: usize,
}

#[derive(Clone)]
pub struct GenerationService {
    settings: SettingsService,
    text: Vec<Arc<dyn TextGenerator>>,
    image: Option<Arc<dyn ImageGenerator>>,
}

impl GenerationService {
    pub fn new(
        settings: SettingsService,
        text: Vec<Arc<dyn TextGenerator>>,
        image: Option<Arc<dyn ImageGenerator>>,
    ) -> Self {
        Self {
            settings,
            text,
            image,
        }
    }

    /// Build command-backed providers from configuration
    pub fn from_config(settings: SettingsService, config: &GenerationConfig) -> Result<Self> {
        let text = config
            .providers
            .iter()
            .map(|p| CommandGenerator::from_config(p).map(|g| Arc::new(g) as Arc<dyn TextGenerator>))
            .collect::<Result<Vec<_>>>()?;
        let image = config
            .image
            .as_ref()
            .map(|p| CommandGenerator::from_config(p).map(|g| Arc::new(g) as Arc<dyn ImageGenerator>))
            .transpose()?;

        Ok(Self::new(settings, text, image))
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.text.iter().map(|g| g.name()).collect()
    }

    /// Rewrite `content` following the user's stored instructions
    pub async fn improve(&self, session: &Session, content: &str) -> Result<Improvement> {
        if content.trim().is_empty() {
            return Err(ValidationErrors::single("content required").into());
        }

        let ai_prompt = self.settings.ai_prompt(session).await?.ok_or_else(|| {
            SparkError::from(ValidationErrors::single(
                "no AI prompt configured; add custom instructions with spark-settings --ai-prompt",
            ))
        })?;

        if self.text.is_empty() {
            return Err(ConfigError::MissingField("generation.providers".to_string()).into());
        }

        let message = format!("{}\n\n{}", ai_prompt, content);
        let mut last_error = None;

        for provider in &self.text {
            match provider.generate(&message).await {
                Ok(text) if !text.trim().is_empty() => {
                    info!(provider = %provider.name(), "Generated content");
                    let (clean, visual) = extract_visual_suggestion(&text);
                    return Ok(Improvement {
                        content: clean,
                        visual_suggestion: visual,
                        provider: provider.name().to_string(),
                        original_length: content.chars().count(),
                    });
                }
                Ok(_) => {
                    warn!(provider = %provider.name(), "Provider returned no content");
                    last_error = Some(SparkError::Upstream(crate::error::UpstreamError::Service {
                        provider: provider.name().to_string(),
                        message: "No content generated".to_string(),
                    }));
                }
                Err(e) => {
                    warn!(provider = %provider.name(), "Generation failed: {}", e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ConfigError::MissingField("generation.providers".to_string()).into()
        }))
    }

    /// Generate a square image for `prompt`
    pub async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage> {
        if prompt.trim().is_empty() {
            return Err(ValidationErrors::single("prompt required").into());
        }
        let generator = self
            .image
            .as_ref()
            .ok_or_else(|| ConfigError::MissingField("generation.image".to_string()))?;

        generator.generate(prompt, ImageSize::Square1024).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheService, MemoryStorage};
    use crate::db::Database;
    use crate::error::UpstreamError;
    use crate::generation::mock::{MockImageGenerator, MockTextGenerator};
    use crate::types::UserSettings;
    use tempfile::TempDir;

    async fn settings_with_prompt(prompt: Option<&str>) -> (SettingsService, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("gen.db");
        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
        let settings = SettingsService::new(Arc::new(db), CacheService::new(MemoryStorage::new()), 300);
        if let Some(prompt) = prompt {
            settings
                .save_settings(
                    &Session::new("u1"),
                    UserSettings {
                        ai_prompt: Some(prompt.to_string()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        (settings, temp_dir)
    }

    #[tokio::test]
    async fn test_improve_composes_prompt_and_extracts_visual() {
        let (settings, _dir) = settings_with_prompt(Some("Be upbeat")).await;
        let groq = MockTextGenerator::replying("groq", "Great news!\nVisual sugerido: confetti");
        let service = GenerationService::new(settings, vec![Arc::new(groq.clone())], None);

        let result = service.improve(&Session::new("u1"), "news").await.unwrap();
        assert_eq!(result.content, "Great news!");
        assert_eq!(result.visual_suggestion.as_deref(), Some("confetti"));
        assert_eq!(result.provider, "groq");
        assert_eq!(result.original_length, 4);
        assert_eq!(groq.prompts(), vec!["Be upbeat\n\nnews".to_string()]);
    }

    #[tokio::test]
    async fn test_falls_back_in_order() {
        let (settings, _dir) = settings_with_prompt(Some("p")).await;
        let groq = MockTextGenerator::rate_limited("groq", "Daily limit reached");
        let openai = MockTextGenerator::replying("openai", "from openai");
        let gemini = MockTextGenerator::replying("gemini", "from gemini");
        let service = GenerationService::new(
            settings,
            vec![
                Arc::new(groq.clone()),
                Arc::new(openai.clone()),
                Arc::new(gemini.clone()),
            ],
            None,
        );

        let result = service.improve(&Session::new("u1"), "text").await.unwrap();
        assert_eq!(result.provider, "openai");
        assert_eq!(groq.call_count(), 1);
        assert_eq!(gemini.call_count(), 0);
    }

    #[tokio::test]
    async fn test_all_failing_returns_last_error() {
        let (settings, _dir) = settings_with_prompt(Some("p")).await;
        let service = GenerationService::new(
            settings,
            vec![
                Arc::new(MockTextGenerator::failing(
                    "groq",
                    UpstreamError::Service {
                        provider: "groq".to_string(),
                        message: "bad key".to_string(),
                    },
                )),
                Arc::new(MockTextGenerator::rate_limited(
                    "gemini",
                    "Gemini rate limit reached (60 requests/minute). Wait 1 minute and try again.",
                )),
            ],
            None,
        );

        let err = service.improve(&Session::new("u1"), "text").await.unwrap_err();
        assert!(err.is_rate_limit());
        assert!(err.user_message().starts_with("Gemini rate limit reached"));
    }

    #[tokio::test]
    async fn test_missing_prompt_is_validation_error() {
        let (settings, _dir) = settings_with_prompt(None).await;
        let groq = MockTextGenerator::replying("groq", "unused");
        let service = GenerationService::new(settings, vec![Arc::new(groq.clone())], None);

        let err = service.improve(&Session::new("u1"), "text").await.unwrap_err();
        assert!(matches!(err, SparkError::Validation(_)));
        assert_eq!(groq.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let (settings, _dir) = settings_with_prompt(Some("p")).await;
        let service = GenerationService::new(settings, vec![], None);
        let err = service.improve(&Session::new("u1"), "  ").await.unwrap_err();
        assert_eq!(err.user_message(), "content required");
    }

    #[tokio::test]
    async fn test_no_providers_is_config_error() {
        let (settings, _dir) = settings_with_prompt(Some("p")).await;
        let service = GenerationService::new(settings, vec![], None);
        let err = service.improve(&Session::new("u1"), "text").await.unwrap_err();
        assert!(matches!(err, SparkError::Config(_)));
    }

    #[tokio::test]
    async fn test_generate_image() {
        let (settings, _dir) = settings_with_prompt(None).await;
        let service = GenerationService::new(
            settings.clone(),
            vec![],
            Some(Arc::new(MockImageGenerator::new(
                "https://img.example.com/1.png",
                Some("a red kite"),
            ))),
        );

        let image = service.generate_image("kite").await.unwrap();
        assert_eq!(image.revised_prompt.as_deref(), Some("a red kite"));
        assert!(service.generate_image("").await.is_err());

        let without = GenerationService::new(settings, vec![], None);
        assert!(matches!(
            without.generate_image("kite").await,
            Err(SparkError::Config(_))
        ));
    }
}
