//! Text and image generation collaborators
//!
//! Providers are external programs: the prompt goes to the command's stdin
//! and the generated text comes back on stdout. This keeps API keys and
//! HTTP clients out of the crate while still allowing any provider to be
//! plugged in, e.g. a small script wrapping Groq, OpenAI or Gemini.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::{Result, SparkError, UpstreamError};

pub mod mock;

/// Exit status a provider command uses to report rate limiting (EX_TEMPFAIL)
pub const EXIT_RATE_LIMITED: i32 = 75;

/// Exit status a provider command uses to report a content policy rejection
pub const EXIT_CONTENT_POLICY: i32 = 65;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Only square output is supported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageSize {
    #[default]
    Square1024,
}

impl ImageSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::Square1024 => "1024x1024",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub url: String,
    /// How the provider reinterpreted the prompt, if it says
    #[serde(default)]
    pub revised_prompt: Option<String>,
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str, size: ImageSize) -> Result<GeneratedImage>;
}

/// Provider backed by an external command
pub struct CommandGenerator {
    name: String,
    program: String,
    args: Vec<String>,
}

impl CommandGenerator {
    pub fn new(name: impl Into<String>, command: &[String]) -> Result<Self> {
        let name = name.into();
        let (program, args) = command.split_first().ok_or_else(|| {
            SparkError::Config(crate::error::ConfigError::MissingField(format!(
                "generation provider '{}' has no command",
                name
            )))
        })?;

        Ok(Self {
            name,
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Self::new(config.name.clone(), &config.command)
    }

    async fn run(&self, input: &str, extra_args: &[&str]) -> Result<String> {
        debug!(provider = %self.name, "Running generation command {}", self.program);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .args(extra_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.service_error(format!("Failed to start {}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(input.as_bytes()).await {
                // The command may exit without reading its input
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(e) => {
                    return Err(self.service_error(format!("Failed to send prompt: {}", e)))
                }
                Ok(()) => {}
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.service_error(format!("Provider did not finish: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(self.classify_failure(output.status.code(), stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            return Err(self.service_error("No content generated".to_string()));
        }
        Ok(stdout)
    }

    fn service_error(&self, message: String) -> SparkError {
        SparkError::Upstream(UpstreamError::Service {
            provider: self.name.clone(),
            message,
        })
    }

    fn classify_failure(&self, code: Option<i32>, stderr: String) -> SparkError {
        let provider = self.name.clone();
        let message = if stderr.is_empty() {
            format!("Failed to generate content with {}", self.name)
        } else {
            stderr
        };

        let error = match code {
            Some(EXIT_RATE_LIMITED) => UpstreamError::RateLimit { provider, message },
            Some(EXIT_CONTENT_POLICY) => UpstreamError::ContentPolicy { provider, message },
            _ => UpstreamError::Service { provider, message },
        };
        error.into()
    }
}

#[async_trait]
impl TextGenerator for CommandGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.run(prompt, &[]).await
    }
}

#[async_trait]
impl ImageGenerator for CommandGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    /// Expects either a JSON `{url, revisedPrompt}` object or a bare URL
    async fn generate(&self, prompt: &str, size: ImageSize) -> Result<GeneratedImage> {
        let out = self.run(prompt, &["--size", size.as_str()]).await?;

        if out.starts_with('{') {
            return serde_json::from_str(&out)
                .map_err(|e| self.service_error(format!("Unreadable image response: {}", e)));
        }

        Ok(GeneratedImage {
            url: out.lines().next().unwrap_or_default().trim().to_string(),
            revised_prompt: None,
        })
    }
}

// First match wins, in this order
static VISUAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)Visual sugerido:\s*(.+?)(?:\n|$)",
        r"(?i)\[Imagem:\s*(.+?)\]",
        r"(?i)Imagem sugerida:\s*(.+?)(?:\n|$)",
        r"(?i)Visual:\s*(.+?)(?:\n|$)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("visual suggestion pattern"))
    .collect()
});

/// Split generated text into post content and an optional image idea
///
/// Best-effort: markers are recognised in a fixed precedence and the first
/// one found supplies the suggestion. When any marker matched, the first
/// occurrence of every marker is stripped from the returned text.
pub fn extract_visual_suggestion(text: &str) -> (String, Option<String>) {
    let suggestion = VISUAL_PATTERNS.iter().find_map(|re| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    });

    match suggestion {
        Some(suggestion) => {
            let clean = VISUAL_PATTERNS
                .iter()
                .fold(text.to_string(), |acc, re| re.replace(&acc, "").into_owned());
            (clean.trim().to_string(), Some(suggestion))
        }
        None => (text.to_string(), None),
    }
}
