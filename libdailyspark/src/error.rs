//! Error types for DailySpark

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SparkError>;

#[derive(Error, Debug)]
pub enum SparkError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Unauthorized: {0}")]
    Auth(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SparkError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SparkError::Auth(_) => 2,
            SparkError::Validation(_) | SparkError::InvalidInput(_) => 3,
            SparkError::Upstream(_) => 1,
            SparkError::Config(_) => 1,
            SparkError::Database(_) => 1,
        }
    }

    /// True when an upstream service reported throughput or quota exhaustion
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, SparkError::Upstream(e) if e.is_rate_limit())
    }

    /// The message shown to the user.
    ///
    /// Upstream and validation messages are passed through verbatim, without
    /// the category prefix used by `Display`.
    pub fn user_message(&self) -> String {
        match self {
            SparkError::Upstream(e) => e.message().to_string(),
            SparkError::Validation(e) => e.to_string(),
            SparkError::Auth(_) => "Unauthorized".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Local cache failures. These are logged and never propagated past the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache storage IO failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache storage quota exceeded ({used} of {quota} bytes)")]
    QuotaExceeded { used: usize, quota: usize },

    #[error("Cache storage lock poisoned")]
    Poisoned,
}

/// Every condition a request violated, reported together.
#[derive(Error, Debug, Clone, PartialEq, Eq, Default)]
#[error("{}", .0.join("; "))]
pub struct ValidationErrors(pub Vec<String>);

impl ValidationErrors {
    pub fn single(message: impl Into<String>) -> Self {
        Self(vec![message.into()])
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.0.iter().any(|m| m.contains(needle))
    }

    pub fn messages(&self) -> &[String] {
        &self.0
    }

    /// `Ok(())` when nothing was violated, otherwise the collected errors
    pub fn into_result(self) -> std::result::Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Failures reported by an external collaborator (generation, upload, publish).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("{provider} rate limit exceeded: {message}")]
    RateLimit { provider: String, message: String },

    #[error("{provider} quota exhausted: {message}")]
    Quota { provider: String, message: String },

    #[error("{provider} rejected the prompt: {message}")]
    ContentPolicy { provider: String, message: String },

    #[error("{provider} failed: {message}")]
    Service { provider: String, message: String },
}

impl UpstreamError {
    pub fn provider(&self) -> &str {
        match self {
            UpstreamError::RateLimit { provider, .. }
            | UpstreamError::Quota { provider, .. }
            | UpstreamError::ContentPolicy { provider, .. }
            | UpstreamError::Service { provider, .. } => provider,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            UpstreamError::RateLimit { message, .. }
            | UpstreamError::Quota { message, .. }
            | UpstreamError::ContentPolicy { message, .. }
            | UpstreamError::Service { message, .. } => message,
        }
    }

    /// Quota exhaustion counts as a rate limit for the caller's guidance flag
    pub fn is_rate_limit(&self) -> bool {
        matches!(
            self,
            UpstreamError::RateLimit { .. } | UpstreamError::Quota { .. }
        )
    }
}

/// Structured outcome returned across the user-facing boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub rate_limit: bool,
}

impl OperationResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            rate_limit: false,
        }
    }
}

impl From<&SparkError> for OperationResult {
    fn from(error: &SparkError) -> Self {
        Self {
            success: false,
            message: error.user_message(),
            rate_limit: error.is_rate_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = SparkError::InvalidInput("Empty content".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_auth_error() {
        let error = SparkError::Auth("missing bearer token".to_string());
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_validation_error() {
        let error = SparkError::Validation(ValidationErrors::single("content required"));
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_upstream_and_infrastructure() {
        let upstream = SparkError::Upstream(UpstreamError::Service {
            provider: "groq".to_string(),
            message: "boom".to_string(),
        });
        assert_eq!(upstream.exit_code(), 1);

        let config = SparkError::Config(ConfigError::MissingField("database.path".to_string()));
        assert_eq!(config.exit_code(), 1);

        let db = SparkError::Database(DbError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "File not found",
        )));
        assert_eq!(db.exit_code(), 1);
    }

    #[test]
    fn test_validation_errors_list_every_violation() {
        let mut errors = ValidationErrors::default();
        errors.push("content required");
        errors.push("at least one platform required");

        let error = SparkError::Validation(errors);
        assert_eq!(
            error.to_string(),
            "Validation failed: content required; at least one platform required"
        );
        assert_eq!(
            error.user_message(),
            "content required; at least one platform required"
        );
    }

    #[test]
    fn test_validation_errors_into_result() {
        assert!(ValidationErrors::default().into_result().is_ok());
        let err = ValidationErrors::single("reel requires video")
            .into_result()
            .unwrap_err();
        assert!(err.contains("reel requires video"));
    }

    #[test]
    fn test_rate_limit_detection() {
        let rate = SparkError::Upstream(UpstreamError::RateLimit {
            provider: "groq".to_string(),
            message: "Daily limit reached".to_string(),
        });
        assert!(rate.is_rate_limit());

        let quota = SparkError::Upstream(UpstreamError::Quota {
            provider: "openai".to_string(),
            message: "insufficient_quota".to_string(),
        });
        assert!(quota.is_rate_limit());

        let policy = SparkError::Upstream(UpstreamError::ContentPolicy {
            provider: "openai".to_string(),
            message: "blocked".to_string(),
        });
        assert!(!policy.is_rate_limit());
        assert!(!SparkError::InvalidInput("x".to_string()).is_rate_limit());
    }

    #[test]
    fn test_upstream_message_is_verbatim() {
        let error = SparkError::Upstream(UpstreamError::RateLimit {
            provider: "gemini".to_string(),
            message: "Wait 1 minute and try again.".to_string(),
        });
        assert_eq!(error.user_message(), "Wait 1 minute and try again.");
        assert_eq!(
            error.to_string(),
            "Upstream error: gemini rate limit exceeded: Wait 1 minute and try again."
        );
    }

    #[test]
    fn test_operation_result_from_error() {
        let error = SparkError::Upstream(UpstreamError::RateLimit {
            provider: "groq".to_string(),
            message: "Daily limit reached".to_string(),
        });
        let result = OperationResult::from(&error);
        assert!(!result.success);
        assert!(result.rate_limit);
        assert_eq!(result.message, "Daily limit reached");

        let json = serde_json::to_value(OperationResult::ok("Post scheduled")).unwrap();
        assert_eq!(json["success"], true);
        assert!(json.get("rate_limit").is_none());
    }

    #[test]
    fn test_error_conversion_from_config_error() {
        let config_error = ConfigError::MissingField("test".to_string());
        let spark_error: SparkError = config_error.into();

        match spark_error {
            SparkError::Config(_) => {}
            _ => panic!("Expected SparkError::Config"),
        }
    }

    #[test]
    fn test_auth_error_does_not_leak_detail_to_user() {
        let error = SparkError::Auth("token abc expired".to_string());
        assert_eq!(error.user_message(), "Unauthorized");
        assert!(format!("{:?}", error).contains("Auth"));
    }
}
