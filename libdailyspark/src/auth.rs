//! Bearer credentials and the session they resolve to
//!
//! Every user-facing operation takes an explicit [`Session`]; nothing keeps
//! a "current user" around between calls.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;

use crate::config::AuthConfig;
use crate::error::{Result, SparkError};

/// Uid used when no tokens are configured
pub const LOCAL_UID: &str = "local";

/// Opaque bearer credential. Never printed.
#[derive(Debug, Clone)]
pub struct BearerToken(SecretString);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Parse an `Authorization` header value (`Bearer <token>`)
    pub fn from_header(value: &str) -> Result<Self> {
        let token = value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SparkError::Auth("missing bearer token".to_string()))?;
        Ok(Self::new(token))
    }

    pub(crate) fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

/// Verified caller identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Session {
    uid: String,
}

impl Session {
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }

    pub fn local() -> Self {
        Self::new(LOCAL_UID)
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Resolve a credential to a session, or fail with `SparkError::Auth`
    async fn verify(&self, token: &BearerToken) -> Result<Session>;
}

/// Token table loaded from configuration
pub struct StaticTokenIdentity {
    tokens: HashMap<String, String>,
}

impl StaticTokenIdentity {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.tokens.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl IdentityProvider for StaticTokenIdentity {
    fn name(&self) -> &str {
        "static"
    }

    async fn verify(&self, token: &BearerToken) -> Result<Session> {
        self.tokens
            .get(token.expose())
            .map(Session::new)
            .ok_or_else(|| SparkError::Auth("invalid bearer token".to_string()))
    }
}

/// Resolve the session for a command-line invocation
///
/// With no tokens configured the tool runs single-user as [`LOCAL_UID`].
/// Once tokens exist, a valid one is required.
pub async fn resolve_session(config: &AuthConfig, token: Option<&str>) -> Result<Session> {
    let identity = StaticTokenIdentity::from_config(config);

    match token {
        Some(raw) => identity.verify(&BearerToken::new(raw)).await,
        None if identity.is_empty() => Ok(Session::local()),
        None => Err(SparkError::Auth("missing bearer token".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        let mut tokens = HashMap::new();
        tokens.insert("dev-token".to_string(), "ana".to_string());
        AuthConfig { tokens }
    }

    #[tokio::test]
    async fn test_known_token_resolves_uid() {
        let identity = StaticTokenIdentity::from_config(&config());
        let session = identity.verify(&BearerToken::new("dev-token")).await.unwrap();
        assert_eq!(session.uid(), "ana");
    }

    #[tokio::test]
    async fn test_unknown_token_is_auth_error() {
        let identity = StaticTokenIdentity::from_config(&config());
        let err = identity.verify(&BearerToken::new("nope")).await.unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(matches!(err, SparkError::Auth(_)));
    }

    #[test]
    fn test_header_parsing() {
        assert_eq!(BearerToken::from_header("Bearer abc").unwrap().expose(), "abc");
        assert!(BearerToken::from_header("Bearer ").is_err());
        assert!(BearerToken::from_header("Basic abc").is_err());
        assert!(BearerToken::from_header("").is_err());
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = BearerToken::new("super-secret");
        assert!(!format!("{:?}", token).contains("super-secret"));
    }

    #[tokio::test]
    async fn test_resolve_session_modes() {
        let open = AuthConfig::default();
        assert_eq!(resolve_session(&open, None).await.unwrap(), Session::local());
        assert!(resolve_session(&open, Some("anything")).await.is_err());

        let locked = config();
        assert!(matches!(
            resolve_session(&locked, None).await,
            Err(SparkError::Auth(_))
        ));
        assert_eq!(
            resolve_session(&locked, Some("dev-token")).await.unwrap().uid(),
            "ana"
        );
    }
}
