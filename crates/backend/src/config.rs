//! Backend configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DRIFTWOOD_API_URL` - Base URL of the hosted data service
//!   (e.g. `https://abcdefgh.example.co`)
//! - `DRIFTWOOD_API_KEY` - Public API key sent with every request
//!
//! When either is missing, [`BackendConfig::from_env`] returns a
//! [`ConfigError`] and the caller degrades to an "unavailable" state; a
//! misconfigured deployment must never panic its way down.

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Connection settings for the hosted data service.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct BackendConfig {
    base_url: Url,
    api_key: SecretString,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl BackendConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from a `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or the base
    /// URL does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let raw_url = get_required_env("DRIFTWOOD_API_URL")?;
        let api_key = SecretString::from(get_required_env("DRIFTWOOD_API_KEY")?);

        Self::new(&raw_url, api_key)
    }

    /// Build a configuration from explicit values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `base_url` is not an absolute
    /// URL.
    pub fn new(base_url: &str, api_key: SecretString) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url.trim_end_matches('/')).map_err(|e| {
            ConfigError::InvalidEnvVar("DRIFTWOOD_API_URL".to_owned(), e.to_string())
        })?;

        Ok(Self { base_url, api_key })
    }

    /// Endpoint prefix for the resource collections, e.g.
    /// `https://host/rest/v1`.
    #[must_use]
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.base())
    }

    /// Endpoint prefix for session authentication, e.g. `https://host/auth/v1`.
    #[must_use]
    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.base())
    }

    /// Endpoint prefix for hosted functions, e.g. `https://host/functions/v1`.
    #[must_use]
    pub fn functions_url(&self) -> String {
        format!("{}/functions/v1", self.base())
    }

    /// The API key to send with every request.
    #[must_use]
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    fn base(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}
