//! Session authentication against the hosted service.
//!
//! The service owns credentials and sessions; this client only performs the
//! password sign-in, holds the resulting session, and answers the one
//! authorization question the admin console needs: is this user present in
//! the `admins` collection. Nothing here stores passwords.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::instrument;

use driftwood_core::types::UserId;

use crate::config::{BackendConfig, ConfigError};

/// Errors that can occur during authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service rejected the email/password pair.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The service returned an unexpected error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        message: String,
    },

    /// Response body could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),
}

/// An authenticated session returned by [`AuthClient::sign_in`].
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct AuthSession {
    /// The signed-in user's id.
    pub user_id: UserId,
    /// The signed-in user's email address.
    pub email: String,
    access_token: SecretString,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// Client for the hosted service's session auth endpoints.
#[derive(Clone)]
pub struct AuthClient {
    inner: Arc<AuthClientInner>,
}

struct AuthClientInner {
    http: reqwest::Client,
    auth_url: String,
    rest_url: String,
}

/// Token-grant response body.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: UserId,
    email: Option<String>,
}

impl AuthClient {
    /// Create a new auth client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the API key cannot be used as an HTTP header
    /// value or the HTTP client fails to build.
    pub fn new(config: &BackendConfig) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        let key_value = HeaderValue::from_str(config.api_key()).map_err(|e| {
            ConfigError::InvalidEnvVar("DRIFTWOOD_API_KEY".to_owned(), e.to_string())
        })?;
        headers.insert("apikey", key_value);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("DRIFTWOOD_API_URL".to_owned(), e.to_string())
            })?;

        Ok(Self {
            inner: Arc::new(AuthClientInner {
                http,
                auth_url: config.auth_url(),
                rest_url: config.rest_url(),
            }),
        })
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` when the service rejects the
    /// pair, `AuthError::Api` for other failures.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let url = format!("{}/token?grant_type=password", self.inner.auth_url);

        let response = self
            .inner
            .http
            .post(&url)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::BAD_REQUEST
            || status == reqwest::StatusCode::UNAUTHORIZED
        {
            return Err(AuthError::InvalidCredentials);
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AuthError::Api {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Parse(e.to_string()))?;

        Ok(AuthSession {
            user_id: token.user.id,
            email: token.user.email.unwrap_or_else(|| email.to_owned()),
            access_token: SecretString::from(token.access_token),
        })
    }

    /// Revoke a session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Api` if the service rejects the revocation.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn sign_out(&self, session: &AuthSession) -> Result<(), AuthError> {
        let url = format!("{}/logout", self.inner.auth_url);

        let response = self
            .inner
            .http
            .post(&url)
            .bearer_auth(session.access_token.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AuthError::Api {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        Ok(())
    }

    /// Whether a user id is present in the `admins` collection.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Api` or `AuthError::Parse` on service failure; a
    /// user who simply isn't listed yields `Ok(false)`.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn is_admin(&self, user_id: UserId) -> Result<bool, AuthError> {
        let url = format!(
            "{}/admins?user_id=eq.{user_id}&select=user_id&limit=1",
            self.inner.rest_url
        );

        let response = self.inner.http.get(&url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AuthError::Api {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        let rows: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| AuthError::Parse(e.to_string()))?;

        Ok(!rows.is_empty())
    }
}
