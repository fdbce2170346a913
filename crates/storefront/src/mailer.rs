//! Order-confirmation notifier.
//!
//! Confirmation email is sent by a hosted function (`send-confirmation`);
//! this module owns the payload and the HTTP call. Sending is best-effort:
//! checkout treats a failure here as a degraded success message, never as a
//! reason to reverse an order.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use driftwood_backend::config::{BackendConfig, ConfigError};
use driftwood_core::types::OrderId;

/// Errors that can occur when sending a confirmation.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The function returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        message: String,
    },
}

/// One line of the confirmation's item list.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmationLine {
    pub name: String,
    pub quantity: i64,
    pub price: Decimal,
}

/// Everything the confirmation message carries.
#[derive(Debug, Clone)]
pub struct OrderConfirmation {
    pub recipient: String,
    pub customer_name: String,
    pub order_id: OrderId,
    pub lines: Vec<ConfirmationLine>,
    pub total: Decimal,
    pub address: String,
    pub phone: String,
}

/// Something that can deliver an order confirmation.
#[allow(async_fn_in_trait)] // callers hold a concrete notifier, no boxing needed
pub trait OrderNotifier {
    /// Deliver the confirmation.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError` if delivery fails; callers treat this as
    /// non-fatal.
    async fn send_confirmation(&self, confirmation: &OrderConfirmation)
    -> Result<(), NotifyError>;
}

impl<N: OrderNotifier + ?Sized> OrderNotifier for &N {
    async fn send_confirmation(
        &self,
        confirmation: &OrderConfirmation,
    ) -> Result<(), NotifyError> {
        (**self).send_confirmation(confirmation).await
    }
}

impl<N: OrderNotifier + ?Sized> OrderNotifier for std::sync::Arc<N> {
    async fn send_confirmation(
        &self,
        confirmation: &OrderConfirmation,
    ) -> Result<(), NotifyError> {
        (**self).send_confirmation(confirmation).await
    }
}

/// Notifier backed by the hosted `send-confirmation` function.
#[derive(Clone)]
pub struct ConfirmationMailer {
    inner: Arc<MailerInner>,
}

struct MailerInner {
    http: reqwest::Client,
    endpoint: String,
}

impl ConfirmationMailer {
    /// Create a mailer from the backend configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the API key cannot be used as an HTTP header
    /// value or the HTTP client fails to build.
    pub fn new(config: &BackendConfig) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key())).map_err(
            |e| ConfigError::InvalidEnvVar("DRIFTWOOD_API_KEY".to_owned(), e.to_string()),
        )?;
        headers.insert("Authorization", bearer);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("DRIFTWOOD_API_URL".to_owned(), e.to_string())
            })?;

        Ok(Self {
            inner: Arc::new(MailerInner {
                http,
                endpoint: format!("{}/send-confirmation", config.functions_url()),
            }),
        })
    }
}

impl OrderNotifier for ConfirmationMailer {
    #[instrument(skip(self, confirmation), fields(order_id = %confirmation.order_id))]
    async fn send_confirmation(
        &self,
        confirmation: &OrderConfirmation,
    ) -> Result<(), NotifyError> {
        let body = serde_json::json!({
            "customer_email": confirmation.recipient,
            "customer_name": confirmation.customer_name,
            "order_id": confirmation.order_id,
            "items": confirmation.lines,
            "total": confirmation.total,
            "address": confirmation.address,
            "phone": confirmation.phone,
        });

        let response = self
            .inner
            .http
            .post(&self.inner.endpoint)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotifyError::Api {
                status: status.as_u16(),
                message: message.chars().take(200).collect(),
            });
        }

        Ok(())
    }
}
