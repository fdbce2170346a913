//! Driftwood Backend - client for the hosted data service.
//!
//! # Architecture
//!
//! The hosted service is the single source of truth for products, variants,
//! orders, and admin membership. This crate owns everything that touches it:
//!
//! - [`config`] - environment configuration (base URL, API key)
//! - [`records`] - raw wire rows and the one normalization boundary that
//!   turns them into the canonical `driftwood-core` types
//! - [`rest`] - [`rest::BackendClient`], the HTTPS client for the resource
//!   collections (`products`, `product_variants`, `orders`, `order_items`)
//!   and the two stock-decrement remote procedures
//! - [`auth`] - session authentication and the `admins` membership check
//! - [`api`] - the [`api::CommerceBackend`] trait the stores are written
//!   against, so they receive an explicitly constructed client rather than
//!   reaching for a global
//! - [`testing`] - an in-memory [`testing::InMemoryBackend`] implementing
//!   the same trait for hermetic tests
//!
//! # Example
//!
//! ```rust,ignore
//! use driftwood_backend::{config::BackendConfig, rest::BackendClient};
//!
//! let config = BackendConfig::from_env()?;
//! let client = BackendClient::new(&config)?;
//! let products = client.list_products().await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod auth;
pub mod config;
pub mod records;
pub mod rest;
pub mod testing;

use thiserror::Error;

pub use api::{
    CommerceBackend, NewOrder, NewOrderItem, NewProduct, NewVariant, ProductPatch, VariantPatch,
};
pub use auth::{AuthClient, AuthError, AuthSession};
pub use config::{BackendConfig, ConfigError};
pub use rest::BackendClient;

/// Errors that can occur when talking to the hosted data service.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        message: String,
    },

    /// Response body could not be parsed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The addressed row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A write succeeded but the service omitted the representation the
    /// caller asked for.
    #[error("response missing data: {0}")]
    MissingData(String),

    /// Rate limited by the service.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),
}
