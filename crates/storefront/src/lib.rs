//! Driftwood Storefront - shopper-facing state.
//!
//! This crate holds everything the public store pages read and mutate,
//! independent of how they are rendered:
//!
//! - [`catalog`] - [`catalog::CatalogStore`], the read model over the hosted
//!   catalog with stale-data-on-error and automatic retry
//! - [`cart`] - [`cart::CartStore`], the shopper's local cart with durable
//!   persistence after every mutation
//! - [`checkout`] - [`checkout::Checkout`], which turns a cart into a
//!   persisted order and reconciles inventory
//! - [`mailer`] - the order-confirmation notifier
//!
//! Stores are constructed with an explicit backend implementation
//! ([`driftwood_backend::CommerceBackend`]); there is no ambient client.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod mailer;

pub use cart::{CartLine, CartStore, CartStorage, JsonFileStorage, MemoryStorage, StorageError};
pub use catalog::{CatalogState, CatalogStore};
pub use checkout::{Checkout, CheckoutError, CustomerDetails, OrderReceipt, StockFailure};
pub use mailer::{
    ConfirmationLine, ConfirmationMailer, NotifyError, OrderConfirmation, OrderNotifier,
};
