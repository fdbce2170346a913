//! Driftwood Admin - administration console state.
//!
//! The console is an authenticated view over the catalog and the order book:
//! product/variant CRUD, the order status workflow, and the dashboard's
//! derived numbers (open/settled partitions, active revenue).
//!
//! Authentication itself lives with the hosted service
//! ([`driftwood_backend::auth`]); the console only checks the
//! [`AdminSession`] flag it was constructed with and refuses to operate
//! without it.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod console;

pub use console::{AdminConsole, AdminError, AdminSession, VariantDraft};
