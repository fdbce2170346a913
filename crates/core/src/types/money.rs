//! Money display helpers.
//!
//! The store is single-currency (USD); amounts are [`rust_decimal::Decimal`]
//! values in the currency's standard unit (dollars, not cents). Arithmetic
//! stays on `Decimal` directly; this module only owns formatting.

use rust_decimal::Decimal;

/// Format a decimal amount for display, e.g. `$19.99`.
///
/// Always renders two fraction digits, matching what the storefront shows on
/// cart rows and order summaries.
#[must_use]
pub fn format_usd(amount: Decimal) -> String {
    format!("${:.2}", amount.round_dp(2))
}
