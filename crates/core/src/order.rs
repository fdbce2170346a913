//! Order, order item, and customer snapshot records.
//!
//! Orders carry *snapshots*: the customer's details and each line's
//! name/price are copied at submission time, so later catalog edits (or a
//! product deletion) never retroactively change what a historical order says
//! was bought and at what price.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{OrderId, OrderItemId, OrderStatus, ProductId, VariantId};

/// Customer details copied onto an order at submission time.
///
/// This is not a reference to any customer record; the store has no customer
/// accounts and the order must remain readable on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

/// An order header as stored by the hosted service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer: Customer,
    /// Computed once from the cart at submission; never recalculated.
    pub total: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// One purchased line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    /// Product name at purchase time.
    pub product_name: String,
    /// Variant name at purchase time, when a variant was selected.
    pub variant_name: Option<String>,
    /// Unit price at purchase time (parent price + variant delta).
    pub unit_price: Decimal,
    pub quantity: i64,
}

impl OrderItem {
    /// Extended price of this line.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Sum of line totals, the value an order's `total` must equal at creation.
#[must_use]
pub fn items_total(items: &[OrderItem]) -> Decimal {
    items.iter().map(OrderItem::line_total).sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::dec;

    use super::*;

    fn item(unit_price: Decimal, quantity: i64) -> OrderItem {
        OrderItem {
            id: OrderItemId::random(),
            order_id: OrderId::random(),
            product_id: ProductId::random(),
            variant_id: None,
            product_name: "Travel Tin".to_owned(),
            variant_name: None,
            unit_price,
            quantity,
        }
    }

    #[test]
    fn test_line_total() {
        assert_eq!(item(dec!(12.50), 3).line_total(), dec!(37.50));
    }

    #[test]
    fn test_items_total_sums_lines() {
        let items = vec![item(dec!(10.00), 2), item(dec!(4.25), 1)];
        assert_eq!(items_total(&items), dec!(24.25));
    }

    #[test]
    fn test_items_total_empty() {
        assert_eq!(items_total(&[]), Decimal::ZERO);
    }
}
