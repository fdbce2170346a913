//! Canonical product and variant records.
//!
//! These are the fully-defaulted shapes produced by the backend crate's
//! normalization boundary. Nothing here is optional: a row that arrived with
//! a null name or price has already been defaulted by the time it becomes a
//! [`Product`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{ProductId, VariantId};

/// A sub-SKU of a product (e.g. a color) with its own stock and an optional
/// price delta relative to the parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub name: String,
    pub image: String,
    /// Units on hand; never negative.
    pub stock: i64,
    /// Signed delta added to the parent product's price.
    pub price_diff: Decimal,
}

/// A catalog product with its variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    /// Unit price in dollars; never negative.
    pub price: Decimal,
    /// Ordered gallery image URLs; may be empty.
    pub images: Vec<String>,
    pub category: String,
    pub featured: bool,
    /// Parent-level units on hand; never negative.
    pub stock: i64,
    pub variants: Vec<Variant>,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Look up one of this product's variants by id.
    #[must_use]
    pub fn variant(&self, id: VariantId) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == id)
    }

    /// Unit price for a given variant selection.
    ///
    /// With a variant selected this is parent price + the variant's
    /// `price_diff`; an unknown variant id falls back to the parent price.
    #[must_use]
    pub fn unit_price(&self, variant_id: Option<VariantId>) -> Decimal {
        variant_id
            .and_then(|id| self.variant(id))
            .map_or(self.price, |v| self.price + v.price_diff)
    }

    /// Units available for a given variant selection.
    ///
    /// Lines without a variant draw on the parent-level stock; lines with a
    /// variant draw on that variant's stock. An unknown variant id reports
    /// zero rather than silently falling back to parent stock.
    #[must_use]
    pub fn available_stock(&self, variant_id: Option<VariantId>) -> i64 {
        match variant_id {
            None => self.stock,
            Some(id) => self.variant(id).map_or(0, |v| v.stock),
        }
    }

    /// Whether the product can be purchased in any form.
    ///
    /// A product with variants is out of stock only when its own stock is
    /// zero AND every variant's stock is zero. (The source system wavered
    /// between ALL and ANY across revisions; ALL is the rule here.)
    #[must_use]
    pub fn is_out_of_stock(&self) -> bool {
        self.stock == 0 && self.variants.iter().all(|v| v.stock == 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::dec;

    use super::*;

    fn variant(stock: i64, price_diff: Decimal) -> Variant {
        Variant {
            id: VariantId::random(),
            product_id: ProductId::random(),
            name: "Walnut".to_owned(),
            image: String::new(),
            stock,
            price_diff,
        }
    }

    fn product(stock: i64, variants: Vec<Variant>) -> Product {
        Product {
            id: ProductId::random(),
            name: "Storage Case".to_owned(),
            description: String::new(),
            price: dec!(29.99),
            images: vec![],
            category: "cases".to_owned(),
            featured: false,
            stock,
            variants,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_unit_price_without_variant() {
        let p = product(5, vec![]);
        assert_eq!(p.unit_price(None), dec!(29.99));
    }

    #[test]
    fn test_unit_price_applies_price_diff() {
        let v = variant(3, dec!(4.00));
        let id = v.id;
        let p = product(5, vec![v]);
        assert_eq!(p.unit_price(Some(id)), dec!(33.99));
    }

    #[test]
    fn test_unit_price_negative_diff() {
        let v = variant(3, dec!(-5.00));
        let id = v.id;
        let p = product(5, vec![v]);
        assert_eq!(p.unit_price(Some(id)), dec!(24.99));
    }

    #[test]
    fn test_unit_price_unknown_variant_falls_back() {
        let p = product(5, vec![]);
        assert_eq!(p.unit_price(Some(VariantId::random())), dec!(29.99));
    }

    #[test]
    fn test_available_stock_by_selection() {
        let v = variant(2, Decimal::ZERO);
        let id = v.id;
        let p = product(7, vec![v]);
        assert_eq!(p.available_stock(None), 7);
        assert_eq!(p.available_stock(Some(id)), 2);
        assert_eq!(p.available_stock(Some(VariantId::random())), 0);
    }

    #[test]
    fn test_out_of_stock_requires_all_variants_empty() {
        let p = product(0, vec![variant(0, Decimal::ZERO), variant(1, Decimal::ZERO)]);
        assert!(!p.is_out_of_stock());

        let p = product(0, vec![variant(0, Decimal::ZERO), variant(0, Decimal::ZERO)]);
        assert!(p.is_out_of_stock());
    }

    #[test]
    fn test_parent_stock_keeps_product_available() {
        let p = product(3, vec![variant(0, Decimal::ZERO)]);
        assert!(!p.is_out_of_stock());
    }

    #[test]
    fn test_no_variants_uses_parent_stock_only() {
        assert!(product(0, vec![]).is_out_of_stock());
        assert!(!product(1, vec![]).is_out_of_stock());
    }
}
