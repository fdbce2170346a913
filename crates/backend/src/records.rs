//! Raw wire rows and the normalization boundary.
//!
//! The hosted service's rows are loosely shaped: most columns are nullable,
//! `images` has been stored as a JSON array, a JSON-encoded string, or not
//! at all, and order statuses arrive as free text. Everything entering the
//! system passes through the conversions here exactly once and comes out as
//! a fully-defaulted canonical record; no downstream code re-derives
//! defaults.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use driftwood_core::types::{OrderId, OrderItemId, OrderStatus, ProductId, VariantId};
use driftwood_core::{Customer, Order, OrderItem, Product, Variant};

/// Fallback display name for a product row whose `name` column is null.
const UNNAMED_PRODUCT: &str = "Unnamed Product";

/// A `products` row as returned by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductRow {
    pub id: ProductId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    #[serde(default)]
    pub images: serde_json::Value,
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub stock: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
}

impl ProductRow {
    /// Normalize this row into a canonical [`Product`], attaching its
    /// already-normalized variants.
    #[must_use]
    pub fn into_product(self, variants: Vec<Variant>) -> Product {
        Product {
            id: self.id,
            name: self
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| UNNAMED_PRODUCT.to_owned()),
            description: self.description.unwrap_or_default(),
            price: self.price.unwrap_or_default().max(Decimal::ZERO),
            images: normalize_images(&self.images),
            category: self.category.unwrap_or_default(),
            featured: self.featured.unwrap_or(false),
            stock: self.stock.unwrap_or(0).max(0),
            variants,
            created_at: self.created_at.unwrap_or_default(),
        }
    }
}

/// A `product_variants` row as returned by the service.
///
/// Older rows carry the image under `image`, newer ones under `image_url`;
/// both are accepted, `image_url` wins.
#[derive(Debug, Clone, Deserialize)]
pub struct VariantRow {
    pub id: VariantId,
    pub product_id: ProductId,
    pub name: Option<String>,
    pub image: Option<String>,
    pub image_url: Option<String>,
    pub stock: Option<i64>,
    pub price_diff: Option<Decimal>,
}

impl VariantRow {
    /// Normalize this row into a canonical [`Variant`].
    #[must_use]
    pub fn into_variant(self) -> Variant {
        Variant {
            id: self.id,
            product_id: self.product_id,
            name: self.name.unwrap_or_default(),
            image: self.image_url.or(self.image).unwrap_or_default(),
            stock: self.stock.unwrap_or(0).max(0),
            price_diff: self.price_diff.unwrap_or_default(),
        }
    }
}

/// An `orders` row as returned by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRow {
    pub id: OrderId,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub total: Option<Decimal>,
    pub status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl OrderRow {
    /// Normalize this row into a canonical [`Order`].
    ///
    /// An unrecognized status string is logged and treated as pending rather
    /// than failing the load.
    #[must_use]
    pub fn into_order(self) -> Order {
        let status = match self.status.as_deref() {
            None => OrderStatus::Pending,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(order_id = %self.id, status = raw, "unknown order status, treating as pending");
                OrderStatus::Pending
            }),
        };

        Order {
            id: self.id,
            customer: Customer {
                name: self.customer_name.unwrap_or_default(),
                email: self.customer_email.unwrap_or_default(),
                phone: self.customer_phone.unwrap_or_default(),
                address: self.customer_address.unwrap_or_default(),
            },
            total: self.total.unwrap_or_default(),
            status,
            created_at: self.created_at.unwrap_or_default(),
        }
    }
}

/// An `order_items` row as returned by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemRow {
    pub id: OrderItemId,
    pub order_id: Option<OrderId>,
    pub product_id: Option<ProductId>,
    pub variant_id: Option<VariantId>,
    pub product_name: Option<String>,
    pub variant_name: Option<String>,
    pub price: Option<Decimal>,
    pub quantity: Option<i64>,
}

impl OrderItemRow {
    /// Normalize this row into a canonical [`OrderItem`].
    ///
    /// Returns `None` for rows missing their owning order or product
    /// reference; such rows are unusable and are dropped with a warning
    /// rather than failing the load.
    #[must_use]
    pub fn into_order_item(self) -> Option<OrderItem> {
        let (Some(order_id), Some(product_id)) = (self.order_id, self.product_id) else {
            tracing::warn!(item_id = %self.id, "order item row missing order or product reference, skipping");
            return None;
        };

        Some(OrderItem {
            id: self.id,
            order_id,
            product_id,
            variant_id: self.variant_id,
            product_name: self
                .product_name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| UNNAMED_PRODUCT.to_owned()),
            variant_name: self.variant_name.filter(|n| !n.is_empty()),
            unit_price: self.price.unwrap_or_default(),
            quantity: self.quantity.unwrap_or(0).max(0),
        })
    }
}

/// Normalize the polymorphic `images` column to an ordered list of URLs.
///
/// Accepted shapes: a JSON array of strings, a JSON-encoded string holding
/// such an array, or nothing. Anything else degrades to an empty list - a
/// malformed image cell must never abort a catalog load.
#[must_use]
pub fn normalize_images(value: &serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::Array(entries) => entries
            .iter()
            .filter_map(|v| v.as_str().map(str::to_owned))
            .collect(),
        serde_json::Value::String(raw) => {
            if raw.is_empty() {
                return vec![];
            }
            match serde_json::from_str::<serde_json::Value>(raw) {
                Ok(parsed @ serde_json::Value::Array(_)) => normalize_images(&parsed),
                _ => {
                    tracing::warn!("images column held an undecodable string, dropping");
                    vec![]
                }
            }
        }
        serde_json::Value::Null => vec![],
        other => {
            tracing::warn!(kind = ?other, "images column held an unexpected JSON shape, dropping");
            vec![]
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn product_row(value: serde_json::Value) -> ProductRow {
        serde_json::from_value(value).unwrap()
    }

    // =========================================================================
    // Image normalization
    // =========================================================================

    #[test]
    fn test_images_from_array() {
        let images = normalize_images(&json!(["a.jpg", "b.jpg"]));
        assert_eq!(images, vec!["a.jpg".to_owned(), "b.jpg".to_owned()]);
    }

    #[test]
    fn test_images_from_encoded_string() {
        let images = normalize_images(&json!("[\"a.jpg\",\"b.jpg\"]"));
        assert_eq!(images, vec!["a.jpg".to_owned(), "b.jpg".to_owned()]);
    }

    #[test]
    fn test_images_absent_or_null() {
        assert!(normalize_images(&serde_json::Value::Null).is_empty());
        assert!(normalize_images(&json!("")).is_empty());
    }

    #[test]
    fn test_images_malformed_degrade_to_empty() {
        assert!(normalize_images(&json!("not json at all")).is_empty());
        assert!(normalize_images(&json!(42)).is_empty());
        assert!(normalize_images(&json!({"url": "a.jpg"})).is_empty());
    }

    #[test]
    fn test_images_array_skips_non_strings() {
        let images = normalize_images(&json!(["a.jpg", 7, null, "b.jpg"]));
        assert_eq!(images, vec!["a.jpg".to_owned(), "b.jpg".to_owned()]);
    }

    // =========================================================================
    // Product rows
    // =========================================================================

    #[test]
    fn test_product_row_defaults() {
        let row = product_row(json!({ "id": uuid::Uuid::new_v4() }));
        let product = row.into_product(vec![]);

        assert_eq!(product.name, "Unnamed Product");
        assert_eq!(product.description, "");
        assert_eq!(product.price, Decimal::ZERO);
        assert_eq!(product.category, "");
        assert!(!product.featured);
        assert_eq!(product.stock, 0);
        assert!(product.images.is_empty());
    }

    #[test]
    fn test_product_row_full() {
        let row = product_row(json!({
            "id": uuid::Uuid::new_v4(),
            "name": "Travel Tin",
            "description": "Pocket-sized.",
            "price": 12.5,
            "images": ["tin.jpg"],
            "category": "tins",
            "featured": true,
            "stock": 8,
            "created_at": "2026-03-01T09:00:00Z",
        }));
        let product = row.into_product(vec![]);

        assert_eq!(product.name, "Travel Tin");
        assert_eq!(product.price, Decimal::new(125, 1));
        assert_eq!(product.images, vec!["tin.jpg".to_owned()]);
        assert!(product.featured);
        assert_eq!(product.stock, 8);
    }

    #[test]
    fn test_product_row_clamps_negatives() {
        let row = product_row(json!({
            "id": uuid::Uuid::new_v4(),
            "price": -3,
            "stock": -2,
        }));
        let product = row.into_product(vec![]);
        assert_eq!(product.price, Decimal::ZERO);
        assert_eq!(product.stock, 0);
    }

    // =========================================================================
    // Variant rows
    // =========================================================================

    #[test]
    fn test_variant_row_image_url_wins() {
        let row: VariantRow = serde_json::from_value(json!({
            "id": uuid::Uuid::new_v4(),
            "product_id": uuid::Uuid::new_v4(),
            "image": "old.jpg",
            "image_url": "new.jpg",
        }))
        .unwrap();
        assert_eq!(row.into_variant().image, "new.jpg");
    }

    #[test]
    fn test_variant_row_defaults() {
        let row: VariantRow = serde_json::from_value(json!({
            "id": uuid::Uuid::new_v4(),
            "product_id": uuid::Uuid::new_v4(),
        }))
        .unwrap();
        let variant = row.into_variant();
        assert_eq!(variant.name, "");
        assert_eq!(variant.image, "");
        assert_eq!(variant.stock, 0);
        assert_eq!(variant.price_diff, Decimal::ZERO);
    }

    // =========================================================================
    // Order rows
    // =========================================================================

    #[test]
    fn test_order_row_normalizes_status() {
        let row: OrderRow = serde_json::from_value(json!({
            "id": uuid::Uuid::new_v4(),
            "status": "shipped",
            "total": 42,
        }))
        .unwrap();
        let order = row.into_order();
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.total, Decimal::from(42));
    }

    #[test]
    fn test_order_row_unknown_status_becomes_pending() {
        let row: OrderRow = serde_json::from_value(json!({
            "id": uuid::Uuid::new_v4(),
            "status": "lost-in-transit",
        }))
        .unwrap();
        assert_eq!(row.into_order().status, OrderStatus::Pending);
    }

    #[test]
    fn test_order_item_row_without_refs_is_dropped() {
        let row: OrderItemRow = serde_json::from_value(json!({
            "id": uuid::Uuid::new_v4(),
            "product_name": "Travel Tin",
        }))
        .unwrap();
        assert!(row.into_order_item().is_none());
    }

    #[test]
    fn test_order_item_row_snapshots() {
        let row: OrderItemRow = serde_json::from_value(json!({
            "id": uuid::Uuid::new_v4(),
            "order_id": uuid::Uuid::new_v4(),
            "product_id": uuid::Uuid::new_v4(),
            "product_name": "Travel Tin",
            "variant_name": "Brass",
            "price": 12.5,
            "quantity": 2,
        }))
        .unwrap();
        let item = row.into_order_item().unwrap();
        assert_eq!(item.product_name, "Travel Tin");
        assert_eq!(item.variant_name.as_deref(), Some("Brass"));
        assert_eq!(item.line_total(), Decimal::from(25));
    }
}
