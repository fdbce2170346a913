//! The backend seam the stores are written against.
//!
//! [`CommerceBackend`] is implemented by [`crate::rest::BackendClient`] for
//! the hosted service and by [`crate::testing::InMemoryBackend`] for tests.
//! Stores receive whichever implementation they are constructed with; nothing
//! in the workspace reaches for a global client.

use rust_decimal::Decimal;
use serde::Serialize;

use driftwood_core::types::{OrderId, OrderStatus, ProductId, VariantId};
use driftwood_core::{Customer, Order, OrderItem, Product, Variant};

use crate::BackendError;

/// Fields for a product to be created; the service assigns the id and
/// creation timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub images: Vec<String>,
    pub category: String,
    pub featured: bool,
    pub stock: i64,
}

/// Partial update for a product; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
}

/// Fields for a variant to be created under an existing product.
#[derive(Debug, Clone, Serialize)]
pub struct NewVariant {
    pub product_id: ProductId,
    pub name: String,
    pub image: String,
    pub stock: i64,
    pub price_diff: Decimal,
}

/// Partial update for a variant; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VariantPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_diff: Option<Decimal>,
}

/// An order header to be created. The service assigns the id, the pending
/// status, and the creation timestamp.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer: Customer,
    pub total: Decimal,
}

/// One line of an order to be recorded, snapshot fields included.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i64,
}

/// Operations the hosted data service exposes to this system.
///
/// Every method suspends until the service responds and surfaces failures as
/// [`BackendError`] values; nothing retries internally. The two stock
/// procedures floor at zero and carry **no** compare-and-decrement guard:
/// two sessions decrementing the same unit concurrently can oversell, which
/// is an accepted property of the deployed service, not something callers
/// may assume is prevented here.
#[allow(async_fn_in_trait)] // stores take a concrete `B: CommerceBackend`, no boxing needed
pub trait CommerceBackend {
    // Catalog -----------------------------------------------------------------

    /// All products joined with their variants, in service order.
    async fn list_products(&self) -> Result<Vec<Product>, BackendError>;

    /// One product with its variants, or `None` if the id has no row.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, BackendError>;

    async fn create_product(&self, product: NewProduct) -> Result<Product, BackendError>;

    async fn update_product(&self, id: ProductId, patch: ProductPatch)
    -> Result<(), BackendError>;

    async fn delete_product(&self, id: ProductId) -> Result<(), BackendError>;

    async fn create_variant(&self, variant: NewVariant) -> Result<Variant, BackendError>;

    async fn update_variant(&self, id: VariantId, patch: VariantPatch)
    -> Result<(), BackendError>;

    async fn delete_variant(&self, id: VariantId) -> Result<(), BackendError>;

    /// Whether any order item references this variant. Used to protect
    /// historical orders when a variant is removed from the catalog.
    async fn variant_in_order_items(&self, id: VariantId) -> Result<bool, BackendError>;

    // Orders ------------------------------------------------------------------

    /// Write an order header. The returned order carries the assigned id and
    /// the pending status.
    async fn create_order(&self, order: NewOrder) -> Result<Order, BackendError>;

    /// Record the order's lines. A failure here leaves the already-written
    /// header in place; the caller decides how to surface the gap.
    async fn insert_order_items(
        &self,
        order_id: OrderId,
        items: Vec<NewOrderItem>,
    ) -> Result<(), BackendError>;

    async fn list_orders(&self) -> Result<Vec<Order>, BackendError>;

    async fn get_order(&self, id: OrderId)
    -> Result<Option<(Order, Vec<OrderItem>)>, BackendError>;

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), BackendError>;

    /// Delete an order and its items (items first).
    async fn delete_order(&self, id: OrderId) -> Result<(), BackendError>;

    // Stock procedures --------------------------------------------------------

    /// Reduce a product's stock by `quantity`, floored at zero.
    async fn decrement_product_stock(
        &self,
        id: ProductId,
        quantity: i64,
    ) -> Result<(), BackendError>;

    /// Reduce a variant's stock by `quantity`, floored at zero.
    async fn decrement_variant_stock(
        &self,
        id: VariantId,
        quantity: i64,
    ) -> Result<(), BackendError>;
}
