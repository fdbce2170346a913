//! HTTPS client for the hosted data service's REST surface.
//!
//! Collections are addressed as `/rest/v1/<collection>` with column filters
//! in the query string (`?id=eq.<uuid>`); the stock procedures live under
//! `/rest/v1/rpc/`. Inserts that need the created row back send
//! `Prefer: return=representation`.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::instrument;

use driftwood_core::types::{OrderId, OrderStatus, ProductId, VariantId};
use driftwood_core::{Order, OrderItem, Product, Variant};

use crate::BackendError;
use crate::api::{
    CommerceBackend, NewOrder, NewOrderItem, NewProduct, NewVariant, ProductPatch, VariantPatch,
};
use crate::config::{BackendConfig, ConfigError};
use crate::records::{OrderItemRow, OrderRow, ProductRow, VariantRow};

/// Longest error-body excerpt worth logging or surfacing.
const ERROR_BODY_LIMIT: usize = 200;

/// Client for the hosted data service's resource collections and stock
/// procedures.
///
/// Cheaply cloneable; all clones share one connection pool.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    rest_url: String,
}

impl BackendClient {
    /// Create a new client from configuration.
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
        headers.insert("apikey", key_value.clone());

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
            inner: Arc::new(ClientInner {
                http,
                rest_url: config.rest_url(),
            }),
        })
    }

    // =========================================================================
    // Request helpers
    // =========================================================================

    fn url(&self, path_and_query: &str) -> String {
        format!("{}/{path_and_query}", self.inner.rest_url)
    }

    /// Fetch rows from a collection query.
    async fn get_rows<T: DeserializeOwned>(
        &self,
        path_and_query: &str,
    ) -> Result<Vec<T>, BackendError> {
        let response = self.inner.http.get(self.url(path_and_query)).send().await?;
        read_json(response).await
    }

    /// Insert rows and return the created representation.
    async fn insert_returning<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Vec<T>, BackendError> {
        let response = self
            .inner
            .http
            .post(self.url(path))
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    /// Insert rows without asking for the representation back.
    async fn insert(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<(), BackendError> {
        let response = self.inner.http.post(self.url(path)).json(body).send().await?;
        read_ok(response).await
    }

    /// Patch rows addressed by a filter query.
    async fn patch<B: serde::Serialize>(
        &self,
        path_and_query: &str,
        body: &B,
    ) -> Result<(), BackendError> {
        let response = self
            .inner
            .http
            .patch(self.url(path_and_query))
            .json(body)
            .send()
            .await?;
        read_ok(response).await
    }

    /// Delete rows addressed by a filter query.
    async fn delete(&self, path_and_query: &str) -> Result<(), BackendError> {
        let response = self.inner.http.delete(self.url(path_and_query)).send().await?;
        read_ok(response).await
    }

    /// Invoke a remote procedure.
    async fn rpc(&self, name: &str, args: &serde_json::Value) -> Result<(), BackendError> {
        let response = self
            .inner
            .http
            .post(self.url(&format!("rpc/{name}")))
            .json(args)
            .send()
            .await?;
        read_ok(response).await
    }

    /// Variants for one product, normalized.
    async fn variants_for(&self, product_id: ProductId) -> Result<Vec<Variant>, BackendError> {
        let rows: Vec<VariantRow> = self
            .get_rows(&format!("product_variants?product_id=eq.{product_id}&select=*"))
            .await?;
        Ok(rows.into_iter().map(VariantRow::into_variant).collect())
    }
}

impl CommerceBackend for BackendClient {
    // =========================================================================
    // Catalog
    // =========================================================================

    #[instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<Product>, BackendError> {
        let product_rows: Vec<ProductRow> = self
            .get_rows("products?select=*&order=created_at.desc")
            .await?;
        let variant_rows: Vec<VariantRow> = self.get_rows("product_variants?select=*").await?;

        // Associate each variant with its parent row.
        let mut by_product: HashMap<ProductId, Vec<Variant>> = HashMap::new();
        for row in variant_rows {
            let variant = row.into_variant();
            by_product.entry(variant.product_id).or_default().push(variant);
        }

        Ok(product_rows
            .into_iter()
            .map(|row| {
                let variants = by_product.remove(&row.id).unwrap_or_default();
                row.into_product(variants)
            })
            .collect())
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, BackendError> {
        let mut rows: Vec<ProductRow> =
            self.get_rows(&format!("products?id=eq.{id}&select=*")).await?;

        let Some(row) = rows.pop() else {
            return Ok(None);
        };

        let variants = self.variants_for(id).await?;
        Ok(Some(row.into_product(variants)))
    }

    #[instrument(skip(self, product), fields(name = %product.name))]
    async fn create_product(&self, product: NewProduct) -> Result<Product, BackendError> {
        let mut rows: Vec<ProductRow> = self.insert_returning("products", &[product]).await?;
        rows.pop()
            .map(|row| row.into_product(vec![]))
            .ok_or_else(|| BackendError::MissingData("created product".to_owned()))
    }

    #[instrument(skip(self, patch), fields(product_id = %id))]
    async fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<(), BackendError> {
        self.patch(&format!("products?id=eq.{id}"), &patch).await
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn delete_product(&self, id: ProductId) -> Result<(), BackendError> {
        self.delete(&format!("products?id=eq.{id}")).await
    }

    #[instrument(skip(self, variant), fields(product_id = %variant.product_id))]
    async fn create_variant(&self, variant: NewVariant) -> Result<Variant, BackendError> {
        let mut rows: Vec<VariantRow> =
            self.insert_returning("product_variants", &[variant]).await?;
        rows.pop()
            .map(VariantRow::into_variant)
            .ok_or_else(|| BackendError::MissingData("created variant".to_owned()))
    }

    #[instrument(skip(self, patch), fields(variant_id = %id))]
    async fn update_variant(
        &self,
        id: VariantId,
        patch: VariantPatch,
    ) -> Result<(), BackendError> {
        self.patch(&format!("product_variants?id=eq.{id}"), &patch).await
    }

    #[instrument(skip(self), fields(variant_id = %id))]
    async fn delete_variant(&self, id: VariantId) -> Result<(), BackendError> {
        self.delete(&format!("product_variants?id=eq.{id}")).await
    }

    #[instrument(skip(self), fields(variant_id = %id))]
    async fn variant_in_order_items(&self, id: VariantId) -> Result<bool, BackendError> {
        let rows: Vec<serde_json::Value> = self
            .get_rows(&format!("order_items?variant_id=eq.{id}&select=id&limit=1"))
            .await?;
        Ok(!rows.is_empty())
    }

    // =========================================================================
    // Orders
    // =========================================================================

    #[instrument(skip(self, order))]
    async fn create_order(&self, order: NewOrder) -> Result<Order, BackendError> {
        let body = json!([{
            "customer_name": order.customer.name,
            "customer_email": order.customer.email,
            "customer_phone": order.customer.phone,
            "customer_address": order.customer.address,
            "total": order.total,
            "status": OrderStatus::Pending,
        }]);

        let mut rows: Vec<OrderRow> = self.insert_returning("orders", &body).await?;
        rows.pop()
            .map(OrderRow::into_order)
            .ok_or_else(|| BackendError::MissingData("created order".to_owned()))
    }

    #[instrument(skip(self, items), fields(order_id = %order_id, lines = items.len()))]
    async fn insert_order_items(
        &self,
        order_id: OrderId,
        items: Vec<NewOrderItem>,
    ) -> Result<(), BackendError> {
        let rows: Vec<serde_json::Value> = items
            .into_iter()
            .map(|item| {
                json!({
                    "order_id": order_id,
                    "product_id": item.product_id,
                    "variant_id": item.variant_id,
                    "product_name": item.product_name,
                    "variant_name": item.variant_name,
                    "price": item.unit_price,
                    "quantity": item.quantity,
                })
            })
            .collect();

        self.insert("order_items", &serde_json::Value::Array(rows)).await
    }

    #[instrument(skip(self))]
    async fn list_orders(&self) -> Result<Vec<Order>, BackendError> {
        let rows: Vec<OrderRow> = self
            .get_rows("orders?select=*&order=created_at.desc")
            .await?;
        Ok(rows.into_iter().map(OrderRow::into_order).collect())
    }

    #[instrument(skip(self), fields(order_id = %id))]
    async fn get_order(
        &self,
        id: OrderId,
    ) -> Result<Option<(Order, Vec<OrderItem>)>, BackendError> {
        let mut rows: Vec<OrderRow> = self.get_rows(&format!("orders?id=eq.{id}&select=*")).await?;

        let Some(row) = rows.pop() else {
            return Ok(None);
        };

        let item_rows: Vec<OrderItemRow> = self
            .get_rows(&format!("order_items?order_id=eq.{id}&select=*"))
            .await?;
        let items = item_rows
            .into_iter()
            .filter_map(OrderItemRow::into_order_item)
            .collect();

        Ok(Some((row.into_order(), items)))
    }

    #[instrument(skip(self), fields(order_id = %id, status = %status))]
    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), BackendError> {
        self.patch(&format!("orders?id=eq.{id}"), &json!({ "status": status })).await
    }

    #[instrument(skip(self), fields(order_id = %id))]
    async fn delete_order(&self, id: OrderId) -> Result<(), BackendError> {
        // Items first; the order row is the foreign-key target.
        self.delete(&format!("order_items?order_id=eq.{id}")).await?;
        self.delete(&format!("orders?id=eq.{id}")).await
    }

    // =========================================================================
    // Stock procedures
    // =========================================================================

    #[instrument(skip(self), fields(product_id = %id, quantity))]
    async fn decrement_product_stock(
        &self,
        id: ProductId,
        quantity: i64,
    ) -> Result<(), BackendError> {
        self.rpc(
            "decrement_product_stock",
            &json!({ "product_id": id, "quantity": quantity }),
        )
        .await
    }

    #[instrument(skip(self), fields(variant_id = %id, quantity))]
    async fn decrement_variant_stock(
        &self,
        id: VariantId,
        quantity: i64,
    ) -> Result<(), BackendError> {
        self.rpc(
            "decrement_variant_stock",
            &json!({ "variant_id": id, "quantity": quantity }),
        )
        .await
    }
}

// =============================================================================
// Response handling
// =============================================================================

/// Check status and parse a JSON body.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BackendError> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(BackendError::RateLimited(retry_after(&response)));
    }

    let body = response.text().await?;

    if !status.is_success() {
        tracing::error!(
            status = %status,
            body = %excerpt(&body),
            "data service returned non-success status"
        );
        return Err(BackendError::Api {
            status: status.as_u16(),
            message: excerpt(&body),
        });
    }

    serde_json::from_str(&body).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %excerpt(&body),
            "failed to parse data service response"
        );
        BackendError::Parse(e)
    })
}

/// Check status on a write that returns no useful body.
async fn read_ok(response: reqwest::Response) -> Result<(), BackendError> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(BackendError::RateLimited(retry_after(&response)));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::error!(
            status = %status,
            body = %excerpt(&body),
            "data service rejected write"
        );
        return Err(BackendError::Api {
            status: status.as_u16(),
            message: excerpt(&body),
        });
    }

    Ok(())
}

fn retry_after(response: &reqwest::Response) -> u64 {
    response
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(1)
}

fn excerpt(body: &str) -> String {
    body.chars().take(ERROR_BODY_LIMIT).collect()
}
