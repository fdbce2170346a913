//! In-memory implementation of [`CommerceBackend`] for tests.
//!
//! Behaves like the hosted service as observed: ids are assigned on insert,
//! new orders start pending, the stock procedures floor at zero, and the
//! order-header/order-items writes are independent (so tests can exercise
//! the partial-failure paths with [`InMemoryBackend::fail_on`]).

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::Utc;

use driftwood_core::types::{OrderId, OrderItemId, OrderStatus, ProductId, VariantId};
use driftwood_core::{Order, OrderItem, Product, Variant};

use crate::BackendError;
use crate::api::{
    CommerceBackend, NewOrder, NewOrderItem, NewProduct, NewVariant, ProductPatch, VariantPatch,
};

/// Operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    ListProducts,
    CreateOrder,
    InsertOrderItems,
    DecrementProductStock,
    DecrementVariantStock,
    UpdateProduct,
    DeleteVariant,
}

#[derive(Default)]
struct State {
    products: Vec<Product>,
    orders: Vec<Order>,
    order_items: Vec<OrderItem>,
    failures: HashSet<FailPoint>,
}

/// A `Mutex`-ed fake of the hosted data service.
#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a product (with any variants already attached).
    pub fn seed_product(&self, product: Product) {
        self.lock().products.push(product);
    }

    /// Seed an order header.
    pub fn seed_order(&self, order: Order) {
        self.lock().orders.push(order);
    }

    /// Seed an order item row.
    pub fn seed_order_item(&self, item: OrderItem) {
        self.lock().order_items.push(item);
    }

    /// Make every subsequent call to `point` fail with a 500 until
    /// [`Self::recover`] is called.
    pub fn fail_on(&self, point: FailPoint) {
        self.lock().failures.insert(point);
    }

    /// Clear all injected failures.
    pub fn recover(&self) {
        self.lock().failures.clear();
    }

    /// Snapshot of the stored products.
    #[must_use]
    pub fn products(&self) -> Vec<Product> {
        self.lock().products.clone()
    }

    /// Snapshot of the stored order headers.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.lock().orders.clone()
    }

    /// Snapshot of the stored order items.
    #[must_use]
    pub fn order_items(&self) -> Vec<OrderItem> {
        self.lock().order_items.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock means a test already panicked; propagating the
        // panic here is the right outcome.
        #[allow(clippy::unwrap_used)]
        self.state.lock().unwrap()
    }

    fn check(&self, point: FailPoint) -> Result<(), BackendError> {
        if self.lock().failures.contains(&point) {
            return Err(BackendError::Api {
                status: 500,
                message: format!("injected failure at {point:?}"),
            });
        }
        Ok(())
    }
}

impl CommerceBackend for InMemoryBackend {
    async fn list_products(&self) -> Result<Vec<Product>, BackendError> {
        self.check(FailPoint::ListProducts)?;
        let mut products = self.lock().products.clone();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(products)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, BackendError> {
        Ok(self.lock().products.iter().find(|p| p.id == id).cloned())
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, BackendError> {
        let created = Product {
            id: ProductId::random(),
            name: product.name,
            description: product.description,
            price: product.price,
            images: product.images,
            category: product.category,
            featured: product.featured,
            stock: product.stock,
            variants: vec![],
            created_at: Utc::now(),
        };
        self.lock().products.push(created.clone());
        Ok(created)
    }

    async fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<(), BackendError> {
        self.check(FailPoint::UpdateProduct)?;
        let mut state = self.lock();
        let product = state
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| BackendError::NotFound(format!("product {id}")))?;

        if let Some(name) = patch.name {
            product.name = name;
        }
        if let Some(description) = patch.description {
            product.description = description;
        }
        if let Some(price) = patch.price {
            product.price = price;
        }
        if let Some(images) = patch.images {
            product.images = images;
        }
        if let Some(category) = patch.category {
            product.category = category;
        }
        if let Some(featured) = patch.featured {
            product.featured = featured;
        }
        if let Some(stock) = patch.stock {
            product.stock = stock;
        }
        Ok(())
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), BackendError> {
        self.lock().products.retain(|p| p.id != id);
        Ok(())
    }

    async fn create_variant(&self, variant: NewVariant) -> Result<Variant, BackendError> {
        let mut state = self.lock();
        let product = state
            .products
            .iter_mut()
            .find(|p| p.id == variant.product_id)
            .ok_or_else(|| BackendError::NotFound(format!("product {}", variant.product_id)))?;

        let created = Variant {
            id: VariantId::random(),
            product_id: variant.product_id,
            name: variant.name,
            image: variant.image,
            stock: variant.stock,
            price_diff: variant.price_diff,
        };
        product.variants.push(created.clone());
        Ok(created)
    }

    async fn update_variant(
        &self,
        id: VariantId,
        patch: VariantPatch,
    ) -> Result<(), BackendError> {
        let mut state = self.lock();
        let variant = state
            .products
            .iter_mut()
            .flat_map(|p| p.variants.iter_mut())
            .find(|v| v.id == id)
            .ok_or_else(|| BackendError::NotFound(format!("variant {id}")))?;

        if let Some(name) = patch.name {
            variant.name = name;
        }
        if let Some(image) = patch.image {
            variant.image = image;
        }
        if let Some(stock) = patch.stock {
            variant.stock = stock;
        }
        if let Some(price_diff) = patch.price_diff {
            variant.price_diff = price_diff;
        }
        Ok(())
    }

    async fn delete_variant(&self, id: VariantId) -> Result<(), BackendError> {
        self.check(FailPoint::DeleteVariant)?;
        for product in &mut self.lock().products {
            product.variants.retain(|v| v.id != id);
        }
        Ok(())
    }

    async fn variant_in_order_items(&self, id: VariantId) -> Result<bool, BackendError> {
        Ok(self
            .lock()
            .order_items
            .iter()
            .any(|item| item.variant_id == Some(id)))
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, BackendError> {
        self.check(FailPoint::CreateOrder)?;
        let created = Order {
            id: OrderId::random(),
            customer: order.customer,
            total: order.total,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };
        self.lock().orders.push(created.clone());
        Ok(created)
    }

    async fn insert_order_items(
        &self,
        order_id: OrderId,
        items: Vec<NewOrderItem>,
    ) -> Result<(), BackendError> {
        self.check(FailPoint::InsertOrderItems)?;
        let mut state = self.lock();
        for item in items {
            state.order_items.push(OrderItem {
                id: OrderItemId::random(),
                order_id,
                product_id: item.product_id,
                variant_id: item.variant_id,
                product_name: item.product_name,
                variant_name: item.variant_name,
                unit_price: item.unit_price,
                quantity: item.quantity,
            });
        }
        Ok(())
    }

    async fn list_orders(&self) -> Result<Vec<Order>, BackendError> {
        let mut orders = self.lock().orders.clone();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn get_order(
        &self,
        id: OrderId,
    ) -> Result<Option<(Order, Vec<OrderItem>)>, BackendError> {
        let state = self.lock();
        let Some(order) = state.orders.iter().find(|o| o.id == id).cloned() else {
            return Ok(None);
        };
        let items = state
            .order_items
            .iter()
            .filter(|item| item.order_id == id)
            .cloned()
            .collect();
        Ok(Some((order, items)))
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), BackendError> {
        let mut state = self.lock();
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| BackendError::NotFound(format!("order {id}")))?;
        order.status = status;
        Ok(())
    }

    async fn delete_order(&self, id: OrderId) -> Result<(), BackendError> {
        let mut state = self.lock();
        state.order_items.retain(|item| item.order_id != id);
        state.orders.retain(|o| o.id != id);
        Ok(())
    }

    async fn decrement_product_stock(
        &self,
        id: ProductId,
        quantity: i64,
    ) -> Result<(), BackendError> {
        self.check(FailPoint::DecrementProductStock)?;
        let mut state = self.lock();
        let product = state
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| BackendError::NotFound(format!("product {id}")))?;
        product.stock = (product.stock - quantity).max(0);
        Ok(())
    }

    async fn decrement_variant_stock(
        &self,
        id: VariantId,
        quantity: i64,
    ) -> Result<(), BackendError> {
        self.check(FailPoint::DecrementVariantStock)?;
        let mut state = self.lock();
        let variant = state
            .products
            .iter_mut()
            .flat_map(|p| p.variants.iter_mut())
            .find(|v| v.id == id)
            .ok_or_else(|| BackendError::NotFound(format!("variant {id}")))?;
        variant.stock = (variant.stock - quantity).max(0);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::dec;

    use driftwood_core::Customer;

    use super::*;

    fn customer() -> Customer {
        Customer {
            name: "Rana Haddad".to_owned(),
            email: "rana@example.com".to_owned(),
            phone: "+962790000000".to_owned(),
            address: "12 Rainbow St, Amman".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_create_order_assigns_pending() {
        let backend = InMemoryBackend::new();
        let order = backend
            .create_order(NewOrder {
                customer: customer(),
                total: dec!(10.00),
            })
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(backend.orders().len(), 1);
    }

    #[tokio::test]
    async fn test_decrement_floors_at_zero() {
        let backend = InMemoryBackend::new();
        let product = backend
            .create_product(NewProduct {
                name: "Travel Tin".to_owned(),
                description: String::new(),
                price: dec!(12.50),
                images: vec![],
                category: String::new(),
                featured: false,
                stock: 2,
            })
            .await
            .unwrap();

        backend.decrement_product_stock(product.id, 5).await.unwrap();
        let products = backend.products();
        assert_eq!(products.first().unwrap().stock, 0);
    }

    #[tokio::test]
    async fn test_fail_point_injection() {
        let backend = InMemoryBackend::new();
        backend.fail_on(FailPoint::CreateOrder);

        let result = backend
            .create_order(NewOrder {
                customer: customer(),
                total: dec!(1.00),
            })
            .await;
        assert!(matches!(result, Err(BackendError::Api { status: 500, .. })));

        backend.recover();
        assert!(
            backend
                .create_order(NewOrder {
                    customer: customer(),
                    total: dec!(1.00),
                })
                .await
                .is_ok()
        );
    }
}
