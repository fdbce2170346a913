//! Checkout flow: cart snapshot in, persisted order out.
//!
//! The sequence is deliberately not a transaction - the hosted service
//! offers none. The order header is the commit point: once it is written,
//! the order stands even if recording its items, decrementing stock, or
//! sending the confirmation fails afterwards. Each of those follow-up steps
//! reports into the returned [`OrderReceipt`] instead of failing the
//! checkout, so callers can show an honest success message.
//!
//! Stock decrements go through the service's remote procedures with no
//! compare-and-set: two shoppers racing for the last unit can both succeed.
//! That is a property of the deployed service (see DESIGN.md), not of this
//! flow.

use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use driftwood_backend::{BackendError, CommerceBackend, NewOrder, NewOrderItem};
use driftwood_core::types::{Email, EmailError, ProductId, VariantId};
use driftwood_core::{Customer, Order};

use crate::cart::{CartStorage, CartStore};
use crate::catalog::CatalogStore;
use crate::mailer::{ConfirmationLine, OrderConfirmation, OrderNotifier};

/// Errors that abort a checkout before any order is written.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart has no lines.
    #[error("cart is empty")]
    EmptyCart,

    /// A required customer field is blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// The customer email does not parse.
    #[error("invalid email address: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Requested quantities exceed known stock.
    #[error("insufficient stock for: {}", .names.join(", "))]
    InsufficientStock {
        /// Display names of the offending lines.
        names: Vec<String>,
    },

    /// The order submission itself failed; nothing was written.
    #[error("order submission failed: {0}")]
    Backend(#[from] BackendError),
}

/// A stock decrement that did not go through.
#[derive(Debug, Clone)]
pub struct StockFailure {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub message: String,
}

/// Outcome of a successful checkout, including the parts that only half
/// succeeded.
#[derive(Debug, Clone)]
pub struct OrderReceipt {
    /// The persisted order header.
    pub order: Order,
    /// Whether the order's line items were recorded. When false the header
    /// exists without lines; the service has no rollback for this.
    pub items_recorded: bool,
    /// Stock decrements that failed and were not retried.
    pub stock_failures: Vec<StockFailure>,
    /// Whether the confirmation email went out.
    pub confirmation_sent: bool,
}

impl OrderReceipt {
    /// Whether every follow-up step completed alongside the order itself.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.items_recorded && self.stock_failures.is_empty() && self.confirmation_sent
    }
}

/// Customer details as entered on the checkout form.
#[derive(Debug, Clone, Default)]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

impl CustomerDetails {
    /// Validate the form and produce the snapshot that goes on the order.
    fn into_customer(self) -> Result<Customer, CheckoutError> {
        let name = required(&self.name, "full name")?;
        let phone = required(&self.phone, "phone number")?;
        let address = required(&self.address, "delivery address")?;
        let email = Email::parse(self.email.trim())?;

        Ok(Customer {
            name,
            email: email.into_inner(),
            phone,
            address,
        })
    }
}

fn required(value: &str, field: &'static str) -> Result<String, CheckoutError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CheckoutError::MissingField(field));
    }
    Ok(trimmed.to_owned())
}

/// The checkout flow.
pub struct Checkout<B, N> {
    backend: Arc<B>,
    notifier: N,
}

impl<B: CommerceBackend, N: OrderNotifier> Checkout<B, N> {
    #[must_use]
    pub fn new(backend: Arc<B>, notifier: N) -> Self {
        Self { backend, notifier }
    }

    /// Place an order for the cart's contents.
    ///
    /// Validates the customer details and every line's quantity against the
    /// catalog's known stock before anything is written; on success the cart
    /// is cleared and the receipt records how the follow-up steps fared.
    /// Callers refresh the [`CatalogStore`] afterwards so the storefront
    /// shows the decremented stock.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError` when validation fails or the order header
    /// cannot be written; in both cases the cart is left untouched.
    #[instrument(skip_all, fields(lines = cart.lines().len()))]
    pub async fn place_order<S: CartStorage>(
        &self,
        catalog: &CatalogStore<B>,
        cart: &mut CartStore<S>,
        details: CustomerDetails,
    ) -> Result<OrderReceipt, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let customer = details.into_customer()?;

        // Pre-flight: every line against the stock we currently know about.
        // A product that has vanished from the catalog counts as having none.
        let mut offenders: Vec<String> = Vec::new();
        let mut items: Vec<NewOrderItem> = Vec::new();
        for line in cart.lines() {
            let Some(product) = catalog.product(line.product_id) else {
                offenders.push(line.name.clone());
                continue;
            };
            if product.available_stock(line.variant_id) < line.quantity {
                offenders.push(line.name.clone());
                continue;
            }

            let variant_name = line
                .variant_id
                .and_then(|id| product.variant(id))
                .map(|v| v.name.clone());
            items.push(NewOrderItem {
                product_id: line.product_id,
                variant_id: line.variant_id,
                product_name: product.name.clone(),
                variant_name,
                unit_price: line.unit_price,
                quantity: line.quantity,
            });
        }
        if !offenders.is_empty() {
            return Err(CheckoutError::InsufficientStock { names: offenders });
        }

        // Commit point: the order header. Total is computed once, here.
        let total = cart.total();
        let order = self
            .backend
            .create_order(NewOrder {
                customer: customer.clone(),
                total,
            })
            .await?;

        let items_recorded = match self.backend.insert_order_items(order.id, items).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(order_id = %order.id, error = %e, "order items not recorded, header stands");
                false
            }
        };

        let confirmation = OrderConfirmation {
            recipient: customer.email.clone(),
            customer_name: customer.name.clone(),
            order_id: order.id,
            lines: cart
                .lines()
                .iter()
                .map(|l| ConfirmationLine {
                    name: l.name.clone(),
                    quantity: l.quantity,
                    price: l.unit_price,
                })
                .collect(),
            total,
            address: customer.address.clone(),
            phone: customer.phone.clone(),
        };

        // Inventory bookkeeping: variant stock when a variant was bought,
        // parent stock always. Failures stand; the order is already placed.
        let mut stock_failures: Vec<StockFailure> = Vec::new();
        for line in cart.lines() {
            if let Some(variant_id) = line.variant_id
                && let Err(e) = self
                    .backend
                    .decrement_variant_stock(variant_id, line.quantity)
                    .await
            {
                tracing::warn!(variant_id = %variant_id, error = %e, "variant stock decrement failed");
                stock_failures.push(StockFailure {
                    product_id: line.product_id,
                    variant_id: Some(variant_id),
                    message: e.to_string(),
                });
            }

            if let Err(e) = self
                .backend
                .decrement_product_stock(line.product_id, line.quantity)
                .await
            {
                tracing::warn!(product_id = %line.product_id, error = %e, "product stock decrement failed");
                stock_failures.push(StockFailure {
                    product_id: line.product_id,
                    variant_id: None,
                    message: e.to_string(),
                });
            }
        }

        if let Err(e) = cart.clear() {
            tracing::error!(error = %e, "cart clear failed to persist after checkout");
        }

        let confirmation_sent = match self.notifier.send_confirmation(&confirmation).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "confirmation email not sent");
                false
            }
        };

        Ok(OrderReceipt {
            order,
            items_recorded,
            stock_failures,
            confirmation_sent,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::Utc;
    use rust_decimal::dec;

    use driftwood_backend::testing::{FailPoint, InMemoryBackend};
    use driftwood_core::types::OrderStatus;
    use driftwood_core::{Product, Variant, order::items_total};

    use crate::cart::{CartLine, MemoryStorage};
    use crate::mailer::NotifyError;

    use super::*;

    // =========================================================================
    // Test doubles & fixtures
    // =========================================================================

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<OrderConfirmation>>,
        fail: AtomicBool,
    }

    impl RecordingNotifier {
        fn fail_sends(&self) {
            self.fail.store(true, Ordering::SeqCst);
        }

        fn sent(&self) -> Vec<OrderConfirmation> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl OrderNotifier for RecordingNotifier {
        async fn send_confirmation(
            &self,
            confirmation: &OrderConfirmation,
        ) -> Result<(), NotifyError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(NotifyError::Api {
                    status: 500,
                    message: "mail function down".to_owned(),
                });
            }
            self.sent.lock().unwrap().push(confirmation.clone());
            Ok(())
        }
    }

    fn product(name: &str, price: rust_decimal::Decimal, stock: i64) -> Product {
        Product {
            id: ProductId::random(),
            name: name.to_owned(),
            description: String::new(),
            price,
            images: vec![],
            category: "cases".to_owned(),
            featured: false,
            stock,
            variants: vec![],
            created_at: Utc::now(),
        }
    }

    fn variant(product_id: ProductId, name: &str, stock: i64, diff: rust_decimal::Decimal) -> Variant {
        Variant {
            id: VariantId::random(),
            product_id,
            name: name.to_owned(),
            image: String::new(),
            stock,
            price_diff: diff,
        }
    }

    fn details() -> CustomerDetails {
        CustomerDetails {
            name: "Rana Haddad".to_owned(),
            email: "rana@example.com".to_owned(),
            phone: "+962790000000".to_owned(),
            address: "12 Rainbow St, Amman".to_owned(),
        }
    }

    fn cart_line(product: &Product, variant_id: Option<VariantId>, quantity: i64) -> CartLine {
        let unit_price = product.unit_price(variant_id);
        let name = match variant_id.and_then(|id| product.variant(id)) {
            Some(v) => format!("{} - {}", product.name, v.name),
            None => product.name.clone(),
        };
        CartLine {
            product_id: product.id,
            variant_id,
            name,
            unit_price,
            quantity,
            image: String::new(),
        }
    }

    struct Harness {
        backend: Arc<InMemoryBackend>,
        catalog: CatalogStore<InMemoryBackend>,
        cart: CartStore<MemoryStorage>,
        notifier: Arc<RecordingNotifier>,
    }

    impl Harness {
        async fn with_products(products: Vec<Product>) -> Self {
            let backend = Arc::new(InMemoryBackend::new());
            for p in products {
                backend.seed_product(p);
            }
            let catalog = CatalogStore::new(Arc::clone(&backend));
            catalog.refresh().await.unwrap();

            Self {
                backend,
                catalog,
                cart: CartStore::open(MemoryStorage::new()),
                notifier: Arc::new(RecordingNotifier::default()),
            }
        }

        fn checkout(&self) -> Checkout<InMemoryBackend, Arc<RecordingNotifier>> {
            Checkout::new(Arc::clone(&self.backend), Arc::clone(&self.notifier))
        }

        async fn place(&mut self) -> Result<OrderReceipt, CheckoutError> {
            let checkout = self.checkout();
            checkout
                .place_order(&self.catalog, &mut self.cart, details())
                .await
        }
    }

    // =========================================================================
    // Happy path
    // =========================================================================

    #[tokio::test]
    async fn test_checkout_writes_order_and_reconciles_stock() {
        let product_a = product("Storage Case", dec!(29.99), 5);
        let mut product_c = product("Travel Tin", dec!(12.00), 4);
        let variant_b = variant(product_c.id, "Brass", 3, dec!(2.50));
        let variant_b_id = variant_b.id;
        product_c.variants.push(variant_b);

        let a_id = product_a.id;
        let c_id = product_c.id;

        let mut h = Harness::with_products(vec![product_a.clone(), product_c.clone()]).await;
        h.cart.add_item(cart_line(&product_a, None, 2)).unwrap();
        h.cart
            .add_item(cart_line(&product_c, Some(variant_b_id), 1))
            .unwrap();

        let receipt = h.place().await.unwrap();

        // Order: pending, total = 2 x 29.99 + 1 x (12.00 + 2.50)
        assert_eq!(receipt.order.status, OrderStatus::Pending);
        assert_eq!(receipt.order.total, dec!(74.48));
        assert!(receipt.is_clean());

        // Items recorded with snapshots, and they sum to the order total.
        let items = h.backend.order_items();
        assert_eq!(items.len(), 2);
        assert_eq!(items_total(&items), receipt.order.total);
        let variant_item = items.iter().find(|i| i.variant_id.is_some()).unwrap();
        assert_eq!(variant_item.product_name, "Travel Tin");
        assert_eq!(variant_item.variant_name.as_deref(), Some("Brass"));
        assert_eq!(variant_item.unit_price, dec!(14.50));

        // Stock: A down by 2; variant B down by 1; parent C also down by 1.
        let products = h.backend.products();
        let a = products.iter().find(|p| p.id == a_id).unwrap();
        let c = products.iter().find(|p| p.id == c_id).unwrap();
        assert_eq!(a.stock, 3);
        assert_eq!(c.stock, 3);
        assert_eq!(c.variant(variant_b_id).unwrap().stock, 2);

        // Cart cleared, confirmation delivered.
        assert!(h.cart.is_empty());
        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent.first().unwrap().recipient, "rana@example.com");
        assert_eq!(sent.first().unwrap().total, dec!(74.48));
    }

    // =========================================================================
    // Pre-flight validation
    // =========================================================================

    #[tokio::test]
    async fn test_checkout_aborts_on_insufficient_stock() {
        let p = product("Storage Case", dec!(29.99), 2);
        let mut h = Harness::with_products(vec![p.clone()]).await;
        h.cart.add_item(cart_line(&p, None, 3)).unwrap();

        let err = h.place().await.unwrap_err();
        match err {
            CheckoutError::InsufficientStock { names } => {
                assert_eq!(names, vec!["Storage Case".to_owned()]);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        // No order written, cart untouched.
        assert!(h.backend.orders().is_empty());
        assert_eq!(h.cart.item_count(), 3);
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_variant_stock_checked_not_parent() {
        let mut p = product("Travel Tin", dec!(12.00), 50);
        let v = variant(p.id, "Brass", 1, dec!(0));
        let v_id = v.id;
        p.variants.push(v);

        let mut h = Harness::with_products(vec![p.clone()]).await;
        h.cart.add_item(cart_line(&p, Some(v_id), 2)).unwrap();

        assert!(matches!(
            h.place().await,
            Err(CheckoutError::InsufficientStock { .. })
        ));
    }

    #[tokio::test]
    async fn test_vanished_product_counts_as_out_of_stock() {
        let p = product("Ghost", dec!(10.00), 5);
        let mut h = Harness::with_products(vec![]).await;
        h.cart.add_item(cart_line(&p, None, 1)).unwrap();

        assert!(matches!(
            h.place().await,
            Err(CheckoutError::InsufficientStock { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_cart_rejected() {
        let mut h = Harness::with_products(vec![]).await;
        assert!(matches!(h.place().await, Err(CheckoutError::EmptyCart)));
    }

    #[tokio::test]
    async fn test_blank_fields_rejected_before_any_write() {
        let p = product("Storage Case", dec!(29.99), 5);
        let mut h = Harness::with_products(vec![p.clone()]).await;
        h.cart.add_item(cart_line(&p, None, 1)).unwrap();

        let checkout = h.checkout();
        let blank_name = CustomerDetails {
            name: "   ".to_owned(),
            ..details()
        };
        let err = checkout
            .place_order(&h.catalog, &mut h.cart, blank_name)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::MissingField("full name")));

        let bad_email = CustomerDetails {
            email: "not-an-email".to_owned(),
            ..details()
        };
        let err = checkout
            .place_order(&h.catalog, &mut h.cart, bad_email)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidEmail(_)));

        assert!(h.backend.orders().is_empty());
        assert_eq!(h.cart.item_count(), 1);
    }

    // =========================================================================
    // Accepted partial failures
    // =========================================================================

    #[tokio::test]
    async fn test_item_insert_failure_leaves_order_standing() {
        let p = product("Storage Case", dec!(29.99), 5);
        let mut h = Harness::with_products(vec![p.clone()]).await;
        h.cart.add_item(cart_line(&p, None, 1)).unwrap();
        h.backend.fail_on(FailPoint::InsertOrderItems);

        let receipt = h.place().await.unwrap();

        assert!(!receipt.items_recorded);
        assert!(!receipt.is_clean());
        assert_eq!(h.backend.orders().len(), 1);
        assert!(h.backend.order_items().is_empty());
        // Cart still clears: the order was submitted.
        assert!(h.cart.is_empty());
    }

    #[tokio::test]
    async fn test_decrement_failure_recorded_not_fatal() {
        let p = product("Storage Case", dec!(29.99), 5);
        let p_id = p.id;
        let mut h = Harness::with_products(vec![p.clone()]).await;
        h.cart.add_item(cart_line(&p, None, 2)).unwrap();
        h.backend.fail_on(FailPoint::DecrementProductStock);

        let receipt = h.place().await.unwrap();

        assert_eq!(receipt.stock_failures.len(), 1);
        assert_eq!(receipt.stock_failures.first().unwrap().product_id, p_id);
        assert_eq!(h.backend.orders().len(), 1);
        assert!(h.cart.is_empty());
        // Stock untouched since the procedure failed.
        assert_eq!(h.backend.products().first().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_header_failure_aborts_and_keeps_cart() {
        let p = product("Storage Case", dec!(29.99), 5);
        let mut h = Harness::with_products(vec![p.clone()]).await;
        h.cart.add_item(cart_line(&p, None, 1)).unwrap();
        h.backend.fail_on(FailPoint::CreateOrder);

        assert!(matches!(h.place().await, Err(CheckoutError::Backend(_))));
        assert_eq!(h.cart.item_count(), 1);
        assert!(h.backend.order_items().is_empty());
    }

    #[tokio::test]
    async fn test_email_failure_is_non_fatal() {
        let p = product("Storage Case", dec!(29.99), 5);
        let mut h = Harness::with_products(vec![p.clone()]).await;
        h.cart.add_item(cart_line(&p, None, 1)).unwrap();
        h.notifier.fail_sends();

        let receipt = h.place().await.unwrap();

        assert!(!receipt.confirmation_sent);
        assert_eq!(h.backend.orders().len(), 1);
        assert!(h.cart.is_empty());
    }
}
