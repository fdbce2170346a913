//! The admin console store.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::instrument;

use driftwood_backend::auth::{AuthClient, AuthError, AuthSession};
use driftwood_backend::{
    BackendError, CommerceBackend, NewProduct, NewVariant, ProductPatch, VariantPatch,
};
use driftwood_core::types::{OrderId, OrderStatus, ProductId, UserId, VariantId};
use driftwood_core::{Order, OrderItem, Product};

/// Errors surfaced by console operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// The session does not carry admin rights.
    #[error("admin access required")]
    Unauthorized,

    /// The addressed record is not in the console's view.
    #[error("not found: {0}")]
    NotFound(String),

    /// The requested status change is not a legal workflow step.
    #[error("illegal status transition: {from} -> {to}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
    },

    /// The hosted service rejected the operation.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Proof of an authorization check, supplied by the auth collaborator.
///
/// The console never sees credentials; it only honors this flag.
#[derive(Debug, Clone, Copy)]
pub struct AdminSession {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl AdminSession {
    /// Resolve a signed-in session's admin membership.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if the membership lookup fails.
    pub async fn authorize(
        auth: &AuthClient,
        session: &AuthSession,
    ) -> Result<Self, AuthError> {
        let is_admin = auth.is_admin(session.user_id).await?;
        Ok(Self {
            user_id: session.user_id,
            is_admin,
        })
    }
}

/// One variant as edited in the product form.
///
/// Carries the existing id when the variant was already in the catalog, so
/// an edit updates the row in place instead of replacing it (replacing would
/// orphan order items pointing at the old id).
#[derive(Debug, Clone)]
pub struct VariantDraft {
    pub id: Option<VariantId>,
    pub name: String,
    pub image: String,
    pub stock: i64,
    pub price_diff: Decimal,
}

#[derive(Default)]
struct ConsoleState {
    products: Vec<Product>,
    orders: Vec<Order>,
}

/// Authenticated view over the catalog and the order book.
pub struct AdminConsole<B> {
    backend: Arc<B>,
    session: AdminSession,
    state: RwLock<ConsoleState>,
}

impl<B: CommerceBackend> AdminConsole<B> {
    /// Create a console for a session. The session's admin flag is checked
    /// on every operation, not just here.
    #[must_use]
    pub fn new(backend: Arc<B>, session: AdminSession) -> Self {
        Self {
            backend,
            session,
            state: RwLock::new(ConsoleState::default()),
        }
    }

    fn ensure_admin(&self) -> Result<(), AdminError> {
        if self.session.is_admin {
            Ok(())
        } else {
            Err(AdminError::Unauthorized)
        }
    }

    /// Load products and orders into the console's view.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Unauthorized` without admin rights, or the
    /// backend failure; the previous view is kept on failure.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<(), AdminError> {
        self.ensure_admin()?;
        let products = self.backend.list_products().await?;
        let orders = self.backend.list_orders().await?;

        let mut state = self.write();
        state.products = products;
        state.orders = orders;
        Ok(())
    }

    /// Products as last refreshed.
    #[must_use]
    pub fn products(&self) -> Vec<Product> {
        self.read().products.clone()
    }

    /// Orders as last refreshed, newest first.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.read().orders.clone()
    }

    // =========================================================================
    // Product management
    // =========================================================================

    /// Create a product and its variants.
    ///
    /// # Errors
    ///
    /// Returns the first backend failure. A variant failure leaves the
    /// already-created product in place.
    #[instrument(skip(self, product, variants), fields(name = %product.name))]
    pub async fn add_product(
        &self,
        product: NewProduct,
        variants: Vec<VariantDraft>,
    ) -> Result<Product, AdminError> {
        self.ensure_admin()?;

        let mut created = self.backend.create_product(product).await?;
        for draft in variants {
            let variant = self
                .backend
                .create_variant(NewVariant {
                    product_id: created.id,
                    name: draft.name,
                    image: draft.image,
                    stock: draft.stock,
                    price_diff: draft.price_diff,
                })
                .await?;
            created.variants.push(variant);
        }

        self.write().products.insert(0, created.clone());
        Ok(created)
    }

    /// Update a product and reconcile its variant set.
    ///
    /// Drafts carrying a known id are updated in place, drafts without one
    /// are created. Variants missing from the new set are deleted - unless
    /// an order item references them, in which case they are kept with
    /// their stock forced to zero so historical orders stay intact.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::NotFound` for an unknown product, otherwise the
    /// first backend failure.
    #[instrument(skip(self, patch, variants), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
        variants: Vec<VariantDraft>,
    ) -> Result<(), AdminError> {
        self.ensure_admin()?;

        let existing = self
            .backend
            .get_product(id)
            .await?
            .ok_or_else(|| AdminError::NotFound(format!("product {id}")))?;

        self.backend.update_product(id, patch).await?;

        let kept_ids: Vec<VariantId> = variants.iter().filter_map(|d| d.id).collect();

        for removed in existing
            .variants
            .iter()
            .filter(|v| !kept_ids.contains(&v.id))
        {
            self.retire_variant(removed.id).await?;
        }

        for draft in variants {
            match draft.id.filter(|draft_id| existing.variant(*draft_id).is_some()) {
                Some(variant_id) => {
                    self.backend
                        .update_variant(
                            variant_id,
                            VariantPatch {
                                name: Some(draft.name),
                                image: Some(draft.image),
                                stock: Some(draft.stock),
                                price_diff: Some(draft.price_diff),
                            },
                        )
                        .await?;
                }
                None => {
                    self.backend
                        .create_variant(NewVariant {
                            product_id: id,
                            name: draft.name,
                            image: draft.image,
                            stock: draft.stock,
                            price_diff: draft.price_diff,
                        })
                        .await?;
                }
            }
        }

        self.reload_product(id).await?;
        Ok(())
    }

    /// Delete a product.
    ///
    /// Variants referenced by order items are never deleted: they are kept
    /// with stock zero, and the product row is kept alongside them (the
    /// service cascades variant deletion with the parent, so removing the
    /// row would take the protected variants with it). The product's own
    /// stock is zeroed in that case, which reads as out of stock on the
    /// storefront. Unreferenced variants and, when nothing forces
    /// retention, the product row itself are deleted.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::NotFound` for an unknown product, otherwise the
    /// first backend failure.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: ProductId) -> Result<(), AdminError> {
        self.ensure_admin()?;

        let existing = self
            .backend
            .get_product(id)
            .await?
            .ok_or_else(|| AdminError::NotFound(format!("product {id}")))?;

        let mut retained = false;
        for variant in &existing.variants {
            retained |= self.retire_variant(variant.id).await?;
        }

        if retained {
            tracing::warn!(product_id = %id, "product kept with zeroed stock, variants referenced by orders");
            self.backend
                .update_product(
                    id,
                    ProductPatch {
                        stock: Some(0),
                        ..ProductPatch::default()
                    },
                )
                .await?;
            self.reload_product(id).await?;
        } else {
            self.backend.delete_product(id).await?;
            self.write().products.retain(|p| p.id != id);
        }

        Ok(())
    }

    /// Remove a variant from the catalog, protecting ordered history.
    ///
    /// Returns whether the variant was retained (stock zeroed) instead of
    /// deleted.
    async fn retire_variant(&self, id: VariantId) -> Result<bool, AdminError> {
        if self.backend.variant_in_order_items(id).await? {
            self.backend
                .update_variant(
                    id,
                    VariantPatch {
                        stock: Some(0),
                        ..VariantPatch::default()
                    },
                )
                .await?;
            Ok(true)
        } else {
            self.backend.delete_variant(id).await?;
            Ok(false)
        }
    }

    async fn reload_product(&self, id: ProductId) -> Result<(), AdminError> {
        let reloaded = self
            .backend
            .get_product(id)
            .await?
            .ok_or_else(|| AdminError::NotFound(format!("product {id}")))?;

        let mut state = self.write();
        match state.products.iter_mut().find(|p| p.id == id) {
            Some(slot) => *slot = reloaded,
            None => state.products.insert(0, reloaded),
        }
        Ok(())
    }

    // =========================================================================
    // Order workflow
    // =========================================================================

    /// Orders still in the fulfillment queue (pending, processing).
    #[must_use]
    pub fn pending_orders(&self) -> Vec<Order> {
        self.read()
            .orders
            .iter()
            .filter(|o| !o.status.is_settled())
            .cloned()
            .collect()
    }

    /// Orders out of the queue (shipped, delivered, cancelled).
    #[must_use]
    pub fn completed_orders(&self) -> Vec<Order> {
        self.read()
            .orders
            .iter()
            .filter(|o| o.status.is_settled())
            .cloned()
            .collect()
    }

    /// Sum of order totals, cancelled orders excluded.
    #[must_use]
    pub fn active_revenue(&self) -> Decimal {
        self.read()
            .orders
            .iter()
            .filter(|o| o.status.counts_toward_revenue())
            .map(|o| o.total)
            .sum()
    }

    /// One order with its items, straight from the service.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::NotFound` for an unknown order.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn order_details(&self, id: OrderId) -> Result<(Order, Vec<OrderItem>), AdminError> {
        self.ensure_admin()?;
        self.backend
            .get_order(id)
            .await?
            .ok_or_else(|| AdminError::NotFound(format!("order {id}")))
    }

    /// Move an order to a new status.
    ///
    /// Only the legal workflow steps are accepted (see
    /// [`OrderStatus::can_transition_to`]); a single-field update with no
    /// inventory side effects.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::InvalidTransition` for an illegal step,
    /// `AdminError::NotFound` for an unknown order.
    #[instrument(skip(self), fields(order_id = %id, status = %status))]
    pub async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), AdminError> {
        self.ensure_admin()?;

        let current = self
            .read()
            .orders
            .iter()
            .find(|o| o.id == id)
            .map(|o| o.status)
            .ok_or_else(|| AdminError::NotFound(format!("order {id}")))?;

        if !current.can_transition_to(status) {
            return Err(AdminError::InvalidTransition {
                from: current,
                to: status,
            });
        }

        self.backend.update_order_status(id, status).await?;

        if let Some(order) = self.write().orders.iter_mut().find(|o| o.id == id) {
            order.status = status;
        }
        Ok(())
    }

    /// Permanently delete an order and its items.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Unauthorized` without admin rights, or the
    /// backend failure.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn delete_order(&self, id: OrderId) -> Result<(), AdminError> {
        self.ensure_admin()?;
        self.backend.delete_order(id).await?;
        self.write().orders.retain(|o| o.id != id);
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, ConsoleState> {
        #[allow(clippy::unwrap_used)]
        self.state.read().unwrap()
    }

    fn write(&self) -> RwLockWriteGuard<'_, ConsoleState> {
        #[allow(clippy::unwrap_used)]
        self.state.write().unwrap()
    }
}
