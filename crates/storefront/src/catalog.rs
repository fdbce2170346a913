//! Catalog read model.
//!
//! Products (with their variants) are fetched from the hosted service and
//! held in memory for the store pages to read. A failed refresh keeps the
//! previous snapshot in place and flips the state to `Failed`;
//! [`CatalogStore::run_until_loaded`] retries on a fixed delay until a load
//! succeeds.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tracing::instrument;

use driftwood_backend::{BackendError, CommerceBackend};
use driftwood_core::Product;
use driftwood_core::types::{ProductId, VariantId};

/// Delay between retries while a load error is present.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Load state of the catalog, driving the storefront's loading indicator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CatalogState {
    /// No load has completed yet.
    #[default]
    Loading,
    /// The snapshot reflects the last successful load.
    Ready,
    /// The last load failed; the snapshot (if any) is stale.
    Failed(String),
}

#[derive(Default)]
struct Snapshot {
    products: Vec<Product>,
    state: CatalogState,
}

/// In-memory read model over the hosted catalog.
pub struct CatalogStore<B> {
    backend: Arc<B>,
    snapshot: RwLock<Snapshot>,
}

impl<B: CommerceBackend> CatalogStore<B> {
    /// Create an empty store; call [`Self::refresh`] (or
    /// [`Self::run_until_loaded`]) to populate it.
    #[must_use]
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    /// Fetch the catalog and publish a new snapshot, newest product first.
    ///
    /// # Errors
    ///
    /// Returns the backend error after recording it in [`Self::state`]; the
    /// previous snapshot stays readable.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<(), BackendError> {
        match self.backend.list_products().await {
            Ok(mut products) => {
                products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                let mut snapshot = self.write();
                snapshot.products = products;
                snapshot.state = CatalogState::Ready;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "catalog refresh failed, keeping previous snapshot");
                self.write().state = CatalogState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    /// Refresh, retrying on a fixed delay until a load succeeds.
    ///
    /// Intended to be driven by the page task at startup; it returns as soon
    /// as one refresh completes cleanly.
    pub async fn run_until_loaded(&self) {
        loop {
            if self.refresh().await.is_ok() {
                return;
            }
            tokio::time::sleep(RETRY_DELAY).await;
        }
    }

    /// Current load state.
    #[must_use]
    pub fn state(&self) -> CatalogState {
        self.read().state.clone()
    }

    /// All products, newest first.
    #[must_use]
    pub fn products(&self) -> Vec<Product> {
        self.read().products.clone()
    }

    /// The featured subset, in catalog order.
    #[must_use]
    pub fn featured(&self) -> Vec<Product> {
        self.read()
            .products
            .iter()
            .filter(|p| p.featured)
            .cloned()
            .collect()
    }

    /// Look up a product by id.
    #[must_use]
    pub fn product(&self, id: ProductId) -> Option<Product> {
        self.read().products.iter().find(|p| p.id == id).cloned()
    }

    /// Known stock for a product (or one of its variants), or `None` if the
    /// product is not in the snapshot.
    #[must_use]
    pub fn stock_for(&self, product_id: ProductId, variant_id: Option<VariantId>) -> Option<i64> {
        self.read()
            .products
            .iter()
            .find(|p| p.id == product_id)
            .map(|p| p.available_stock(variant_id))
    }

    fn read(&self) -> RwLockReadGuard<'_, Snapshot> {
        // A poisoned lock means another reader/writer panicked mid-update;
        // there is no recovery story better than propagating.
        #[allow(clippy::unwrap_used)]
        self.snapshot.read().unwrap()
    }

    fn write(&self) -> RwLockWriteGuard<'_, Snapshot> {
        #[allow(clippy::unwrap_used)]
        self.snapshot.write().unwrap()
    }
}
