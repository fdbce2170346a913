//! Shopper's local cart.
//!
//! The cart is owned entirely by the shopper's session: it never touches the
//! hosted service, and it is written back to durable local storage after
//! every mutation so a page reload (or restart) finds it intact.
//!
//! Line identity for *merging* is the (product, variant) pair: adding an
//! item that matches an existing line increments that line's quantity.
//! Removal and quantity updates, however, match by product id alone - with
//! two variants of the same product in the cart they affect both lines. That
//! asymmetry is the behavior shipped to shoppers today and is kept as is;
//! see the removal-granularity note in DESIGN.md.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use driftwood_core::types::{ProductId, VariantId};

/// Errors from the durable cart storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing store failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted state could not be encoded or decoded.
    #[error("storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// One line of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    /// Resolved display name, including the variant name when one is
    /// selected (e.g. "Storage Case - Walnut").
    pub name: String,
    /// Parent price plus the selected variant's delta, captured when the
    /// line was added.
    pub unit_price: Decimal,
    pub quantity: i64,
    pub image: String,
}

impl CartLine {
    fn matches(&self, other: &Self) -> bool {
        self.product_id == other.product_id && self.variant_id == other.variant_id
    }

    fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Durable storage for the cart, written synchronously after every mutation.
pub trait CartStorage {
    /// Read the persisted lines. An empty store yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store is unreadable or undecodable.
    fn load(&self) -> Result<Vec<CartLine>, StorageError>;

    /// Replace the persisted lines.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be written.
    fn save(&self, lines: &[CartLine]) -> Result<(), StorageError>;
}

impl<S: CartStorage + ?Sized> CartStorage for &S {
    fn load(&self) -> Result<Vec<CartLine>, StorageError> {
        (**self).load()
    }

    fn save(&self, lines: &[CartLine]) -> Result<(), StorageError> {
        (**self).save(lines)
    }
}

/// Cart persistence in a local JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: std::path::PathBuf,
}

impl JsonFileStorage {
    #[must_use]
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CartStorage for JsonFileStorage {
    fn load(&self) -> Result<Vec<CartLine>, StorageError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    fn save(&self, lines: &[CartLine]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let encoded = serde_json::to_string(lines)?;
        std::fs::write(&self.path, encoded)?;
        Ok(())
    }
}

/// In-memory storage for tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    lines: std::sync::Mutex<Vec<CartLine>>,
    fail_saves: std::sync::atomic::AtomicBool,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent saves fail, for exercising persistence errors.
    pub fn fail_saves(&self) {
        self.fail_saves
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, Vec<CartLine>> {
        #[allow(clippy::unwrap_used)]
        self.lines.lock().unwrap()
    }
}

impl CartStorage for MemoryStorage {
    fn load(&self) -> Result<Vec<CartLine>, StorageError> {
        Ok(self.guard().clone())
    }

    fn save(&self, lines: &[CartLine]) -> Result<(), StorageError> {
        if self.fail_saves.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("save disabled")));
        }
        *self.guard() = lines.to_vec();
        Ok(())
    }
}

/// The shopper's cart.
///
/// Every mutating operation persists the resulting state before returning;
/// a persistence failure is surfaced as an error, never swallowed.
pub struct CartStore<S> {
    lines: Vec<CartLine>,
    storage: S,
}

impl<S: CartStorage> CartStore<S> {
    /// Open the cart, restoring any persisted lines.
    ///
    /// Unreadable or malformed persisted state degrades to an empty cart
    /// with a warning; a shopper must never be locked out of the store by a
    /// corrupt cart file.
    #[must_use]
    pub fn open(storage: S) -> Self {
        let lines = match storage.load() {
            Ok(lines) => lines,
            Err(e) => {
                tracing::warn!(error = %e, "failed to restore cart, starting empty");
                vec![]
            }
        };
        Self { lines, storage }
    }

    /// Add a line, merging into an existing (product, variant) line if one
    /// is present. Quantities below 1 are treated as 1.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the updated cart cannot be persisted.
    pub fn add_item(&mut self, mut line: CartLine) -> Result<(), StorageError> {
        line.quantity = line.quantity.max(1);

        if let Some(existing) = self.lines.iter_mut().find(|l| l.matches(&line)) {
            existing.quantity += line.quantity;
        } else {
            self.lines.push(line);
        }
        self.persist()
    }

    /// Remove every line for a product id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the updated cart cannot be persisted.
    pub fn remove_item(&mut self, product_id: ProductId) -> Result<(), StorageError> {
        self.lines.retain(|l| l.product_id != product_id);
        self.persist()
    }

    /// Set the quantity on every line for a product id; a quantity of zero
    /// or below behaves as [`Self::remove_item`].
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the updated cart cannot be persisted.
    pub fn update_quantity(
        &mut self,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<(), StorageError> {
        if quantity <= 0 {
            return self.remove_item(product_id);
        }

        for line in self.lines.iter_mut().filter(|l| l.product_id == product_id) {
            line.quantity = quantity;
        }
        self.persist()
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the emptied cart cannot be persisted.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.lines.clear();
        self.persist()
    }

    /// Sum of unit price x quantity over all lines.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Sum of quantities, for the cart badge.
    #[must_use]
    pub fn item_count(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// The current lines.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn persist(&self) -> Result<(), StorageError> {
        self.storage.save(&self.lines)
    }
}
