//! In-memory state behind the fake commerce backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use souq_core::{CheckoutDraft, Price, ProductId, ProductSummary};

/// Which saved-product list a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SavedKind {
    Wishlist,
    Compare,
}

impl SavedKind {
    /// Noun used in response messages.
    #[must_use]
    pub const fn noun(self) -> &'static str {
        match self {
            Self::Wishlist => "wishlist",
            Self::Compare => "compare list",
        }
    }

    /// Capitalized noun used at the start of response messages.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Wishlist => "Wishlist",
            Self::Compare => "Compare list",
        }
    }
}

/// One shopper's server-side collections.
#[derive(Debug, Clone, Default)]
pub struct Shopper {
    /// Cart lines in insertion order.
    pub cart: Vec<(ProductId, u32)>,
    pub wishlist: Vec<ProductId>,
    pub compare: Vec<ProductId>,
}

impl Shopper {
    pub fn saved(&self, kind: SavedKind) -> &[ProductId] {
        match kind {
            SavedKind::Wishlist => &self.wishlist,
            SavedKind::Compare => &self.compare,
        }
    }

    pub fn saved_mut(&mut self, kind: SavedKind) -> &mut Vec<ProductId> {
        match kind {
            SavedKind::Wishlist => &mut self.wishlist,
            SavedKind::Compare => &mut self.compare,
        }
    }
}

/// An order accepted by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedOrder {
    pub order_id: String,
    pub token: String,
    pub shipping: CheckoutDraft,
    pub lines: Vec<(ProductId, u32)>,
    pub total_price: Price,
}

/// Switchable misbehaviour.
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    /// Answer `405` to `DELETE` on a collection, forcing the `POST .../clear` path.
    pub delete_clear_unsupported: bool,
    /// Sleep before answering every request.
    pub latency: Option<Duration>,
}

#[derive(Debug)]
pub struct Store {
    pub catalog: BTreeMap<ProductId, ProductSummary>,
    pub shoppers: HashMap<String, Shopper>,
    pub orders: Vec<RecordedOrder>,
    pub faults: Faults,
    pub shipping_fee: Price,
    pub requests: usize,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            catalog: BTreeMap::new(),
            shoppers: HashMap::new(),
            orders: Vec::new(),
            faults: Faults::default(),
            shipping_fee: Price::from_minor(6000),
            requests: 0,
        }
    }
}

/// Shared handle to the store.
#[derive(Debug, Clone, Default)]
pub struct BackendState {
    inner: Arc<Mutex<Store>>,
}

impl BackendState {
    /// Lock the store. Never hold the guard across an `.await`.
    pub fn lock(&self) -> MutexGuard<'_, Store> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
