//! The storefront bundle: session, the three collection caches and checkout
//! wired to one transport and one notification sink.

use std::sync::Arc;

use souq_core::{AmountOverflow, CartItem, Credential, SavedItem, Totals};
use tracing::info;

use crate::api::{Endpoints, HttpTransport, Transport, TransportError};
use crate::checkout::{CheckoutError, CheckoutOrchestrator};
use crate::collection::{CacheDeps, CartCache, CompareCache, SharedSnapshot, WishlistCache};
use crate::config::StorefrontConfig;
use crate::error::ClientError;
use crate::notify::{NotificationSink, TracingSink};
use crate::session::SessionStore;
use crate::storage::{FileStore, KeyValueStore, PersistedDraftStore, StorageError};

/// Result of [`Storefront::refresh_all`], one entry per collection.
#[derive(Debug)]
pub struct RefreshAll {
    pub cart: Result<SharedSnapshot<CartItem>, ClientError>,
    pub wishlist: Result<SharedSnapshot<SavedItem>, ClientError>,
    pub compare: Result<SharedSnapshot<SavedItem>, ClientError>,
}

impl RefreshAll {
    /// Whether all three refreshes succeeded.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.cart.is_ok() && self.wishlist.is_ok() && self.compare.is_ok()
    }
}

/// Client-side storefront state.
///
/// This struct is cheaply cloneable via `Arc`; clones share the same
/// session, caches and sink.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    deps: CacheDeps,
    drafts: PersistedDraftStore,
    cart: Arc<CartCache>,
    wishlist: Arc<WishlistCache>,
    compare: Arc<CompareCache>,
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("config", &self.inner.config)
            .field("session", &self.inner.deps.session)
            .field("cart", &self.inner.cart)
            .field("wishlist", &self.inner.wishlist)
            .field("compare", &self.inner.compare)
            .finish()
    }
}

impl Storefront {
    /// Create a storefront talking HTTP to the configured API, storing state
    /// under `config.state_dir` and reporting outcomes to the log.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, TransportError> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        let storage = Arc::new(FileStore::new(config.state_dir.clone()));
        info!(
            api = %transport.base_url(),
            state_dir = %storage.dir().display(),
            "Storefront ready"
        );
        Ok(Self::with_parts(
            config,
            transport,
            storage,
            Arc::new(TracingSink),
        ))
    }

    /// Create a storefront from injected collaborators.
    ///
    /// A pre-issued `api_token` in the config seeds the in-memory session.
    #[must_use]
    pub fn with_parts(
        config: StorefrontConfig,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let session = Arc::new(SessionStore::new(Arc::clone(&storage)));
        if let Some(token) = &config.api_token {
            session.set_credential(Some(Credential::from(token.clone())));
        }

        let deps = CacheDeps {
            session,
            transport,
            notifier,
            timeout: config.request_timeout,
        };

        Self {
            inner: Arc::new(StorefrontInner {
                drafts: PersistedDraftStore::new(storage),
                cart: Arc::new(CartCache::new(Endpoints::cart(), deps.clone())),
                wishlist: Arc::new(WishlistCache::new(Endpoints::wishlist(), deps.clone())),
                compare: Arc::new(CompareCache::new(Endpoints::compare(), deps.clone())),
                deps,
                config,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.deps.session
    }

    #[must_use]
    pub fn cart(&self) -> &CartCache {
        &self.inner.cart
    }

    #[must_use]
    pub fn wishlist(&self) -> &WishlistCache {
        &self.inner.wishlist
    }

    #[must_use]
    pub fn compare(&self) -> &CompareCache {
        &self.inner.compare
    }

    /// Persisted checkout draft storage.
    #[must_use]
    pub fn drafts(&self) -> &PersistedDraftStore {
        &self.inner.drafts
    }

    /// Cart totals with the configured shipping fee.
    ///
    /// # Errors
    ///
    /// Returns `AmountOverflow` when the figures leave the decimal range.
    pub fn totals(&self) -> Result<Totals, AmountOverflow> {
        Totals::for_cart(&self.cart().snapshot().items, self.config().shipping_fee)
    }

    /// Enter the checkout workflow against the current cart snapshot.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` when the cart is empty.
    pub fn checkout(&self) -> Result<CheckoutOrchestrator, CheckoutError> {
        CheckoutOrchestrator::enter(
            Arc::clone(&self.inner.cart),
            self.inner.drafts.clone(),
            self.inner.deps.clone(),
            self.inner.config.shipping_fee,
        )
    }

    /// Record a new credential and drop collections cached for any previous
    /// shopper.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the credential cannot be persisted.
    pub fn sign_in(&self, credential: Credential) -> Result<(), StorageError> {
        self.reset_collections();
        self.session().sign_in(credential)
    }

    /// Destroy the credential and drop all cached collections.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the stored credential cannot be deleted.
    pub fn sign_out(&self) -> Result<(), StorageError> {
        self.reset_collections();
        self.session().sign_out()
    }

    /// Refresh the three collections concurrently.
    pub async fn refresh_all(&self) -> RefreshAll {
        let (cart, wishlist, compare) = tokio::join!(
            self.inner.cart.refresh(),
            self.inner.wishlist.refresh(),
            self.inner.compare.refresh(),
        );
        let outcome = RefreshAll {
            cart,
            wishlist,
            compare,
        };
        info!(ok = outcome.is_ok(), "Collections refreshed");
        outcome
    }

    fn reset_collections(&self) {
        self.inner.cart.reset();
        self.inner.wishlist.reset();
        self.inner.compare.reset();
    }
}
