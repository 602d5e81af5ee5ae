//! Integration tests for Souq.
//!
//! Provides [`FakeBackend`], an in-process commerce API served by axum on an
//! ephemeral port. Tests in `tests/` point a real [`Storefront`] at it and
//! exercise the full HTTP path.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p souq-integration-tests
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let backend = FakeBackend::start().await?;
//! backend.add_product("A", "Linen shirt", Price::from_minor(1000));
//! backend.register_shopper("tok_jane");
//!
//! let (storefront, sink) = backend.storefront()?;
//! storefront.sign_in(Credential::new("tok_jane").unwrap())?;
//! storefront.cart().add(&ProductId::new("A"), Some(2)).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

mod routes;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use souq_core::{Price, ProductId, ProductSummary};
use souq_storefront::api::{HttpTransport, TransportError};
use souq_storefront::notify::RecordingSink;
use souq_storefront::storage::{KeyValueStore, MemoryStore};
use souq_storefront::{Storefront, StorefrontConfig};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

pub use store::{Faults, RecordedOrder, SavedKind};
use store::BackendState;

/// Commerce API double running on `127.0.0.1`.
///
/// The server task is aborted when the backend is dropped.
#[derive(Debug)]
pub struct FakeBackend {
    base_url: Url,
    state: BackendState,
    server: JoinHandle<()>,
}

impl FakeBackend {
    /// Bind an ephemeral port and start serving.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the listener cannot be bound.
    pub async fn start() -> std::io::Result<Self> {
        let state = BackendState::default();
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let base_url = Url::parse(&format!("http://{addr}/")).map_err(std::io::Error::other)?;

        let app = routes::router(state.clone());
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Fake backend stopped: {e}");
            }
        });

        tracing::debug!(%base_url, "Fake backend listening");
        Ok(Self {
            base_url,
            state,
            server,
        })
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Client configuration pointing at this backend with a short timeout.
    #[must_use]
    pub fn config(&self) -> StorefrontConfig {
        StorefrontConfig::new(self.base_url.clone()).with_request_timeout(Duration::from_secs(2))
    }

    /// A storefront over real HTTP with in-memory storage and a recording sink.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the HTTP client cannot be built.
    pub fn storefront(&self) -> Result<(Storefront, Arc<RecordingSink>), TransportError> {
        self.storefront_with(self.config(), Arc::new(MemoryStore::new()))
    }

    /// A storefront over real HTTP with the given config and storage.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the HTTP client cannot be built.
    pub fn storefront_with(
        &self,
        config: StorefrontConfig,
        storage: Arc<dyn KeyValueStore>,
    ) -> Result<(Storefront, Arc<RecordingSink>), TransportError> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        let sink = Arc::new(RecordingSink::new());
        let storefront = Storefront::with_parts(config, transport, storage, sink.clone());
        Ok((storefront, sink))
    }

    /// Add a product to the catalog.
    pub fn add_product(&self, id: &str, name: &str, price: Price) {
        self.state.lock().catalog.insert(
            ProductId::new(id),
            ProductSummary {
                name: name.to_string(),
                price,
                image: Some(format!("https://cdn.souq.example/{id}.jpg")),
                store: None,
            },
        );
    }

    /// Accept `token` as a valid bearer credential.
    pub fn register_shopper(&self, token: &str) {
        self.state
            .lock()
            .shoppers
            .entry(token.to_string())
            .or_default();
    }

    /// Server-side cart lines for a shopper.
    #[must_use]
    pub fn cart_lines(&self, token: &str) -> Vec<(ProductId, u32)> {
        self.state
            .lock()
            .shoppers
            .get(token)
            .map(|shopper| shopper.cart.clone())
            .unwrap_or_default()
    }

    /// Server-side saved products for a shopper.
    #[must_use]
    pub fn saved(&self, token: &str, kind: SavedKind) -> Vec<ProductId> {
        self.state
            .lock()
            .shoppers
            .get(token)
            .map(|shopper| shopper.saved(kind).to_vec())
            .unwrap_or_default()
    }

    /// Empty a shopper's cart behind the client's back.
    pub fn empty_cart(&self, token: &str) {
        if let Some(shopper) = self.state.lock().shoppers.get_mut(token) {
            shopper.cart.clear();
        }
    }

    /// Orders accepted so far.
    #[must_use]
    pub fn orders(&self) -> Vec<RecordedOrder> {
        self.state.lock().orders.clone()
    }

    /// Number of requests received.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.state.lock().requests
    }

    /// Replace the active faults.
    pub fn set_faults(&self, faults: Faults) {
        self.state.lock().faults = faults;
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}
