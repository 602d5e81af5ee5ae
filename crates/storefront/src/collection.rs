//! Local mirrors of server-owned collections.
//!
//! One generic [`RemoteCollectionCache`] backs the cart, the wishlist and the
//! comparison set. Each instance owns its snapshot and its [`MutationGate`].
//!
//! # Protocol
//!
//! - `refresh` replaces the whole snapshot with the server's answer.
//! - `add`, `update` and `remove` send the mutation and, on the exact
//!   acknowledgment, re-fetch before returning. The server does not echo the
//!   denormalized product fields, so nothing is ever appended locally.
//! - `clear` sets the canonical empty snapshot directly on acknowledgment and
//!   retries once with the alternate verb if the primary verb is refused.
//! - Each attempt produces exactly one notification, except attempts rejected
//!   by the gate, which are silent no-ops.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use souq_core::{CartItem, CollectionItem, CollectionSnapshot, Credential, Price, ProductId, SavedItem};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::api::{
    ApiRequest, ApiResponse, Endpoints, Route, Transport, classify_fetch, classify_mutation,
    send_bounded,
};
use crate::error::{ClientError, add_breadcrumb, capture_unexpected};
use crate::gate::MutationGate;
use crate::notify::{Notification, NotificationSink};
use crate::session::SessionStore;

const QUANTITY_TOO_LOW: &str = "Quantity must be at least 1";

/// Cart cache.
pub type CartCache = RemoteCollectionCache<CartItem>;

/// Wishlist cache.
pub type WishlistCache = RemoteCollectionCache<SavedItem>;

/// Comparison set cache.
pub type CompareCache = RemoteCollectionCache<SavedItem>;

/// Shared, immutable view of a snapshot.
pub type SharedSnapshot<T> = Arc<CollectionSnapshot<T>>;

/// Collaborators every cache needs.
#[derive(Clone)]
pub struct CacheDeps {
    pub session: Arc<SessionStore>,
    pub transport: Arc<dyn Transport>,
    pub notifier: Arc<dyn NotificationSink>,
    /// Bounded wait for each remote call.
    pub timeout: Duration,
}

/// Fetch response body.
#[derive(Debug, Deserialize)]
struct FetchBody<T> {
    items: Vec<T>,
    #[serde(default)]
    count: Option<u32>,
    #[serde(default, alias = "subtotal")]
    aggregate: Option<Price>,
}

impl<T: CollectionItem> FetchBody<T> {
    fn into_snapshot(self) -> Result<CollectionSnapshot<T>, ClientError> {
        let mut snapshot = CollectionSnapshot::from_items(self.items)
            .map_err(|e| ClientError::Malformed(format!("item totals: {e}")))?;
        if let Some(count) = self.count {
            snapshot.count = count;
        }
        if let Some(aggregate) = self.aggregate {
            snapshot.aggregate = aggregate;
        }
        Ok(snapshot)
    }
}

/// Decode a fetch response into a snapshot.
fn decode_snapshot<T: CollectionItem>(
    response: &ApiResponse,
    empty_signal: &str,
) -> Result<CollectionSnapshot<T>, ClientError> {
    let Some(body) = classify_fetch(response, empty_signal)? else {
        return Ok(CollectionSnapshot::empty());
    };

    let wire: FetchBody<T> = serde_json::from_value(body.clone())
        .map_err(|e| ClientError::Malformed(e.to_string()))?;
    wire.into_snapshot()
}

/// Local mirror of one server-owned collection.
pub struct RemoteCollectionCache<T: CollectionItem> {
    endpoints: Endpoints,
    deps: CacheDeps,
    gate: MutationGate,
    snapshot: watch::Sender<SharedSnapshot<T>>,
    /// Bumped by `reset`; responses that started under an older epoch are dropped.
    epoch: AtomicU64,
}

impl<T: CollectionItem> std::fmt::Debug for RemoteCollectionCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCollectionCache")
            .field("collection", &self.endpoints.noun)
            .field("in_flight", &self.gate.is_held())
            .field("count", &self.snapshot.borrow().count)
            .finish_non_exhaustive()
    }
}

impl<T: CollectionItem> RemoteCollectionCache<T> {
    /// Create a cache holding the empty snapshot. Nothing is fetched until
    /// [`refresh`](Self::refresh) is called.
    #[must_use]
    pub fn new(endpoints: Endpoints, deps: CacheDeps) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(CollectionSnapshot::empty()));
        Self {
            endpoints,
            deps,
            gate: MutationGate::new(),
            snapshot,
            epoch: AtomicU64::new(0),
        }
    }

    /// Endpoint definitions this cache talks to.
    #[must_use]
    pub const fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SharedSnapshot<T> {
        self.snapshot.borrow().clone()
    }

    /// Watch snapshot replacements.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SharedSnapshot<T>> {
        self.snapshot.subscribe()
    }

    /// Whether the current snapshot holds the product.
    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.snapshot.borrow().contains(product_id)
    }

    /// Whether a fetch or mutation is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.gate.is_held()
    }

    /// Drop local state without contacting the server.
    ///
    /// Used on sign-out. Any response still in flight is discarded when it
    /// arrives.
    pub fn reset(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.snapshot
            .send_replace(Arc::new(CollectionSnapshot::empty()));
        debug!(collection = self.endpoints.noun, "Local snapshot reset");
    }

    // =========================================================================
    // Public operations
    // =========================================================================

    /// Re-fetch the authoritative snapshot.
    ///
    /// Without a credential this is a no-op returning the last known
    /// snapshot. Failures leave the snapshot untouched.
    ///
    /// # Errors
    ///
    /// Returns `Busy` when another operation is in flight, otherwise the
    /// classified failure (which has already been reported).
    #[instrument(skip(self), fields(collection = self.endpoints.noun))]
    pub async fn refresh(&self) -> Result<SharedSnapshot<T>, ClientError> {
        let Some(_guard) = self.gate.try_acquire() else {
            return Err(self.busy("refresh"));
        };

        if self.deps.session.current_credential().is_none() {
            debug!("No credential, skipping refresh");
            return Ok(self.snapshot());
        }

        self.reload().await.inspect_err(|e| self.report_failure(e))
    }

    /// Add a product. The cart sends `quantity` (default 1); other
    /// collections ignore it.
    ///
    /// # Errors
    ///
    /// Returns `Busy`, `AuthenticationMissing`, `Rejected` (e.g. duplicate)
    /// or a transport classification. All but `Busy` are reported.
    #[instrument(skip(self), fields(collection = self.endpoints.noun, product_id = %product_id))]
    pub async fn add(
        &self,
        product_id: &ProductId,
        quantity: Option<u32>,
    ) -> Result<SharedSnapshot<T>, ClientError> {
        self.mutate("add", product_id, |endpoints| {
            let quantity = quantity.unwrap_or(1);
            if quantity == 0 {
                return Err(QUANTITY_TOO_LOW.to_string());
            }

            let body = if endpoints.update.is_some() {
                json!({ "productId": product_id, "quantity": quantity })
            } else {
                json!({ "productId": product_id })
            };
            let route = &endpoints.add;
            let request = ApiRequest::new(route.method.clone(), route.path()).with_body(body);
            Ok((request, endpoints.added_ack))
        })
        .await
    }

    /// Change a line quantity. Zero is refused; use [`remove`](Self::remove).
    ///
    /// # Errors
    ///
    /// As for [`add`](Self::add), plus `Rejected` when the collection has no
    /// quantities.
    #[instrument(skip(self), fields(collection = self.endpoints.noun, product_id = %product_id))]
    pub async fn update(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<SharedSnapshot<T>, ClientError> {
        self.mutate("update", product_id, |endpoints| {
            let (Some(route), Some(ack)) = (&endpoints.update, endpoints.updated_ack) else {
                return Err(format!(
                    "{} does not support quantity changes",
                    capitalize(endpoints.noun)
                ));
            };
            if quantity == 0 {
                return Err(QUANTITY_TOO_LOW.to_string());
            }

            let request = ApiRequest::new(route.method.clone(), route.path_for(product_id))
                .with_body(json!({ "quantity": quantity }));
            Ok((request, ack))
        })
        .await
    }

    /// Remove a product.
    ///
    /// # Errors
    ///
    /// As for [`add`](Self::add).
    #[instrument(skip(self), fields(collection = self.endpoints.noun, product_id = %product_id))]
    pub async fn remove(&self, product_id: &ProductId) -> Result<SharedSnapshot<T>, ClientError> {
        self.mutate("remove", product_id, |endpoints| {
            let route = &endpoints.remove;
            let request = ApiRequest::new(route.method.clone(), route.path_for(product_id));
            Ok((request, endpoints.removed_ack))
        })
        .await
    }

    /// Empty the collection server-side.
    ///
    /// # Errors
    ///
    /// Returns `Busy`, `AuthenticationMissing` or the classification of the
    /// last attempted verb.
    #[instrument(skip(self), fields(collection = self.endpoints.noun))]
    pub async fn clear(&self) -> Result<SharedSnapshot<T>, ClientError> {
        match self.run_clear().await {
            Ok((message, snapshot)) => {
                self.deps.notifier.report(Notification::success(message));
                Ok(snapshot)
            }
            Err(ClientError::Busy) => Err(ClientError::Busy),
            Err(e) => {
                self.report_failure(&e);
                Err(e)
            }
        }
    }

    /// Clear after an order without notifying; the caller owns the
    /// shopper-facing outcome.
    ///
    /// Unlike [`clear`](Self::clear) this never gives up on a held gate. The
    /// local snapshot is emptied first, which also discards whatever an
    /// in-flight fetch brings back, then the server clear is sent as soon as
    /// that operation finishes.
    pub(crate) async fn clear_after_order(&self) -> Result<SharedSnapshot<T>, ClientError> {
        self.reset();
        let _guard = self.gate.acquire().await;
        self.clear_held().await.map(|(_, snapshot)| snapshot)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Shared add/update/remove protocol: gate, validate, send, classify,
    /// re-fetch, report.
    ///
    /// `prepare` builds the request and its acknowledgment, or refuses the
    /// attempt locally. It runs only once the gate is held, so a busy attempt
    /// stays silent even when its arguments are invalid.
    async fn mutate<F>(
        &self,
        action: &'static str,
        product_id: &ProductId,
        prepare: F,
    ) -> Result<SharedSnapshot<T>, ClientError>
    where
        F: FnOnce(&Endpoints) -> Result<(ApiRequest, &'static str), String> + Send,
    {
        let Some(_guard) = self.gate.try_acquire() else {
            return Err(self.busy(action));
        };

        let (request, ack) = prepare(&self.endpoints).map_err(|m| self.reject_locally(&m))?;

        add_breadcrumb(
            self.endpoints.noun,
            action,
            Some(&[("product_id", product_id.as_str())]),
        );

        let outcome = async {
            let credential = self.credential()?;
            let response = self.send(request.with_credential(credential)).await?;
            let message = classify_mutation(&response, ack)?;
            let snapshot = self.reload().await?;
            Ok::<_, ClientError>((message, snapshot))
        }
        .await;

        match outcome {
            Ok((message, snapshot)) => {
                info!(action, count = snapshot.count, "Mutation acknowledged");
                self.deps.notifier.report(Notification::success(message));
                Ok(snapshot)
            }
            Err(e) => {
                self.report_failure(&e);
                Err(e)
            }
        }
    }

    async fn run_clear(&self) -> Result<(String, SharedSnapshot<T>), ClientError> {
        let Some(_guard) = self.gate.try_acquire() else {
            return Err(self.busy("clear"));
        };
        self.clear_held().await
    }

    /// Primary clear, then the alternate verb once. Caller holds the gate.
    async fn clear_held(&self) -> Result<(String, SharedSnapshot<T>), ClientError> {
        add_breadcrumb(self.endpoints.noun, "clear", None);

        let message = match self.clear_with(&self.endpoints.clear).await {
            Ok(message) => message,
            Err(e) if triggers_clear_fallback(&e) => {
                warn!(
                    error = %e,
                    fallback = %self.endpoints.clear_fallback.method,
                    "Clear refused, retrying once with alternate verb"
                );
                self.clear_with(&self.endpoints.clear_fallback).await?
            }
            Err(e) => return Err(e),
        };

        info!("Collection cleared");
        Ok((message, self.replace(CollectionSnapshot::empty())))
    }

    async fn clear_with(&self, route: &Route) -> Result<String, ClientError> {
        let credential = self.credential()?;
        let request = ApiRequest::new(route.method.clone(), route.path()).with_credential(credential);
        let response = self.send(request).await?;
        classify_mutation(&response, self.endpoints.cleared_ack)
    }

    /// Fetch and install the authoritative snapshot. Caller holds the gate.
    async fn reload(&self) -> Result<SharedSnapshot<T>, ClientError> {
        let epoch = self.epoch.load(Ordering::Acquire);
        let credential = self.credential()?;
        let route = &self.endpoints.fetch;
        let request = ApiRequest::new(route.method.clone(), route.path()).with_credential(credential);

        let response = self.send(request).await?;
        let snapshot = decode_snapshot::<T>(&response, self.endpoints.empty_signal)?;

        if self.epoch.load(Ordering::Acquire) != epoch {
            debug!("Discarding snapshot fetched before reset");
            return Ok(self.snapshot());
        }

        debug!(count = snapshot.count, "Snapshot replaced");
        Ok(self.replace(snapshot))
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        send_bounded(self.deps.transport.as_ref(), self.deps.timeout, request).await
    }

    /// Re-resolve the credential; never cached across suspension points.
    fn credential(&self) -> Result<Credential, ClientError> {
        self.deps
            .session
            .current_credential()
            .ok_or(ClientError::AuthenticationMissing)
    }

    fn replace(&self, snapshot: CollectionSnapshot<T>) -> SharedSnapshot<T> {
        let shared = Arc::new(snapshot);
        self.snapshot.send_replace(Arc::clone(&shared));
        shared
    }

    fn busy(&self, action: &'static str) -> ClientError {
        debug!(
            collection = self.endpoints.noun,
            action, "Operation already in flight, ignoring"
        );
        ClientError::Busy
    }

    fn reject_locally(&self, message: &str) -> ClientError {
        let err = ClientError::Rejected(message.to_string());
        self.report_failure(&err);
        err
    }

    fn report_failure(&self, err: &ClientError) {
        warn!(
            collection = self.endpoints.noun,
            error = %err,
            kind = ?err.kind(),
            transient = err.kind().is_transient(),
            "Collection operation failed"
        );
        capture_unexpected(err);
        self.deps
            .notifier
            .report(Notification::error(err.user_message()));
    }
}

/// Whether a refused primary clear should be retried with the alternate verb.
///
/// Connection failures and missing credentials would fail the same way again.
const fn triggers_clear_fallback(err: &ClientError) -> bool {
    matches!(
        err,
        ClientError::Rejected(_) | ClientError::Timeout(_) | ClientError::Malformed(_)
    )
}

fn capitalize(noun: &str) -> String {
    let mut chars = noun.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::time::Duration;

    use reqwest::Method;
    use serde_json::json;

    use super::*;
    use crate::api::TransportError;
    use crate::notify::{RecordingSink, Severity};
    use crate::storage::MemoryStore;
    use crate::testing::{ScriptedTransport, cart_body, cart_item_json, reply};

    const TIMEOUT: Duration = Duration::from_secs(5);

    struct Fixture {
        cart: CartCache,
        transport: Arc<ScriptedTransport>,
        sink: Arc<RecordingSink>,
        session: Arc<SessionStore>,
    }

    struct Harness {
        transport: Arc<ScriptedTransport>,
        sink: Arc<RecordingSink>,
        session: Arc<SessionStore>,
        deps: CacheDeps,
    }

    fn harness(signed_in: bool) -> Harness {
        let transport = Arc::new(ScriptedTransport::new());
        let sink = Arc::new(RecordingSink::new());
        let session = Arc::new(SessionStore::new(Arc::new(MemoryStore::new())));
        if signed_in {
            session.set_credential(Credential::new("tok_test"));
        }
        let deps = CacheDeps {
            session: session.clone(),
            transport: transport.clone(),
            notifier: sink.clone(),
            timeout: TIMEOUT,
        };
        Harness {
            transport,
            sink,
            session,
            deps,
        }
    }

    fn cart_fixture(signed_in: bool) -> Fixture {
        let h = harness(signed_in);
        Fixture {
            cart: CartCache::new(Endpoints::cart(), h.deps),
            transport: h.transport,
            sink: h.sink,
            session: h.session,
        }
    }

    fn two_line_cart() -> serde_json::Value {
        cart_body(&[cart_item_json("A", 2, 10.0), cart_item_json("B", 1, 5.0)])
    }

    #[tokio::test]
    async fn test_refresh_without_credential_is_noop() {
        let f = cart_fixture(false);

        let snapshot = f.cart.refresh().await.unwrap();

        assert!(snapshot.is_empty());
        assert!(f.transport.requests().is_empty());
        assert!(f.sink.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_replaces_snapshot() {
        let f = cart_fixture(true);
        f.transport.push(reply(200, two_line_cart()));

        let snapshot = f.cart.refresh().await.unwrap();

        assert_eq!(snapshot.items.len(), 2);
        assert_eq!(snapshot.count, 2);
        assert_eq!(snapshot.aggregate, Price::from_minor(2500));
        assert_eq!(*f.cart.snapshot(), *snapshot);

        let requests = f.transport.requests();
        assert_eq!(requests[0].method, Method::GET);
        assert_eq!(requests[0].path, "api/cart");
        assert_eq!(requests[0].credential.as_ref().map(Credential::expose), Some("tok_test"));
    }

    #[tokio::test]
    async fn test_refresh_twice_is_idempotent() {
        let f = cart_fixture(true);
        f.transport.push(reply(200, two_line_cart()));
        f.transport.push(reply(200, two_line_cart()));

        let first = f.cart.refresh().await.unwrap();
        let second = f.cart.refresh().await.unwrap();

        assert_eq!(*first, *second);
    }

    #[tokio::test]
    async fn test_empty_signal_is_valid_empty_snapshot() {
        let f = cart_fixture(true);
        f.transport.push(reply(200, two_line_cart()));
        f.cart.refresh().await.unwrap();

        f.transport.push(reply(404, json!({ "message": "Cart not found" })));
        let snapshot = f.cart.refresh().await.unwrap();

        assert!(snapshot.is_empty());
        assert!(f.sink.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_prior_snapshot() {
        let f = cart_fixture(true);
        f.transport.push(reply(200, two_line_cart()));
        let before = f.cart.refresh().await.unwrap();

        f.transport.push(reply(200, json!({ "message": "ok" })));
        let err = f.cart.refresh().await.unwrap_err();

        assert!(matches!(err, ClientError::Malformed(_)));
        assert_eq!(*f.cart.snapshot(), *before);
        assert_eq!(f.sink.notifications().len(), 1);
        assert_eq!(f.sink.last().unwrap().severity, Severity::Error);
    }

    #[tokio::test]
    async fn test_overflowing_line_total_is_malformed() {
        let f = cart_fixture(true);
        f.transport.push(reply(200, two_line_cart()));
        let before = f.cart.refresh().await.unwrap();

        let huge = json!({
            "productId": "A",
            "quantity": 2,
            "product": { "name": "Gold bar", "price": "79228162514264337593543950335" },
        });
        f.transport.push(reply(200, cart_body(&[huge])));
        let err = f.cart.refresh().await.unwrap_err();

        assert!(matches!(err, ClientError::Malformed(_)));
        assert_eq!(*f.cart.snapshot(), *before);
        assert_eq!(f.sink.notifications().len(), 1);
        assert_eq!(f.sink.last().unwrap().severity, Severity::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_started_before_reset_is_discarded() {
        let f = cart_fixture(true);
        f.transport
            .push_delayed(reply(200, two_line_cart()), Duration::from_millis(100));

        let sign_out = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            f.cart.reset();
        };
        let (refreshed, ()) = tokio::join!(f.cart.refresh(), sign_out);

        assert!(refreshed.unwrap().is_empty());
        assert!(f.cart.snapshot().is_empty());
        assert!(f.sink.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_add_refreshes_after_acknowledgment() {
        let f = cart_fixture(true);
        f.transport.push(reply(201, json!({ "message": "Product added to cart successfully" })));
        f.transport.push(reply(200, two_line_cart()));

        let snapshot = f.cart.add(&ProductId::new("A"), Some(2)).await.unwrap();

        assert_eq!(snapshot.items.len(), 2);
        let requests = f.transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[0].body, Some(json!({ "productId": "A", "quantity": 2 })));
        assert_eq!(requests[1].method, Method::GET);

        assert_eq!(
            f.sink.notifications(),
            vec![Notification::success("Product added to cart successfully")]
        );
    }

    #[tokio::test]
    async fn test_failed_refetch_after_acknowledgment_keeps_prior_snapshot() {
        let f = cart_fixture(true);
        f.transport.push(reply(200, two_line_cart()));
        let before = f.cart.refresh().await.unwrap();

        f.transport.push(reply(201, json!({ "message": "Product added to cart successfully" })));
        f.transport.push(reply(503, json!({ "message": "Service unavailable" })));
        let err = f.cart.add(&ProductId::new("C"), None).await.unwrap_err();

        assert!(matches!(err, ClientError::Exhausted(_)));
        assert_eq!(*f.cart.snapshot(), *before);
        assert_eq!(f.transport.requests().len(), 3);
        assert_eq!(
            f.sink.notifications(),
            vec![Notification::error(
                "The store is busy right now. Please try again shortly."
            )]
        );
    }

    #[tokio::test]
    async fn test_add_without_credential_makes_no_call() {
        let f = cart_fixture(false);

        let err = f.cart.add(&ProductId::new("A"), None).await.unwrap_err();

        assert!(matches!(err, ClientError::AuthenticationMissing));
        assert!(f.transport.requests().is_empty());
        assert_eq!(
            f.sink.notifications(),
            vec![Notification::error("Please sign in to continue")]
        );
    }

    #[tokio::test]
    async fn test_duplicate_add_reports_server_message_without_mutation() {
        let f = cart_fixture(true);
        f.transport.push(reply(200, two_line_cart()));
        let before = f.cart.refresh().await.unwrap();

        f.transport.push(reply(400, json!({ "message": "Product already in cart" })));
        let err = f.cart.add(&ProductId::new("A"), None).await.unwrap_err();

        assert!(matches!(err, ClientError::Rejected(_)));
        assert_eq!(*f.cart.snapshot(), *before);
        assert_eq!(f.transport.requests().len(), 2, "no refresh after rejection");
        assert_eq!(
            f.sink.notifications(),
            vec![Notification::error("Product already in cart")]
        );
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_state_untouched() {
        let f = cart_fixture(true);
        f.transport
            .push_error(TransportError::Connect("connection refused".to_string()));

        let err = f.cart.remove(&ProductId::new("A")).await.unwrap_err();

        assert!(matches!(err, ClientError::Unreachable(_)));
        assert!(f.cart.snapshot().is_empty());
        assert!(!f.cart.is_loading());
        assert_eq!(f.sink.notifications().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_releases_gate() {
        let Harness {
            transport,
            sink,
            mut deps,
            ..
        } = harness(true);
        deps.timeout = Duration::from_millis(100);
        let cart = CartCache::new(Endpoints::cart(), deps);

        transport.push_delayed(
            reply(200, json!({ "message": "Product added to cart successfully" })),
            Duration::from_secs(30),
        );

        let err = cart.add(&ProductId::new("A"), None).await.unwrap_err();

        assert!(matches!(err, ClientError::Timeout(_)));
        assert!(!cart.is_loading());
        assert_eq!(
            sink.notifications(),
            vec![Notification::error("The request timed out. Please try again.")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_mutation_is_rejected() {
        let f = cart_fixture(true);
        f.transport.push_delayed(
            reply(201, json!({ "message": "Product added to cart successfully" })),
            Duration::from_millis(50),
        );
        f.transport.push(reply(200, cart_body(&[cart_item_json("A", 1, 10.0)])));

        let a = ProductId::new("A");
        let b = ProductId::new("B");
        let (first, second) = tokio::join!(f.cart.add(&a, None), f.cart.add(&b, None));

        let first = first.unwrap();
        assert!(matches!(second, Err(ClientError::Busy)));
        assert_eq!(first.items.len(), 1);
        assert_eq!(*f.cart.snapshot(), *first);
        assert_eq!(f.transport.requests().len(), 2);
        assert_eq!(f.sink.notifications().len(), 1, "busy attempt is silent");
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_attempt_with_invalid_quantity_is_silent() {
        let f = cart_fixture(true);
        f.transport.push_delayed(
            reply(201, json!({ "message": "Product added to cart successfully" })),
            Duration::from_millis(50),
        );
        f.transport.push(reply(200, cart_body(&[cart_item_json("A", 1, 10.0)])));

        let a = ProductId::new("A");
        let (added, updated) = tokio::join!(f.cart.add(&a, None), f.cart.update(&a, 0));

        assert!(added.is_ok());
        assert!(matches!(updated, Err(ClientError::Busy)));
        assert_eq!(
            f.sink.notifications(),
            vec![Notification::success("Product added to cart successfully")]
        );
    }

    #[tokio::test]
    async fn test_update_rejects_zero_quantity_locally() {
        let f = cart_fixture(true);

        let err = f.cart.update(&ProductId::new("A"), 0).await.unwrap_err();

        assert!(matches!(err, ClientError::Rejected(ref m) if m == "Quantity must be at least 1"));
        assert!(f.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_update_sends_patch_and_refreshes() {
        let f = cart_fixture(true);
        f.transport.push(reply(200, json!({ "message": "Quantity updated successfully" })));
        f.transport.push(reply(200, cart_body(&[cart_item_json("A", 3, 10.0)])));

        let snapshot = f.cart.update(&ProductId::new("A"), 3).await.unwrap();

        assert_eq!(snapshot.items[0].quantity, 3);
        let requests = f.transport.requests();
        assert_eq!(requests[0].method, Method::PATCH);
        assert_eq!(requests[0].path, "api/cart/A");
        assert_eq!(requests[0].body, Some(json!({ "quantity": 3 })));
    }

    #[tokio::test]
    async fn test_wishlist_has_no_quantity_updates() {
        let Harness {
            transport,
            sink,
            deps,
            ..
        } = harness(true);
        let wishlist = WishlistCache::new(Endpoints::wishlist(), deps);

        let err = wishlist.update(&ProductId::new("A"), 2).await.unwrap_err();

        assert!(matches!(err, ClientError::Rejected(ref m) if m == "Wishlist does not support quantity changes"));
        assert!(transport.requests().is_empty());
        assert_eq!(sink.notifications().len(), 1);
    }

    #[tokio::test]
    async fn test_wishlist_add_omits_quantity() {
        let Harness {
            transport, deps, ..
        } = harness(true);
        let wishlist = WishlistCache::new(Endpoints::wishlist(), deps);
        transport.push(reply(201, json!({ "message": "Product added to wishlist successfully" })));
        transport.push(reply(200, json!({ "items": [], "count": 0, "aggregate": 0 })));

        wishlist.add(&ProductId::new("W1"), Some(4)).await.unwrap();

        assert_eq!(transport.requests()[0].body, Some(json!({ "productId": "W1" })));
        assert_eq!(transport.requests()[0].path, "api/wishlist");
    }

    #[tokio::test]
    async fn test_clear_sets_empty_without_refetch() {
        let f = cart_fixture(true);
        f.transport.push(reply(200, two_line_cart()));
        f.cart.refresh().await.unwrap();

        f.transport.push(reply(200, json!({ "message": "Cart cleared successfully" })));
        let snapshot = f.cart.clear().await.unwrap();

        assert!(snapshot.is_empty());
        assert_eq!(snapshot.count, 0);
        assert!(snapshot.aggregate.is_zero());
        assert_eq!(f.transport.requests().len(), 2);
        assert_eq!(f.transport.requests()[1].method, Method::DELETE);
    }

    #[tokio::test]
    async fn test_clear_falls_back_once_to_alternate_verb() {
        let f = cart_fixture(true);
        f.transport.push(reply(405, json!({ "message": "Method not allowed" })));
        f.transport.push(reply(200, json!({ "message": "Cart cleared successfully" })));

        let snapshot = f.cart.clear().await.unwrap();

        assert!(snapshot.is_empty());
        let requests = f.transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, Method::DELETE);
        assert_eq!(requests[1].method, Method::POST);
        assert_eq!(requests[1].path, "api/cart/clear");
        assert_eq!(
            f.sink.notifications(),
            vec![Notification::success("Cart cleared successfully")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_falls_back_after_primary_timeout() {
        let Harness {
            transport,
            sink,
            mut deps,
            ..
        } = harness(true);
        deps.timeout = Duration::from_millis(100);
        let cart = CartCache::new(Endpoints::cart(), deps);
        transport.push_delayed(
            reply(200, json!({ "message": "Cart cleared successfully" })),
            Duration::from_secs(30),
        );
        transport.push(reply(200, json!({ "message": "Cart cleared successfully" })));

        let snapshot = cart.clear().await.unwrap();

        assert!(snapshot.is_empty());
        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, Method::DELETE);
        assert_eq!(requests[1].method, Method::POST);
        assert_eq!(requests[1].path, "api/cart/clear");
        assert_eq!(
            sink.notifications(),
            vec![Notification::success("Cart cleared successfully")]
        );
    }

    #[tokio::test]
    async fn test_clear_fallback_is_not_repeated() {
        let f = cart_fixture(true);
        f.transport.push(reply(405, json!({ "message": "Method not allowed" })));
        f.transport.push(reply(404, json!({ "message": "Route not found" })));
        f.transport.push(reply(200, json!({ "message": "Cart cleared successfully" })));

        let err = f.cart.clear().await.unwrap_err();

        assert!(matches!(err, ClientError::Rejected(ref m) if m == "Route not found"));
        assert_eq!(f.transport.requests().len(), 2);
        assert_eq!(f.sink.notifications().len(), 1);
    }

    #[tokio::test]
    async fn test_clear_does_not_fall_back_when_unreachable() {
        let f = cart_fixture(true);
        f.transport.push_error(TransportError::Connect("refused".to_string()));

        let err = f.cart.clear().await.unwrap_err();

        assert!(matches!(err, ClientError::Unreachable(_)));
        assert_eq!(f.transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_reset_empties_snapshot() {
        let f = cart_fixture(true);
        f.transport.push(reply(200, two_line_cart()));
        f.cart.refresh().await.unwrap();
        assert!(!f.cart.snapshot().is_empty());

        f.cart.reset();
        f.session.set_credential(None);

        assert!(f.cart.snapshot().is_empty());
        assert!(f.cart.refresh().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_see_replacement() {
        let f = cart_fixture(true);
        let mut rx = f.cart.subscribe();
        f.transport.push(reply(200, two_line_cart()));

        f.cart.refresh().await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().count, 2);
    }

    #[test]
    fn test_decode_accepts_subtotal_alias_and_derives_missing_fields() {
        let response = ApiResponse::new(
            200,
            Some(json!({ "items": [cart_item_json("A", 2, 10.0)], "subtotal": 20 })),
        );
        let snapshot = decode_snapshot::<CartItem>(&response, "Cart not found").unwrap();
        assert_eq!(snapshot.count, 1);
        assert_eq!(snapshot.aggregate, Price::from_minor(2000));
    }

    #[test]
    fn test_decode_missing_items_is_malformed() {
        let response = ApiResponse::new(200, Some(json!({ "count": 3 })));
        assert!(matches!(
            decode_snapshot::<CartItem>(&response, "Cart not found"),
            Err(ClientError::Malformed(_))
        ));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("compare list"), "Compare list");
        assert_eq!(capitalize(""), "");
    }
}
