//! End-to-end tests for the checkout workflow over HTTP.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use souq_core::{CheckoutDraft, CheckoutStep, Credential, Price, ProductId};
use souq_integration_tests::FakeBackend;
use souq_storefront::notify::Severity;
use souq_storefront::storage::FileStore;
use souq_storefront::{CheckoutError, ClientError, Transition};
use tempfile::TempDir;

const TOKEN: &str = "tok_jane";

async fn backend_with_cart_products() -> FakeBackend {
    let backend = FakeBackend::start().await.unwrap();
    backend.add_product("A", "Linen shirt", Price::from_minor(1000));
    backend.add_product("B", "Cotton socks", Price::from_minor(500));
    backend.register_shopper(TOKEN);
    backend
}

fn jane() -> CheckoutDraft {
    CheckoutDraft::new("Jane", "1 Nile St", "Cairo")
}

#[tokio::test]
async fn test_order_placement_confirms_and_empties_cart() {
    let backend = backend_with_cart_products().await;
    let (storefront, sink) = backend.storefront().unwrap();
    storefront.sign_in(Credential::new(TOKEN).unwrap()).unwrap();
    storefront.cart().add(&ProductId::new("A"), Some(2)).await.unwrap();
    storefront.cart().add(&ProductId::new("B"), Some(1)).await.unwrap();

    let checkout = storefront.checkout().unwrap();
    let totals = checkout.totals().unwrap();
    assert_eq!(totals.subtotal, Price::from_minor(2500));
    assert_eq!(totals.total, Price::from_minor(8500));

    assert_eq!(checkout.next(), Transition::Moved(CheckoutStep::Shipping));
    checkout.set_draft(jane());
    assert_eq!(checkout.next(), Transition::Moved(CheckoutStep::Payment));
    sink.drain();

    let order = checkout.submit().await.unwrap();

    assert_eq!(checkout.step(), CheckoutStep::Confirmed);
    assert!(!order.order_id.as_str().is_empty());
    assert_eq!(order.total_price, Price::from_minor(8500));
    assert!(storefront.cart().snapshot().is_empty());
    assert!(backend.cart_lines(TOKEN).is_empty());

    let orders = backend.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].shipping, jane());
    assert_eq!(orders[0].lines.len(), 2);

    let outcomes = sink.notifications();
    assert_eq!(outcomes.len(), 1, "cart clear after an order is silent");
    assert_eq!(outcomes[0].message, "Order placed successfully");
}

#[tokio::test]
async fn test_auth_gate_survives_a_restart() {
    let backend = backend_with_cart_products().await;
    let state_dir = TempDir::new().unwrap();
    let storage = Arc::new(FileStore::new(state_dir.path()));

    // First run: token only held in memory, then lost
    let (storefront, _) = backend
        .storefront_with(backend.config(), storage.clone())
        .unwrap();
    storefront
        .session()
        .set_credential(Credential::new(TOKEN));
    storefront.cart().add(&ProductId::new("A"), Some(2)).await.unwrap();

    let checkout = storefront.checkout().unwrap();
    checkout.next();
    checkout.set_full_name("Jane");
    checkout.set_address("1 Nile St");
    checkout.set_city("Cairo");
    storefront.session().set_credential(None);

    assert_eq!(
        checkout.next(),
        Transition::LoginRequired {
            return_to: "/checkout"
        }
    );
    assert_eq!(checkout.step(), CheckoutStep::Shipping);
    assert!(state_dir.path().join("checkout_draft.json").exists());
    drop(checkout);
    drop(storefront);

    // Second run: sign in and come back to checkout
    let (storefront, _) = backend
        .storefront_with(backend.config(), storage)
        .unwrap();
    storefront.sign_in(Credential::new(TOKEN).unwrap()).unwrap();
    storefront.cart().refresh().await.unwrap();

    let checkout = storefront.checkout().unwrap();
    assert_eq!(checkout.step(), CheckoutStep::Shipping);
    assert_eq!(checkout.draft(), jane());
    assert_eq!(checkout.next(), Transition::Moved(CheckoutStep::Payment));

    checkout.submit().await.unwrap();
    assert!(!state_dir.path().join("checkout_draft.json").exists());
}

#[tokio::test]
async fn test_server_rejection_keeps_payment_step() {
    let backend = backend_with_cart_products().await;
    let (storefront, sink) = backend.storefront().unwrap();
    storefront.sign_in(Credential::new(TOKEN).unwrap()).unwrap();
    storefront.cart().add(&ProductId::new("B"), None).await.unwrap();

    let checkout = storefront.checkout().unwrap();
    checkout.next();
    checkout.set_draft(jane());
    checkout.next();
    sink.drain();

    // Emptied from another device
    backend.empty_cart(TOKEN);
    let err = checkout.submit().await.unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::Client(ClientError::Rejected(ref m)) if m == "Cart is empty"
    ));
    assert_eq!(checkout.step(), CheckoutStep::Payment);
    assert!(backend.orders().is_empty());

    let outcomes = sink.notifications();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].severity, Severity::Error);

    // Retry after restocking the server cart succeeds
    storefront.cart().add(&ProductId::new("B"), None).await.unwrap();
    assert!(checkout.submit().await.is_ok());
}

#[tokio::test]
async fn test_entry_with_empty_cart_is_refused() {
    let backend = backend_with_cart_products().await;
    let (storefront, _) = backend.storefront().unwrap();
    storefront.sign_in(Credential::new(TOKEN).unwrap()).unwrap();
    storefront.cart().refresh().await.unwrap();

    assert!(matches!(storefront.checkout(), Err(CheckoutError::EmptyCart)));
}
