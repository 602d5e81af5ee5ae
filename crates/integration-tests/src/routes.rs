//! HTTP handlers for the fake commerce backend.
//!
//! Every answer is JSON with a `message` field, mirroring the real API's
//! acknowledgment strings.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::routing::{delete, get, patch, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use souq_core::{CartItem, CheckoutDraft, CollectionItem, Price, ProductId, SavedItem};

use crate::store::{BackendState, RecordedOrder, SavedKind};

const OUT_OF_RANGE: &str = "Total out of range";

type Reply = (StatusCode, Json<Value>);
type HandlerResult = Result<Reply, Reply>;

fn reply(status: StatusCode, message: &str) -> Reply {
    (status, Json(json!({ "message": message })))
}

/// Build the backend router.
pub fn router(state: BackendState) -> Router {
    Router::new()
        .route("/api/cart", get(cart_fetch).post(cart_add).delete(cart_clear))
        .route("/api/cart/clear", post(cart_clear_alternate))
        .route(
            "/api/cart/{product_id}",
            patch(cart_update).delete(cart_remove),
        )
        .nest(
            "/api/wishlist",
            saved_routes().layer(Extension(SavedKind::Wishlist)),
        )
        .nest(
            "/api/compare",
            saved_routes().layer(Extension(SavedKind::Compare)),
        )
        .route("/api/orders", post(place_order))
        .with_state(state)
}

fn saved_routes() -> Router<BackendState> {
    Router::new()
        .route("/", get(saved_fetch).post(saved_add).delete(saved_clear))
        .route("/clear", post(saved_clear_alternate))
        .route("/{product_id}", delete(saved_remove))
}

/// Count the request, apply latency, and resolve the bearer token.
async fn authorize(state: &BackendState, headers: &HeaderMap) -> Result<String, Reply> {
    let latency = {
        let mut store = state.lock();
        store.requests += 1;
        store.faults.latency
    };
    if let Some(latency) = latency {
        tokio::time::sleep(latency).await;
    }

    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| reply(StatusCode::UNAUTHORIZED, "Not authorized, no token"))?;

    if !state.lock().shoppers.contains_key(token) {
        return Err(reply(StatusCode::UNAUTHORIZED, "Not authorized, token failed"));
    }
    Ok(token.to_string())
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddBody {
    product_id: ProductId,
    quantity: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct QuantityBody {
    quantity: u32,
}

async fn cart_fetch(State(state): State<BackendState>, headers: HeaderMap) -> HandlerResult {
    let token = authorize(&state, &headers).await?;
    let store = state.lock();
    let shopper = &store.shoppers[&token];

    if shopper.cart.is_empty() {
        return Err(reply(StatusCode::NOT_FOUND, "Cart not found"));
    }

    let items: Vec<CartItem> = shopper
        .cart
        .iter()
        .filter_map(|(product_id, quantity)| {
            store.catalog.get(product_id).map(|product| CartItem {
                product_id: product_id.clone(),
                quantity: *quantity,
                product: product.clone(),
            })
        })
        .collect();
    let subtotal = Price::try_sum(items.iter().map(CollectionItem::line_total))
        .map_err(|_| reply(StatusCode::INTERNAL_SERVER_ERROR, OUT_OF_RANGE))?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": "Cart retrieved successfully",
            "count": items.len(),
            "subtotal": subtotal,
            "items": items,
        })),
    ))
}

async fn cart_add(
    State(state): State<BackendState>,
    headers: HeaderMap,
    Json(body): Json<AddBody>,
) -> HandlerResult {
    let token = authorize(&state, &headers).await?;
    let mut store = state.lock();

    if !store.catalog.contains_key(&body.product_id) {
        return Err(reply(StatusCode::NOT_FOUND, "Product not found"));
    }
    let quantity = body.quantity.unwrap_or(1);
    if quantity == 0 {
        return Err(reply(StatusCode::BAD_REQUEST, "Quantity must be at least 1"));
    }

    let Some(shopper) = store.shoppers.get_mut(&token) else {
        return Err(reply(StatusCode::UNAUTHORIZED, "Not authorized, token failed"));
    };
    if shopper.cart.iter().any(|(id, _)| *id == body.product_id) {
        return Err(reply(StatusCode::BAD_REQUEST, "Product already in cart"));
    }
    shopper.cart.push((body.product_id, quantity));

    Ok(reply(StatusCode::CREATED, "Product added to cart successfully"))
}

async fn cart_update(
    State(state): State<BackendState>,
    headers: HeaderMap,
    Path(product_id): Path<ProductId>,
    Json(body): Json<QuantityBody>,
) -> HandlerResult {
    let token = authorize(&state, &headers).await?;
    if body.quantity == 0 {
        return Err(reply(StatusCode::BAD_REQUEST, "Quantity must be at least 1"));
    }

    let mut store = state.lock();
    let Some(shopper) = store.shoppers.get_mut(&token) else {
        return Err(reply(StatusCode::UNAUTHORIZED, "Not authorized, token failed"));
    };
    let Some(line) = shopper.cart.iter_mut().find(|(id, _)| *id == product_id) else {
        return Err(reply(StatusCode::NOT_FOUND, "Product not found in cart"));
    };
    line.1 = body.quantity;

    Ok(reply(StatusCode::OK, "Quantity updated successfully"))
}

async fn cart_remove(
    State(state): State<BackendState>,
    headers: HeaderMap,
    Path(product_id): Path<ProductId>,
) -> HandlerResult {
    let token = authorize(&state, &headers).await?;
    let mut store = state.lock();
    let Some(shopper) = store.shoppers.get_mut(&token) else {
        return Err(reply(StatusCode::UNAUTHORIZED, "Not authorized, token failed"));
    };

    let before = shopper.cart.len();
    shopper.cart.retain(|(id, _)| *id != product_id);
    if shopper.cart.len() == before {
        return Err(reply(StatusCode::NOT_FOUND, "Product not found in cart"));
    }

    Ok(reply(StatusCode::OK, "Product removed from cart successfully"))
}

async fn cart_clear(State(state): State<BackendState>, headers: HeaderMap) -> HandlerResult {
    let token = authorize(&state, &headers).await?;
    if state.lock().faults.delete_clear_unsupported {
        return Err(reply(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"));
    }
    clear_cart(&state, &token)
}

async fn cart_clear_alternate(
    State(state): State<BackendState>,
    headers: HeaderMap,
) -> HandlerResult {
    let token = authorize(&state, &headers).await?;
    clear_cart(&state, &token)
}

fn clear_cart(state: &BackendState, token: &str) -> HandlerResult {
    let mut store = state.lock();
    if let Some(shopper) = store.shoppers.get_mut(token) {
        shopper.cart.clear();
    }
    Ok(reply(StatusCode::OK, "Cart cleared successfully"))
}

// =============================================================================
// Wishlist and comparison list
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveBody {
    product_id: ProductId,
}

async fn saved_fetch(
    State(state): State<BackendState>,
    Extension(kind): Extension<SavedKind>,
    headers: HeaderMap,
) -> HandlerResult {
    let token = authorize(&state, &headers).await?;
    let store = state.lock();
    let saved = store.shoppers[&token].saved(kind);

    if saved.is_empty() {
        return Err(reply(
            StatusCode::NOT_FOUND,
            &format!("{} not found", kind.title()),
        ));
    }

    let items: Vec<SavedItem> = saved
        .iter()
        .filter_map(|product_id| {
            store.catalog.get(product_id).map(|product| SavedItem {
                product_id: product_id.clone(),
                product: product.clone(),
            })
        })
        .collect();

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": format!("{} retrieved successfully", kind.title()),
            "count": items.len(),
            "items": items,
        })),
    ))
}

async fn saved_add(
    State(state): State<BackendState>,
    Extension(kind): Extension<SavedKind>,
    headers: HeaderMap,
    Json(body): Json<SaveBody>,
) -> HandlerResult {
    let token = authorize(&state, &headers).await?;
    let mut store = state.lock();

    if !store.catalog.contains_key(&body.product_id) {
        return Err(reply(StatusCode::NOT_FOUND, "Product not found"));
    }
    let Some(shopper) = store.shoppers.get_mut(&token) else {
        return Err(reply(StatusCode::UNAUTHORIZED, "Not authorized, token failed"));
    };
    let saved = shopper.saved_mut(kind);
    if saved.contains(&body.product_id) {
        return Err(reply(
            StatusCode::BAD_REQUEST,
            &format!("Product already in {}", kind.noun()),
        ));
    }
    saved.push(body.product_id);

    Ok(reply(
        StatusCode::CREATED,
        &format!("Product added to {} successfully", kind.noun()),
    ))
}

async fn saved_remove(
    State(state): State<BackendState>,
    Extension(kind): Extension<SavedKind>,
    headers: HeaderMap,
    Path(product_id): Path<ProductId>,
) -> HandlerResult {
    let token = authorize(&state, &headers).await?;
    let mut store = state.lock();
    let Some(shopper) = store.shoppers.get_mut(&token) else {
        return Err(reply(StatusCode::UNAUTHORIZED, "Not authorized, token failed"));
    };

    let saved = shopper.saved_mut(kind);
    let before = saved.len();
    saved.retain(|id| *id != product_id);
    if saved.len() == before {
        return Err(reply(
            StatusCode::NOT_FOUND,
            &format!("Product not found in {}", kind.noun()),
        ));
    }

    Ok(reply(
        StatusCode::OK,
        &format!("Product removed from {} successfully", kind.noun()),
    ))
}

async fn saved_clear(
    State(state): State<BackendState>,
    Extension(kind): Extension<SavedKind>,
    headers: HeaderMap,
) -> HandlerResult {
    let token = authorize(&state, &headers).await?;
    if state.lock().faults.delete_clear_unsupported {
        return Err(reply(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"));
    }
    clear_saved(&state, kind, &token)
}

async fn saved_clear_alternate(
    State(state): State<BackendState>,
    Extension(kind): Extension<SavedKind>,
    headers: HeaderMap,
) -> HandlerResult {
    let token = authorize(&state, &headers).await?;
    clear_saved(&state, kind, &token)
}

fn clear_saved(state: &BackendState, kind: SavedKind, token: &str) -> HandlerResult {
    let mut store = state.lock();
    if let Some(shopper) = store.shoppers.get_mut(token) {
        shopper.saved_mut(kind).clear();
    }
    Ok(reply(
        StatusCode::OK,
        &format!("{} cleared successfully", kind.title()),
    ))
}

// =============================================================================
// Orders
// =============================================================================

async fn place_order(
    State(state): State<BackendState>,
    headers: HeaderMap,
    Json(shipping): Json<CheckoutDraft>,
) -> HandlerResult {
    let token = authorize(&state, &headers).await?;
    if !shipping.is_complete() {
        return Err(reply(
            StatusCode::BAD_REQUEST,
            "Full name, address and city are required",
        ));
    }

    let mut store = state.lock();
    let lines = store.shoppers[&token].cart.clone();
    if lines.is_empty() {
        return Err(reply(StatusCode::BAD_REQUEST, "Cart is empty"));
    }

    let subtotal = Price::try_sum(lines.iter().filter_map(|(id, quantity)| {
        store
            .catalog
            .get(id)
            .map(|p| p.price.checked_times(*quantity))
    }))
    .map_err(|_| reply(StatusCode::INTERNAL_SERVER_ERROR, OUT_OF_RANGE))?;
    let total_price = subtotal
        .checked_add(store.shipping_fee)
        .ok_or_else(|| reply(StatusCode::INTERNAL_SERVER_ERROR, OUT_OF_RANGE))?;
    let order_id = format!("ord_{}", store.orders.len() + 1);

    tracing::debug!(%order_id, %total_price, "Fake backend accepted order");
    store.orders.push(RecordedOrder {
        order_id: order_id.clone(),
        token,
        shipping,
        lines,
        total_price,
    });

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Order placed successfully",
            "orderId": order_id,
            "totalPrice": total_price,
        })),
    ))
}
