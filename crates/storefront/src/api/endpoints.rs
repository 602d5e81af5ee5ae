//! Fixed endpoint definitions for the three collections and order placement.
//!
//! Paths are relative to the configured base URL. `{productId}` in a path is
//! replaced with the percent-encoded product identifier.

use reqwest::Method;
use souq_core::ProductId;

const PRODUCT_PLACEHOLDER: &str = "{productId}";

/// One remote operation: verb plus path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub method: Method,
    pub path: &'static str,
}

impl Route {
    const fn new(method: Method, path: &'static str) -> Self {
        Self { method, path }
    }

    /// Expand the path template for a product.
    #[must_use]
    pub fn path_for(&self, product_id: &ProductId) -> String {
        self.path
            .replace(PRODUCT_PLACEHOLDER, &urlencoding::encode(product_id.as_str()))
    }

    /// The path with no template expansion.
    #[must_use]
    pub fn path(&self) -> String {
        self.path.to_string()
    }
}

/// Remote operations and acknowledgment strings for one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Lowercase noun used in logs and messages (`cart`, `wishlist`, ...).
    pub noun: &'static str,
    pub fetch: Route,
    pub add: Route,
    /// Quantity changes; `None` for collections without quantities.
    pub update: Option<Route>,
    pub remove: Route,
    pub clear: Route,
    /// Alternate verb tried once when `clear` is refused.
    pub clear_fallback: Route,
    pub added_ack: &'static str,
    pub updated_ack: Option<&'static str>,
    pub removed_ack: &'static str,
    pub cleared_ack: &'static str,
    /// Fetch message meaning "no collection yet"; treated as empty.
    pub empty_signal: &'static str,
}

impl Endpoints {
    /// Shopping cart endpoints.
    #[must_use]
    pub const fn cart() -> Self {
        Self {
            noun: "cart",
            fetch: Route::new(Method::GET, "api/cart"),
            add: Route::new(Method::POST, "api/cart"),
            update: Some(Route::new(Method::PATCH, "api/cart/{productId}")),
            remove: Route::new(Method::DELETE, "api/cart/{productId}"),
            clear: Route::new(Method::DELETE, "api/cart"),
            clear_fallback: Route::new(Method::POST, "api/cart/clear"),
            added_ack: "Product added to cart successfully",
            updated_ack: Some("Quantity updated successfully"),
            removed_ack: "Product removed from cart successfully",
            cleared_ack: "Cart cleared successfully",
            empty_signal: "Cart not found",
        }
    }

    /// Wishlist endpoints.
    #[must_use]
    pub const fn wishlist() -> Self {
        Self {
            noun: "wishlist",
            fetch: Route::new(Method::GET, "api/wishlist"),
            add: Route::new(Method::POST, "api/wishlist"),
            update: None,
            remove: Route::new(Method::DELETE, "api/wishlist/{productId}"),
            clear: Route::new(Method::DELETE, "api/wishlist"),
            clear_fallback: Route::new(Method::POST, "api/wishlist/clear"),
            added_ack: "Product added to wishlist successfully",
            updated_ack: None,
            removed_ack: "Product removed from wishlist successfully",
            cleared_ack: "Wishlist cleared successfully",
            empty_signal: "Wishlist not found",
        }
    }

    /// Comparison set endpoints.
    #[must_use]
    pub const fn compare() -> Self {
        Self {
            noun: "compare list",
            fetch: Route::new(Method::GET, "api/compare"),
            add: Route::new(Method::POST, "api/compare"),
            update: None,
            remove: Route::new(Method::DELETE, "api/compare/{productId}"),
            clear: Route::new(Method::DELETE, "api/compare"),
            clear_fallback: Route::new(Method::POST, "api/compare/clear"),
            added_ack: "Product added to compare list successfully",
            updated_ack: None,
            removed_ack: "Product removed from compare list successfully",
            cleared_ack: "Compare list cleared successfully",
            empty_signal: "Compare list not found",
        }
    }
}

/// Order placement endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEndpoint {
    pub place: Route,
    pub placed_ack: &'static str,
}

impl OrderEndpoint {
    /// The order placement endpoint.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            place: Route::new(Method::POST, "api/orders"),
            placed_ack: "Order placed successfully",
        }
    }
}

impl Default for OrderEndpoint {
    fn default() -> Self {
        Self::new()
    }
}
