//! Souq storefront client layer.
//!
//! Keeps local mirrors of the shopper's server-owned collections (cart,
//! wishlist, comparison set) consistent with the commerce API, and drives the
//! multi-step checkout workflow on top of the cart.
//!
//! # Modules
//!
//! - [`api`] - Transport seam, HTTP implementation and response classification
//! - [`collection`] - Generic remote collection cache
//! - [`checkout`] - Checkout wizard state machine
//! - [`session`] - Credential ownership
//! - [`storage`] - Durable key-value storage and the checkout draft store
//! - [`state`] - The [`Storefront`] bundle wiring everything together

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod checkout;
pub mod collection;
pub mod config;
pub mod error;
pub mod gate;
pub mod notify;
pub mod session;
pub mod state;
pub mod storage;

#[cfg(test)]
mod testing;

pub use checkout::{BlockReason, CheckoutError, CheckoutOrchestrator, Transition};
pub use collection::{CartCache, CompareCache, RemoteCollectionCache, WishlistCache};
pub use config::StorefrontConfig;
pub use error::ClientError;
pub use state::Storefront;
