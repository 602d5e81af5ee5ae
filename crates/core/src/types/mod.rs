//! Core types for Souq.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod checkout;
pub mod collection;
pub mod credential;
pub mod id;
pub mod price;

pub use checkout::{CheckoutDraft, CheckoutStep, DraftField, OrderResult, Totals};
pub use collection::{CartItem, CollectionItem, CollectionSnapshot, ProductSummary, SavedItem};
pub use credential::Credential;
pub use id::*;
pub use price::{AmountOverflow, Price};
