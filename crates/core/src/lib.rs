//! Souq Core - Shared domain types.
//!
//! This crate provides the types exchanged between the storefront client
//! layer, its command-line front end and the test backend:
//! - `storefront` - Collection caches, session and checkout workflow
//! - `cli` - Command-line shopper tools
//! - `integration-tests` - Fake commerce backend and end-to-end tests
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no storage access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, credentials, collection items and
//!   checkout records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
