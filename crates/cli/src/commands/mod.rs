//! CLI command implementations.

pub mod checkout;
pub mod collections;
pub mod session;

use souq_core::AmountOverflow;
use souq_storefront::api::TransportError;
use souq_storefront::config::ConfigError;
use souq_storefront::storage::StorageError;
use souq_storefront::{CheckoutError, ClientError};
use thiserror::Error;

/// Errors that end a command with a non-zero exit code.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Could not set up the HTTP client: {0}")]
    Transport(#[from] TransportError),

    #[error("{}", .0.user_message())]
    Client(#[from] ClientError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error("Local state error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cart totals are out of range: {0}")]
    Amount(#[from] AmountOverflow),

    /// The supplied token was blank.
    #[error("Token must not be empty")]
    InvalidToken,

    /// No credential is stored.
    #[error("Not signed in. Run `souq login --token <TOKEN>` first")]
    NotSignedIn,

    /// Checkout stopped at the authentication gate.
    #[error("Sign in to continue checkout; your shipping details were saved for {0}")]
    LoginRequired(&'static str),

    /// Checkout could not advance.
    #[error("Checkout blocked at {step}: {reason}")]
    Blocked { step: String, reason: String },
}
