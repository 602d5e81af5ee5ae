//! Unified error handling with Sentry integration.
//!
//! Every failure that crosses the network boundary is classified into a
//! [`ClientError`]. Collection caches and the checkout orchestrator convert
//! it into exactly one notification plus a stable `Result` value; nothing
//! escapes their public operations as a panic.

use std::time::Duration;

use thiserror::Error;

use crate::api::TransportError;
use crate::storage::StorageError;

/// Generic text used when the server rejects a request without explanation.
pub const GENERIC_REJECTION: &str = "The request could not be completed";

/// Client-level error type for the storefront layer.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No credential was resolvable for an operation that needs one.
    #[error("Authentication required")]
    AuthenticationMissing,

    /// The bounded wait elapsed before a response arrived.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection-level failure.
    #[error("Service unreachable: {0}")]
    Unreachable(String),

    /// The service refused work because it is overloaded (HTTP 429/503).
    #[error("Service exhausted: {0}")]
    Exhausted(String),

    /// Well-formed response carrying a domain refusal.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Response received but missing expected fields.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Another operation on the same collection is still in flight.
    #[error("Another request is already in progress")]
    Busy,

    /// Durable storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Coarse classification of a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    AuthenticationMissing,
    TransportTimeout,
    TransportUnreachable,
    ServerRejection,
    MalformedResponse,
    Busy,
    Storage,
}

impl FailureKind {
    /// Whether retrying the same request later could succeed.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(
            self,
            Self::TransportTimeout | Self::TransportUnreachable | Self::Busy
        )
    }
}

impl ClientError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::AuthenticationMissing => FailureKind::AuthenticationMissing,
            Self::Timeout(_) => FailureKind::TransportTimeout,
            Self::Unreachable(_) | Self::Exhausted(_) => FailureKind::TransportUnreachable,
            Self::Rejected(_) => FailureKind::ServerRejection,
            Self::Malformed(_) => FailureKind::MalformedResponse,
            Self::Busy => FailureKind::Busy,
            Self::Storage(_) => FailureKind::Storage,
        }
    }

    /// Build a rejection from an optional server message.
    #[must_use]
    pub fn rejected(message: Option<&str>) -> Self {
        let message = message.map(str::trim).filter(|m| !m.is_empty());
        Self::Rejected(message.unwrap_or(GENERIC_REJECTION).to_string())
    }

    /// Human-readable message shown to the shopper.
    ///
    /// Server rejection messages are passed through verbatim; everything
    /// else maps to stable text that never leaks transport internals.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthenticationMissing => "Please sign in to continue".to_string(),
            Self::Timeout(_) => "The request timed out. Please try again.".to_string(),
            Self::Unreachable(_) => {
                "Could not reach the store. Check your connection and try again.".to_string()
            }
            Self::Exhausted(_) => {
                "The store is busy right now. Please try again shortly.".to_string()
            }
            Self::Rejected(message) => message.clone(),
            Self::Malformed(_) => "Received an unexpected response from the store".to_string(),
            Self::Busy => "Another update is already in progress".to_string(),
            Self::Storage(_) => "Could not save your progress on this device".to_string(),
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(elapsed) => Self::Timeout(elapsed),
            TransportError::Connect(reason) | TransportError::Other(reason) => {
                Self::Unreachable(reason)
            }
        }
    }
}

/// Capture failures that indicate a contract problem rather than a
/// transient condition.
pub fn capture_unexpected(err: &ClientError) {
    if matches!(err, ClientError::Malformed(_) | ClientError::Storage(_)) {
        let event_id = sentry::capture_error(err);
        tracing::error!(
            error = %err,
            sentry_event_id = %event_id,
            "Unexpected storefront failure"
        );
    }
}

/// Add a breadcrumb for shopper actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "add", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
