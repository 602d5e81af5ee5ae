//! Commerce API transport and response classification.
//!
//! # Architecture
//!
//! - [`Transport`] is the seam between the storefront layer and the network.
//!   [`HttpTransport`] is the production implementation over `reqwest`;
//!   tests substitute scripted fakes.
//! - Every response carries a JSON body with a `message` field that
//!   discriminates outcomes. [`classify_mutation`] maps a raw response onto
//!   the [`ClientError`] taxonomy.
//! - Endpoint paths and acknowledgment strings live in [`endpoints`].

pub mod endpoints;
mod http;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use souq_core::Credential;
use thiserror::Error;

use crate::error::ClientError;

pub use endpoints::{Endpoints, Route};
pub use http::HttpTransport;

/// Connection-level failures reported by a [`Transport`].
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request did not complete within the bounded wait.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other transport failure (invalid URL, broken body stream).
    #[error("transport error: {0}")]
    Other(String),
}

/// A request against the commerce API.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the configured base URL.
    pub path: String,
    pub body: Option<Value>,
    pub credential: Option<Credential>,
}

impl ApiRequest {
    /// Create a request without body or credential.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            credential: None,
        }
    }

    /// Attach a JSON body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach the bearer credential.
    #[must_use]
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }
}

/// A response from the commerce API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body, `None` when the body was empty or not JSON.
    pub body: Option<Value>,
}

impl ApiResponse {
    /// Create a response.
    #[must_use]
    pub const fn new(status: u16, body: Option<Value>) -> Self {
        Self { status, body }
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// The `message` field of the body, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.body.as_ref()?.get("message")?.as_str()
    }

    /// Whether the `message` field matches an expected acknowledgment.
    #[must_use]
    pub fn message_is(&self, expected: &str) -> bool {
        self.message()
            .is_some_and(|m| m.trim().eq_ignore_ascii_case(expected.trim()))
    }
}

/// Sends requests to the commerce API.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and return the raw response.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` on connection-level failure. Non-2xx
    /// responses are not errors at this layer.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Send a request, giving up after `timeout`.
///
/// # Errors
///
/// Returns `Timeout` when the wait elapses, otherwise the classified
/// transport failure.
pub async fn send_bounded(
    transport: &dyn Transport,
    timeout: Duration,
    request: ApiRequest,
) -> Result<ApiResponse, ClientError> {
    match tokio::time::timeout(timeout, transport.send(request)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ClientError::Timeout(timeout)),
    }
}

/// Map status codes that mean the same thing for every endpoint.
///
/// # Errors
///
/// Returns `AuthenticationMissing` for 401 and `Exhausted` for 429/503.
pub fn check_status(response: &ApiResponse) -> Result<(), ClientError> {
    match response.status {
        401 => Err(ClientError::AuthenticationMissing),
        429 | 503 => Err(ClientError::Exhausted(
            response
                .message()
                .map_or_else(|| format!("HTTP {}", response.status), str::to_string),
        )),
        _ => Ok(()),
    }
}

/// Classify the response to a mutation.
///
/// Returns the acknowledgment message when the server answered 2xx with
/// exactly `ack`.
///
/// # Errors
///
/// - `AuthenticationMissing` / `Exhausted` per [`check_status`]
/// - `Malformed` when the body is not JSON or has no `message`
/// - `Rejected` for any other well-formed answer
pub fn classify_mutation(response: &ApiResponse, ack: &str) -> Result<String, ClientError> {
    check_status(response)?;

    if response.body.is_none() {
        return Err(ClientError::Malformed(format!(
            "HTTP {}: body is not JSON",
            response.status
        )));
    }

    let Some(message) = response.message() else {
        return Err(ClientError::Malformed(format!(
            "HTTP {}: response has no message field",
            response.status
        )));
    };

    if response.is_success() && response.message_is(ack) {
        return Ok(message.trim().to_string());
    }

    Err(ClientError::rejected(Some(message)))
}

/// Classify the response to a collection fetch.
///
/// Returns `None` when the server answered with the collection's empty
/// signal (whatever the status code), otherwise the body to decode.
///
/// # Errors
///
/// - `AuthenticationMissing` / `Exhausted` per [`check_status`]
/// - `Malformed` when the body is not JSON
/// - `Rejected` for a non-2xx answer
pub fn classify_fetch<'a>(
    response: &'a ApiResponse,
    empty_signal: &str,
) -> Result<Option<&'a Value>, ClientError> {
    check_status(response)?;

    if response.message_is(empty_signal) {
        return Ok(None);
    }

    let Some(body) = &response.body else {
        return Err(ClientError::Malformed(format!(
            "HTTP {}: body is not JSON",
            response.status
        )));
    };

    if !response.is_success() {
        return Err(ClientError::rejected(response.message()));
    }

    Ok(Some(body))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const ACK: &str = "Product added to cart successfully";

    #[test]
    fn test_acknowledged_mutation() {
        let response = ApiResponse::new(200, Some(json!({ "message": ACK })));
        assert_eq!(classify_mutation(&response, ACK).ok().as_deref(), Some(ACK));
    }

    #[test]
    fn test_ack_comparison_ignores_case_and_padding() {
        let response = ApiResponse::new(
            201,
            Some(json!({ "message": " product added to cart successfully " })),
        );
        assert!(classify_mutation(&response, ACK).is_ok());
    }

    #[test]
    fn test_duplicate_is_rejection_with_server_message() {
        let response = ApiResponse::new(400, Some(json!({ "message": "Product already in cart" })));
        let err = classify_mutation(&response, ACK).expect_err("rejected");
        assert!(matches!(err, ClientError::Rejected(ref m) if m == "Product already in cart"));
    }

    #[test]
    fn test_success_status_with_other_message_is_rejection() {
        let response = ApiResponse::new(200, Some(json!({ "message": "Nothing changed" })));
        let err = classify_mutation(&response, ACK).expect_err("rejected");
        assert!(matches!(err, ClientError::Rejected(_)));
    }

    #[test]
    fn test_missing_message_is_malformed() {
        let response = ApiResponse::new(200, Some(json!({ "ok": true })));
        let err = classify_mutation(&response, ACK).expect_err("malformed");
        assert!(matches!(err, ClientError::Malformed(_)));

        let response = ApiResponse::new(502, None);
        let err = classify_mutation(&response, ACK).expect_err("malformed");
        assert!(matches!(err, ClientError::Malformed(_)));
    }

    #[test]
    fn test_status_codes_take_precedence() {
        let response = ApiResponse::new(401, Some(json!({ "message": "jwt expired" })));
        assert!(matches!(
            classify_mutation(&response, ACK),
            Err(ClientError::AuthenticationMissing)
        ));

        let response = ApiResponse::new(429, None);
        assert!(matches!(
            classify_mutation(&response, ACK),
            Err(ClientError::Exhausted(ref m)) if m == "HTTP 429"
        ));
    }

    #[test]
    fn test_fetch_empty_signal_is_not_an_error() {
        let response = ApiResponse::new(404, Some(json!({ "message": "Cart not found" })));
        assert_eq!(classify_fetch(&response, "Cart not found").ok(), Some(None));
    }

    #[test]
    fn test_fetch_failure_statuses() {
        let response = ApiResponse::new(500, Some(json!({ "message": "Internal error" })));
        assert!(matches!(
            classify_fetch(&response, "Cart not found"),
            Err(ClientError::Rejected(ref m)) if m == "Internal error"
        ));

        let response = ApiResponse::new(200, None);
        assert!(matches!(
            classify_fetch(&response, "Cart not found"),
            Err(ClientError::Malformed(_))
        ));
    }
}
