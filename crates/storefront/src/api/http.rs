//! `reqwest`-backed [`Transport`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use super::{ApiRequest, ApiResponse, Transport, TransportError};
use crate::config::StorefrontConfig;

/// Header carrying a per-call correlation ID.
const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Maximum number of body characters copied into log lines.
const LOG_BODY_LIMIT: usize = 500;

/// HTTP client for the commerce API.
///
/// Cheaply cloneable; the underlying connection pool is shared.
#[derive(Clone)]
pub struct HttpTransport {
    inner: Arc<HttpTransportInner>,
}

struct HttpTransportInner {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.inner.base_url.as_str())
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Create a transport for the configured API.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StorefrontConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(HttpTransportInner {
                client,
                base_url: config.api_base_url.clone(),
                timeout: config.request_timeout,
            }),
        })
    }

    /// The base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn classify(&self, err: &reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.inner.timeout)
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(
        skip(self, request),
        fields(method = %request.method, path = %request.path, request_id = tracing::field::Empty)
    )]
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self
            .inner
            .base_url
            .join(request.path.trim_start_matches('/'))
            .map_err(|e| TransportError::Other(format!("invalid path {}: {e}", request.path)))?;

        let request_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());

        let mut builder = self
            .inner
            .client
            .request(request.method.clone(), url)
            .header(REQUEST_ID_HEADER, &request_id);

        if let Some(credential) = &request.credential {
            builder = builder.bearer_auth(credential.expose());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| self.classify(&e))?;
        let status = response.status();

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await.map_err(|e| self.classify(&e))?;

        let body = if response_text.trim().is_empty() {
            None
        } else {
            match serde_json::from_str(&response_text) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(
                        status = %status,
                        error = %e,
                        body = %response_text.chars().take(LOG_BODY_LIMIT).collect::<String>(),
                        "Commerce API returned a non-JSON body"
                    );
                    None
                }
            }
        };

        if !status.is_success() {
            debug!(
                status = %status,
                body = %response_text.chars().take(LOG_BODY_LIMIT).collect::<String>(),
                "Commerce API returned non-success status"
            );
        }

        Ok(ApiResponse::new(status.as_u16(), body))
    }
}
