//! Scripted transport and wire fixtures for unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::api::{ApiRequest, ApiResponse, Transport, TransportError};

struct Scripted {
    outcome: Result<ApiResponse, TransportError>,
    delay: Option<Duration>,
}

/// Transport that answers from a queue and records every request.
///
/// An exhausted queue answers 500 with no body, which every caller
/// classifies as malformed.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: ApiResponse) {
        self.enqueue(Ok(response), None);
    }

    pub fn push_delayed(&self, response: ApiResponse, delay: Duration) {
        self.enqueue(Ok(response), Some(delay));
    }

    pub fn push_error(&self, error: TransportError) {
        self.enqueue(Err(error), None);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn enqueue(&self, outcome: Result<ApiResponse, TransportError>, delay: Option<Duration>) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted { outcome, delay });
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        let next = self.script.lock().unwrap().pop_front();
        let Some(scripted) = next else {
            return Ok(ApiResponse::new(500, None));
        };
        if let Some(delay) = scripted.delay {
            tokio::time::sleep(delay).await;
        }
        scripted.outcome
    }
}

pub fn reply(status: u16, body: Value) -> ApiResponse {
    ApiResponse::new(status, Some(body))
}

/// One cart line in wire shape.
pub fn cart_item_json(product_id: &str, quantity: u32, price: f64) -> Value {
    json!({
        "productId": product_id,
        "quantity": quantity,
        "product": {
            "name": format!("Product {product_id}"),
            "price": format!("{price:.2}"),
        },
    })
}

/// Fetch body with `count` and `aggregate` left for the client to derive.
pub fn cart_body(items: &[Value]) -> Value {
    json!({ "items": items })
}
