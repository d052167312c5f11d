//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use item_search_proxy::{
    ResultStore, RetryPolicy, Transport, TransportError, UpstreamClient, UpstreamRequest,
    UpstreamResponse,
};

/// Two items: one with markup in the title, one with a link.
pub const TWO_ITEMS: &str = r#"{"itemSummaries": [
    {"title": "<b>Phone</b><script>alert(1)</script>", "price": {"value": "10", "currency": "USD"}, "itemWebUrl": "https://shop.example/item/1"},
    {"title": "Case, see www.example.com", "price": {"value": "2.50", "currency": "USD"}, "itemWebUrl": "https://shop.example/item/2?a=1&b=2"}
]}"#;

/// Transport replaying scripted outcomes; once the script runs out it keeps
/// answering with the fallback.
pub struct ScriptedTransport {
    outcomes: Mutex<VecDeque<Result<UpstreamResponse, TransportError>>>,
    fallback: UpstreamResponse,
    requests: Mutex<Vec<UpstreamRequest>>,
}

impl ScriptedTransport {
    pub fn new(outcomes: Vec<Result<UpstreamResponse, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            fallback: status(503),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Always answers 200 with `body`.
    pub fn always_ok(body: &str) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(VecDeque::new()),
            fallback: UpstreamResponse {
                status: 200,
                body: body.as_bytes().to_vec(),
            },
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn attempts(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<UpstreamRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, TransportError> {
        self.requests.lock().push(request.clone());
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

pub fn status(code: u16) -> UpstreamResponse {
    UpstreamResponse {
        status: code,
        body: Vec::new(),
    }
}

pub fn ok_json(body: &str) -> Result<UpstreamResponse, TransportError> {
    Ok(UpstreamResponse {
        status: 200,
        body: body.as_bytes().to_vec(),
    })
}

/// Upstream client without inter-attempt delay.
pub fn client(transport: Arc<ScriptedTransport>, store: Arc<dyn ResultStore>) -> UpstreamClient {
    UpstreamClient::new(transport, store).with_retry(RetryPolicy {
        delay: Duration::ZERO,
        ..RetryPolicy::default()
    })
}
