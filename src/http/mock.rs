//! Scripted in-memory transport.
//!
//! Replies are queued per `(method, path)`; the last queued reply for a route
//! keeps answering once the others are consumed. Unrouted requests get a 404.
//! Every request is recorded together with the (tokio) instant it arrived,
//! which makes retry spacing observable under a paused clock.

use super::transport::{ApiRequest, ApiResponse, Transport, TransportError};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value as JsonValue, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub enum MockReply {
    Json { status: u16, body: JsonValue },
    Fail(TransportError),
    Delayed(Duration, Box<MockReply>),
    Hang,
}

impl MockReply {
    pub fn ok(body: JsonValue) -> Self {
        MockReply::Json { status: 200, body }
    }

    pub fn status(status: u16, body: JsonValue) -> Self {
        MockReply::Json { status, body }
    }

    pub fn network_failure() -> Self {
        MockReply::Fail(TransportError::Connect("connection refused".to_string()))
    }

    pub fn after(self, delay: Duration) -> Self {
        MockReply::Delayed(delay, Box::new(self))
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub request: ApiRequest,
    pub at: Instant,
}

#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<MockReply>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for `method path`.
    pub fn on(&self, method: Method, path: &str, reply: MockReply) -> &Self {
        lock(&self.routes)
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
        self
    }

    /// Drop every queued reply for `method path`.
    pub fn clear_route(&self, method: Method, path: &str) {
        lock(&self.routes).remove(&(method, path.to_string()));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn calls_to(&self, method: Method, path: &str) -> Vec<RecordedCall> {
        lock(&self.calls)
            .iter()
            .filter(|call| call.request.method == method && call.request.path == path)
            .cloned()
            .collect()
    }

    pub fn call_count(&self, method: Method, path: &str) -> usize {
        self.calls_to(method, path).len()
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn reset_calls(&self) {
        lock(&self.calls).clear();
    }

    fn next_reply(&self, request: &ApiRequest) -> MockReply {
        let mut routes = lock(&self.routes);
        let key = (request.method.clone(), request.path.clone());
        match routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(MockReply::Hang),
            Some(queue) => queue.front().cloned().unwrap_or(MockReply::Hang),
            None => MockReply::status(
                404,
                json!({ "message": format!("No mock route for {} {}", request.method, request.path) }),
            ),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        lock(&self.calls).push(RecordedCall {
            request: request.clone(),
            at: Instant::now(),
        });

        let mut reply = self.next_reply(request);
        loop {
            match reply {
                MockReply::Json { status, body } => return Ok(ApiResponse::new(status, body)),
                MockReply::Fail(err) => return Err(err),
                MockReply::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
                MockReply::Hang => return std::future::pending().await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_last_reply_is_sticky() {
        let mock = MockTransport::new();
        mock.on(Method::GET, "/products", MockReply::status(500, JsonValue::Null))
            .on(Method::GET, "/products", MockReply::ok(json!([])));

        let request = ApiRequest::new(Method::GET, "/products");
        assert_eq!(mock.send(&request).await.unwrap().status, 500);
        assert_eq!(mock.send(&request).await.unwrap().status, 200);
        assert_eq!(mock.send(&request).await.unwrap().status, 200);
        assert_eq!(mock.call_count(Method::GET, "/products"), 3);
    }

    #[tokio::test]
    async fn test_unrouted_request_is_not_found() {
        let mock = MockTransport::new();
        let response = mock.send(&ApiRequest::new(Method::DELETE, "/carts/x")).await.unwrap();
        assert_eq!(response.status, 404);
    }
}
