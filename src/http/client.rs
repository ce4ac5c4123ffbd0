use super::config::{ClientConfig, normalize_path};
use super::retry::RetryPolicy;
use super::transport::{ApiRequest, ReqwestTransport, Transport};
use crate::core::{ApiError, Result, SyncError};
use crate::session::SessionStore;
use reqwest::{Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, warn};

struct ClientInner {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    session: SessionStore,
}

/// Resilient fetch client
///
/// Wraps every call with a per-attempt timeout, exponential retry on
/// network failures and 5xx responses, and uniform error classification.
/// Any `Unauthorized` outcome clears the shared session.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use serde_json::json;
/// use storesync::{ApiClient, ClientConfig, Method, MockReply, MockTransport, SessionStore};
///
/// # tokio_test::block_on(async {
/// let transport = Arc::new(MockTransport::new());
/// transport.on(Method::GET, "/products", MockReply::ok(json!([{"_id": "p1"}])));
///
/// let client = ApiClient::with_transport(
///     ClientConfig::default(),
///     transport.clone(),
///     SessionStore::default(),
/// );
/// let products = client.request(Method::GET, "/products", None, &[], None).await.unwrap();
/// assert_eq!(products[0]["_id"], "p1");
/// # });
/// ```
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    /// Client backed by `reqwest`
    pub fn new(config: ClientConfig, session: SessionStore) -> Result<Self> {
        config.validate().map_err(SyncError::Config)?;
        let transport = ReqwestTransport::new(config.clone())
            .map_err(|e| SyncError::Config(e.to_string()))?;
        Ok(Self::with_transport(config, Arc::new(transport), session))
    }

    /// Client over an arbitrary transport
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        session: SessionStore,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                config,
                session,
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    /// Perform a request and classify its outcome.
    ///
    /// `retry` overrides the configured policy for this call only.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
        headers: &[(&str, &str)],
        retry: Option<RetryPolicy>,
    ) -> std::result::Result<JsonValue, ApiError> {
        self.execute(build_request(method, path, body, headers), retry).await
    }

    /// Like `request`, for routes that exchange credentials.
    ///
    /// A 401 here means the credentials were rejected, so the current
    /// session is left untouched.
    pub async fn credential_request(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
    ) -> std::result::Result<JsonValue, ApiError> {
        let request = build_request(method, path, body, &[]);
        self.run(request, Some(RetryPolicy::no_retry()), false).await
    }

    /// Like `request`, with `Authorization: Bearer <token>` from the session.
    ///
    /// Without a valid session this fails with `Unauthorized` before any
    /// network traffic.
    pub async fn authorized_request(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
        headers: &[(&str, &str)],
        retry: Option<RetryPolicy>,
    ) -> std::result::Result<JsonValue, ApiError> {
        let token = self.inner.session.require_token()?;
        let request = build_request(method, path, body, headers)
            .with_header("Authorization", &format!("Bearer {}", token));
        self.execute(request, retry).await
    }

    /// Unauthenticated GET decoded into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.request(Method::GET, path, None, &[], None).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Authenticated call with a serializable body, decoded into `T`.
    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        let response = self
            .authorized_request(method, path, Some(body), &[], None)
            .await?;
        Ok(serde_json::from_value(response)?)
    }

    /// Run `request` under `retry` (or the configured policy).
    pub async fn execute(
        &self,
        request: ApiRequest,
        retry: Option<RetryPolicy>,
    ) -> std::result::Result<JsonValue, ApiError> {
        self.run(request, retry, true).await
    }

    async fn run(
        &self,
        mut request: ApiRequest,
        retry: Option<RetryPolicy>,
        ends_session: bool,
    ) -> std::result::Result<JsonValue, ApiError> {
        let policy = retry.unwrap_or(self.inner.config.retry);
        request.path = normalize_path(&request.path);

        let mut attempt = 0u32;
        loop {
            match self.attempt(&request).await {
                Ok(body) => {
                    debug!(method = %request.method, path = %request.path, attempt = attempt + 1, "request succeeded");
                    return Ok(body);
                }
                Err(err) if err.is_retryable() && policy.has_attempt_after(attempt) => {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        method = %request.method,
                        path = %request.path,
                        attempt = attempt + 1,
                        max_attempts = policy.attempts(),
                        error = %err,
                        ?delay,
                        "request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(method = %request.method, path = %request.path, attempt = attempt + 1, error = %err, "request failed");
                    if ends_session && err.is_unauthorized() {
                        self.inner.session.handle_unauthorized();
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn attempt(&self, request: &ApiRequest) -> std::result::Result<JsonValue, ApiError> {
        let timeout = self.inner.config.request_timeout;
        match tokio::time::timeout(timeout, self.inner.transport.send(request)).await {
            Err(_) => Err(ApiError::NetworkError(format!(
                "request timed out after {} ms",
                timeout.as_millis()
            ))),
            Ok(Err(err)) => Err(ApiError::NetworkError(err.to_string())),
            Ok(Ok(response)) if response.is_success() => Ok(response.body),
            Ok(Ok(response)) => Err(ApiError::from_status(
                response.status,
                response.server_message(),
            )),
        }
    }
}

fn build_request(
    method: Method,
    path: &str,
    body: Option<JsonValue>,
    headers: &[(&str, &str)],
) -> ApiRequest {
    let mut request = ApiRequest::new(method, path);
    request.body = body;
    for (name, value) in headers {
        request = request.with_header(name, value);
    }
    request
}

/// Append percent-encoded query parameters to a relative route.
pub fn with_query(path: &str, pairs: &[(&str, &str)]) -> String {
    if pairs.is_empty() {
        return path.to_string();
    }
    let Ok(mut scratch) = Url::parse("http://localhost/") else {
        return path.to_string();
    };
    scratch.query_pairs_mut().extend_pairs(pairs.iter().copied());
    match scratch.query() {
        Some(query) if !query.is_empty() => {
            let separator = if path.contains('?') { '&' } else { '?' };
            format!("{}{}{}", path, separator, query)
        }
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_query_encodes_values() {
        assert_eq!(
            with_query("/orders/search", &[("acc_id", "u1"), ("q", "red shoes&more")]),
            "/orders/search?acc_id=u1&q=red+shoes%26more"
        );
        assert_eq!(with_query("/carts", &[]), "/carts");
        assert_eq!(
            with_query("/variants?pro_id=p1", &[("page", "2")]),
            "/variants?pro_id=p1&page=2"
        );
    }
}
