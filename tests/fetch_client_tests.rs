/// Resilient fetch client tests
///
/// Retry bounds, error classification, timeouts and session handling over a
/// scripted transport, plus one round trip through reqwest against a local
/// axum backend.
/// Run with: cargo test --test fetch_client_tests
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use storesync::session::{Account, AuthStatus, LoginReason, SessionStore};
use storesync::{ApiClient, ApiError, ClientConfig, Method, MockReply, MockTransport, RetryPolicy};

fn signed_in_session() -> SessionStore {
    let session = SessionStore::default();
    session.establish("tok-1", Account::new("u1")).unwrap();
    session
}

fn client_with(transport: &Arc<MockTransport>, session: SessionStore) -> ApiClient {
    ApiClient::with_transport(ClientConfig::default(), transport.clone(), session)
}

#[tokio::test(start_paused = true)]
async fn test_persistent_server_error_is_attempted_three_times() {
    let transport = Arc::new(MockTransport::new());
    transport.on(Method::GET, "/products", MockReply::status(503, json!({})));
    let client = client_with(&transport, SessionStore::default());

    let err = client
        .request(Method::GET, "/products", None, &[], None)
        .await
        .unwrap_err();

    assert_eq!(err, ApiError::ServerError { status: 503 });
    let calls = transport.calls_to(Method::GET, "/products");
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[1].at - calls[0].at, Duration::from_millis(1000));
    assert_eq!(calls[2].at - calls[1].at, Duration::from_millis(2000));
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_transient_network_failure() {
    let transport = Arc::new(MockTransport::new());
    transport
        .on(Method::GET, "/variants", MockReply::network_failure())
        .on(Method::GET, "/variants", MockReply::ok(json!([{"_id": "v1"}])));
    let client = client_with(&transport, SessionStore::default());

    let body = client
        .request(Method::GET, "/variants", None, &[], None)
        .await
        .unwrap();

    assert_eq!(body, json!([{"_id": "v1"}]));
    assert_eq!(transport.call_count(Method::GET, "/variants"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_client_errors_are_not_retried() {
    let transport = Arc::new(MockTransport::new());
    transport.on(
        Method::POST,
        "/carts",
        MockReply::status(400, json!({"message": "Variant is required"})),
    );
    transport.on(Method::GET, "/products/missing", MockReply::status(404, json!({})));
    let client = client_with(&transport, SessionStore::default());

    let err = client
        .request(Method::POST, "/carts", Some(json!({})), &[], None)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ApiError::RequestError {
            status: 400,
            message: "Variant is required".to_string()
        }
    );
    assert_eq!(err.to_string(), "Variant is required");

    let err = client
        .request(Method::GET, "/products/missing", None, &[], None)
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::NotFound);
    assert_eq!(transport.total_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_a_network_error() {
    let transport = Arc::new(MockTransport::new());
    transport.on(Method::GET, "/orders", MockReply::Hang);
    let config = ClientConfig::default()
        .request_timeout(Duration::from_secs(10))
        .retry(RetryPolicy::no_retry());
    let client = ApiClient::with_transport(config, transport.clone(), SessionStore::default());

    let started = tokio::time::Instant::now();
    let err = client
        .request(Method::GET, "/orders", None, &[], None)
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::NetworkError(_)));
    assert_eq!(started.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_clears_session() {
    let transport = Arc::new(MockTransport::new());
    transport.on(Method::GET, "/orders?acc_id=u1", MockReply::status(401, json!({})));
    let session = signed_in_session();
    let mut status = session.subscribe();
    let client = client_with(&transport, session.clone());

    let err = client
        .authorized_request(Method::GET, "/orders?acc_id=u1", None, &[], None)
        .await
        .unwrap_err();

    assert_eq!(err, ApiError::Unauthorized);
    assert_eq!(transport.call_count(Method::GET, "/orders?acc_id=u1"), 1);
    assert!(!session.is_signed_in());
    assert!(status.has_changed().unwrap());
    assert_eq!(
        *status.borrow_and_update(),
        AuthStatus::LoginRequired(LoginReason::Unauthorized)
    );
}

#[tokio::test(start_paused = true)]
async fn test_rejected_credentials_keep_session() {
    let transport = Arc::new(MockTransport::new());
    transport.on(Method::POST, "/auth/login", MockReply::status(401, json!({})));
    let session = signed_in_session();
    let mut status = session.subscribe();
    status.borrow_and_update();
    let client = client_with(&transport, session.clone());

    let err = client
        .credential_request(Method::POST, "/auth/login", Some(json!({"username": "ann"})))
        .await
        .unwrap_err();

    assert_eq!(err, ApiError::Unauthorized);
    assert!(session.is_signed_in());
    assert!(!status.has_changed().unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_bearer_token_is_attached() {
    let transport = Arc::new(MockTransport::new());
    transport.on(Method::GET, "/favorites", MockReply::ok(json!([])));
    let client = client_with(&transport, signed_in_session());

    client
        .authorized_request(Method::GET, "/favorites", None, &[], None)
        .await
        .unwrap();

    let calls = transport.calls_to(Method::GET, "/favorites");
    assert_eq!(calls[0].request.header("authorization"), Some("Bearer tok-1"));
}

#[tokio::test(start_paused = true)]
async fn test_missing_token_fails_without_network() {
    let transport = Arc::new(MockTransport::new());
    let session = SessionStore::default();
    let client = client_with(&transport, session.clone());

    let err = client
        .authorized_request(Method::GET, "/carts", None, &[], None)
        .await
        .unwrap_err();

    assert_eq!(err, ApiError::Unauthorized);
    assert_eq!(transport.total_calls(), 0);
    assert_eq!(
        session.status(),
        AuthStatus::LoginRequired(LoginReason::MissingToken)
    );
}

mod over_http {
    use super::*;
    use anyhow::Context;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, put};
    use axum::{Json, Router};
    use serde_json::Value;

    async fn spawn_backend() -> String {
        let router = Router::new()
            .route(
                "/products",
                get(|| async { Json(json!([{"_id": "p1", "pro_name": "Tee"}])) }),
            )
            .route(
                "/carts/:id",
                put(
                    |Path(id): Path<String>, headers: HeaderMap, Json(body): Json<Value>| async move {
                        let authorized = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            == Some("Bearer tok-1");
                        if !authorized {
                            return (StatusCode::UNAUTHORIZED, Json(json!({"message": "no token"})));
                        }
                        let quantity = body["pro_quantity"].as_u64().unwrap_or(0);
                        let price = body["pro_price"].as_f64().unwrap_or(0.0);
                        (
                            StatusCode::OK,
                            Json(json!({"cartItem": {
                                "_id": id,
                                "pro_quantity": quantity,
                                "pro_price": price,
                                "Total_price": price * quantity as f64
                            }})),
                        )
                    },
                ),
            )
            .route(
                "/broken",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_reqwest_transport_round_trip() -> anyhow::Result<()> {
        let base_url = spawn_backend().await;
        let config = ClientConfig::new(&base_url).retry(RetryPolicy::new(2, 10));
        let client = ApiClient::new(config, signed_in_session())?;

        let products = client
            .request(Method::GET, "/products", None, &[], None)
            .await
            .context("listing products")?;
        assert_eq!(products[0]["pro_name"], json!("Tee"));

        let updated = client
            .authorized_request(
                Method::PUT,
                "/carts/c1",
                Some(json!({"pro_quantity": 3, "pro_price": 1000.0})),
                &[],
                None,
            )
            .await
            .context("updating cart line")?;
        assert_eq!(updated["cartItem"]["Total_price"], json!(3000.0));

        let err = client
            .request(Method::GET, "/broken", None, &[], None)
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::ServerError { status: 500 });
        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ClientConfig::new(&format!("http://{}", addr)).retry(RetryPolicy::no_retry());
        let client = ApiClient::new(config, SessionStore::default()).unwrap();

        let err = client
            .request(Method::GET, "/products", None, &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NetworkError(_)));
    }
}
