//! Integration tests: `HttpCredentialExchange` and `SessionStore` against an
//! in-process login server.

use std::net::SocketAddr;
use std::sync::Arc;

use authwatch_core::{
    ApiError, AuthError, CredentialExchange, HttpCredentialExchange, SessionEvent, SessionStore,
};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde_json::{json, Value};

const GOOD_EMAIL: &str = "a@b.com";
const GOOD_PASSWORD: &str = "pw";

fn token_expiring_in(secs: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(json!({ "exp": Utc::now().timestamp() + secs }).to_string());
    format!("{}.{}.signature", header, payload)
}

async fn login(Json(body): Json<Value>) -> Result<Json<Value>, (StatusCode, &'static str)> {
    let email = body.get("email").and_then(Value::as_str);
    let password = body.get("password").and_then(Value::as_str);
    match (email, password) {
        (Some(GOOD_EMAIL), Some(GOOD_PASSWORD)) => {
            Ok(Json(json!({ "token": token_expiring_in(3600) })))
        }
        (Some("broken@b.com"), _) => Err((StatusCode::INTERNAL_SERVER_ERROR, "database unavailable")),
        _ => Err((StatusCode::UNAUTHORIZED, "invalid credentials")),
    }
}

async fn garbage() -> &'static str {
    "definitely not json"
}

/// Start a mock login server and return its base URL.
async fn start_server() -> String {
    let app = Router::new()
        .route("/api/auth", post(login))
        .route("/garbage/api/auth", post(garbage));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr: SocketAddr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server");
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_exchange_returns_token() {
    let base_url = start_server().await;
    let exchange = HttpCredentialExchange::new(&base_url).expect("client");

    let token = exchange
        .exchange(GOOD_EMAIL, GOOD_PASSWORD)
        .await
        .expect("login should succeed");

    assert_eq!(token.split('.').count(), 3);
}

#[tokio::test]
async fn test_exchange_maps_rejected_credentials() {
    let base_url = start_server().await;
    let exchange = HttpCredentialExchange::new(&base_url).expect("client");

    let result = exchange.exchange(GOOD_EMAIL, "wrong").await;

    match result {
        Err(AuthError::Api(ApiError::CredentialsRejected { status, body })) => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid credentials");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_exchange_maps_server_error() {
    let base_url = start_server().await;
    let exchange = HttpCredentialExchange::new(&base_url).expect("client");

    let result = exchange.exchange("broken@b.com", "pw").await;

    match result {
        Err(AuthError::Api(ApiError::ServerError(body))) => {
            assert_eq!(body, "database unavailable");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_exchange_rejects_unparseable_body() {
    let base_url = start_server().await;
    let exchange = HttpCredentialExchange::new(&format!("{}/garbage", base_url)).expect("client");

    let result = exchange.exchange(GOOD_EMAIL, GOOD_PASSWORD).await;

    assert!(matches!(result, Err(AuthError::Api(ApiError::InvalidResponse(_)))));
}

#[tokio::test]
async fn test_store_login_over_http() {
    let base_url = start_server().await;
    let exchange = HttpCredentialExchange::new(&base_url).expect("client");
    let store = SessionStore::new(Arc::new(exchange));
    let mut events = store.events();

    store.authenticate(GOOD_EMAIL, GOOD_PASSWORD).await;

    assert!(store.is_authenticated());
    let expires_at = store.expires_at().expect("decodable expiry");
    assert!(expires_at > Utc::now());
    assert!(matches!(
        events.try_recv().expect("login event"),
        SessionEvent::Authenticated { expires_at: Some(_) }
    ));
}

#[tokio::test]
async fn test_store_rejected_login_stays_logged_out() {
    let base_url = start_server().await;
    let exchange = HttpCredentialExchange::new(&base_url).expect("client");
    let store = SessionStore::new(Arc::new(exchange));
    let mut events = store.events();

    store.authenticate(GOOD_EMAIL, "wrong").await;

    assert_eq!(store.token(), None);
    assert!(matches!(
        events.try_recv().expect("failure event"),
        SessionEvent::AuthenticationFailed { .. }
    ));
}
