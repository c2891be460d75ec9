#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use slotswap_api::auth::jwt::{Claims, JwtConfig};
use slotswap_api::config::ServerConfig;
use slotswap_api::router::build_app_router;
use slotswap_api::state::AppState;
use slotswap_api::ws::WsManager;
use slotswap_core::types::DbId;
use slotswap_db::models::user::CreateUser;
use slotswap_db::repositories::UserRepo;
use slotswap_events::EventBus;
use sqlx::PgPool;
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        ws_heartbeat_secs: 30,
        db_max_connections: 5,
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            access_token_expiry_mins: 60,
        },
    }
}

/// Fresh application state over `pool` with its own bus and WebSocket manager.
pub fn build_test_state(pool: PgPool) -> AppState {
    AppState::new(
        pool,
        Arc::new(test_config()),
        Arc::new(WsManager::new()),
        Arc::new(EventBus::default()),
    )
}

/// Build the full application router with all middleware layers.
pub fn build_test_app(pool: PgPool) -> Router {
    build_app_router(build_test_state(pool), &test_config())
}

/// Router over an existing state, so a test can observe its bus and sockets.
pub fn build_app_with_state(state: AppState) -> Router {
    build_app_router(state, &test_config())
}

/// Mint a valid access token for `user_id`, as the identity service would.
pub fn token_for(user_id: DbId) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        exp: now + 3600,
        iat: now,
        jti: uuid::Uuid::new_v4().to_string(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

/// Insert a user and return its id.
pub async fn create_user(pool: &PgPool, name: &str) -> DbId {
    let input = CreateUser {
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
    };
    UserRepo::create(pool, &input).await.unwrap().id
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

fn request(method: Method, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    match token {
        Some(token) => builder.header("authorization", format!("Bearer {token}")),
        None => builder,
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, request(Method::GET, uri, None).body(Body::empty()).unwrap()).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(
        app,
        request(Method::GET, uri, Some(token))
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(
        app,
        request(Method::DELETE, uri, Some(token))
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send_json(app, Method::POST, uri, body.to_string(), Some(token)).await
}

pub async fn patch_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    send_json(app, Method::PATCH, uri, body.to_string(), Some(token)).await
}

/// Send a raw (possibly malformed) JSON body.
pub async fn send_json(
    app: Router,
    method: Method,
    uri: &str,
    body: String,
    token: Option<&str>,
) -> Response<Body> {
    send(
        app,
        request(method, uri, token)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap(),
    )
    .await
}
