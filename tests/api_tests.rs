use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use sea_orm::EntityTrait;
use tower::ServiceExt;

use tessera::config::Config;
use tessera::db::Store;
use tessera::entities::users;
use tessera::services::{MailError, MailService};
use tessera::state::SharedState;

struct MockMailer {
    fail: AtomicBool,
}

impl MockMailer {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            fail: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl MailService for MockMailer {
    async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), MailError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MailError::Transport("mock transport down".to_string()));
        }
        Ok(())
    }
}

async fn spawn_app() -> (Router, Store, Arc<MockMailer>) {
    let store = Store::new("sqlite::memory:")
        .await
        .expect("Failed to create in-memory store");

    let mailer = MockMailer::new();
    let shared = Arc::new(
        SharedState::with_collaborators(Config::default(), store.clone(), mailer.clone())
            .expect("Failed to build state"),
    );

    let state = tessera::api::create_app_state(shared, None);
    let app = tessera::api::router(state).await;

    (app, store, mailer)
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn activation_secret(store: &Store) -> String {
    users::Entity::find()
        .one(&store.conn)
        .await
        .unwrap()
        .expect("No user registered")
        .activation_token
        .expect("No activation secret on user")
}

#[tokio::test]
async fn test_protected_routes_require_auth() {
    let (app, _store, _mailer) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/system/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/system/status")
                .header("Authorization", "Bearer wrong-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_full_account_lifecycle() {
    let (app, store, _mailer) = spawn_app().await;

    // Register
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/accounts",
            serde_json::json!({
                "username": "alice",
                "email": "alice@example.com",
                "password": "correct-horse-battery"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Activate with the emailed secret
    let secret = activation_secret(&store).await;
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/accounts/activate",
            serde_json::json!({ "token": secret }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Login mints a bearer token
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/login",
            serde_json::json!({
                "username": "alice",
                "password": "correct-horse-battery"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let token = body["data"]["token"].as_str().unwrap().to_string();
    assert_eq!(token.len(), 64);

    // The token authenticates profile reads
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/account")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["username"], "alice");

    // Logout revokes it
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/account")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_refused_before_activation() {
    let (app, _store, _mailer) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/accounts",
            serde_json::json!({
                "username": "bob",
                "email": "bob@example.com",
                "password": "correct-horse-battery"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/login",
            serde_json::json!({
                "username": "bob",
                "password": "correct-horse-battery"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_register_maps_dispatch_failure_to_bad_gateway() {
    let (app, store, mailer) = spawn_app().await;
    mailer.fail.store(true, Ordering::SeqCst);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/accounts",
            serde_json::json!({
                "username": "carol",
                "email": "carol@example.com",
                "password": "correct-horse-battery"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    // Rolled back: nothing persisted.
    assert!(users::Entity::find().one(&store.conn).await.unwrap().is_none());
}

#[tokio::test]
async fn test_invalid_credentials_rejected() {
    let (app, store, _mailer) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/accounts",
            serde_json::json!({
                "username": "dave",
                "email": "dave@example.com",
                "password": "correct-horse-battery"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let secret = activation_secret(&store).await;
    app.clone()
        .oneshot(post_json(
            "/api/accounts/activate",
            serde_json::json!({ "token": secret }),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/login",
            serde_json::json!({
                "username": "dave",
                "password": "wrong-password-entirely"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_reset_request_for_unknown_email_is_404() {
    let (app, _store, _mailer) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/accounts/password-reset",
            serde_json::json!({ "email": "ghost@example.com" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_activate_unknown_secret_is_rejected() {
    let (app, _store, _mailer) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/accounts/activate",
            serde_json::json!({ "token": "00000000000000000000000000000000" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
