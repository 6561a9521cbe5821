#![allow(dead_code)]

pub mod faults;

use std::sync::Arc;

use axum::body::Body;
use axum::extract::ws::Message;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tokio::sync::mpsc;
use tower::ServiceExt;

use kinship_api::auth::jwt::{generate_access_token, JwtConfig};
use kinship_api::config::ServerConfig;
use kinship_api::connections::ConnectionService;
use kinship_api::router::build_app_router;
use kinship_api::state::AppState;
use kinship_api::ws::{EventRouter, SessionRegistry};
use kinship_core::connection::RespondAction;
use kinship_core::trust::TrustLadder;
use kinship_core::types::DbId;
use kinship_db::{ConnectionStore, DirectChatProvisioner, InMemoryStore, UserDirectory};
use kinship_events::EventBus;

use faults::FaultyStore;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        session_write_timeout_ms: 200,
        session_channel_capacity: 64,
        trust_levels_path: None,
        jwt: JwtConfig {
            secret: "test-secret-for-integration-tests".to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

/// Everything a test needs to drive the server and inspect its side effects.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
}

/// Build the full application over an in-memory store.
///
/// Uses the same router builder as `main.rs`, so the middleware stack
/// (CORS, request ID, timeout, tracing, panic recovery) matches production.
pub fn build_test_app() -> TestApp {
    build_test_app_with(test_config())
}

pub fn build_test_app_with(config: ServerConfig) -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    assemble(config, Arc::clone(&store), store)
}

/// Build the application over a [`FaultyStore`] wrapping a fresh in-memory
/// store. `TestApp::store` is the wrapped store, for seeding and inspection.
pub fn build_faulty_app() -> (TestApp, Arc<FaultyStore>) {
    let store = Arc::new(InMemoryStore::new());
    let faulty = Arc::new(FaultyStore::new(Arc::clone(&store)));
    (assemble(test_config(), Arc::clone(&faulty), store), faulty)
}

fn assemble<B>(config: ServerConfig, backend: Arc<B>, store: Arc<InMemoryStore>) -> TestApp
where
    B: ConnectionStore + UserDirectory + DirectChatProvisioner + 'static,
{
    let sessions = Arc::new(SessionRegistry::new(config.session_channel_capacity));
    let event_bus = Arc::new(EventBus::default());
    let router = EventRouter::new(Arc::clone(&sessions), config.session_write_timeout());
    let connections = Arc::new(ConnectionService::with_backend(
        backend,
        Arc::new(TrustLadder::default()),
        router,
        Arc::clone(&event_bus),
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        sessions,
        connections,
        event_bus,
    };

    TestApp {
        router: build_app_router(state.clone(), &config),
        state,
        store,
    }
}

/// Directory entries shared by most tests.
pub struct Users {
    pub alice: DbId,
    pub bob: DbId,
    pub carol: DbId,
}

pub const ALICE_PIN: &str = "PIN-ALI001";
pub const BOB_PIN: &str = "PIN-BOB002";
pub const CAROL_PIN: &str = "PIN-CAR003";

pub fn seed_users(store: &InMemoryStore) -> Users {
    Users {
        alice: store.add_user("Alice", "alice@example.com", Some(ALICE_PIN)),
        bob: store.add_user("Bob", "bob@example.com", Some(BOB_PIN)),
        carol: store.add_user("Carol", "carol@example.com", Some(CAROL_PIN)),
    }
}

/// Send a request from `from` to the owner of `to_pin` and accept it.
/// Returns the new connection's id.
pub async fn connect(app: &TestApp, from: DbId, to: DbId, to_pin: &str) -> DbId {
    let request = app
        .state
        .connections
        .request_by_pin(from, to_pin, None)
        .await
        .unwrap();
    let outcome = app
        .state
        .connections
        .respond(request.id, to, RespondAction::Accept)
        .await
        .unwrap();
    outcome.connection.unwrap().id
}

/// Mint an access token for `user_id` with the test secret.
pub fn token_for(user_id: DbId) -> String {
    generate_access_token(user_id, &test_config().jwt).unwrap()
}

/// Drain every text frame currently queued on a session receiver and parse
/// each as JSON.
pub fn drain_events(rx: &mut mpsc::Receiver<Message>) -> Vec<serde_json::Value> {
    let mut events = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        if let Message::Text(text) = msg {
            events.push(serde_json::from_str(text.as_str()).unwrap());
        }
    }
    events
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str, token: Option<&str>) -> Response {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    app.oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(
    app: Router,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Response {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    app.oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

pub async fn post_empty(app: Router, uri: &str, token: Option<&str>) -> Response {
    let mut builder = Request::builder().method(Method::POST).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    app.oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
