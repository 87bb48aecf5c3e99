#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use tower::ServiceExt;

use usergate::identity::{PlaceholderTokenCodec, Role, TokenCodec};
use usergate::security::{hash_password_with, PasswordHasherConfig};
use usergate::server::{build_router, AppState};
use usergate::storage::{LoginEventSink, MemoryLoginEventSink, MemoryUserStore, NewUser, SharedLoginSink, UserStore};

pub const PASSWORD: &str = "secret123";

/// Router over in-memory stores with six users: admin (1, ADMIN), then bob,
/// carol, dave, erin, frank (2..=6, USER), all with [`PASSWORD`].
pub struct TestApp {
    pub router: Router,
    pub users: Arc<MemoryUserStore>,
    pub state: AppState,
}

pub fn seeded_users() -> Arc<MemoryUserStore> {
    let users = Arc::new(MemoryUserStore::new());
    let cfg = PasswordHasherConfig::insecure_fast();
    for (name, role) in [("admin", Role::Admin), ("bob", Role::User), ("carol", Role::User), ("dave", Role::User), ("erin", Role::User), ("frank", Role::User)] {
        let password_hash = hash_password_with(&cfg, PASSWORD).expect("hash");
        users.create(NewUser { username: name.into(), email: format!("{name}@example.com"), password_hash, role }).expect("seed");
    }
    users
}

pub fn app_with(codec: Arc<dyn TokenCodec>, sink: SharedLoginSink) -> TestApp {
    let users = seeded_users();
    let state = AppState::new(users.clone(), sink, codec, PasswordHasherConfig::insecure_fast(), vec![]).expect("state");
    TestApp { router: build_router(state.clone()), users, state }
}

pub fn app() -> (TestApp, Arc<MemoryLoginEventSink>) {
    let sink = Arc::new(MemoryLoginEventSink::new());
    (app_with(Arc::new(PlaceholderTokenCodec), sink.clone()), sink)
}

pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        builder = builder.header("authorization", format!("Bearer {t}"));
    }
    match body {
        Some(v) => builder.header("content-type", "application/json").body(Body::from(v.to_string())).expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

pub async fn send(app: &TestApp, req: Request<Body>) -> Response {
    app.router.clone().oneshot(req).await.expect("infallible")
}

pub async fn read_body(response: Response) -> (StatusCode, String) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
    (status, String::from_utf8(bytes.to_vec()).expect("utf8"))
}

pub async fn read_json(response: Response) -> (StatusCode, serde_json::Value) {
    let (status, text) = read_body(response).await;
    (status, serde_json::from_str(&text).expect("json"))
}

/// Wait for the detached recorder to land `n` events.
pub async fn wait_for_events(sink: &MemoryLoginEventSink, n: usize) {
    for _ in 0..200 {
        if sink.len() >= n { return; }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {} login events, saw {}", n, sink.len());
}

pub fn events_for(sink: &dyn LoginEventSink, id: u64) -> usize {
    sink.list_for_user(id).expect("list").len()
}
