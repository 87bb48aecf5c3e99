//!
//! usergate HTTP server
//! --------------------
//! This module wires the Axum router for the user-management API and starts it.
//!
//! Responsibilities:
//! - Shared `AppState`: stores, token codec, login provider, login recorder.
//! - Pipeline composition: request lifecycle, authentication, role gate, handlers.
//! - Bootstrap admin seeding and startup logging.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::{Config, TokenScheme};
use crate::identity::{AuthProvider, LocalAuthProvider, LoginEventRecorder, PlaceholderTokenCodec, Role, SignedTokenCodec, TokenCodec};
use crate::security::{self, PasswordHasherConfig};
use crate::storage::{MemoryLoginEventSink, MemoryUserStore, NewUser, SharedLoginSink, SharedUserStore, StoreError};

pub mod auth;
pub mod lifecycle;
pub mod middleware;
pub mod users;
pub mod validate;

/// Shared server state injected into all handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub users: SharedUserStore,
    pub login_events: SharedLoginSink,
    pub codec: Arc<dyn TokenCodec>,
    pub auth: Arc<dyn AuthProvider>,
    pub recorder: LoginEventRecorder,
    /// Argon2 cost used when hashing new or changed passwords.
    pub hasher: PasswordHasherConfig,
    /// Peers whose forwarding headers are believed.
    pub trusted_proxies: Arc<Vec<IpAddr>>,
}

impl AppState {
    /// Assemble state from explicit collaborators; the login provider checks
    /// passwords against `users` and mints tokens with `codec`.
    pub fn new(
        users: SharedUserStore,
        login_events: SharedLoginSink,
        codec: Arc<dyn TokenCodec>,
        hasher: PasswordHasherConfig,
        trusted_proxies: Vec<IpAddr>,
    ) -> anyhow::Result<Self> {
        let auth = LocalAuthProvider::new(users.clone(), codec.clone(), &hasher).context("While preparing the login provider")?;
        Ok(Self {
            recorder: LoginEventRecorder::new(login_events.clone()),
            users,
            login_events,
            codec,
            auth: Arc::new(auth),
            hasher,
            trusted_proxies: Arc::new(trusted_proxies),
        })
    }

    /// In-memory stores plus the codec selected by `cfg`.
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let codec = codec_for(cfg)?;
        Self::new(
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryLoginEventSink::new()),
            codec,
            PasswordHasherConfig::default(),
            cfg.trusted_proxies.clone(),
        )
    }
}

fn codec_for(cfg: &Config) -> anyhow::Result<Arc<dyn TokenCodec>> {
    match cfg.token_scheme {
        TokenScheme::Placeholder => {
            warn!(target: "usergate::startup", "placeholder tokens enabled: tokens are guessable and never expire, do not use in production");
            Ok(Arc::new(PlaceholderTokenCodec))
        }
        TokenScheme::Signed => {
            let key = match &cfg.token_secret {
                Some(s) => s.as_bytes().to_vec(),
                None => {
                    warn!(target: "usergate::startup", "TOKEN_SECRET not set; using a random key, tokens will not survive a restart");
                    let mut bytes = vec![0u8; 32];
                    getrandom::getrandom(&mut bytes).map_err(|e| anyhow::anyhow!("failed to generate token key: {e}"))?;
                    bytes
                }
            };
            let codec = SignedTokenCodec::new(&key, cfg.token_ttl).context("While creating the token codec")?;
            Ok(Arc::new(codec))
        }
    }
}

/// Seed the bootstrap admin when a password is configured and no user holds the name yet.
pub fn ensure_default_admin(state: &AppState, cfg: &Config) -> anyhow::Result<()> {
    let Some(password) = cfg.admin_password.as_deref() else {
        info!(target: "usergate::startup", "ADMIN_PASSWORD not set; skipping admin bootstrap");
        return Ok(());
    };
    match state.users.find_by_username(&cfg.admin_username) {
        Ok(_) => {
            info!(target: "usergate::startup", username = %cfg.admin_username, "admin user already present");
            return Ok(());
        }
        Err(StoreError::NotFound) => {}
        Err(e) => return Err(anyhow::anyhow!(e)).context("While looking up the bootstrap admin"),
    }
    let password_hash = security::hash_password_with(&state.hasher, password)?;
    let admin = state
        .users
        .create(NewUser { username: cfg.admin_username.clone(), email: cfg.admin_email.clone(), password_hash, role: Role::Admin })
        .map_err(|e| anyhow::anyhow!(e))
        .context("While creating the bootstrap admin")?;
    info!(target: "usergate::startup", id = admin.id, username = %admin.username, "bootstrap admin created");
    Ok(())
}

async fn root() -> Json<Value> { Json(json!({ "message": "usergate ok" })) }

async fn ping() -> Json<Value> { Json(json!({ "message": "pong" })) }

/// Compose the request pipeline.
///
/// Admin routes: lifecycle > authenticate > role gate > handler.
/// Owner routes: lifecycle > authenticate > handler (ownership checked inside).
/// Public routes: lifecycle > handler.
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{delete, post};

    let admin = Router::new()
        .route("/users", get(users::list_users))
        .route("/user", post(users::create_user))
        .route("/user/{id}", delete(users::delete_user))
        .route_layer(from_fn(middleware::require_admin));

    let owner = Router::new()
        .route("/user/{id}", get(users::get_user).put(users::update_user))
        .route("/user/{id}/logins", get(users::list_logins));

    let protected = owner
        .merge(admin)
        .route_layer(from_fn_with_state(state.clone(), middleware::authenticate));

    Router::new()
        .route("/", get(root))
        .route("/ping", get(ping))
        .route("/login", post(auth::login))
        .merge(protected)
        .layer(from_fn_with_state(state.clone(), lifecycle::track))
        .with_state(state)
}

/// Start the usergate HTTP server and serve until Ctrl-C.
pub async fn run_with_config(cfg: Config) -> anyhow::Result<()> {
    let state = AppState::from_config(&cfg)?;
    ensure_default_admin(&state, &cfg)?;
    info!(
        target: "usergate::startup",
        scheme = state.codec.scheme(),
        trusted_proxies = ?cfg.trusted_proxies,
        "state ready"
    );

    let app = build_router(state);
    let addr = SocketAddr::new(cfg.bind_addr, cfg.http_port);
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("Failed to bind {}", addr))?;
    info!(target: "usergate::startup", "Starting server on {}", addr);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!(target: "usergate::startup", "server stopped");
    Ok(())
}

/// Convenience entry point reading configuration from the environment.
pub async fn run() -> anyhow::Result<()> {
    let cfg = Config::from_env().context("Invalid configuration")?;
    run_with_config(cfg).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(target: "usergate::startup", error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target: "usergate::startup", "shutdown requested");
}
