//! Per-request stage machine and access logging.
//!
//! The outermost layer opens a [`Lifecycle`] at `Received`, shares it with the
//! inner stages through request extensions, and closes it at `Responded` once the
//! response exists. Stages only move forward; any stage may jump straight to
//! `Responded`, which is how rejections skip the rest of the pipeline.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{error, info};

use crate::error::{AppError, AppResult};
use crate::identity::RequestContext;
use crate::server::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Received,
    Authenticating,
    Authorizing,
    Handling,
    LoginRecording,
    Responded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal stage transition {from:?} -> {to:?}")]
pub struct StageError {
    pub from: Stage,
    pub to: Stage,
}

#[derive(Debug, Clone)]
pub struct Lifecycle {
    trail: Vec<Stage>,
}

impl Default for Lifecycle {
    fn default() -> Self { Self { trail: vec![Stage::Received] } }
}

impl Lifecycle {
    pub fn new() -> Self { Self::default() }

    pub fn current(&self) -> Stage { self.trail.last().copied().unwrap_or(Stage::Received) }

    pub fn trail(&self) -> &[Stage] { &self.trail }

    pub fn is_responded(&self) -> bool { self.current() == Stage::Responded }

    /// Move to `next`. Fails if `next` is not strictly later than the current
    /// stage, which also covers re-running a stage and anything after `Responded`.
    pub fn advance(&mut self, next: Stage) -> Result<(), StageError> {
        let from = self.current();
        if next <= from { return Err(StageError { from, to: next }); }
        self.trail.push(next);
        Ok(())
    }

    fn trail_string(&self) -> String {
        self.trail.iter().map(|s| format!("{:?}", s)).collect::<Vec<_>>().join(">")
    }
}

pub type SharedLifecycle = Arc<Mutex<Lifecycle>>;

fn advance_shared(lc: &SharedLifecycle, stage: Stage) -> AppResult<()> {
    lc.lock().advance(stage).map_err(|e| {
        error!(target: "usergate::http", error = %e, "request pipeline out of order");
        AppError::internal("internal", "internal server error")
    })
}

/// Advance the lifecycle attached to `req`. A request without one never went
/// through the composed router and is refused.
pub fn enter(req: &Request, stage: Stage) -> AppResult<()> {
    match req.extensions().get::<SharedLifecycle>() {
        Some(lc) => advance_shared(lc, stage),
        None => {
            error!(target: "usergate::http", ?stage, "request has no lifecycle attached");
            Err(AppError::internal("internal", "internal server error"))
        }
    }
}

/// Handler-side access to the request lifecycle.
#[derive(Clone)]
pub struct Pipeline(SharedLifecycle);

impl Pipeline {
    pub fn enter(&self, stage: Stage) -> AppResult<()> { advance_shared(&self.0, stage) }
}

impl<S: Send + Sync> FromRequestParts<S> for Pipeline {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<SharedLifecycle>().cloned().map(Pipeline).ok_or_else(|| {
            error!(target: "usergate::http", "handler reached without a lifecycle");
            AppError::internal("internal", "internal server error")
        })
    }
}

/// Outermost layer: builds the request context, opens the lifecycle, and writes
/// one access log line per request.
pub async fn track(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let peer = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|c| c.0);
    let ctx = RequestContext::from_parts(peer, req.headers(), &state.trusted_proxies);
    let lifecycle: SharedLifecycle = Arc::new(Mutex::new(Lifecycle::new()));
    req.extensions_mut().insert(lifecycle.clone());
    req.extensions_mut().insert(ctx.clone());

    let response = next.run(req).await;

    let trail = {
        let mut lc = lifecycle.lock();
        if let Err(e) = lc.advance(Stage::Responded) {
            error!(target: "usergate::http", error = %e, "response produced twice");
        }
        lc.trail_string()
    };
    info!(
        target: "usergate::http",
        request_id = %ctx.request_id,
        client = %ctx.source_address,
        %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        stages = %trail,
        "request"
    );
    response
}
