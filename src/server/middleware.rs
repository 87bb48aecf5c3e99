//! Authentication and role-gate middleware plus the extractors handlers use to
//! read what they attached.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, error};

use super::lifecycle::{enter, Stage};
use crate::error::{AppError, AppResult};
use crate::identity::{check_role, CallerIdentity, RequestContext, Role, TokenCodec};
use crate::server::AppState;

pub const MSG_AUTH_REQUIRED: &str = "authentication required";
pub const MSG_MALFORMED_AUTH: &str = "malformed auth header";
pub const MSG_INVALID_TOKEN: &str = "invalid token";
pub const MSG_ADMIN_REQUIRED: &str = "admin privileges required";

/// Turn an `Authorization` header into a caller identity.
///
/// Only `Bearer <token>` is accepted: exact scheme name, exactly one space, and
/// no further spaces in the token. Pure and deterministic for a given header.
pub fn authenticate_header(codec: &dyn TokenCodec, header: Option<&HeaderValue>) -> AppResult<CallerIdentity> {
    let Some(value) = header else {
        return Err(AppError::unauthenticated("missing_auth", MSG_AUTH_REQUIRED));
    };
    let Ok(text) = value.to_str() else {
        return Err(AppError::unauthenticated("malformed_auth", MSG_MALFORMED_AUTH));
    };
    let token = match text.strip_prefix("Bearer ") {
        Some(t) if !t.contains(' ') => t,
        _ => return Err(AppError::unauthenticated("malformed_auth", MSG_MALFORMED_AUTH)),
    };
    codec.decode(token).map_err(|e| {
        debug!(target: "usergate::auth", reason = %e, scheme = codec.scheme(), "token rejected");
        AppError::unauthenticated("invalid_token", MSG_INVALID_TOKEN)
    })
}

/// First stage on every protected route.
pub async fn authenticate(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    if let Err(e) = enter(&req, Stage::Authenticating) { return e.into_response(); }
    match authenticate_header(state.codec.as_ref(), req.headers().get(AUTHORIZATION)) {
        Ok(identity) => {
            debug!(target: "usergate::auth", id = identity.id, role = %identity.role, "authenticated");
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

/// Role gate for admin-only routes. Must sit inside [`authenticate`]; without an
/// identity present it fails with 500 instead of letting the request through.
pub async fn require_admin(req: Request, next: Next) -> Response {
    require_role(Role::Admin, req, next).await
}

async fn require_role(required: Role, req: Request, next: Next) -> Response {
    if let Err(e) = enter(&req, Stage::Authorizing) { return e.into_response(); }
    let Some(caller) = req.extensions().get::<CallerIdentity>() else {
        error!(target: "usergate::auth", ?required, "role gate reached without an authenticated caller");
        return AppError::internal("internal", "internal server error").into_response();
    };
    let decision = check_role(caller, required);
    if !decision.allow {
        debug!(target: "usergate::auth", id = caller.id, reason = ?decision.reason, "role gate denied");
        return AppError::forbidden("forbidden", MSG_ADMIN_REQUIRED).into_response();
    }
    next.run(req).await
}

/// The authenticated caller, as attached by [`authenticate`].
#[derive(Debug, Clone)]
pub struct Caller(pub CallerIdentity);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<CallerIdentity>().cloned().map(Caller).ok_or_else(|| {
            error!(target: "usergate::auth", path = %parts.uri.path(), "handler reached without an authenticated caller");
            AppError::internal("internal", "internal server error")
        })
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<RequestContext>().cloned().ok_or_else(|| AppError::internal("internal", "internal server error"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{PlaceholderTokenCodec, SignedTokenCodec};
    use axum::http::StatusCode;
    use std::time::Duration;

    fn hv(s: &'static str) -> HeaderValue { HeaderValue::from_static(s) }

    #[test]
    fn missing_header() {
        let e = authenticate_header(&PlaceholderTokenCodec, None).unwrap_err();
        assert_eq!(e.http_status(), StatusCode::UNAUTHORIZED);
        assert_eq!(e.message(), MSG_AUTH_REQUIRED);
    }

    #[test]
    fn malformed_headers() {
        for h in ["admin-token", "bearer admin-token", "Bearer  admin-token", "Bearer admin-token extra", "Basic YWxhZGRpbjpvcGVuc2VzYW1l", "Bearer"] {
            let e = authenticate_header(&PlaceholderTokenCodec, Some(&hv(h))).unwrap_err();
            assert_eq!(e.message(), MSG_MALFORMED_AUTH, "header {:?}", h);
        }
    }

    #[test]
    fn undecodable_token() {
        for h in ["Bearer root-token", "Bearer user-token-x", "Bearer "] {
            let e = authenticate_header(&PlaceholderTokenCodec, Some(&hv(h))).unwrap_err();
            assert_eq!(e.message(), MSG_INVALID_TOKEN, "header {:?}", h);
            assert_eq!(e.http_status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn valid_tokens_yield_identity_idempotently() {
        let h = hv("Bearer user-token-5");
        let a = authenticate_header(&PlaceholderTokenCodec, Some(&h)).unwrap();
        let b = authenticate_header(&PlaceholderTokenCodec, Some(&h)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.id, 5);
        assert_eq!(a.role, Role::User);
    }

    async fn unauthenticated_pipeline_status(router: axum::Router<AppState>) -> (StatusCode, String) {
        use crate::identity::PlaceholderTokenCodec;
        use crate::security::PasswordHasherConfig;
        use crate::storage::{MemoryLoginEventSink, MemoryUserStore};
        use axum::middleware::from_fn_with_state;
        use std::sync::Arc;
        use tower::ServiceExt;

        let state = AppState::new(
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryLoginEventSink::new()),
            Arc::new(PlaceholderTokenCodec),
            PasswordHasherConfig::insecure_fast(),
            vec![],
        )
        .unwrap();
        let app = router.layer(from_fn_with_state(state.clone(), crate::server::lifecycle::track)).with_state(state);
        let req = axum::http::Request::builder()
            .uri("/gated")
            .header(AUTHORIZATION, "Bearer admin-token")
            .body(axum::body::Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn role_gate_without_authentication_fails_closed() {
        use axum::middleware::from_fn;
        use axum::routing::get;

        let router = axum::Router::new()
            .route("/gated", get(|| async { "reached" }))
            .route_layer(from_fn(require_admin));
        let (status, body) = unauthenticated_pipeline_status(router).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, r#"{"error":"internal server error"}"#);
    }

    #[tokio::test]
    async fn caller_extractor_without_authentication_fails_closed() {
        use axum::routing::get;

        let router = axum::Router::new().route("/gated", get(|Caller(c): Caller| async move { c.display_name }));
        let (status, body) = unauthenticated_pipeline_status(router).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, r#"{"error":"internal server error"}"#);
    }

    #[test]
    fn signed_scheme_through_header() {
        let codec = SignedTokenCodec::new(b"k", Duration::from_secs(60)).unwrap();
        let ident = CallerIdentity::new(9, "nine", Role::Admin);
        let header = HeaderValue::from_str(&format!("Bearer {}", codec.encode(&ident))).unwrap();
        assert_eq!(authenticate_header(&codec, Some(&header)).unwrap(), ident);
        // Placeholder literals mean nothing to the signed codec
        assert!(authenticate_header(&codec, Some(&hv("Bearer admin-token"))).is_err());
    }
}
