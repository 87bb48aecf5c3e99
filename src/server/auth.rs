use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::{error, info};

use super::lifecycle::{Pipeline, Stage};
use super::validate::{self, LoginPayload};
use crate::error::{AppError, AppResult};
use crate::identity::{LoginError, RequestContext, Role, UserId};
use crate::server::AppState;

/// Identical for unknown usernames and wrong passwords.
pub const MSG_INVALID_CREDENTIALS: &str = "invalid credentials";

#[derive(Debug, Serialize)]
pub struct LoginResponseBody {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub token: String,
}

/// `POST /login`. The attempt is recorded on a detached task once it has been
/// adjudicated; the response never waits for that write.
pub async fn login(
    State(state): State<AppState>,
    stage: Pipeline,
    ctx: RequestContext,
    payload: Result<Json<LoginPayload>, JsonRejection>,
) -> AppResult<Json<LoginResponseBody>> {
    stage.enter(Stage::Handling)?;
    let req = validate::login(validate::body(payload)?)?;
    let username = req.username.clone();

    // Argon2 verification is CPU-bound
    let provider = state.auth.clone();
    let outcome = tokio::task::spawn_blocking(move || provider.login(&req)).await.map_err(|e| {
        error!(target: "usergate::login", error = %e, "login task failed");
        AppError::internal("internal", "internal server error")
    })?;

    match outcome {
        Ok(resp) => {
            stage.enter(Stage::LoginRecording)?;
            let _ = state.recorder.record(ctx.source_address.clone(), ctx.client_agent.clone(), resp.user.id, true);
            info!(target: "usergate::login", request_id = %ctx.request_id, id = resp.user.id, client = %ctx.source_address, "login succeeded");
            Ok(Json(LoginResponseBody {
                id: resp.user.id,
                username: resp.user.username,
                email: resp.user.email,
                role: resp.user.role,
                token: resp.token,
            }))
        }
        Err(LoginError::InvalidCredentials { subject }) => {
            stage.enter(Stage::LoginRecording)?;
            let _ = state.recorder.record(ctx.source_address.clone(), ctx.client_agent.clone(), subject, false);
            info!(target: "usergate::login", request_id = %ctx.request_id, username = %username, client = %ctx.source_address, "login rejected");
            Err(AppError::unauthenticated("invalid_credentials", MSG_INVALID_CREDENTIALS))
        }
        Err(LoginError::Store(e)) => Err(AppError::from_store("failed to look up user", &e)),
    }
}
