//! User management handlers.
//!
//! `GET/PUT /user/{id}` and `GET /user/{id}/logins` are open to both roles and
//! run the ownership gate themselves. The remaining routes sit behind the admin
//! role gate, so by the time they run the caller is known to be ADMIN.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use super::lifecycle::{Pipeline, Stage};
use super::middleware::Caller;
use super::validate::{self, CreateUserPayload, UpdateUserPayload};
use crate::error::{AppError, AppResult};
use crate::identity::{evaluate, evaluate_update, UserId};
use crate::security;
use crate::storage::{LoginAttempt, NewUser, StoreError, User};
use crate::server::AppState;

pub const MSG_USER_NOT_FOUND: &str = "user not found";
pub const MSG_USERNAME_TAKEN: &str = "username already taken";
pub const MSG_NOT_OWNER: &str = "not allowed to access another user";
pub const MSG_ROLE_CHANGE: &str = "not allowed to change role";

fn not_found() -> AppError { AppError::not_found("not_found", MSG_USER_NOT_FOUND) }
fn username_taken() -> AppError { AppError::conflict("username_taken", MSG_USERNAME_TAKEN) }

fn load_user(state: &AppState, id: UserId) -> AppResult<User> {
    match state.users.find_by_id(id) {
        Ok(u) => Ok(u),
        Err(StoreError::NotFound) => Err(not_found()),
        Err(e) => Err(AppError::from_store("failed to load user", &e)),
    }
}

/// Reject when `username` belongs to a user other than `except`.
fn ensure_username_free(state: &AppState, username: &str, except: Option<UserId>) -> AppResult<()> {
    match state.users.find_by_username(username) {
        Ok(existing) if Some(existing.id) == except => Ok(()),
        Ok(_) => Err(username_taken()),
        Err(StoreError::NotFound) => Ok(()),
        Err(e) => Err(AppError::from_store("failed to check username", &e)),
    }
}

async fn hash(state: &AppState, password: String) -> AppResult<String> {
    let cfg = state.hasher;
    tokio::task::spawn_blocking(move || security::hash_password_with(&cfg, &password))
        .await
        .map_err(|e| AppError::from(anyhow::anyhow!("hash task failed: {e}")))?
        .map_err(AppError::from)
}

fn ownership_gate(stage: &Pipeline, caller: &Caller, target: UserId) -> AppResult<()> {
    stage.enter(Stage::Authorizing)?;
    let decision = evaluate(&caller.0, target);
    if !decision.allow {
        return Err(AppError::forbidden("forbidden", MSG_NOT_OWNER));
    }
    Ok(())
}

/// `GET /users` (admin).
pub async fn list_users(State(state): State<AppState>, stage: Pipeline) -> AppResult<Json<Vec<User>>> {
    stage.enter(Stage::Handling)?;
    state.users.list_all().map(Json).map_err(|e| AppError::from_store("failed to list users", &e))
}

/// `GET /user/{id}`.
pub async fn get_user(
    State(state): State<AppState>,
    stage: Pipeline,
    caller: Caller,
    id: Result<Path<UserId>, PathRejection>,
) -> AppResult<Json<User>> {
    let id = validate::user_id(id)?;
    ownership_gate(&stage, &caller, id)?;
    stage.enter(Stage::Handling)?;
    load_user(&state, id).map(Json)
}

/// `POST /user` (admin).
pub async fn create_user(
    State(state): State<AppState>,
    stage: Pipeline,
    Caller(caller): Caller,
    payload: Result<Json<CreateUserPayload>, JsonRejection>,
) -> AppResult<(StatusCode, Json<User>)> {
    stage.enter(Stage::Handling)?;
    let req = validate::create_user(validate::body(payload)?)?;
    ensure_username_free(&state, &req.username, None)?;
    let password_hash = hash(&state, req.password).await?;
    let created = match state.users.create(NewUser { username: req.username, email: req.email, password_hash, role: req.role }) {
        Ok(u) => u,
        Err(StoreError::Conflict(_)) => return Err(username_taken()),
        Err(e) => return Err(AppError::from_store("failed to create user", &e)),
    };
    info!(target: "usergate::users", by = caller.id, id = created.id, role = %created.role, "user created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// `PUT /user/{id}`.
pub async fn update_user(
    State(state): State<AppState>,
    stage: Pipeline,
    caller: Caller,
    id: Result<Path<UserId>, PathRejection>,
    payload: Result<Json<UpdateUserPayload>, JsonRejection>,
) -> AppResult<Json<User>> {
    let id = validate::user_id(id)?;
    ownership_gate(&stage, &caller, id)?;
    stage.enter(Stage::Handling)?;
    let mut user = load_user(&state, id)?;
    let patch = validate::update_user(validate::body(payload)?)?;

    if !evaluate_update(&caller.0, id, user.role, patch.role).allow {
        return Err(AppError::forbidden("forbidden", MSG_ROLE_CHANGE));
    }
    if let Some(name) = patch.username {
        if name != user.username {
            ensure_username_free(&state, &name, Some(id))?;
            user.username = name;
        }
    }
    if let Some(email) = patch.email { user.email = email; }
    if let Some(pw) = patch.password { user.password_hash = hash(&state, pw).await?; }
    if let Some(role) = patch.role { user.role = role; }

    let updated = match state.users.update(user) {
        Ok(u) => u,
        Err(StoreError::NotFound) => return Err(not_found()),
        Err(StoreError::Conflict(_)) => return Err(username_taken()),
        Err(e) => return Err(AppError::from_store("failed to update user", &e)),
    };
    info!(target: "usergate::users", by = caller.0.id, id = updated.id, "user updated");
    Ok(Json(updated))
}

/// `DELETE /user/{id}` (admin).
pub async fn delete_user(
    State(state): State<AppState>,
    stage: Pipeline,
    Caller(caller): Caller,
    id: Result<Path<UserId>, PathRejection>,
) -> AppResult<Json<Value>> {
    let id = validate::user_id(id)?;
    stage.enter(Stage::Handling)?;
    match state.users.delete(id) {
        Ok(()) => {
            info!(target: "usergate::users", by = caller.id, id, "user deleted");
            Ok(Json(json!({ "message": "user deleted" })))
        }
        Err(StoreError::NotFound) => Err(not_found()),
        Err(e) => Err(AppError::from_store("failed to delete user", &e)),
    }
}

/// `GET /user/{id}/logins`.
pub async fn list_logins(
    State(state): State<AppState>,
    stage: Pipeline,
    caller: Caller,
    id: Result<Path<UserId>, PathRejection>,
) -> AppResult<Json<Vec<LoginAttempt>>> {
    let id = validate::user_id(id)?;
    ownership_gate(&stage, &caller, id)?;
    stage.enter(Stage::Handling)?;
    load_user(&state, id)?;
    state.login_events.list_for_user(id).map(Json).map_err(|e| AppError::from_store("failed to read login history", &e))
}
