//! Request payloads and their validation. Everything here fails with a 400-class
//! `AppError` whose message may quote the offending detail.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::Path;
use axum::Json;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::identity::{LoginRequest, Role, UserId};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").expect("email pattern compiles"));

const USERNAME_LEN: (usize, usize) = (3, 50);
const EMAIL_MAX: usize = 100;
const PASSWORD_LEN: (usize, usize) = (6, 255);

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserPayload {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserPayload {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

/// Validated create request; the password is still plaintext here.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Validated partial update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

fn invalid(msg: &str) -> AppError { AppError::malformed("validation_error", msg) }

pub fn is_blank(s: &str) -> bool { s.trim().is_empty() }

fn present(v: Option<String>) -> Option<String> { v.filter(|s| !is_blank(s)) }

pub fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload.map(|Json(v)| v).map_err(|rej| AppError::malformed("invalid_body", format!("invalid request body: {}", rej.body_text()).as_str()))
}

pub fn user_id(path: Result<Path<UserId>, PathRejection>) -> AppResult<UserId> {
    path.map(|Path(id)| id).map_err(|_| AppError::malformed("invalid_id", "invalid user id"))
}

fn check_len(field: &str, value: &str, (min, max): (usize, usize)) -> AppResult<()> {
    let n = value.chars().count();
    if n < min || n > max {
        return Err(invalid(&format!("{} must be between {} and {} characters", field, min, max)));
    }
    Ok(())
}

fn check_email(email: &str) -> AppResult<()> {
    if email.chars().count() > EMAIL_MAX {
        return Err(invalid(&format!("email must be at most {} characters", EMAIL_MAX)));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(invalid(&format!("invalid email address '{}'", email)));
    }
    Ok(())
}

fn parse_role(role: &str) -> AppResult<Role> {
    role.parse::<Role>().map_err(|_| invalid(&format!("role must be USER or ADMIN, got '{}'", role)))
}

pub fn login(p: LoginPayload) -> AppResult<LoginRequest> {
    if is_blank(&p.username) || is_blank(&p.password) {
        return Err(AppError::malformed("validation_error", "username and password are required"));
    }
    Ok(LoginRequest { username: p.username, password: p.password })
}

pub fn create_user(p: CreateUserPayload) -> AppResult<CreateUser> {
    for (field, v) in [("username", &p.username), ("email", &p.email), ("password", &p.password), ("role", &p.role)] {
        if is_blank(v) { return Err(invalid(&format!("{} is required", field))); }
    }
    check_len("username", &p.username, USERNAME_LEN)?;
    check_email(&p.email)?;
    check_len("password", &p.password, PASSWORD_LEN)?;
    let role = parse_role(&p.role)?;
    Ok(CreateUser { username: p.username, email: p.email, password: p.password, role })
}

pub fn update_user(p: UpdateUserPayload) -> AppResult<UserPatch> {
    let patch = UserPatch {
        username: present(p.username),
        email: present(p.email),
        password: present(p.password),
        role: present(p.role).map(|r| parse_role(&r)).transpose()?,
    };
    if let Some(u) = &patch.username { check_len("username", u, USERNAME_LEN)?; }
    if let Some(e) = &patch.email { check_email(e)?; }
    if let Some(pw) = &patch.password { check_len("password", pw, PASSWORD_LEN)?; }
    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(u: &str, e: &str, p: &str, r: &str) -> AppResult<CreateUser> {
        create_user(CreateUserPayload { username: u.into(), email: e.into(), password: p.into(), role: r.into() })
    }

    #[test]
    fn create_accepts_valid_payload() {
        let c = create("carol", "carol@example.com", "secret1", "USER").unwrap();
        assert_eq!(c.role, Role::User);
    }

    #[test]
    fn create_enforces_constraints() {
        assert!(create("", "a@b.co", "secret1", "USER").unwrap_err().message().contains("username is required"));
        assert!(create("ab", "a@b.co", "secret1", "USER").is_err());
        assert!(create(&"x".repeat(51), "a@b.co", "secret1", "USER").is_err());
        assert!(create("carol", "not-an-email", "secret1", "USER").unwrap_err().message().contains("not-an-email"));
        assert!(create("carol", &format!("{}@example.com", "a".repeat(95)), "secret1", "USER").is_err());
        assert!(create("carol", "a@b.co", "short", "USER").is_err());
        assert!(create("carol", "a@b.co", "secret1", "ROOT").unwrap_err().message().contains("ROOT"));
    }

    #[test]
    fn validation_errors_carry_code_and_detail() {
        let e = create("carol", "a@b.co", "secret1", "ROOT").unwrap_err();
        assert_eq!(e.code_str(), "validation_error");
        assert_eq!(e.message(), "role must be USER or ADMIN, got 'ROOT'");
        assert_eq!(e.http_status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn update_treats_blank_as_absent() {
        let p = update_user(UpdateUserPayload { username: Some("  ".into()), email: Some("x@y.com".into()), ..Default::default() }).unwrap();
        assert_eq!(p, UserPatch { email: Some("x@y.com".into()), ..Default::default() });
    }

    #[test]
    fn update_validates_present_fields() {
        assert!(update_user(UpdateUserPayload { role: Some("admin".into()), ..Default::default() }).is_err());
        assert!(update_user(UpdateUserPayload { password: Some("123".into()), ..Default::default() }).is_err());
        let p = update_user(UpdateUserPayload { role: Some("ADMIN".into()), ..Default::default() }).unwrap();
        assert_eq!(p.role, Some(Role::Admin));
    }

    #[test]
    fn login_requires_both_fields() {
        assert!(login(LoginPayload { username: "bob".into(), password: " ".into() }).is_err());
        assert!(login(LoginPayload { username: "bob".into(), password: "pw".into() }).is_ok());
    }
}
