use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;

use super::principal::{CallerIdentity, UserId};
use super::session::TokenCodec;
use crate::security::{self, PasswordHasherConfig};
use crate::storage::{SharedUserStore, StoreError, User};
use crate::tprintln;

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Error)]
pub enum LoginError {
    /// Unknown username or wrong password. `subject` is 0 when the name matched nobody.
    #[error("invalid credentials")]
    InvalidCredentials { subject: UserId },
    #[error("user store failure: {0}")]
    Store(StoreError),
}

impl LoginError {
    pub fn subject(&self) -> Option<UserId> {
        match self { LoginError::InvalidCredentials { subject } => Some(*subject), LoginError::Store(_) => None }
    }
}

pub trait AuthProvider: Send + Sync {
    fn login(&self, req: &LoginRequest) -> Result<LoginResponse, LoginError>;
}

/// Password login against the configured user store.
pub struct LocalAuthProvider {
    users: SharedUserStore,
    codec: Arc<dyn TokenCodec>,
    /// Verified against when the username is unknown so both failure paths cost the same.
    dummy_hash: String,
}

impl LocalAuthProvider {
    pub fn new(users: SharedUserStore, codec: Arc<dyn TokenCodec>, hasher: &PasswordHasherConfig) -> Result<Self> {
        let dummy_hash = security::hash_password_with(hasher, "usergate-dummy-password")?;
        Ok(Self { users, codec, dummy_hash })
    }
}

impl AuthProvider for LocalAuthProvider {
    fn login(&self, req: &LoginRequest) -> Result<LoginResponse, LoginError> {
        let user = match self.users.find_by_username(&req.username) {
            Ok(u) => u,
            Err(StoreError::NotFound) => {
                let _ = security::verify_password(&self.dummy_hash, &req.password);
                return Err(LoginError::InvalidCredentials { subject: 0 });
            }
            Err(e) => return Err(LoginError::Store(e)),
        };
        if !security::verify_password(&user.password_hash, &req.password) {
            return Err(LoginError::InvalidCredentials { subject: user.id });
        }
        let identity = CallerIdentity::new(user.id, user.username.clone(), user.role);
        let token = self.codec.encode(&identity);
        tprintln!("auth.login user={} id={} scheme={}", user.username, user.id, self.codec.scheme());
        Ok(LoginResponse { user, token })
    }
}
