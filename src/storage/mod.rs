//!
//! usergate storage collaborators
//! ------------------------------
//! The authentication core only talks to storage through two narrow traits:
//! - `UserStore`: create/read/update/delete/find-by-name of user records.
//! - `LoginEventSink`: append-only record of login attempts.
//!
//! Both are responsible for their own concurrency control. The in-memory
//! implementations here guard their state with `parking_lot` locks and are what
//! the binary runs with; a database-backed store slots in behind the same traits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::identity::{Role, UserId};

mod users;
mod login_events;

pub use users::MemoryUserStore;
pub use login_events::MemoryLoginEventSink;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    /// Transient failure; the caller decides whether the request fails.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A persisted user. The password hash never leaves the process in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating a user; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

pub trait UserStore: Send + Sync {
    fn find_by_username(&self, username: &str) -> Result<User, StoreError>;
    fn find_by_id(&self, id: UserId) -> Result<User, StoreError>;
    /// Fails with `Conflict` when the username is already taken.
    fn create(&self, user: NewUser) -> Result<User, StoreError>;
    /// Replaces the stored record with the same id. `NotFound` if absent,
    /// `Conflict` if the new username belongs to another user.
    fn update(&self, user: User) -> Result<User, StoreError>;
    fn delete(&self, id: UserId) -> Result<(), StoreError>;
    fn list_all(&self) -> Result<Vec<User>, StoreError>;
}

/// One login attempt. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAttempt {
    pub source_address: String,
    /// When the attempt was adjudicated, not when it was written.
    pub occurred_at: DateTime<Utc>,
    pub succeeded: bool,
    pub client_agent: String,
    /// 0 when the username matched no user.
    pub subject_user_id: UserId,
}

pub trait LoginEventSink: Send + Sync {
    fn append(&self, attempt: LoginAttempt) -> Result<(), StoreError>;
    fn list_for_user(&self, user_id: UserId) -> Result<Vec<LoginAttempt>, StoreError>;
}

pub type SharedUserStore = Arc<dyn UserStore>;
pub type SharedLoginSink = Arc<dyn LoginEventSink>;
