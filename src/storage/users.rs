use std::collections::BTreeMap;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;

use super::{NewUser, StoreError, User, UserStore};
use crate::identity::UserId;

#[derive(Debug, Default)]
struct Inner {
    next_id: UserId,
    users: BTreeMap<UserId, User>,
}

impl Inner {
    fn username_owner(&self, username: &str) -> Option<UserId> {
        self.users.values().find(|u| u.username == username).map(|u| u.id)
    }
}

/// Process-local user table. Ids start at 1 and are never reused.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    inner: RwLock<Inner>,
}

impl MemoryUserStore {
    pub fn new() -> Self { Self::default() }
}

impl UserStore for MemoryUserStore {
    fn find_by_username(&self, username: &str) -> Result<User, StoreError> {
        let g = self.inner.read();
        g.users.values().find(|u| u.username == username).cloned().ok_or(StoreError::NotFound)
    }

    fn find_by_id(&self, id: UserId) -> Result<User, StoreError> {
        self.inner.read().users.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut g = self.inner.write();
        if g.username_owner(&user.username).is_some() {
            return Err(StoreError::Conflict(format!("username '{}'", user.username)));
        }
        g.next_id += 1;
        let now = Utc::now();
        let stored = User {
            id: g.next_id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        g.users.insert(stored.id, stored.clone());
        debug!(target: "usergate::store", "user.create id={} role={}", stored.id, stored.role);
        Ok(stored)
    }

    fn update(&self, mut user: User) -> Result<User, StoreError> {
        let mut g = self.inner.write();
        let Some(existing) = g.users.get(&user.id) else { return Err(StoreError::NotFound); };
        let created_at = existing.created_at;
        if let Some(owner) = g.username_owner(&user.username) {
            if owner != user.id { return Err(StoreError::Conflict(format!("username '{}'", user.username))); }
        }
        user.created_at = created_at;
        user.updated_at = Utc::now();
        g.users.insert(user.id, user.clone());
        debug!(target: "usergate::store", "user.update id={}", user.id);
        Ok(user)
    }

    fn delete(&self, id: UserId) -> Result<(), StoreError> {
        match self.inner.write().users.remove(&id) {
            Some(_) => { debug!(target: "usergate::store", "user.delete id={}", id); Ok(()) }
            None => Err(StoreError::NotFound),
        }
    }

    fn list_all(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.inner.read().users.values().cloned().collect())
    }
}
