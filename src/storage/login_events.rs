use parking_lot::Mutex;

use super::{LoginAttempt, LoginEventSink, StoreError};
use crate::identity::UserId;

/// Append-only in-memory login history.
#[derive(Debug, Default)]
pub struct MemoryLoginEventSink {
    events: Mutex<Vec<LoginAttempt>>,
}

impl MemoryLoginEventSink {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.events.lock().len() }

    pub fn is_empty(&self) -> bool { self.events.lock().is_empty() }

    pub fn snapshot(&self) -> Vec<LoginAttempt> { self.events.lock().clone() }
}

impl LoginEventSink for MemoryLoginEventSink {
    fn append(&self, attempt: LoginAttempt) -> Result<(), StoreError> {
        self.events.lock().push(attempt);
        Ok(())
    }

    fn list_for_user(&self, user_id: UserId) -> Result<Vec<LoginAttempt>, StoreError> {
        Ok(self.events.lock().iter().filter(|a| a.subject_user_id == user_id).cloned().collect())
    }
}
