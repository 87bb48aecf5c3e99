//! Fire-and-forget login auditing.
//!
//! `record` captures everything by value, stamps the adjudication time, and hands
//! the append to the blocking pool. The request never waits on it and never sees
//! its outcome; a failed append is logged and dropped. There is no retry queue.

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::principal::UserId;
use crate::storage::{LoginAttempt, SharedLoginSink};

#[derive(Clone)]
pub struct LoginEventRecorder {
    sink: SharedLoginSink,
}

impl LoginEventRecorder {
    pub fn new(sink: SharedLoginSink) -> Self { Self { sink } }

    /// Dispatch one attempt. Callers normally drop the returned handle, which
    /// detaches the task; tests may await it.
    pub fn record(&self, source_address: String, client_agent: String, subject_user_id: UserId, succeeded: bool) -> JoinHandle<()> {
        let attempt = LoginAttempt { source_address, occurred_at: Utc::now(), succeeded, client_agent, subject_user_id };
        let sink = self.sink.clone();
        tokio::task::spawn_blocking(move || {
            let subject = attempt.subject_user_id;
            match sink.append(attempt) {
                Ok(()) => debug!(target: "usergate::login", subject, succeeded, "login attempt recorded"),
                Err(e) => warn!(target: "usergate::login", subject, succeeded, error = %e, "failed to record login attempt"),
            }
        })
    }
}
