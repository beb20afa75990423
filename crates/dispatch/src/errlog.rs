//! User-facing error log seam.
//!
//! Every recognized failure classification is appended here before the
//! error re-surfaces to the caller, so account settings can show the user
//! why their calls fail. `()` is the no-op log; [`MemoryErrorLog`] is the
//! in-memory implementation used by tests and small embedders.

use crate::ErrorKind;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// Receives user-facing error entries from the dispatcher.
pub trait ErrorLog: Send + Sync {
    /// Append an entry for the user.
    fn append(
        &self,
        user: &str,
        kind: ErrorKind,
        message: &str,
    ) -> impl Future<Output = ()> + Send;
}

/// `()` as the no-op log.
impl ErrorLog for () {
    async fn append(&self, _user: &str, _kind: ErrorKind, _message: &str) {}
}

/// Logs can be shared between the dispatcher and their owner.
impl<T: ErrorLog> ErrorLog for std::sync::Arc<T> {
    async fn append(&self, user: &str, kind: ErrorKind, message: &str) {
        T::append(self, user, kind, message).await;
    }
}

/// One logged failure.
#[derive(Debug, Clone)]
pub struct ErrorEntry {
    /// The user the failure belongs to.
    pub user: String,
    /// Which known failure pattern matched.
    pub kind: ErrorKind,
    /// The original error message.
    pub message: String,
    /// When the entry was appended.
    pub at: DateTime<Utc>,
}

/// An in-memory error log.
#[derive(Debug, Default)]
pub struct MemoryErrorLog {
    entries: Mutex<Vec<ErrorEntry>>,
}

impl MemoryErrorLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the entries appended so far.
    pub fn entries(&self) -> Vec<ErrorEntry> {
        self.entries.lock().expect("error log lock poisoned").clone()
    }
}

impl ErrorLog for MemoryErrorLog {
    async fn append(&self, user: &str, kind: ErrorKind, message: &str) {
        let entry = ErrorEntry {
            user: user.to_owned(),
            kind,
            message: message.to_owned(),
            at: Utc::now(),
        };
        self.entries
            .lock()
            .expect("error log lock poisoned")
            .push(entry);
    }
}
