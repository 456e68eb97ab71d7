//! Error types for lock link and notification operations.
//!
//! Link failures are ordinary values: the engine counts them, logs them and
//! retries on the next poll. Nothing here is fatal to the process.

/// Result type alias for lock link operations.
pub type Result<T> = std::result::Result<T, LinkError>;

/// Errors reported by a lock backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// The backend network is not ready yet.
    #[error("Lock link not ready")]
    NotReady,

    /// Reading slot codes from the lock failed.
    #[error("Poll of {lock} failed: {message}")]
    PollFailed { lock: String, message: String },

    /// Writing a slot code to the lock failed.
    #[error("Write to {lock} slot {slot} failed: {message}")]
    WriteFailed {
        lock: String,
        slot: u16,
        message: String,
    },

    /// Generic error with custom message.
    #[error("{0}")]
    Other(String),
}

impl LinkError {
    pub fn poll_failed(lock: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PollFailed {
            lock: lock.into(),
            message: message.into(),
        }
    }

    pub fn write_failed(lock: impl Into<String>, slot: u16, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            lock: lock.into(),
            slot,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Errors reported by a notification channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification channel unavailable: {0}")]
    Unavailable(String),

    #[error("Notification rejected: {message}")]
    Rejected { message: String },
}

impl NotifyError {
    pub fn unavailable(channel: impl Into<String>) -> Self {
        Self::Unavailable(channel.into())
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}
