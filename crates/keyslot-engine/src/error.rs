use keyslot_core::{LockId, PolicyError};
use keyslot_link::LinkError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    // Input errors
    #[error("Invalid slot policy: {0}")]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Core(#[from] keyslot_core::Error),

    // Lookup errors
    #[error("Slot {slot} is not managed on {lock}")]
    UnknownSlot { lock: LockId, slot: u16 },

    #[error("Lock not loaded: {0}")]
    LockNotLoaded(LockId),

    #[error("Lock already loaded: {0}")]
    AlreadyLoaded(LockId),

    // Collaborator errors
    #[error("Lock link error: {0}")]
    Link(#[from] LinkError),

    #[error("Storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl EngineError {
    pub fn storage(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage(Box::new(error))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_slot_message() {
        let error = EngineError::UnknownSlot {
            lock: LockId::new("lock.front").unwrap(),
            slot: 42,
        };
        assert_eq!(error.to_string(), "Slot 42 is not managed on lock.front");
    }

    #[test]
    fn test_policy_error_converts() {
        let error: EngineError = PolicyError::UnknownDay("funday".to_string()).into();
        assert!(matches!(error, EngineError::Policy(_)));
    }

    #[test]
    fn test_storage_error_keeps_source() {
        let io = std::io::Error::other("disk full");
        let error = EngineError::storage(io);
        assert_eq!(error.to_string(), "Storage error: disk full");
        assert!(std::error::Error::source(&error).is_some());
    }
}
