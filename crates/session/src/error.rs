use storage::StorageError;
use thiserror::Error;

/// Session lifecycle errors. Messages are shown to the user as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("A journey is already in progress")]
    AlreadyActive,

    #[error("No active journey")]
    NoActiveSession,

    #[error("Could not start monitoring: {0}")]
    ResourceUnavailable(String),

    #[error("Camera disconnected; the journey was ended automatically")]
    StreamEnded,

    #[error("Could not save journey: {0}")]
    PersistenceFailure(StorageError),
}

impl From<StorageError> for SessionError {
    fn from(err: StorageError) -> Self {
        SessionError::PersistenceFailure(err)
    }
}
