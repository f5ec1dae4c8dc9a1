use std::path::PathBuf;
use storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Refusing to create a password store at {0} without explicit authorization")]
    CreationNotAuthorized(PathBuf),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] StorageError),

    #[error("Password hashing failed: {0}")]
    HashComputationFailed(String),

    #[error("Invalid hash cost {0}: must be between 4 and 31")]
    InvalidCost(u32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No account named {0}")]
    NotFound(String),

    #[error("Found {count} accounts named {username}")]
    DuplicateRecord { username: String, count: usize },

    #[error("Wrong password for {0}")]
    InvalidPassword(String),

    #[error("Stored {field} for {username} has the wrong type")]
    CorruptRecord { username: String, field: &'static str },
}

impl CredentialError {
    /// Not-found is an ordinary negative answer rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CredentialError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, CredentialError>;
