//! Store errors.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Snapshot store failures.
///
/// None of these are retryable: the store is deterministic, so repeating a
/// failed operation without outside intervention repeats the failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No committed snapshot under this identifier. Also reported for
    /// identifiers that fail validation, since those can never name one.
    #[error("no snapshot for module `{module}`")]
    NotFound { module: String },

    /// The stored envelope failed an integrity check or could not be read.
    #[error("corrupt snapshot for module `{module}`: {reason}")]
    Corrupt { module: String, reason: String },

    /// `init_module` for an identifier that already has a snapshot.
    #[error("module `{module}` is already initialized")]
    AlreadyExists { module: String },

    /// A write-path failure: the previously committed snapshot is intact,
    /// but the new one could not be persisted.
    #[error("snapshot i/o failure: {context}: {reason}")]
    Io { context: String, reason: String },
}

impl StoreError {
    pub fn not_found(module: impl Into<String>) -> Self {
        StoreError::NotFound {
            module: module.into(),
        }
    }

    pub fn corrupt(module: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::Corrupt {
            module: module.into(),
            reason: reason.into(),
        }
    }

    pub fn already_exists(module: impl Into<String>) -> Self {
        StoreError::AlreadyExists {
            module: module.into(),
        }
    }

    pub fn io(context: impl Into<String>, err: std::io::Error) -> Self {
        StoreError::Io {
            context: context.into(),
            reason: err.to_string(),
        }
    }
}
