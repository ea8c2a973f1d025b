//! Error types for key store operations.
//!
//! This module defines all application errors and the stable error codes
//! the command layer reports to the user.

use std::path::PathBuf;

/// Application-wide error type.
///
/// This enum represents all possible errors that can occur while managing keys.
/// Each variant maps to a stable error code (see [`AppError::code`]).
///
/// # Error Categories
///
/// - **Lookup Errors**: Requested key does not exist
/// - **Lifecycle Errors**: Transitions the key state machine forbids
/// - **Storage Errors**: The store file is unreadable or cannot be written
/// - **Validation Errors**: Invalid counts, durations or filters
/// - **Publish Errors**: The version-control sink failed
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// No record matches the requested key string.
    #[error("Key not found: {0}")]
    NotFound(String),

    /// The key was already marked as used.
    ///
    /// Re-marking is rejected so that `usedAt` is only ever set once.
    #[error("Key already used: {0}")]
    AlreadyUsed(String),

    /// The persisted store exists but is not a valid key collection.
    ///
    /// Recoverable: callers usually log a warning and continue with an
    /// empty store.
    #[error("Corrupt key store at {}: {source}", path.display())]
    CorruptStore {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Reading or writing a file failed.
    ///
    /// This wraps any std::io::Error using the `#[from]` attribute.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding the collection failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A count, duration or filter supplied by the user is invalid.
    ///
    /// The String contains details about what was invalid.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The publish collaborator could not commit or push the store.
    #[error("Publish failed: {0}")]
    Publish(String),
}

impl AppError {
    /// Stable machine-readable code for this error.
    ///
    /// # Code Mapping
    ///
    /// - `NotFound` → `not_found`
    /// - `AlreadyUsed` → `already_used`
    /// - `CorruptStore` → `corrupt_store`
    /// - `Io` → `io_error`
    /// - `Serialization` → `serialization_error`
    /// - `InvalidInput` → `invalid_input`
    /// - `Publish` → `publish_failed`
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::AlreadyUsed(_) => "already_used",
            AppError::CorruptStore { .. } => "corrupt_store",
            AppError::Io(_) => "io_error",
            AppError::Serialization(_) => "serialization_error",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::Publish(_) => "publish_failed",
        }
    }
}
