//! Error types for eggtrack.
//!
//! This module defines all error types used throughout the eggtrack crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for eggtrack operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the `SQLite` blob database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// The entry document could not be fetched or parsed.
    #[error("failed to read {location}: {message}")]
    StorageRead {
        /// Backend location of the resource.
        location: String,
        /// Description of what went wrong.
        message: String,
    },

    /// The entry document could not be written.
    #[error("failed to write {location}: {message}")]
    StorageWrite {
        /// Backend location of the resource.
        location: String,
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Domain Errors ===
    /// Caller input was missing or malformed.
    #[error("invalid input: {message}")]
    Validation {
        /// Which field was wrong and how.
        message: String,
    },

    /// The caller-supplied secret did not match the configured secret.
    #[error("unauthorized")]
    Unauthorized,

    /// A requested entry does not exist.
    #[error("entry not found: {id}")]
    NotFound {
        /// The id that was looked up.
        id: String,
    },

    /// A webhook payload did not carry a usable name and cage.
    #[error("invalid webhook payload: {reason}")]
    InvalidPayload {
        /// Why the payload was rejected.
        reason: String,
    },

    // === Rendering Errors ===
    /// A QR code, PDF or PNG artifact could not be produced.
    #[error("failed to render {artifact}: {message}")]
    Render {
        /// The kind of artifact being rendered.
        artifact: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for eggtrack operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new invalid payload error.
    #[must_use]
    pub fn invalid_payload(reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            reason: reason.into(),
        }
    }

    /// Create a new not-found error for an entry id.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a storage read error.
    #[must_use]
    pub fn storage_read(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StorageRead {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create a storage write error.
    #[must_use]
    pub fn storage_write(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StorageWrite {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create a render error for the given artifact kind.
    #[must_use]
    pub fn render(artifact: &'static str, message: impl Into<String>) -> Self {
        Self::Render {
            artifact,
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
