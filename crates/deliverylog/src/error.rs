//! Error types for deliverylog.
//!
//! This module defines all error types used throughout the deliverylog crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A single problem found while validating a submitted form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    /// The column name of the offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl FieldIssue {
    /// Create a new field issue.
    #[must_use]
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Joins issues for the `Validation` display string.
fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// The main error type for deliverylog operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Form Errors ===
    /// The submitted form failed validation. Nothing was written.
    #[error("invalid delivery form: {}", join_issues(.issues))]
    Validation {
        /// Every problem found, in column order.
        issues: Vec<FieldIssue>,
    },

    /// A field value could not be parsed.
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        /// The column name of the field.
        field: &'static str,
        /// Description of the parse failure.
        message: String,
    },

    /// The plate number cannot be used to name a storage folder.
    #[error("plate '{plate}' cannot be used as a folder key: {reason}")]
    InvalidFolderKey {
        /// The rejected plate value.
        plate: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    // === Filesystem Errors ===
    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a captured image.
    #[error("failed to write image {path}: {source}")]
    ImageWrite {
        /// Destination path of the image.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to read an image file supplied for a delivery.
    #[error("failed to read image {path}: {source}")]
    ImageRead {
        /// Path of the image.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Export Errors ===
    /// CSV encoding or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // === Terminal Errors ===
    /// Reading interactive input failed.
    #[error("prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    // === Remote Sink Errors ===
    /// The remote sink rejected or failed an operation.
    #[error("remote sink '{sink}' failed: {message}")]
    RemoteSink {
        /// Name of the sink.
        sink: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    // === Outbox Errors ===
    /// Failed to open or create the outbox database.
    #[error("failed to open outbox at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// An outbox query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run outbox migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
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

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for deliverylog operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a remote sink error.
    #[must_use]
    pub fn remote(sink: &'static str, message: impl Into<String>) -> Self {
        Self::RemoteSink {
            sink,
            message: message.into(),
        }
    }

    /// Create an invalid value error.
    #[must_use]
    pub fn invalid_value(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error is a form validation failure.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::InvalidValue { .. } | Self::InvalidFolderKey { .. }
        )
    }

    /// Check if this error came from the remote sink.
    #[must_use]
    pub fn is_remote_error(&self) -> bool {
        matches!(self, Self::RemoteSink { .. })
    }

    /// The individual field issues, if this is a validation error.
    #[must_use]
    pub fn issues(&self) -> &[FieldIssue] {
        match self {
            Self::Validation { issues } => issues,
            _ => &[],
        }
    }
}
