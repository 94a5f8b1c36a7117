//! Error types for the catalog reconciliation engine.
//!
//! Every failure is a [`CatalogError`]. Callers that only need to branch on
//! the broad category use [`CatalogError::kind`], which collapses the enum to
//! one of the five [`ErrorKind`] discriminants.

use std::path::PathBuf;
use thiserror::Error;

use crate::catalog::ObjectKind;
use crate::planner::{TaskAction, VersionStrategy};

/// Broad error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Something that must exist could not be found.
    NotFound,
    /// Input failed validation before any remote call.
    Validation,
    /// A requested change touches fields the remote API cannot update.
    UpdateNotSupported,
    /// The remote catalog API failed.
    RemoteApi,
    /// Unreachable state or local I/O failure.
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::UpdateNotSupported => "update_not_supported",
            Self::RemoteApi => "remote_api",
            Self::Internal => "internal",
        };
        write!(f, "{s}")
    }
}

/// The main error type.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// An object that must exist is missing.
    #[error("{kind} not found: {identity}")]
    NotFound {
        /// Kind of the missing object.
        kind: ObjectKind,
        /// Name or id used for the lookup.
        identity: String,
    },

    /// Input validation failed.
    #[error("Validation failed: {message}")]
    Validation {
        /// What was wrong.
        message: String,
        /// The offending value, if there is one.
        value: Option<String>,
    },

    /// An `EXACT` version request is not newer than the existing version.
    #[error(
        "Version strategy {strategy} violated for {kind} '{identity}': requested {requested}, existing {existing}"
    )]
    VersionStrategyViolation {
        /// Kind of the version object.
        kind: ObjectKind,
        /// Identity of the parent object.
        identity: String,
        /// Strategy in effect.
        strategy: VersionStrategy,
        /// Requested version string.
        requested: String,
        /// Highest existing version string.
        existing: String,
    },

    /// Update touches immutable fields.
    #[error("Update not supported for {kind} '{identity}': immutable fields changed: {}", fields.join(", "))]
    UpdateNotSupported {
        /// Kind of the object.
        kind: ObjectKind,
        /// Identity of the object.
        identity: String,
        /// Immutable fields that differ.
        fields: Vec<String>,
    },

    /// Remote API errors.
    #[error("Catalog API error: {0}")]
    RemoteApi(#[from] RemoteApiError),

    /// A task failed; carries the task context.
    #[error("{kind} '{identity}' ({action}): {source}")]
    Task {
        /// Kind handled by the task.
        kind: ObjectKind,
        /// Identity handled by the task.
        identity: String,
        /// Action the task had decided on when it failed.
        action: TaskAction,
        /// Underlying error.
        #[source]
        source: Box<CatalogError>,
    },

    /// Configuration errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Migration orchestration errors.
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors reported by the remote catalog API.
#[derive(Debug, Error)]
pub enum RemoteApiError {
    /// The token was rejected for the given operation.
    #[error("Authorization denied for {operation}: {message}")]
    AuthorizationDenied {
        /// Operation that was denied (read, write, delete).
        operation: String,
        /// Message from the API.
        message: String,
    },

    /// The object is still referenced or was concurrently modified.
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
    },

    /// Rate limited.
    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Request failed with an unexpected status.
    #[error("Request failed: {status} - {message}")]
    RequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error body from the API.
        message: String,
    },

    /// Transport failure.
    #[error("Network error: {message}")]
    Network {
        /// Description of the failure.
        message: String,
    },

    /// The API answered with something we cannot interpret.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },
}

/// Migration orchestration errors.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A setup step failed; nothing after it can succeed.
    #[error("Migration setup failed: {reason}")]
    Setup {
        /// Reason for the failure.
        reason: String,
    },

    /// Bulk removal still had objects left after the last pass.
    #[error("Maximum passes ({attempts}) exceeded, {remaining} object(s) could not be removed: {}", last_errors.join("; "))]
    MaxPassesExceeded {
        /// Number of passes made.
        attempts: u32,
        /// Objects left behind.
        remaining: usize,
        /// Last error per remaining object.
        last_errors: Vec<String>,
    },

    /// Run report could not be stored or read.
    #[error("Run report error: {message}")]
    Report {
        /// Description of the failure.
        message: String,
    },
}

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

impl CatalogError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Creates a validation error carrying the offending value.
    #[must_use]
    pub fn validation(message: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            value: Some(value.into()),
        }
    }

    /// Wraps this error with task context.
    #[must_use]
    pub fn in_task(self, kind: ObjectKind, identity: impl Into<String>, action: TaskAction) -> Self {
        Self::Task {
            kind,
            identity: identity.into(),
            action,
            source: Box::new(self),
        }
    }

    /// Returns the broad error category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation { .. } | Self::VersionStrategyViolation { .. } | Self::Config(_) => {
                ErrorKind::Validation
            }
            Self::UpdateNotSupported { .. } => ErrorKind::UpdateNotSupported,
            Self::RemoteApi(_) => ErrorKind::RemoteApi,
            Self::Task { source, .. } => source.kind(),
            Self::Migration(MigrationError::Setup { .. }) => ErrorKind::Validation,
            Self::Migration(MigrationError::MaxPassesExceeded { .. }) => ErrorKind::RemoteApi,
            Self::Migration(MigrationError::Report { .. }) | Self::Io(_) | Self::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RemoteApi(
                RemoteApiError::Conflict { .. }
                | RemoteApiError::RateLimited { .. }
                | RemoteApiError::Network { .. },
            ) => true,
            Self::Task { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::RemoteApi(RemoteApiError::RateLimited { retry_after_secs }) => {
                Some(*retry_after_secs)
            }
            Self::RemoteApi(RemoteApiError::Network { .. }) => Some(5),
            Self::RemoteApi(RemoteApiError::Conflict { .. }) => Some(1),
            Self::Task { source, .. } => source.retry_delay_secs(),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl RemoteApiError {
    /// Creates a request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }
}
