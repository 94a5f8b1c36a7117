//! Per-object failures collected during a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::ObjectKind;
use crate::error::{CatalogError, ErrorKind};

use super::context::ContextRecord;

/// A failure that did not abort the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunIssue {
    /// Kind of the object that failed.
    pub kind: ObjectKind,
    /// Name or id of the object.
    pub identity: String,
    /// Error category.
    pub error_kind: ErrorKind,
    /// Full error message.
    pub message: String,
    /// Context at the time of failure.
    #[serde(default)]
    pub context: ContextRecord,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
}

impl RunIssue {
    /// Builds an issue from an error.
    #[must_use]
    pub fn from_error(
        kind: ObjectKind,
        identity: impl Into<String>,
        error: &CatalogError,
        context: ContextRecord,
    ) -> Self {
        Self {
            kind,
            identity: identity.into(),
            error_kind: error.kind(),
            message: error.to_string(),
            context,
            timestamp: Utc::now(),
        }
    }
}

impl std::fmt::Display for RunIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}': {}", self.kind, self.identity, self.message)
    }
}
