//! Error types for operation policy and backend configuration checks.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::operation::OperationKind;

/// Result type for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Failure kinds a generation request can end in.
///
/// Every error type in the workspace maps onto exactly one of these, so
/// callers can branch on the kind without matching variant payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// The backend configuration file does not exist.
    ConfigNotFound,
    /// The backend configuration file is unparsable or malformed.
    ConfigInvalid,
    /// The operation is in neither policy set.
    UndefinedOperation,
    /// The backend executable could not be located or started.
    BackendNotFound,
    /// The backend process ran but exited unsuccessfully.
    BackendExecutionError,
    /// The artifact could not be retrieved.
    NetworkDownloadError,
    /// The backend output held no recognizable artifact URL.
    NoArtifactFound,
    /// Anything outside the request taxonomy (local IO, policy misuse).
    Internal,
}

impl ErrorKind {
    /// Returns the taxonomy name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConfigNotFound => "ConfigNotFound",
            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::UndefinedOperation => "UndefinedOperation",
            ErrorKind::BackendNotFound => "BackendNotFound",
            ErrorKind::BackendExecutionError => "BackendExecutionError",
            ErrorKind::NetworkDownloadError => "NetworkDownloadError",
            ErrorKind::NoArtifactFound => "NoArtifactFound",
            ErrorKind::Internal => "Internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the operation registry, config verifier and safety gate.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Backend configuration file missing.
    #[error("Kamui backend configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Backend configuration file present but unusable.
    #[error("Kamui backend configuration at {path} is invalid: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    /// Operation is neither generation nor processing.
    #[error("Undefined operation '{name}'")]
    UndefinedOperation { name: String },

    /// Registration would put an operation in both policy sets.
    #[error("Operation '{name}' is already registered as {existing}")]
    OperationConflict {
        name: String,
        existing: OperationKind,
    },

    /// Registration with an empty identifier.
    #[error("Operation name must not be empty")]
    EmptyOperationName,
}

impl PolicyError {
    /// Creates a new config invalid error.
    pub fn config_invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns the stable error code for reporting.
    pub fn code(&self) -> &'static str {
        match self {
            PolicyError::ConfigNotFound { .. } => "POLICY_001",
            PolicyError::ConfigInvalid { .. } => "POLICY_002",
            PolicyError::UndefinedOperation { .. } => "POLICY_003",
            PolicyError::OperationConflict { .. } => "POLICY_004",
            PolicyError::EmptyOperationName => "POLICY_005",
        }
    }

    /// Returns the error category.
    pub fn category(&self) -> &'static str {
        "policy"
    }

    /// Returns the taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PolicyError::ConfigNotFound { .. } => ErrorKind::ConfigNotFound,
            PolicyError::ConfigInvalid { .. } => ErrorKind::ConfigInvalid,
            PolicyError::UndefinedOperation { .. } => ErrorKind::UndefinedOperation,
            PolicyError::OperationConflict { .. } | PolicyError::EmptyOperationName => {
                ErrorKind::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PolicyError::ConfigNotFound {
            path: PathBuf::from("/tmp/missing.json"),
        };
        assert!(err.to_string().contains("/tmp/missing.json"));

        let err = PolicyError::config_invalid("/tmp/c.json", "missing mcpServers");
        assert!(err.to_string().contains("missing mcpServers"));

        let err = PolicyError::OperationConflict {
            name: "render_scene".to_string(),
            existing: OperationKind::Processing,
        };
        assert!(err.to_string().contains("processing"));
    }

    #[test]
    fn test_error_kinds_and_codes() {
        let err = PolicyError::UndefinedOperation {
            name: "paint".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::UndefinedOperation);
        assert_eq!(err.code(), "POLICY_003");
        assert_eq!(err.category(), "policy");
        assert_eq!(ErrorKind::ConfigNotFound.to_string(), "ConfigNotFound");
    }
}
