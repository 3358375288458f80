//! Error types for the Kamui backend.

use std::path::PathBuf;

use factory_policy::{ErrorKind, PolicyError};
use thiserror::Error;

/// Maximum number of characters of captured stdout kept in an execution error.
pub const STDOUT_PREFIX_LIMIT: usize = 2000;

/// Result type for Kamui backend operations.
pub type KamuiResult<T> = Result<T, KamuiError>;

/// Errors that can occur while generating through the Kamui backend.
#[derive(Debug, Error)]
pub enum KamuiError {
    /// The safety gate or configuration check refused the request.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// Backend executable not found.
    #[error("Kamui backend executable '{name}' not found. Ensure it is installed and in PATH, or set KAMUI_BACKEND_PATH")]
    BackendNotFound { name: String },

    /// Failed to spawn or wait on the backend process.
    #[error("Failed to run backend process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    /// Backend process exited with non-zero status.
    #[error("Backend process exited with status {exit_code}: {stderr}")]
    BackendExecution {
        exit_code: i32,
        stderr: String,
        stdout_prefix: String,
    },

    /// Failed to stage the prompt payload to a temporary file.
    #[error("Failed to stage prompt file: {0}")]
    StagePromptFailed(#[source] std::io::Error),

    /// Artifact download failed.
    #[error("Failed to download artifact from {url}: {reason}")]
    NetworkDownload { url: String, reason: String },

    /// Backend output contained no recognizable artifact URL.
    #[error("No artifact URL found in backend output (planned output: {planned_path})")]
    NoArtifactFound { planned_path: PathBuf },

    /// Caller-supplied output file name is not a plain file name.
    #[error("Invalid output file name '{name}': {reason}")]
    InvalidOutputName { name: String, reason: String },

    /// Failed to build the HTTP client.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl KamuiError {
    /// Creates a backend execution error, keeping a bounded prefix of stdout.
    pub fn backend_execution(exit_code: i32, stderr: impl Into<String>, stdout: &str) -> Self {
        Self::BackendExecution {
            exit_code,
            stderr: stderr.into(),
            stdout_prefix: truncate_chars(stdout, STDOUT_PREFIX_LIMIT),
        }
    }

    /// Creates a new invalid output name error.
    pub fn invalid_output_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOutputName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Returns the stable error code for reporting.
    pub fn code(&self) -> &'static str {
        match self {
            KamuiError::Policy(inner) => inner.code(),
            KamuiError::BackendNotFound { .. } => "KAMUI_001",
            KamuiError::SpawnFailed(_) => "KAMUI_002",
            KamuiError::BackendExecution { .. } => "KAMUI_003",
            KamuiError::StagePromptFailed(_) => "KAMUI_004",
            KamuiError::NetworkDownload { .. } => "KAMUI_005",
            KamuiError::NoArtifactFound { .. } => "KAMUI_006",
            KamuiError::InvalidOutputName { .. } => "KAMUI_007",
            KamuiError::HttpClient(_) => "KAMUI_008",
            KamuiError::Io(_) => "KAMUI_009",
        }
    }

    /// Returns the error category.
    pub fn category(&self) -> &'static str {
        match self {
            KamuiError::Policy(inner) => inner.category(),
            _ => "kamui",
        }
    }

    /// Returns the taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KamuiError::Policy(inner) => inner.kind(),
            KamuiError::BackendNotFound { .. } | KamuiError::SpawnFailed(_) => {
                ErrorKind::BackendNotFound
            }
            KamuiError::BackendExecution { .. } => ErrorKind::BackendExecutionError,
            KamuiError::NetworkDownload { .. } => ErrorKind::NetworkDownloadError,
            KamuiError::NoArtifactFound { .. } => ErrorKind::NoArtifactFound,
            KamuiError::StagePromptFailed(_)
            | KamuiError::InvalidOutputName { .. }
            | KamuiError::HttpClient(_)
            | KamuiError::Io(_) => ErrorKind::Internal,
        }
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KamuiError::BackendNotFound {
            name: "claude".to_string(),
        };
        assert!(err.to_string().contains("'claude' not found"));

        let err = KamuiError::backend_execution(2, "mcp server crashed", "partial output");
        assert!(err.to_string().contains("status 2"));
        assert!(err.to_string().contains("mcp server crashed"));
    }

    #[test]
    fn test_backend_execution_truncates_stdout() {
        let stdout = "é".repeat(STDOUT_PREFIX_LIMIT + 50);
        match KamuiError::backend_execution(1, "", &stdout) {
            KamuiError::BackendExecution { stdout_prefix, .. } => {
                assert_eq!(stdout_prefix.chars().count(), STDOUT_PREFIX_LIMIT);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_policy_errors_keep_their_kind() {
        let err: KamuiError = PolicyError::ConfigNotFound {
            path: PathBuf::from("/x"),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::ConfigNotFound);
        assert_eq!(err.code(), "POLICY_001");
        assert_eq!(err.category(), "policy");
    }

    #[test]
    fn test_kamui_error_kinds() {
        let err = KamuiError::NoArtifactFound {
            planned_path: PathBuf::from("outputs/images/a.jpg"),
        };
        assert_eq!(err.kind(), ErrorKind::NoArtifactFound);
        assert_eq!(err.code(), "KAMUI_006");

        let err = KamuiError::NetworkDownload {
            url: "https://fal.media/a".to_string(),
            reason: "404".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::NetworkDownloadError);
    }
}
