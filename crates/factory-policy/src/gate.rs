//! The operation safety gate.
//!
//! Callers invoke [`SafetyGate::ensure`] before running an operation. For
//! generation operations in strict mode this verifies the backend
//! configuration; verification always completes before any backend process
//! is started for the request.

use serde::Serialize;

use crate::config::{BackendConfigReport, BackendConfigVerifier, ConfigVerifier};
use crate::error::{PolicyError, PolicyResult};
use crate::operation::{OperationKind, OperationPolicy};

/// Environment variable holding the strict-mode toggle.
pub const STRICT_MODE_ENV_VAR: &str = "KAMUI_STRICT_MODE";

/// Reads strict mode from `KAMUI_STRICT_MODE`. Enabled when unset.
pub fn strict_mode_from_env() -> bool {
    parse_strict_mode(std::env::var(STRICT_MODE_ENV_VAR).ok().as_deref())
}

/// Interprets a strict-mode setting.
///
/// Only a case-insensitive `true` enables strict mode once the variable is
/// set; `None` means unset and defaults to enabled.
pub fn parse_strict_mode(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => v.trim().eq_ignore_ascii_case("true"),
    }
}

/// What the gate decided for an operation that was allowed through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    /// Generation operation; backend configuration verified.
    Verified {
        operation: String,
        report: BackendConfigReport,
    },
    /// Allowed without verification; an advisory signal was emitted.
    Advisory {
        operation: String,
        kind: OperationKind,
    },
    /// Processing operation; no verification needed.
    Processing { operation: String },
}

impl GateDecision {
    /// The operation this decision is for.
    pub fn operation(&self) -> &str {
        match self {
            GateDecision::Verified { operation, .. }
            | GateDecision::Advisory { operation, .. }
            | GateDecision::Processing { operation } => operation,
        }
    }

    /// Returns true if the backend configuration was verified.
    pub fn is_verified(&self) -> bool {
        matches!(self, GateDecision::Verified { .. })
    }

    /// Returns true if the operation passed on an advisory basis only.
    pub fn is_advisory(&self) -> bool {
        matches!(self, GateDecision::Advisory { .. })
    }
}

/// Enforces the operation policy before execution.
#[derive(Debug, Clone)]
pub struct SafetyGate<V = BackendConfigVerifier> {
    policy: OperationPolicy,
    verifier: V,
}

impl SafetyGate<BackendConfigVerifier> {
    /// Creates a gate with the standard policy and the default config path.
    pub fn standard() -> Self {
        Self::new(OperationPolicy::standard(), BackendConfigVerifier::from_default())
    }
}

impl<V: ConfigVerifier> SafetyGate<V> {
    /// Creates a gate over an explicit policy and verifier.
    pub fn new(policy: OperationPolicy, verifier: V) -> Self {
        Self { policy, verifier }
    }

    /// Returns the policy this gate enforces.
    pub fn policy(&self) -> &OperationPolicy {
        &self.policy
    }

    /// Returns the configuration verifier.
    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    /// Classifies an operation under this gate's policy.
    pub fn classify(&self, operation: &str) -> OperationKind {
        self.policy.classify(operation)
    }

    /// Checks that `operation` may proceed.
    ///
    /// | kind       | strict                          | non-strict |
    /// |------------|---------------------------------|------------|
    /// | generation | verify config, fail on error    | advisory   |
    /// | processing | proceed                         | proceed    |
    /// | unknown    | `UndefinedOperation`            | advisory   |
    pub fn ensure(&self, operation: &str, strict: bool) -> PolicyResult<GateDecision> {
        let kind = self.policy.classify(operation);

        match (kind, strict) {
            (OperationKind::Generation, true) => {
                let report = self.verifier.verify()?;
                tracing::info!(operation, "kamui backend use confirmed");
                Ok(GateDecision::Verified {
                    operation: operation.to_string(),
                    report,
                })
            }
            (OperationKind::Generation, false) => {
                tracing::warn!(
                    operation,
                    "strict mode disabled; kamui backend recommended but not verified"
                );
                Ok(GateDecision::Advisory {
                    operation: operation.to_string(),
                    kind,
                })
            }
            (OperationKind::Processing, _) => {
                tracing::debug!(operation, "processing operation; any backend allowed");
                Ok(GateDecision::Processing {
                    operation: operation.to_string(),
                })
            }
            (OperationKind::Unknown, true) => Err(PolicyError::UndefinedOperation {
                name: operation.to_string(),
            }),
            (OperationKind::Unknown, false) => {
                tracing::warn!(operation, "undefined operation allowed in non-strict mode");
                Ok(GateDecision::Advisory {
                    operation: operation.to_string(),
                    kind,
                })
            }
        }
    }
}
