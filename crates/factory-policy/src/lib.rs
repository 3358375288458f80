//! Creative Factory operation policy.
//!
//! Generation operations must go through the Kamui backend; processing
//! operations may use any backend. This crate holds the classification and the
//! gate that enforces it.
//!
//! # Overview
//!
//! - [`OperationPolicy`] - immutable pair of disjoint operation sets
//! - [`BackendConfigVerifier`] - validates the backend MCP configuration file
//! - [`SafetyGate`] - checks an operation against the policy before it runs
//!
//! # Example
//!
//! ```no_run
//! use factory_policy::{BackendConfigVerifier, OperationPolicy, SafetyGate};
//!
//! let policy = OperationPolicy::standard().with_generation("generate_texture")?;
//! let gate = SafetyGate::new(policy, BackendConfigVerifier::from_default());
//!
//! let decision = gate.ensure("generate_texture", true)?;
//! assert!(decision.is_verified());
//! # Ok::<(), factory_policy::PolicyError>(())
//! ```

pub mod config;
pub mod error;
pub mod gate;
pub mod operation;

pub use config::{
    default_config_path, BackendConfigReport, BackendConfigVerifier, ConfigVerifier,
};
pub use error::{ErrorKind, PolicyError, PolicyResult};
pub use gate::{parse_strict_mode, strict_mode_from_env, GateDecision, SafetyGate};
pub use operation::{OperationKind, OperationPolicy};
