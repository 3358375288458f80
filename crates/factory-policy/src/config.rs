//! Kamui backend configuration verification.
//!
//! The backend is driven with an MCP configuration document. The only
//! requirement placed on it here is well-formedness: a JSON object with a
//! top-level `mcpServers` object. Which services are declared is reported
//! but never gates a request.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{PolicyError, PolicyResult};

/// Environment variable overriding the configuration path.
pub const CONFIG_ENV_VAR: &str = "KAMUI_MCP_CONFIG";

/// Top-level key holding the named service entries.
pub const SERVICES_KEY: &str = "mcpServers";

/// Service name prefixes for the core text-to-image/video/music capabilities.
pub const CAPABILITY_PREFIXES: &[&str] = &["t2i-", "t2v-", "t2m-"];

/// Returns the default configuration path.
///
/// `KAMUI_MCP_CONFIG` wins if set; otherwise `~/.claude/mcp-kamuicode.json`.
pub fn default_config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        return PathBuf::from(path);
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".claude")
        .join("mcp-kamuicode.json")
}

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendConfigReport {
    /// The file that was verified.
    pub path: PathBuf,
    /// Number of declared services.
    pub service_count: usize,
    /// Declared service names, sorted.
    pub services: Vec<String>,
    /// Capability prefixes no declared service provides.
    pub missing_capabilities: Vec<&'static str>,
}

/// Something that can verify the backend configuration.
///
/// [`SafetyGate`](crate::SafetyGate) depends on this rather than on the file
/// verifier directly so callers can substitute their own check.
pub trait ConfigVerifier {
    /// Verifies the configuration, re-reading it on every call.
    fn verify(&self) -> PolicyResult<BackendConfigReport>;
}

/// Verifies the on-disk backend configuration file.
#[derive(Debug, Clone)]
pub struct BackendConfigVerifier {
    path: PathBuf,
}

impl BackendConfigVerifier {
    /// Creates a verifier for the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a verifier for [`default_config_path`].
    pub fn from_default() -> Self {
        Self::new(default_config_path())
    }

    /// Returns the configuration path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for BackendConfigVerifier {
    fn default() -> Self {
        Self::from_default()
    }
}

impl ConfigVerifier for BackendConfigVerifier {
    fn verify(&self) -> PolicyResult<BackendConfigReport> {
        if !self.path.exists() {
            return Err(PolicyError::ConfigNotFound {
                path: self.path.clone(),
            });
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| PolicyError::config_invalid(&self.path, format!("unreadable: {}", e)))?;

        let report = parse_config(&self.path, &content)?;

        tracing::info!(
            path = %report.path.display(),
            services = report.service_count,
            "kamui backend configuration verified"
        );
        if !report.missing_capabilities.is_empty() {
            tracing::warn!(
                missing = ?report.missing_capabilities,
                "kamui configuration declares no service for some capabilities"
            );
        }

        Ok(report)
    }
}

/// Parses configuration content and builds a report.
pub fn parse_config(path: &Path, content: &str) -> PolicyResult<BackendConfigReport> {
    let document: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| PolicyError::config_invalid(path, format!("not valid JSON: {}", e)))?;

    let services = document
        .get(SERVICES_KEY)
        .ok_or_else(|| {
            PolicyError::config_invalid(path, format!("missing top-level \"{}\"", SERVICES_KEY))
        })?
        .as_object()
        .ok_or_else(|| {
            PolicyError::config_invalid(path, format!("\"{}\" must be an object", SERVICES_KEY))
        })?;

    let mut names: Vec<String> = services.keys().cloned().collect();
    names.sort();

    let missing_capabilities = CAPABILITY_PREFIXES
        .iter()
        .copied()
        .filter(|prefix| !names.iter().any(|name| name.starts_with(prefix)))
        .collect();

    Ok(BackendConfigReport {
        path: path.to_path_buf(),
        service_count: names.len(),
        services: names,
        missing_capabilities,
    })
}
