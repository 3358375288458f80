//! Kamui backend subprocess orchestrator.
//!
//! This module builds the backend invocation and runs it as a child process.
//! The instruction payload goes in over stdin (or a staged temp file); the
//! call blocks until the process exits and captures stdout and stderr.
//! There is no timeout and no retry.

use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use factory_policy::default_config_path;

use crate::error::{KamuiError, KamuiResult};

/// Default backend executable name.
pub const DEFAULT_EXECUTABLE: &str = "claude";

/// Environment variable overriding the backend executable path.
pub const BACKEND_PATH_ENV_VAR: &str = "KAMUI_BACKEND_PATH";

/// Flags forcing non-interactive, auto-confirming execution.
pub const DEFAULT_AUTOMATION_FLAGS: &[&str] = &["--print", "--dangerously-skip-permissions"];

/// How the instruction payload reaches the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptDelivery {
    /// Written to the child's stdin, which is then closed.
    Stdin,
    /// Written to a temporary file whose path follows `flag`.
    ///
    /// The file is removed when the run ends, whatever the outcome.
    StagedFile { flag: String },
}

/// Configuration for backend invocations.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Executable name (looked up) or path (used as-is).
    pub executable: PathBuf,
    /// Backend MCP configuration handed to the executable.
    pub mcp_config_path: PathBuf,
    /// Non-interactive / auto-confirm flags.
    pub automation_flags: Vec<String>,
    /// Working directory for the child; inherited when `None`.
    pub working_dir: Option<PathBuf>,
    /// Payload delivery.
    pub prompt_delivery: PromptDelivery,
    /// Extra environment for the child.
    pub extra_env: Vec<(String, String)>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(DEFAULT_EXECUTABLE),
            mcp_config_path: default_config_path(),
            automation_flags: DEFAULT_AUTOMATION_FLAGS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            working_dir: None,
            prompt_delivery: PromptDelivery::Stdin,
            extra_env: Vec::new(),
        }
    }
}

impl OrchestratorConfig {
    /// Sets the backend executable.
    pub fn executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = executable.into();
        self
    }

    /// Sets the MCP configuration path.
    pub fn mcp_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.mcp_config_path = path.into();
        self
    }

    /// Replaces the automation flags.
    pub fn automation_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.automation_flags = flags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sets how the payload is delivered.
    pub fn prompt_delivery(mut self, delivery: PromptDelivery) -> Self {
        self.prompt_delivery = delivery;
        self
    }

    /// Adds an environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_env.push((key.into(), value.into()));
        self
    }

    /// Builds the invocation for `payload`.
    ///
    /// Arguments are the automation flags followed by `--mcp-config=<path>`.
    /// `PATH` is the current search path with the user-local binary
    /// directory in front.
    pub fn invocation(&self, payload: impl Into<String>) -> ProcessInvocation {
        let mut args: Vec<OsString> = self.automation_flags.iter().map(OsString::from).collect();
        let mut config_arg = OsString::from("--mcp-config=");
        config_arg.push(&self.mcp_config_path);
        args.push(config_arg);

        let mut env = vec![(OsString::from("PATH"), search_path_with_local_bin())];
        env.extend(
            self.extra_env
                .iter()
                .map(|(k, v)| (OsString::from(k), OsString::from(v))),
        );

        ProcessInvocation {
            program: self.executable.clone(),
            args,
            env,
            working_dir: self.working_dir.clone(),
            payload: payload.into(),
            delivery: self.prompt_delivery.clone(),
        }
    }
}

/// Everything needed to start one backend process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInvocation {
    /// Executable name or path.
    pub program: PathBuf,
    /// Arguments, not including any staged prompt file.
    pub args: Vec<OsString>,
    /// Environment overrides.
    pub env: Vec<(OsString, OsString)>,
    /// Working directory; inherited when `None`.
    pub working_dir: Option<PathBuf>,
    /// Instruction payload.
    pub payload: String,
    /// Payload delivery.
    pub delivery: PromptDelivery,
}

impl ProcessInvocation {
    /// Value of an environment override, if set.
    pub fn env_value(&self, key: &str) -> Option<&OsStr> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_os_str())
    }
}

/// Captured outcome of a finished backend process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    /// Exit code; `None` when terminated by a signal.
    pub exit_code: Option<i32>,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

impl ProcessResult {
    /// Returns true if the process exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Converts an unsuccessful exit into [`KamuiError::BackendExecution`].
    pub fn into_success(self) -> KamuiResult<Self> {
        if self.success() {
            return Ok(self);
        }
        Err(KamuiError::backend_execution(
            self.exit_code.unwrap_or(-1),
            self.stderr,
            &self.stdout,
        ))
    }
}

/// Runs backend invocations.
///
/// [`Orchestrator`] is the process-spawning implementation; the trait is the
/// seam the generation client is built over.
pub trait BackendRunner {
    /// Runs one invocation to completion. One call is one spawn attempt.
    fn run(&self, invocation: &ProcessInvocation) -> KamuiResult<ProcessResult>;
}

impl<R: BackendRunner + ?Sized> BackendRunner for &R {
    fn run(&self, invocation: &ProcessInvocation) -> KamuiResult<ProcessResult> {
        (**self).run(invocation)
    }
}

/// The Kamui backend subprocess orchestrator.
#[derive(Debug, Clone, Default)]
pub struct Orchestrator;

impl Orchestrator {
    /// Creates a new orchestrator.
    pub fn new() -> Self {
        Self
    }
}

impl BackendRunner for Orchestrator {
    fn run(&self, invocation: &ProcessInvocation) -> KamuiResult<ProcessResult> {
        let program = find_backend(invocation)?;

        let mut cmd = Command::new(&program);
        cmd.args(&invocation.args);
        cmd.envs(invocation.env.iter().map(|(k, v)| (k, v)));
        if let Some(ref dir) = invocation.working_dir {
            cmd.current_dir(dir);
        }

        // Kept alive until the child exits; the file is deleted on drop.
        let _staged = match &invocation.delivery {
            PromptDelivery::Stdin => {
                cmd.stdin(Stdio::piped());
                None
            }
            PromptDelivery::StagedFile { flag } => {
                let file = stage_prompt(&invocation.payload)?;
                cmd.arg(flag).arg(file.path());
                cmd.stdin(Stdio::null());
                Some(file)
            }
        };
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        tracing::info!(program = %program.display(), "spawning kamui backend");
        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KamuiError::BackendNotFound {
                    name: program.display().to_string(),
                }
            } else {
                KamuiError::SpawnFailed(e)
            }
        })?;

        // The child may fill its stdout pipe before it drains stdin.
        let writer = child.stdin.take().map(|mut stdin| {
            let payload = invocation.payload.clone();
            std::thread::spawn(move || stdin.write_all(payload.as_bytes()))
        });

        let output = child.wait_with_output().map_err(KamuiError::SpawnFailed)?;

        if let Some(handle) = writer {
            match handle.join() {
                Ok(Err(e)) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                    tracing::warn!(error = %e, "failed to write prompt to backend stdin");
                }
                Err(_) => tracing::warn!("prompt writer thread panicked"),
                _ => {}
            }
        }

        let result = ProcessResult {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::info!(
            exit_code = ?result.exit_code,
            stdout_len = result.stdout.len(),
            "kamui backend exited"
        );
        Ok(result)
    }
}

fn stage_prompt(payload: &str) -> KamuiResult<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("kamui_prompt_")
        .suffix(".md")
        .tempfile()
        .map_err(KamuiError::StagePromptFailed)?;
    file.write_all(payload.as_bytes())
        .map_err(KamuiError::StagePromptFailed)?;
    file.flush().map_err(KamuiError::StagePromptFailed)?;
    Ok(file)
}

/// Locates the backend executable for `invocation`.
///
/// Order: an explicit path in the invocation, `KAMUI_BACKEND_PATH`, the
/// invocation's search path, then the user-local binary directories.
pub fn find_backend(invocation: &ProcessInvocation) -> KamuiResult<PathBuf> {
    let program = &invocation.program;
    let not_found = || KamuiError::BackendNotFound {
        name: program.display().to_string(),
    };

    // A path with directories is taken literally.
    if program.is_absolute() || program.components().count() > 1 {
        return if program.exists() {
            Ok(program.clone())
        } else {
            Err(not_found())
        };
    }

    if let Some(path) = std::env::var_os(BACKEND_PATH_ENV_VAR) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
    }

    let search_path = invocation
        .env_value("PATH")
        .map(OsStr::to_os_string)
        .or_else(|| std::env::var_os("PATH"));
    let cwd = invocation
        .working_dir
        .clone()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    if let Ok(path) = which::which_in(program, search_path, &cwd) {
        return Ok(path);
    }

    for dir in user_local_bin_dirs() {
        let candidate = dir.join(program);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    Err(not_found())
}

/// The user-local binary directory prepended to the child's `PATH`.
pub fn user_local_bin_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".local").join("bin"))
}

fn user_local_bin_dirs() -> Vec<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };
    vec![home.join(".local").join("bin"), home.join(".claude").join("local")]
}

/// Current `PATH` with [`user_local_bin_dir`] in front.
pub fn search_path_with_local_bin() -> OsString {
    let current = std::env::var_os("PATH").unwrap_or_default();
    let Some(local) = user_local_bin_dir() else {
        return current;
    };
    prepend_path(&local, &current).unwrap_or(current)
}

fn prepend_path(dir: &Path, search_path: &OsStr) -> Option<OsString> {
    let paths = std::iter::once(dir.to_path_buf()).chain(std::env::split_paths(search_path));
    std::env::join_paths(paths).ok()
}
