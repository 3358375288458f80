//! Generation client.
//!
//! Builds the instruction payload, runs the backend once, parses its stdout
//! and downloads the selected artifact into the output layout.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::download::{ArtifactFetcher, DownloadOutcome, HttpDownloader};
use crate::error::{KamuiError, KamuiResult};
use crate::orchestrator::{BackendRunner, Orchestrator, OrchestratorConfig, PromptDelivery};
use crate::output::OutputLayout;
use crate::pipeline::{RequestState, StateTrace};
use crate::prompt::build_instruction;
use crate::request::{GenerationRequest, Modality};
use crate::response::parse_response;

/// What to do when the backend output names no artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingArtifactPolicy {
    /// Fail with `NoArtifactFound`.
    #[default]
    Fail,
    /// Return the planned path marked [`ArtifactStatus::NotFound`].
    PlannedPath,
}

/// What to do when the selected artifact URL cannot be downloaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadFailurePolicy {
    /// Return the planned path marked [`ArtifactStatus::DownloadFailed`].
    #[default]
    PlannedPath,
    /// Fail with `NetworkDownload`.
    Fail,
}

/// Whether the returned artifact path holds a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArtifactStatus {
    /// Downloaded from `url`.
    Downloaded { url: String, bytes: u64 },
    /// The backend output named no artifact.
    NotFound,
    /// An artifact URL was found but could not be downloaded.
    DownloadFailed { url: String, reason: String },
}

/// Result of one generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedArtifact {
    /// Local path of the artifact (or where it was planned to go).
    pub path: PathBuf,
    /// Modality generated.
    pub modality: Modality,
    /// Download status.
    pub status: ArtifactStatus,
    /// Every candidate URL found in the backend output, sorted.
    pub candidates: Vec<String>,
}

impl GeneratedArtifact {
    /// Returns true if the artifact was downloaded.
    pub fn is_downloaded(&self) -> bool {
        matches!(self.status, ArtifactStatus::Downloaded { .. })
    }

    /// Returns true if a file exists at [`path`](Self::path).
    pub fn exists_on_disk(&self) -> bool {
        self.path.is_file()
    }
}

/// Client configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Backend invocation settings.
    pub orchestrator: OrchestratorConfig,
    /// Output directory layout.
    pub layout: OutputLayout,
    /// Behaviour when the backend output names no artifact.
    pub missing_artifact: MissingArtifactPolicy,
    /// Behaviour when the artifact download fails.
    pub download_failure: DownloadFailurePolicy,
}

impl ClientConfig {
    /// Sets the backend executable.
    pub fn executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.orchestrator = self.orchestrator.executable(executable);
        self
    }

    /// Sets the MCP configuration path.
    pub fn mcp_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.orchestrator = self.orchestrator.mcp_config(path);
        self
    }

    /// Replaces the automation flags.
    pub fn automation_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.orchestrator = self.orchestrator.automation_flags(flags);
        self
    }

    /// Sets the backend working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.orchestrator = self.orchestrator.working_dir(dir);
        self
    }

    /// Sets how the payload reaches the backend.
    pub fn prompt_delivery(mut self, delivery: PromptDelivery) -> Self {
        self.orchestrator = self.orchestrator.prompt_delivery(delivery);
        self
    }

    /// Sets the output root.
    pub fn output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.layout = OutputLayout::new(root);
        self
    }

    /// Sets the missing-artifact policy.
    pub fn missing_artifact(mut self, policy: MissingArtifactPolicy) -> Self {
        self.missing_artifact = policy;
        self
    }

    /// Sets the download-failure policy.
    pub fn download_failure(mut self, policy: DownloadFailurePolicy) -> Self {
        self.download_failure = policy;
        self
    }

    /// The MCP configuration path handed to the backend.
    pub fn mcp_config_path(&self) -> &Path {
        &self.orchestrator.mcp_config_path
    }
}

/// Runs generation requests against the Kamui backend.
///
/// Does not consult the safety gate; see
/// [`GenerationPipeline`](crate::GenerationPipeline).
#[derive(Debug, Clone)]
pub struct GenerationClient<R = Orchestrator, F = HttpDownloader> {
    config: ClientConfig,
    runner: R,
    fetcher: F,
}

impl GenerationClient {
    /// Creates a client that spawns the real backend and downloads over HTTP.
    pub fn new(config: ClientConfig) -> KamuiResult<Self> {
        Ok(Self::with_parts(config, Orchestrator::new(), HttpDownloader::new()?))
    }
}

impl<R: BackendRunner, F: ArtifactFetcher> GenerationClient<R, F> {
    /// Creates a client from explicit parts.
    pub fn with_parts(config: ClientConfig, runner: R, fetcher: F) -> Self {
        Self {
            config,
            runner,
            fetcher,
        }
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the backend runner.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Returns the artifact fetcher.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Generates one artifact.
    pub fn generate(&self, request: &GenerationRequest) -> KamuiResult<GeneratedArtifact> {
        self.generate_traced(request, &mut StateTrace::default())
    }

    /// Generates one artifact, recording state transitions in `trace`.
    pub fn generate_traced(
        &self,
        request: &GenerationRequest,
        trace: &mut StateTrace,
    ) -> KamuiResult<GeneratedArtifact> {
        let modality = request.modality();
        let layout = &self.config.layout;
        let planned = request.planned_output_path(layout)?;
        let target_dir = layout.dir_for(modality);
        std::fs::create_dir_all(&target_dir)?;

        let payload = build_instruction(request, &target_dir);
        let invocation = self.config.orchestrator.invocation(payload);

        trace.enter(RequestState::Invoking);
        let result = self.runner.run(&invocation)?.into_success()?;
        trace.enter(RequestState::Invoked);

        let extracted = parse_response(&result.stdout);
        trace.enter(RequestState::Parsed);
        let candidates: Vec<String> = extracted.candidates().into_iter().collect();
        tracing::debug!(
            tagged = extracted.tagged.len(),
            scraped = extracted.scraped.len(),
            "parsed backend output"
        );

        let Some(url) = extracted.select(modality) else {
            tracing::warn!(planned = %planned.display(), "no artifact URL in backend output");
            return match self.config.missing_artifact {
                MissingArtifactPolicy::Fail => Err(KamuiError::NoArtifactFound {
                    planned_path: planned,
                }),
                MissingArtifactPolicy::PlannedPath => Ok(GeneratedArtifact {
                    path: planned,
                    modality,
                    status: ArtifactStatus::NotFound,
                    candidates,
                }),
            };
        };

        trace.enter(RequestState::Downloading);
        match self.fetcher.fetch(url, &planned)? {
            DownloadOutcome::Saved { path, bytes } => Ok(GeneratedArtifact {
                path,
                modality,
                status: ArtifactStatus::Downloaded {
                    url: url.to_string(),
                    bytes,
                },
                candidates,
            }),
            DownloadOutcome::Failed { url, reason } => {
                tracing::warn!(%url, %reason, "artifact download failed");
                match self.config.download_failure {
                    DownloadFailurePolicy::Fail => Err(KamuiError::NetworkDownload { url, reason }),
                    DownloadFailurePolicy::PlannedPath => Ok(GeneratedArtifact {
                        path: planned,
                        modality,
                        status: ArtifactStatus::DownloadFailed { url, reason },
                        candidates,
                    }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{ProcessInvocation, ProcessResult};
    use std::cell::RefCell;

    struct ScriptedRunner {
        stdout: String,
        seen: RefCell<Vec<ProcessInvocation>>,
    }

    impl ScriptedRunner {
        fn new(stdout: &str) -> Self {
            Self {
                stdout: stdout.to_string(),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl BackendRunner for ScriptedRunner {
        fn run(&self, invocation: &ProcessInvocation) -> KamuiResult<ProcessResult> {
            self.seen.borrow_mut().push(invocation.clone());
            Ok(ProcessResult {
                exit_code: Some(0),
                stdout: self.stdout.clone(),
                stderr: String::new(),
            })
        }
    }

    /// Writes a fixed body, or fails, recording requested URLs.
    struct StaticFetcher {
        body: Option<&'static str>,
        urls: RefCell<Vec<String>>,
    }

    impl ArtifactFetcher for StaticFetcher {
        fn fetch(&self, url: &str, destination: &Path) -> KamuiResult<DownloadOutcome> {
            self.urls.borrow_mut().push(url.to_string());
            match self.body {
                Some(body) => {
                    std::fs::write(destination, body)?;
                    Ok(DownloadOutcome::Saved {
                        path: destination.to_path_buf(),
                        bytes: body.len() as u64,
                    })
                }
                None => Ok(DownloadOutcome::Failed {
                    url: url.to_string(),
                    reason: "connection refused".to_string(),
                }),
            }
        }
    }

    fn fetcher(body: Option<&'static str>) -> StaticFetcher {
        StaticFetcher {
            body,
            urls: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn test_generate_downloads_selected_url_into_modality_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::default().output_root(dir.path());
        let runner = ScriptedRunner::new(
            "Saved. https://fal.media/files/x/clip.mp4 and preview https://fal.media/files/x/p.jpg",
        );
        let client = GenerationClient::with_parts(config, &runner, fetcher(Some("video")));

        let artifact = client.generate(&GenerationRequest::video("ocean waves")).unwrap();

        assert!(artifact.is_downloaded());
        assert!(artifact.exists_on_disk());
        assert!(artifact.path.starts_with(dir.path().join("videos")));
        assert_eq!(
            artifact.status,
            ArtifactStatus::Downloaded {
                url: "https://fal.media/files/x/clip.mp4".to_string(),
                bytes: 5,
            }
        );
        assert_eq!(artifact.candidates.len(), 2);

        let seen = runner.seen.borrow();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].payload.contains("ocean waves"));
        let target = dir.path().join("videos").canonicalize().unwrap();
        assert!(seen[0].payload.contains(&target.display().to_string()));
    }

    #[test]
    fn test_no_url_fails_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::default().output_root(dir.path());
        let fetch = fetcher(Some("x"));
        let client =
            GenerationClient::with_parts(config, ScriptedRunner::new("I could not do it."), &fetch);

        let request = GenerationRequest::image("a red circle").with_output_name("circle.jpg");
        match client.generate(&request).unwrap_err() {
            KamuiError::NoArtifactFound { planned_path } => {
                assert_eq!(planned_path, dir.path().join("images").join("circle.jpg"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(fetch.urls.borrow().is_empty());
    }

    #[test]
    fn test_no_url_returns_planned_path_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::default()
            .output_root(dir.path())
            .missing_artifact(MissingArtifactPolicy::PlannedPath);
        let client =
            GenerationClient::with_parts(config, ScriptedRunner::new("nothing"), fetcher(None));

        let artifact = client.generate(&GenerationRequest::music("rain")).unwrap();
        assert_eq!(artifact.status, ArtifactStatus::NotFound);
        assert!(!artifact.exists_on_disk());
        assert!(artifact.path.starts_with(dir.path().join("audio")));
    }

    #[test]
    fn test_download_failure_policies() {
        let dir = tempfile::tempdir().unwrap();
        let stdout = "ARTIFACT_URL: https://fal.media/files/golem.obj";

        let request = GenerationRequest::model3d("golem").with_output_name("golem.obj");

        let default = GenerationClient::with_parts(
            ClientConfig::default().output_root(dir.path()),
            ScriptedRunner::new(stdout),
            fetcher(None),
        );
        let artifact = default.generate(&request).unwrap();
        assert_eq!(artifact.path, dir.path().join("3d").join("golem.obj"));
        assert_eq!(
            artifact.status,
            ArtifactStatus::DownloadFailed {
                url: "https://fal.media/files/golem.obj".to_string(),
                reason: "connection refused".to_string(),
            }
        );
        assert!(!artifact.is_downloaded());
        assert!(!artifact.exists_on_disk());

        let strict = GenerationClient::with_parts(
            ClientConfig::default()
                .output_root(dir.path())
                .download_failure(DownloadFailurePolicy::Fail),
            ScriptedRunner::new(stdout),
            fetcher(None),
        );
        let err = strict.generate(&request).unwrap_err();
        assert!(matches!(err, KamuiError::NetworkDownload { .. }));
    }

    #[test]
    fn test_http_404_is_a_soft_failure_by_default() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/x.jpg").with_status(404).create();
        let stdout = format!("ARTIFACT_URL: {}/x.jpg", server.url());

        let dir = tempfile::tempdir().unwrap();
        let client = GenerationClient::with_parts(
            ClientConfig::default().output_root(dir.path()),
            ScriptedRunner::new(&stdout),
            HttpDownloader::new().unwrap(),
        );

        let artifact = client
            .generate(&GenerationRequest::image("a red circle"))
            .unwrap();
        assert!(matches!(
            artifact.status,
            ArtifactStatus::DownloadFailed { ref reason, .. } if reason.contains("404")
        ));
        assert!(artifact.path.starts_with(dir.path().join("images")));
        assert!(!artifact.exists_on_disk());
        assert_eq!(std::fs::read_dir(dir.path().join("images")).unwrap().count(), 0);
    }

    #[test]
    fn test_invalid_output_name_rejected_before_invoking() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new("https://fal.media/files/a.jpg");
        let client = GenerationClient::with_parts(
            ClientConfig::default().output_root(dir.path()),
            &runner,
            fetcher(Some("x")),
        );

        let request = GenerationRequest::image("x").with_output_name("../escape.jpg");
        let err = client.generate(&request).unwrap_err();
        assert!(matches!(err, KamuiError::InvalidOutputName { .. }));
        assert!(runner.seen.borrow().is_empty());
    }
}
