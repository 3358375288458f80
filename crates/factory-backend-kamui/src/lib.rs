//! Creative Factory Kamui Backend
//!
//! This crate drives the Kamui MCP backend as a subprocess to generate
//! images, videos, music, 3D models and image-to-video clips, then downloads
//! the resulting artifact into a local output tree.
//!
//! # Overview
//!
//! A generation runs in four steps:
//!
//! 1. **Gate** - [`factory_policy::SafetyGate`] checks the operation and, in
//!    strict mode, verifies the backend MCP configuration
//! 2. **Invoke** - the instruction payload is piped to the backend process
//! 3. **Parse** - artifact URLs are pulled out of the backend's free-text output
//! 4. **Download** - the selected URL is streamed into the output layout
//!
//! # Output Layout
//!
//! | Modality | Directory | Default name |
//! |----------|-----------|--------------|
//! | image | `images/` | `image_<hash>.jpg` |
//! | video | `videos/` | `video_<hash>.mp4` |
//! | music | `audio/` | `music_<hash>.mp3` |
//! | 3D model | `3d/` | `model_<hash>.obj` |
//! | image-to-video | `videos/` | `i2v_<hash>.mp4` |
//!
//! # Example
//!
//! ```no_run
//! use factory_backend_kamui::{ClientConfig, GenerationPipeline, GenerationRequest};
//!
//! let pipeline = GenerationPipeline::from_config(ClientConfig::default())?;
//! let outcome = pipeline.run(&GenerationRequest::image("A simple red circle"))?;
//!
//! println!("Generated: {}", outcome.artifact.path.display());
//! # Ok::<(), factory_backend_kamui::KamuiError>(())
//! ```
//!
//! # Backend Requirements
//!
//! The orchestrator looks for the backend executable in:
//!
//! 1. `KAMUI_BACKEND_PATH` environment variable
//! 2. System PATH (with `~/.local/bin` prepended)
//! 3. `~/.local/bin` and `~/.claude/local`
//!
//! # Crate Structure
//!
//! - [`request`] - Requests, modalities and parameter defaults
//! - [`prompt`] - Instruction payload builder
//! - [`orchestrator`] - Backend subprocess management
//! - [`response`] - Artifact URL extraction and selection
//! - [`download`] - Artifact download
//! - [`output`] - Output directories and file names
//! - [`client`] - Invoke, parse and download for one request
//! - [`pipeline`] - Gate plus client, with per-request state tracking
//! - [`error`] - Error types

pub mod client;
pub mod download;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod prompt;
pub mod request;
pub mod response;

// Re-export main types at crate root
pub use client::{
    ArtifactStatus, ClientConfig, DownloadFailurePolicy, GeneratedArtifact, GenerationClient,
    MissingArtifactPolicy,
};
pub use download::{ArtifactFetcher, DownloadOutcome, HttpDownloader};
pub use error::{KamuiError, KamuiResult};
pub use orchestrator::{
    BackendRunner, Orchestrator, OrchestratorConfig, ProcessInvocation, ProcessResult,
    PromptDelivery,
};
pub use output::OutputLayout;
pub use pipeline::{GenerationPipeline, PipelineOutcome, RequestState, StateTrace};
pub use request::{GenerationParams, GenerationRequest, Modality};
pub use response::{extract_urls, parse_response, ExtractedArtifacts};

/// Gates and generates a single request with the default pipeline.
///
/// This is a convenience wrapper around [`GenerationPipeline::from_config`].
pub fn generate(request: &GenerationRequest, config: ClientConfig) -> KamuiResult<PipelineOutcome> {
    GenerationPipeline::from_config(config)?.run(request)
}
