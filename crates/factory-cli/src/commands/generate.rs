//! Generate command implementation
//!
//! Gates each requested content type, drives the Kamui backend and reports
//! where the artifacts landed. Content types run strictly one after another.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Result};
use colored::Colorize;
use factory_backend_kamui::request::{DEFAULT_MOTION, DEFAULT_VIDEO_DURATION_SECS};
use factory_backend_kamui::{
    ArtifactStatus, ClientConfig, GenerationClient, GenerationParams, GenerationPipeline,
    GenerationRequest, KamuiError, Modality, PipelineOutcome,
};
use factory_policy::{
    strict_mode_from_env, BackendConfigReport, BackendConfigVerifier, ConfigVerifier,
    OperationPolicy, SafetyGate,
};
use serde::Serialize;

use crate::cli_args::ContentType;

/// Options for the generate command.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub content_type: ContentType,
    pub prompt: Option<String>,
    pub output: Option<String>,
    pub out_root: Option<PathBuf>,
    pub mcp_config: Option<PathBuf>,
    pub strict: Option<bool>,
    pub image: Option<PathBuf>,
    pub motion: Option<String>,
    pub duration: Option<u32>,
    pub json: bool,
}

/// A structured error in JSON output.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct JsonError {
    /// Stable error code (e.g. "POLICY_001", "KAMUI_003")
    pub code: String,
    /// Taxonomy kind
    pub kind: String,
    /// Human-readable message
    pub message: String,
}

impl From<&KamuiError> for JsonError {
    fn from(err: &KamuiError) -> Self {
        Self {
            code: err.code().to_string(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// JSON report for a generate run.
#[derive(Debug, Serialize)]
pub struct GenerateReport {
    pub success: bool,
    pub strict: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<BackendConfigReport>,
    pub results: Vec<PipelineOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonError>,
}

/// Builds the requests for `options`, in run order.
pub fn build_requests(options: &GenerateOptions) -> Result<Vec<GenerationRequest>> {
    if options.content_type == ContentType::All && options.output.is_some() {
        bail!("--output cannot be combined with --type all; names are derived per content type");
    }

    let prompt = options.prompt.as_deref().unwrap_or("").trim();

    let mut requests = Vec::new();
    for modality in options.content_type.modalities() {
        let mut request = match modality {
            Modality::ImageToVideo => {
                let Some(ref image) = options.image else {
                    bail!("--image is required for --type image-to-video");
                };
                if !image.is_file() {
                    bail!("Source image does not exist: {}", image.display());
                }
                let params = GenerationParams::ImageToVideo {
                    source_image: image.clone(),
                    motion: options
                        .motion
                        .clone()
                        .unwrap_or_else(|| DEFAULT_MOTION.to_string()),
                    duration_secs: options.duration.unwrap_or(DEFAULT_VIDEO_DURATION_SECS),
                };
                GenerationRequest::new(prompt, params)
            }
            _ => {
                if prompt.is_empty() {
                    bail!("--prompt is required for --type {}", modality);
                }
                let mut request = GenerationRequest::for_modality(modality, prompt)
                    .ok_or_else(|| anyhow!("no default parameters for {}", modality))?;
                request.params = with_duration(request.params, options.duration);
                request
            }
        };

        if let Some(ref name) = options.output {
            request = request.with_output_name(name.clone());
        }
        requests.push(request);
    }

    Ok(requests)
}

fn with_duration(params: GenerationParams, duration: Option<u32>) -> GenerationParams {
    let Some(secs) = duration else {
        return params;
    };
    match params {
        GenerationParams::Video { fps, .. } => GenerationParams::Video {
            duration_secs: secs,
            fps,
        },
        GenerationParams::Music { genre, .. } => GenerationParams::Music {
            duration_secs: secs,
            genre,
        },
        other => other,
    }
}

/// Builds the client configuration from command-line overrides.
pub fn client_config(options: &GenerateOptions) -> ClientConfig {
    let mut config = ClientConfig::default();
    if let Some(ref root) = options.out_root {
        config = config.output_root(root.clone());
    }
    if let Some(ref path) = options.mcp_config {
        config = config.mcp_config(path.clone());
    }
    config
}

/// Run the generate command
///
/// # Returns
/// Exit code: 0 if every artifact was generated, 1 otherwise
pub fn run(options: &GenerateOptions) -> Result<ExitCode> {
    let requests = build_requests(options)?;
    let config = client_config(options);
    let strict = options.strict.unwrap_or_else(strict_mode_from_env);
    tracing::debug!(?options, strict, requests = requests.len(), "generate command");

    config.layout.ensure_dirs()?;

    let mut report = GenerateReport {
        success: false,
        strict,
        config: None,
        results: Vec::new(),
        error: None,
    };

    let verifier = BackendConfigVerifier::new(config.mcp_config_path());

    // Preflight: in strict mode nothing runs against a broken configuration.
    if strict {
        match verifier.verify() {
            Ok(config_report) => {
                if !options.json {
                    print_config_report(&config_report);
                }
                report.config = Some(config_report);
            }
            Err(e) => {
                let err = KamuiError::from(e);
                return finish_with_error(report, &err, options.json);
            }
        }
    } else if !options.json {
        println!(
            "{} strict mode disabled; Kamui configuration not verified",
            "!!".yellow()
        );
    }

    let gate = SafetyGate::new(OperationPolicy::standard(), verifier);
    let client = GenerationClient::new(config)?;
    let pipeline = GenerationPipeline::new(gate, client, strict);

    for request in &requests {
        let modality = request.modality();
        if !options.json {
            println!("{} {}...", "Generating".cyan().bold(), modality.noun());
        }

        match pipeline.run(request) {
            Ok(outcome) => {
                if !options.json {
                    print_outcome(&outcome);
                }
                report.results.push(outcome);
            }
            Err(err) => return finish_with_error(report, &err, options.json),
        }
    }

    let on_disk = artifacts_on_disk(&report.results);
    report.success = on_disk == report.results.len();
    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.success {
        println!("{} {} artifact(s) generated", "SUCCESS".green().bold(), on_disk);
    } else {
        println!(
            "{} {} of {} artifact(s) on disk",
            "INCOMPLETE".yellow().bold(),
            on_disk,
            report.results.len()
        );
    }

    if report.success {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}

/// Counts outcomes whose artifact file exists.
fn artifacts_on_disk(results: &[PipelineOutcome]) -> usize {
    results
        .iter()
        .filter(|outcome| outcome.artifact.exists_on_disk())
        .count()
}

fn finish_with_error(mut report: GenerateReport, err: &KamuiError, json: bool) -> Result<ExitCode> {
    if json {
        report.error = Some(JsonError::from(err));
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_error(err);
    }
    Ok(ExitCode::from(1))
}

fn print_config_report(report: &BackendConfigReport) {
    println!(
        "{} Kamui configuration verified ({} services, {})",
        "ok".green(),
        report.service_count,
        report.path.display()
    );
    for prefix in &report.missing_capabilities {
        println!(
            "  {} no service provides {}* capabilities",
            "!!".yellow(),
            prefix
        );
    }
}

fn print_outcome(outcome: &PipelineOutcome) {
    let artifact = &outcome.artifact;
    if artifact.exists_on_disk() {
        println!("  {} {}", "->".green(), artifact.path.display());
    } else {
        println!(
            "  {} {} (not on disk)",
            "->".yellow(),
            artifact.path.display()
        );
        if let ArtifactStatus::DownloadFailed { url, reason } = &artifact.status {
            println!("     {} {}: {}", "download failed".dimmed(), url, reason);
        }
    }
}

fn print_error(err: &KamuiError) {
    eprintln!(
        "{} [{}] {}",
        "FAILED".red().bold(),
        err.code(),
        err
    );
    if let KamuiError::BackendExecution { stdout_prefix, .. } = err {
        if !stdout_prefix.is_empty() {
            eprintln!("{}", "Backend output:".dimmed());
            eprintln!("{}", stdout_prefix.dimmed());
        }
    }
}
