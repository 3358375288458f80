//! Gated generation pipeline.
//!
//! A request moves through
//! `Gated -> Verified | AdvisoryPassed -> Invoking -> Invoked -> Parsed ->
//! Downloading -> Completed | Failed(kind)`. Nothing is retried; a failed
//! request is simply reported.

use std::fmt;

use factory_policy::{
    strict_mode_from_env, BackendConfigVerifier, ConfigVerifier, ErrorKind, GateDecision,
    OperationPolicy, SafetyGate,
};
use serde::Serialize;

use crate::client::{ClientConfig, GeneratedArtifact, GenerationClient};
use crate::download::{ArtifactFetcher, HttpDownloader};
use crate::error::KamuiResult;
use crate::orchestrator::{BackendRunner, Orchestrator};
use crate::request::GenerationRequest;

/// States of a single generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "kind", rename_all = "snake_case")]
pub enum RequestState {
    Gated,
    Verified,
    AdvisoryPassed,
    Invoking,
    Invoked,
    Parsed,
    Downloading,
    Completed,
    Failed(ErrorKind),
}

impl RequestState {
    /// Returns true for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Completed | RequestState::Failed(_))
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestState::Gated => write!(f, "gated"),
            RequestState::Verified => write!(f, "verified"),
            RequestState::AdvisoryPassed => write!(f, "advisory_passed"),
            RequestState::Invoking => write!(f, "invoking"),
            RequestState::Invoked => write!(f, "invoked"),
            RequestState::Parsed => write!(f, "parsed"),
            RequestState::Downloading => write!(f, "downloading"),
            RequestState::Completed => write!(f, "completed"),
            RequestState::Failed(kind) => write!(f, "failed({})", kind),
        }
    }
}

/// Ordered record of the states a request passed through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateTrace {
    states: Vec<RequestState>,
}

impl StateTrace {
    /// Records a transition.
    pub fn enter(&mut self, state: RequestState) {
        tracing::debug!(%state, "request state");
        self.states.push(state);
    }

    /// States entered so far.
    pub fn states(&self) -> &[RequestState] {
        &self.states
    }

    /// Most recent state.
    pub fn current(&self) -> Option<RequestState> {
        self.states.last().copied()
    }

    /// Consumes the trace.
    pub fn into_states(self) -> Vec<RequestState> {
        self.states
    }
}

/// A completed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineOutcome {
    /// What the gate decided.
    pub decision: GateDecision,
    /// The generated artifact.
    pub artifact: GeneratedArtifact,
    /// States the request went through.
    pub states: Vec<RequestState>,
}

/// Safety gate in front of a generation client.
#[derive(Debug, Clone)]
pub struct GenerationPipeline<V = BackendConfigVerifier, R = Orchestrator, F = HttpDownloader> {
    gate: SafetyGate<V>,
    client: GenerationClient<R, F>,
    strict: bool,
}

impl GenerationPipeline {
    /// Standard policy, the client's MCP config, and strict mode from the
    /// environment.
    pub fn from_config(config: ClientConfig) -> KamuiResult<Self> {
        let verifier = BackendConfigVerifier::new(config.mcp_config_path());
        let gate = SafetyGate::new(OperationPolicy::standard(), verifier);
        let client = GenerationClient::new(config)?;
        Ok(Self::new(gate, client, strict_mode_from_env()))
    }
}

impl<V, R, F> GenerationPipeline<V, R, F>
where
    V: ConfigVerifier,
    R: BackendRunner,
    F: ArtifactFetcher,
{
    /// Creates a pipeline.
    pub fn new(gate: SafetyGate<V>, client: GenerationClient<R, F>, strict: bool) -> Self {
        Self {
            gate,
            client,
            strict,
        }
    }

    /// Returns the gate.
    pub fn gate(&self) -> &SafetyGate<V> {
        &self.gate
    }

    /// Returns the client.
    pub fn client(&self) -> &GenerationClient<R, F> {
        &self.client
    }

    /// Whether gate failures are fatal.
    pub fn strict(&self) -> bool {
        self.strict
    }

    /// Returns a copy with strict mode set.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Gates and runs one request.
    pub fn run(&self, request: &GenerationRequest) -> KamuiResult<PipelineOutcome> {
        let mut trace = StateTrace::default();
        let result = self.run_traced(request, &mut trace);
        match result {
            Ok((decision, artifact)) => {
                trace.enter(RequestState::Completed);
                tracing::info!(
                    path = %artifact.path.display(),
                    downloaded = artifact.is_downloaded(),
                    "generation finished"
                );
                Ok(PipelineOutcome {
                    decision,
                    artifact,
                    states: trace.into_states(),
                })
            }
            Err(e) => {
                trace.enter(RequestState::Failed(e.kind()));
                tracing::debug!(code = e.code(), states = ?trace.states(), "generation failed");
                Err(e)
            }
        }
    }

    fn run_traced(
        &self,
        request: &GenerationRequest,
        trace: &mut StateTrace,
    ) -> KamuiResult<(GateDecision, GeneratedArtifact)> {
        trace.enter(RequestState::Gated);
        let decision = self.gate.ensure(request.operation(), self.strict)?;
        trace.enter(if decision.is_verified() {
            RequestState::Verified
        } else {
            RequestState::AdvisoryPassed
        });

        let artifact = self.client.generate_traced(request, trace)?;
        Ok((decision, artifact))
    }

    /// Runs requests one after another, stopping at the first failure.
    pub fn run_sequence(&self, requests: &[GenerationRequest]) -> KamuiResult<Vec<PipelineOutcome>> {
        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            outcomes.push(self.run(request)?);
        }
        Ok(outcomes)
    }
}
