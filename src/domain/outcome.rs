//! Tagged results returned by the render and merge pipelines.

use std::time::Duration;

use bytes::Bytes;

/// Failure taxonomy shared by both pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// A required field was missing or malformed; nothing was executed.
    InvalidRequest,
    /// An external tool exited non-zero.
    SubprocessFailure,
    /// The tool reported success but its output file is missing.
    ArtifactNotFound,
    /// A subprocess or the whole request exceeded its time bound.
    Timeout,
    /// A remote artifact could not be downloaded.
    TransportFailure,
    Unexpected,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::InvalidRequest => "invalid_request",
            FailureKind::SubprocessFailure => "subprocess_failure",
            FailureKind::ArtifactNotFound => "artifact_not_found",
            FailureKind::Timeout => "timeout",
            FailureKind::TransportFailure => "transport_failure",
            FailureKind::Unexpected => "unexpected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Either the artifact bytes or a typed failure, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { artifact: Bytes },
    Failure(Failure),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn artifact(&self) -> Option<&Bytes> {
        match self {
            Outcome::Success { artifact } => Some(artifact),
            Outcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure(failure) => Some(failure),
        }
    }

    /// `outcome` metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "success",
            Outcome::Failure(_) => "failure",
        }
    }

    /// `kind` metric label; `none` for successes.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "none",
            Outcome::Failure(failure) => failure.kind.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    pub outcome: Outcome,
    pub log_text: String,
    pub elapsed: Duration,
}

impl RenderResult {
    /// A failure produced outside the pipeline, e.g. when the request bound elapses.
    pub fn failed(failure: Failure, elapsed: Duration) -> Self {
        Self {
            log_text: failure.message.clone(),
            outcome: Outcome::Failure(failure),
            elapsed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    pub outcome: Outcome,
    /// Processor output, kept only when the processor itself failed.
    pub log_text: Option<String>,
    pub elapsed: Duration,
    pub scene_count: usize,
}

impl MergeResult {
    pub fn failed(failure: Failure, elapsed: Duration, scene_count: usize) -> Self {
        Self {
            outcome: Outcome::Failure(failure),
            log_text: None,
            elapsed,
            scene_count,
        }
    }
}
