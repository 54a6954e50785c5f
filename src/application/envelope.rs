//! Conversion of pipeline results into JSON response envelopes.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use scenecast_api_types::{CompileResponse, ErrorKind, MergeResponse};

use crate::domain::outcome::{FailureKind, MergeResult, Outcome, RenderResult};

impl From<FailureKind> for ErrorKind {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::InvalidRequest => ErrorKind::InvalidRequest,
            FailureKind::SubprocessFailure => ErrorKind::SubprocessFailure,
            FailureKind::ArtifactNotFound => ErrorKind::ArtifactNotFound,
            FailureKind::Timeout => ErrorKind::Timeout,
            FailureKind::TransportFailure => ErrorKind::TransportFailure,
            FailureKind::Unexpected => ErrorKind::Unexpected,
        }
    }
}

struct EnvelopeParts {
    success: bool,
    video_bytes_base64: Option<String>,
    error: Option<String>,
    error_kind: Option<ErrorKind>,
}

fn split(outcome: Outcome) -> EnvelopeParts {
    match outcome {
        Outcome::Success { artifact } => EnvelopeParts {
            success: true,
            video_bytes_base64: Some(STANDARD.encode(&artifact)),
            error: None,
            error_kind: None,
        },
        Outcome::Failure(failure) => EnvelopeParts {
            success: false,
            video_bytes_base64: None,
            error: Some(failure.message),
            error_kind: Some(failure.kind.into()),
        },
    }
}

impl From<RenderResult> for CompileResponse {
    fn from(result: RenderResult) -> Self {
        let parts = split(result.outcome);
        Self {
            success: parts.success,
            video_bytes_base64: parts.video_bytes_base64,
            error: parts.error,
            error_kind: parts.error_kind,
            logs: Some(result.log_text),
            duration: Some(result.elapsed.as_secs_f64()),
        }
    }
}

impl From<MergeResult> for MergeResponse {
    fn from(result: MergeResult) -> Self {
        let parts = split(result.outcome);
        Self {
            success: parts.success,
            video_bytes_base64: parts.video_bytes_base64,
            error: parts.error,
            error_kind: parts.error_kind,
            logs: result.log_text,
            duration: Some(result.elapsed.as_secs_f64()),
            scene_count: Some(result.scene_count),
        }
    }
}
