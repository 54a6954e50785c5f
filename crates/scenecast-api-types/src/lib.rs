//! Wire types for the scenecast HTTP API.
//!
//! The server and `scenecast-cli` both depend on this crate so request and
//! response shapes cannot drift apart.

use serde::{Deserialize, Serialize};

/// Body accepted by `POST /compile`.
///
/// Every field is optional on the wire so the server can answer a missing
/// `python_code` with a structured failure instead of a deserializer error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
}

/// Body accepted by `POST /merge`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeRequest {
    /// Kept as a raw JSON value so a non-array is reported as an invalid request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_urls: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_transitions: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_duration: Option<f64>,
}

/// Failure categories reported in `error_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    SubprocessFailure,
    ArtifactNotFound,
    Timeout,
    TransportFailure,
    Unexpected,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::SubprocessFailure => "subprocess_failure",
            ErrorKind::ArtifactNotFound => "artifact_not_found",
            ErrorKind::Timeout => "timeout",
            ErrorKind::TransportFailure => "transport_failure",
            ErrorKind::Unexpected => "unexpected",
        }
    }
}

/// Response returned by `POST /compile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_bytes_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
    /// Wall-clock seconds spent in the pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl CompileResponse {
    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            success: false,
            video_bytes_base64: None,
            error: Some(error.into()),
            error_kind: Some(ErrorKind::InvalidRequest),
            logs: None,
            duration: None,
        }
    }
}

/// Response returned by `POST /merge`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_bytes_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_count: Option<usize>,
}

impl MergeResponse {
    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            success: false,
            video_bytes_base64: None,
            error: Some(error.into()),
            error_kind: Some(ErrorKind::InvalidRequest),
            logs: None,
            duration: None,
            scene_count: None,
        }
    }
}

/// Response returned by `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub renderer_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renderer_version: Option<String>,
    pub ffmpeg_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffmpeg_version: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_request_tolerates_missing_fields() {
        let request: CompileRequest = serde_json::from_str("{}").expect("empty body parses");
        assert!(request.python_code.is_none());
        assert!(request.class_name.is_none());
    }

    #[test]
    fn merge_request_keeps_non_array_urls() {
        let request: MergeRequest =
            serde_json::from_str(r#"{"video_urls": "nope"}"#).expect("body parses");
        assert_eq!(
            request.video_urls,
            Some(serde_json::Value::String("nope".to_string()))
        );
    }

    #[test]
    fn invalid_compile_response_omits_empty_fields() {
        let value = serde_json::to_value(CompileResponse::invalid("python_code is required"))
            .expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "success": false,
                "error": "python_code is required",
                "error_kind": "invalid_request",
            })
        );
    }

    #[test]
    fn error_kind_strings_match_serde_names() {
        for kind in [
            ErrorKind::InvalidRequest,
            ErrorKind::SubprocessFailure,
            ErrorKind::ArtifactNotFound,
            ErrorKind::Timeout,
            ErrorKind::TransportFailure,
            ErrorKind::Unexpected,
        ] {
            let value = serde_json::to_value(kind).expect("serialize kind");
            assert_eq!(value, serde_json::Value::String(kind.as_str().to_string()));
        }
    }
}
