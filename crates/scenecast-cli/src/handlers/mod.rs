#![deny(clippy::all, clippy::pedantic)]

pub mod compile;
pub mod health;
pub mod merge;

use scenecast_api_types::ErrorKind;
use serde::Serialize;

use crate::client::CliError;

/// What gets printed after a render or merge, without the payload itself.
#[derive(Debug, Serialize)]
pub struct Summary {
    pub output: String,
    pub bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_count: Option<usize>,
}

pub fn failure(
    error: Option<String>,
    kind: Option<ErrorKind>,
    logs: Option<&str>,
) -> CliError {
    if let Some(logs) = logs.filter(|logs| !logs.trim().is_empty()) {
        eprintln!("{logs}");
    }
    CliError::Failed {
        kind: kind.map_or("unexpected", ErrorKind::as_str).to_string(),
        message: error.unwrap_or_else(|| "request failed".to_string()),
    }
}
