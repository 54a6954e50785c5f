#![deny(clippy::all, clippy::pedantic)]

use std::fs;
use std::path::{Path, PathBuf};

use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::client::CliError;

pub fn read_value(val: Option<String>, file: Option<PathBuf>) -> Result<String, CliError> {
    if let Some(path) = file {
        let data = fs::read_to_string(&path).map_err(|source| CliError::InputFile {
            path: path.display().to_string(),
            source,
        })?;
        Ok(data)
    } else if let Some(v) = val {
        Ok(v)
    } else {
        Err(CliError::InvalidInput(
            "script required (use --script or --script-file)".into(),
        ))
    }
}

/// Decodes a `video_bytes_base64` payload and writes it to `path`.
pub fn write_artifact(encoded: &str, path: &Path) -> Result<usize, CliError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| CliError::Server(format!("invalid base64 payload: {e}")))?;
    fs::write(path, &bytes).map_err(|source| CliError::OutputFile {
        path: path.display().to_string(),
        source,
    })?;
    Ok(bytes.len())
}
