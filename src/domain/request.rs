//! Validated request records for the render and merge pipelines.

use url::Url;

use super::{error::DomainError, types::Quality};

pub const DEFAULT_ENTRY_POINT: &str = "Scene";
pub const DEFAULT_TRANSITION_SECONDS: f64 = 0.5;

/// One scene to render. Constructed only through [`RenderRequest::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    source_text: String,
    entry_point: String,
    quality: Quality,
}

impl RenderRequest {
    pub fn new(
        source_text: impl Into<String>,
        entry_point: impl Into<String>,
        quality: Quality,
    ) -> Result<Self, DomainError> {
        let source_text = source_text.into();
        if source_text.trim().is_empty() {
            return Err(DomainError::validation("python_code is required"));
        }

        let entry_point = entry_point.into();
        validate_entry_point(&entry_point)?;

        Ok(Self {
            source_text,
            entry_point,
            quality,
        })
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }
}

/// The entry point is passed to the renderer and used as a fallback file name,
/// so it must be a plain identifier.
fn validate_entry_point(name: &str) -> Result<(), DomainError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DomainError::validation(format!(
            "class_name `{name}` is not a valid identifier"
        )))
    }
}

/// An ordered list of clips to concatenate.
///
/// An empty location list is representable on purpose: the merge pipeline
/// reports it as a failure result rather than refusing to build the request.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeRequest {
    locations: Vec<Url>,
    add_transitions: bool,
    transition_seconds: f64,
}

impl MergeRequest {
    pub fn new(
        locations: Vec<Url>,
        add_transitions: bool,
        transition_seconds: f64,
    ) -> Result<Self, DomainError> {
        if !transition_seconds.is_finite() || transition_seconds <= 0.0 {
            return Err(DomainError::validation(format!(
                "transition_duration must be a positive number of seconds, got {transition_seconds}"
            )));
        }

        Ok(Self {
            locations,
            add_transitions,
            transition_seconds,
        })
    }

    pub fn locations(&self) -> &[Url] {
        &self.locations
    }

    pub fn add_transitions(&self) -> bool {
        self.add_transitions
    }

    pub fn transition_seconds(&self) -> f64 {
        self.transition_seconds
    }
}

/// Parse caller-supplied artifact locations, keeping their order.
///
/// `file` locations are accepted only when `allow_file` is set; otherwise any
/// caller could read files local to the service.
pub fn parse_locations<S: AsRef<str>>(
    raw: &[S],
    allow_file: bool,
) -> Result<Vec<Url>, DomainError> {
    raw.iter()
        .enumerate()
        .map(|(index, value)| parse_location(index, value.as_ref(), allow_file))
        .collect()
}

fn parse_location(index: usize, value: &str, allow_file: bool) -> Result<Url, DomainError> {
    let url = Url::parse(value.trim()).map_err(|err| {
        DomainError::validation(format!("video_urls[{index}] is not a valid URL: {err}"))
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        "file" if allow_file => Ok(url),
        "file" => Err(DomainError::validation(format!(
            "video_urls[{index}] uses `file` locations, which are disabled"
        ))),
        scheme => Err(DomainError::validation(format!(
            "video_urls[{index}] uses unsupported scheme `{scheme}`"
        ))),
    }
}
