//! Shared domain enumerations.

use std::{fmt, str::FromStr};

use super::error::DomainError;

/// Renderer quality preset, trading fidelity for render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    #[default]
    Low,
    Medium,
    High,
}

impl Quality {
    /// Name used on the wire and in configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Low => "low_quality",
            Quality::Medium => "medium_quality",
            Quality::High => "high_quality",
        }
    }

    /// Flag understood by the renderer CLI.
    pub fn renderer_flag(self) -> &'static str {
        match self {
            Quality::Low => "-ql",
            Quality::Medium => "-qm",
            Quality::High => "-qh",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low_quality" | "low" | "l" => Ok(Quality::Low),
            "medium_quality" | "medium" | "m" => Ok(Quality::Medium),
            "high_quality" | "high" | "h" => Ok(Quality::High),
            other => Err(DomainError::validation(format!(
                "unknown quality `{other}` (expected low_quality, medium_quality or high_quality)"
            ))),
        }
    }
}
