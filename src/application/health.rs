//! Availability checks for the external tools.

use std::{path::PathBuf, sync::Arc, time::Duration};

use scenecast_api_types::{HealthResponse, HealthStatus};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{debug, warn};

use super::process::{Invocation, ProcessRunner};

#[derive(Debug, Clone)]
pub struct HealthProbeConfig {
    pub renderer_path: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub timeout: Duration,
}

/// Result of asking one tool for its version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub available: bool,
    pub version: Option<String>,
}

#[derive(Clone)]
pub struct HealthProbe {
    config: HealthProbeConfig,
    runner: Arc<dyn ProcessRunner>,
}

impl HealthProbe {
    pub fn new(config: HealthProbeConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { config, runner }
    }

    pub async fn check(&self) -> HealthResponse {
        let renderer = self
            .probe(
                Invocation::new(&self.config.renderer_path, self.config.timeout).arg("--version"),
            )
            .await;
        let ffmpeg = self
            .probe(Invocation::new(&self.config.ffmpeg_path, self.config.timeout).arg("-version"))
            .await;

        let status = if renderer.available && ffmpeg.available {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };

        HealthResponse {
            status,
            renderer_available: renderer.available,
            renderer_version: renderer.version,
            ffmpeg_available: ffmpeg.available,
            ffmpeg_version: ffmpeg.version,
            timestamp: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_default(),
        }
    }

    async fn probe(&self, invocation: Invocation) -> ToolStatus {
        match self.runner.run(&invocation).await {
            Ok(output) if output.success => {
                let version = output
                    .stdout
                    .lines()
                    .map(str::trim)
                    .find(|line| !line.is_empty())
                    .map(str::to_string);
                debug!(
                    target = "application::health",
                    op = "health::probe",
                    program = %invocation.program_name(),
                    version = version.as_deref().unwrap_or(""),
                    "Tool answered version probe"
                );
                ToolStatus {
                    available: true,
                    version,
                }
            }
            Ok(output) => {
                warn!(
                    target = "application::health",
                    op = "health::probe",
                    result = "error",
                    program = %invocation.program_name(),
                    exit_code = output.exit_code,
                    "Version probe exited unsuccessfully"
                );
                ToolStatus {
                    available: false,
                    version: None,
                }
            }
            Err(err) => {
                warn!(
                    target = "application::health",
                    op = "health::probe",
                    result = "error",
                    program = %invocation.program_name(),
                    error = %err,
                    "Version probe failed"
                );
                ToolStatus {
                    available: false,
                    version: None,
                }
            }
        }
    }
}
