//! Render pipeline: one scene source in, one video artifact (or a typed failure) out.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::Bytes;
use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{
    outcome::{Failure, FailureKind, Outcome, RenderResult},
    request::RenderRequest,
};

use super::{
    process::{Invocation, ProcessError, ProcessRunner},
    workspace::{ScratchWorkspace, WorkspaceError},
};

pub const SOURCE_FILE_NAME: &str = "animation.py";
pub const OUTPUT_NAME: &str = "output";
pub const VIDEO_EXTENSION: &str = "mp4";

pub const METRIC_RENDER_TOTAL: &str = "scenecast_render_total";
pub const METRIC_RENDER_MS: &str = "scenecast_render_ms";

#[derive(Debug, Clone)]
pub struct RenderPipelineConfig {
    pub cli_path: PathBuf,
    pub timeout: Duration,
    /// Parent directory for scratch workspaces; the system temp dir when `None`.
    pub scratch_root: Option<PathBuf>,
}

#[derive(Debug, Error)]
enum RenderFailure {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error("render timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("renderer could not be started: {0}")]
    Process(ProcessError),
    #[error("render failed (exit {}): {stderr}", exit_label(.exit_code))]
    Exited {
        exit_code: Option<i32>,
        stderr: String,
        logs: String,
    },
    #[error("video file not found. Files created:\n{}", .files.join("\n"))]
    NotFound { files: Vec<String>, logs: String },
}

impl From<ProcessError> for RenderFailure {
    fn from(error: ProcessError) -> Self {
        match error {
            ProcessError::Timeout { limit, .. } => RenderFailure::Timeout(limit),
            other => RenderFailure::Process(other),
        }
    }
}

impl RenderFailure {
    fn kind(&self) -> FailureKind {
        match self {
            RenderFailure::Workspace(_) => FailureKind::Unexpected,
            RenderFailure::Timeout(_) => FailureKind::Timeout,
            RenderFailure::Process(_) | RenderFailure::Exited { .. } => {
                FailureKind::SubprocessFailure
            }
            RenderFailure::NotFound { .. } => FailureKind::ArtifactNotFound,
        }
    }

    fn into_parts(self) -> (Failure, String) {
        let failure = Failure::new(self.kind(), self.to_string());
        let logs = match self {
            RenderFailure::Exited { logs, .. } | RenderFailure::NotFound { logs, .. } => logs,
            RenderFailure::Timeout(_) => "renderer exceeded its time limit".to_string(),
            other => other.to_string(),
        };
        (failure, logs)
    }
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |code| code.to_string())
}

struct Rendered {
    artifact: Bytes,
    stdout: String,
    path: PathBuf,
}

/// Runs the external renderer inside a fresh workspace per request.
#[derive(Clone)]
pub struct RenderPipeline {
    config: RenderPipelineConfig,
    runner: Arc<dyn ProcessRunner>,
}

impl RenderPipeline {
    pub fn new(config: RenderPipelineConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { config, runner }
    }

    /// Always returns a result; every failure is folded into [`Outcome::Failure`].
    pub async fn render(&self, request: &RenderRequest) -> RenderResult {
        let started_at = Instant::now();
        let (outcome, log_text) = match self.execute(request).await {
            Ok(rendered) => {
                info!(
                    target = "application::render",
                    op = "render::render",
                    result = "success",
                    entry_point = request.entry_point(),
                    quality = %request.quality(),
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    artifact_path = %rendered.path.display(),
                    artifact_bytes = rendered.artifact.len(),
                    "Scene rendered"
                );
                (
                    Outcome::Success {
                        artifact: rendered.artifact,
                    },
                    rendered.stdout,
                )
            }
            Err(failure) => {
                let (failure, logs) = failure.into_parts();
                warn!(
                    target = "application::render",
                    op = "render::render",
                    result = "error",
                    error_code = failure.kind.as_str(),
                    entry_point = request.entry_point(),
                    quality = %request.quality(),
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error = %failure.message,
                    "Scene render failed"
                );
                (Outcome::Failure(failure), logs)
            }
        };

        let elapsed = started_at.elapsed();
        counter!(
            METRIC_RENDER_TOTAL,
            "outcome" => outcome.label(),
            "kind" => outcome.kind_label()
        )
        .increment(1);
        histogram!(METRIC_RENDER_MS).record(elapsed.as_secs_f64() * 1000.0);

        RenderResult {
            outcome,
            log_text,
            elapsed,
        }
    }

    async fn execute(&self, request: &RenderRequest) -> Result<Rendered, RenderFailure> {
        let workspace = ScratchWorkspace::create(self.config.scratch_root.as_deref())?;
        let source_path = workspace
            .write_file(SOURCE_FILE_NAME, request.source_text())
            .await?;

        let invocation = self.invocation(request, &source_path, workspace.path());
        let output = self.runner.run(&invocation).await?;

        if !output.success {
            return Err(RenderFailure::Exited {
                exit_code: output.exit_code,
                logs: output.combined(),
                stderr: output.stderr,
            });
        }

        let canonical = format!("{OUTPUT_NAME}.{VIDEO_EXTENSION}");
        let fallback = format!("{}.{VIDEO_EXTENSION}", request.entry_point());
        let located = match workspace.find_file(&canonical).await? {
            Some(path) => Some(path),
            None => workspace.find_file(&fallback).await?,
        };

        let Some(path) = located else {
            let files = workspace
                .list_entries()
                .await?
                .into_iter()
                .map(|entry| entry.display().to_string())
                .collect();
            return Err(RenderFailure::NotFound {
                files,
                logs: output.combined(),
            });
        };

        let artifact = workspace.read_file(&path).await?;
        Ok(Rendered {
            artifact: Bytes::from(artifact),
            stdout: output.stdout,
            path,
        })
    }

    /// Renderer command line for `request`, writing below `workspace`.
    pub fn invocation(
        &self,
        request: &RenderRequest,
        source_path: &Path,
        workspace: &Path,
    ) -> Invocation {
        Invocation::new(&self.config.cli_path, self.config.timeout)
            .arg(source_path)
            .arg(request.entry_point())
            .arg(request.quality().renderer_flag())
            .arg("--disable_caching")
            .args(["--output_file", OUTPUT_NAME])
            .arg("--media_dir")
            .arg(workspace)
            .current_dir(workspace)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::application::process::{TokioProcessRunner, write_script};
    use crate::domain::types::Quality;
    use std::fs;
    use tempfile::TempDir;

    /// Fake renderer mimicking the real CLI's media layout.
    const FAKE_RENDERER: &str = r#"#!/bin/sh
set -eu
scene="$2"
media=""
name=""
while [ "$#" -gt 0 ]; do
  case "$1" in
    --media_dir) shift; media="$1" ;;
    --output_file) shift; name="$1" ;;
  esac
  shift
done
out="$media/videos/animation/480p15"
mkdir -p "$out"
printf 'frames-of-%s' "$scene" > "$out/$name.mp4"
echo "rendered $scene"
"#;

    struct Harness {
        _dir: TempDir,
        scratch: PathBuf,
        pipeline: RenderPipeline,
    }

    fn harness(script: &str, timeout: Duration) -> Harness {
        let dir = TempDir::new().expect("temp dir");
        let cli_path = write_script(dir.path(), "fake-manim", script);
        let scratch = dir.path().join("scratch");
        fs::create_dir(&scratch).expect("scratch dir");
        let pipeline = RenderPipeline::new(
            RenderPipelineConfig {
                cli_path,
                timeout,
                scratch_root: Some(scratch.clone()),
            },
            Arc::new(TokioProcessRunner),
        );
        Harness {
            _dir: dir,
            scratch,
            pipeline,
        }
    }

    fn request(entry_point: &str) -> RenderRequest {
        RenderRequest::new(
            "from manim import *\nclass Intro(Scene): pass\n",
            entry_point,
            Quality::Medium,
        )
        .expect("valid request")
    }

    fn scratch_is_empty(path: &Path) -> bool {
        fs::read_dir(path).expect("read scratch").next().is_none()
    }

    #[test]
    fn builds_renderer_command_line() {
        let harness = harness(FAKE_RENDERER, Duration::from_secs(5));
        let invocation = harness.pipeline.invocation(
            &request("Intro"),
            Path::new("/work/animation.py"),
            Path::new("/work"),
        );
        let args: Vec<String> = invocation
            .args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            [
                "/work/animation.py",
                "Intro",
                "-qm",
                "--disable_caching",
                "--output_file",
                "output",
                "--media_dir",
                "/work",
            ]
        );
        assert_eq!(invocation.working_dir.as_deref(), Some(Path::new("/work")));
    }

    #[tokio::test]
    async fn returns_rendered_bytes_verbatim() {
        let harness = harness(FAKE_RENDERER, Duration::from_secs(10));
        let result = harness.pipeline.render(&request("Intro")).await;

        assert_eq!(
            result.outcome.artifact().map(|bytes| &bytes[..]),
            Some(&b"frames-of-Intro"[..]),
            "unexpected outcome: {:?}",
            result.outcome
        );
        assert_eq!(result.log_text, "rendered Intro\n");
        assert!(scratch_is_empty(&harness.scratch), "workspace not removed");
    }

    #[tokio::test]
    async fn repeated_renders_are_byte_identical() {
        let harness = harness(FAKE_RENDERER, Duration::from_secs(10));
        let first = harness.pipeline.render(&request("Intro")).await;
        let second = harness.pipeline.render(&request("Intro")).await;

        assert!(first.outcome.is_success());
        assert_eq!(first.outcome.artifact(), second.outcome.artifact());
    }

    #[tokio::test]
    async fn surfaces_renderer_errors() {
        let harness = harness(
            "#!/bin/sh\necho \"partial\"\necho \"NameError: Intro\" >&2\nexit 1\n",
            Duration::from_secs(10),
        );
        let result = harness.pipeline.render(&request("Intro")).await;

        let failure = result.outcome.failure().expect("failure");
        assert_eq!(failure.kind, FailureKind::SubprocessFailure);
        assert!(
            failure.message.contains("NameError: Intro"),
            "stderr missing from message: {}",
            failure.message
        );
        assert_eq!(result.log_text, "partial\nNameError: Intro\n");
        assert!(scratch_is_empty(&harness.scratch));
    }

    #[tokio::test]
    async fn falls_back_to_entry_point_file_name() {
        let harness = harness(
            r#"#!/bin/sh
mkdir -p "$8/videos/animation/1080p60"
printf 'named' > "$8/videos/animation/1080p60/$2.mp4"
"#,
            Duration::from_secs(10),
        );
        let result = harness.pipeline.render(&request("Intro")).await;

        assert_eq!(
            result.outcome.artifact().map(|bytes| &bytes[..]),
            Some(&b"named"[..])
        );
    }

    #[tokio::test]
    async fn lists_produced_files_when_video_is_missing() {
        let harness = harness(
            "#!/bin/sh\nmkdir -p \"$8/images\"\ntouch \"$8/images/frame.png\"\n",
            Duration::from_secs(10),
        );
        let result = harness.pipeline.render(&request("Intro")).await;

        let failure = result.outcome.failure().expect("failure");
        assert_eq!(failure.kind, FailureKind::ArtifactNotFound);
        assert!(failure.message.contains("animation.py"), "{}", failure.message);
        assert!(
            failure.message.contains("images/frame.png"),
            "{}",
            failure.message
        );
    }

    #[tokio::test]
    async fn times_out_hung_renderer() {
        let harness = harness("#!/bin/sh\nsleep 5\n", Duration::from_millis(200));
        let started_at = Instant::now();
        let result = harness.pipeline.render(&request("Intro")).await;

        let failure = result.outcome.failure().expect("failure");
        assert_eq!(failure.kind, FailureKind::Timeout);
        assert!(failure.message.contains("timed out"), "{}", failure.message);
        assert!(started_at.elapsed() < Duration::from_secs(3));
        assert!(scratch_is_empty(&harness.scratch));
    }

    #[tokio::test]
    async fn missing_renderer_is_a_subprocess_failure() {
        let dir = TempDir::new().expect("temp dir");
        let pipeline = RenderPipeline::new(
            RenderPipelineConfig {
                cli_path: dir.path().join("not-installed"),
                timeout: Duration::from_secs(1),
                scratch_root: Some(dir.path().to_path_buf()),
            },
            Arc::new(TokioProcessRunner),
        );

        let result = pipeline.render(&request("Intro")).await;
        let failure = result.outcome.failure().expect("failure");
        assert_eq!(failure.kind, FailureKind::SubprocessFailure);
        assert!(failure.message.contains("not-installed"), "{}", failure.message);
    }
}
