//! Merge pipeline: concatenate rendered scenes into one video with FFmpeg.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::Bytes;
use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{
    outcome::{Failure, FailureKind, MergeResult, Outcome},
    request::MergeRequest,
};

use super::{
    fetch::{ArtifactFetcher, FetchError},
    process::{Invocation, ProcessError, ProcessRunner},
    workspace::{ScratchWorkspace, WorkspaceError},
};

pub const MANIFEST_FILE_NAME: &str = "concat_list.txt";
pub const MERGED_FILE_NAME: &str = "merged.mp4";

pub const METRIC_MERGE_TOTAL: &str = "scenecast_merge_total";
pub const METRIC_MERGE_MS: &str = "scenecast_merge_ms";

#[derive(Debug, Clone)]
pub struct MergePipelineConfig {
    pub ffmpeg_path: PathBuf,
    pub timeout: Duration,
    pub scratch_root: Option<PathBuf>,
    /// Seconds between consecutive crossfade offsets.
    pub transition_spacing_seconds: f64,
    pub crf: u8,
    pub preset: String,
}

#[derive(Debug, Error)]
enum MergeFailure {
    #[error("no videos provided to merge")]
    Empty,
    #[error("failed to download scene {index}: {source}")]
    Download { index: usize, source: FetchError },
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error("ffmpeg merge timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("ffmpeg could not be started: {0}")]
    Process(ProcessError),
    #[error("ffmpeg merge failed: {stderr}")]
    Exited { stderr: String, logs: String },
    #[error("merged video file not created")]
    MissingOutput { logs: String },
}

impl From<ProcessError> for MergeFailure {
    fn from(error: ProcessError) -> Self {
        match error {
            ProcessError::Timeout { limit, .. } => MergeFailure::Timeout(limit),
            other => MergeFailure::Process(other),
        }
    }
}

impl MergeFailure {
    fn kind(&self) -> FailureKind {
        match self {
            MergeFailure::Empty => FailureKind::InvalidRequest,
            MergeFailure::Download { source, .. } => source.kind(),
            MergeFailure::Workspace(_) => FailureKind::Unexpected,
            MergeFailure::Timeout(_) => FailureKind::Timeout,
            MergeFailure::Process(_) | MergeFailure::Exited { .. } => {
                FailureKind::SubprocessFailure
            }
            MergeFailure::MissingOutput { .. } => FailureKind::ArtifactNotFound,
        }
    }

    fn into_parts(self) -> (Failure, Option<String>) {
        let failure = Failure::new(self.kind(), self.to_string());
        let logs = match self {
            MergeFailure::Exited { logs, .. } | MergeFailure::MissingOutput { logs } => Some(logs),
            _ => None,
        };
        (failure, logs)
    }
}

/// Downloads scenes in caller order and joins them with the configured processor.
#[derive(Clone)]
pub struct MergePipeline {
    config: MergePipelineConfig,
    runner: Arc<dyn ProcessRunner>,
    fetcher: Arc<dyn ArtifactFetcher>,
}

impl MergePipeline {
    pub fn new(
        config: MergePipelineConfig,
        runner: Arc<dyn ProcessRunner>,
        fetcher: Arc<dyn ArtifactFetcher>,
    ) -> Self {
        Self {
            config,
            runner,
            fetcher,
        }
    }

    /// Always returns a result; every failure is folded into [`Outcome::Failure`].
    pub async fn merge(&self, request: &MergeRequest) -> MergeResult {
        let started_at = Instant::now();
        let scene_count = request.locations().len();

        let (outcome, log_text) = match self.execute(request).await {
            Ok(artifact) => {
                info!(
                    target = "application::merge",
                    op = "merge::merge",
                    result = "success",
                    scene_count,
                    transitions = request.add_transitions(),
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    artifact_bytes = artifact.len(),
                    "Scenes merged"
                );
                (Outcome::Success { artifact }, None)
            }
            Err(failure) => {
                let (failure, logs) = failure.into_parts();
                warn!(
                    target = "application::merge",
                    op = "merge::merge",
                    result = "error",
                    error_code = failure.kind.as_str(),
                    scene_count,
                    transitions = request.add_transitions(),
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error = %failure.message,
                    "Scene merge failed"
                );
                (Outcome::Failure(failure), logs)
            }
        };

        let elapsed = started_at.elapsed();
        counter!(
            METRIC_MERGE_TOTAL,
            "outcome" => outcome.label(),
            "kind" => outcome.kind_label()
        )
        .increment(1);
        histogram!(METRIC_MERGE_MS).record(elapsed.as_secs_f64() * 1000.0);

        MergeResult {
            outcome,
            log_text,
            elapsed,
            scene_count,
        }
    }

    async fn execute(&self, request: &MergeRequest) -> Result<Bytes, MergeFailure> {
        let locations = request.locations();
        match locations {
            [] => return Err(MergeFailure::Empty),
            // A single clip is returned as downloaded; re-encoding it would only lose quality.
            [only] => {
                return self
                    .fetcher
                    .fetch(only)
                    .await
                    .map_err(|source| MergeFailure::Download { index: 0, source });
            }
            _ => {}
        }

        let workspace = ScratchWorkspace::create(self.config.scratch_root.as_deref())?;
        let mut scenes = Vec::with_capacity(locations.len());
        for (index, location) in locations.iter().enumerate() {
            let destination = workspace.join(format!("scene_{index}.mp4"));
            let bytes = self
                .fetcher
                .fetch_to_file(location, &destination)
                .await
                .map_err(|source| MergeFailure::Download { index, source })?;
            debug!(
                target = "application::merge",
                op = "merge::download",
                index,
                bytes,
                location = %location,
                "Scene downloaded"
            );
            scenes.push(destination);
        }

        let output_path = workspace.join(MERGED_FILE_NAME);
        let invocation = if request.add_transitions() {
            self.crossfade_invocation(&scenes, request.transition_seconds(), &output_path)
        } else {
            let manifest = workspace
                .write_file(MANIFEST_FILE_NAME, concat_manifest(&scenes))
                .await?;
            self.concat_invocation(&manifest, &output_path)
        };
        let invocation = invocation.current_dir(workspace.path());

        let output = self.runner.run(&invocation).await?;
        if !output.success {
            return Err(MergeFailure::Exited {
                logs: output.combined(),
                stderr: output.stderr,
            });
        }

        let produced = tokio::fs::try_exists(&output_path)
            .await
            .map_err(|source| WorkspaceError::Io {
                path: output_path.clone(),
                source,
            })?;
        if !produced {
            return Err(MergeFailure::MissingOutput {
                logs: output.combined(),
            });
        }

        let merged = workspace.read_file(&output_path).await?;
        Ok(Bytes::from(merged))
    }

    /// Stream-copy concatenation driven by a manifest file.
    pub fn concat_invocation(&self, manifest: &Path, output: &Path) -> Invocation {
        Invocation::new(&self.config.ffmpeg_path, self.config.timeout)
            .args(["-y", "-f", "concat", "-safe", "0", "-i"])
            .arg(manifest)
            .args(["-c", "copy"])
            .arg(output)
    }

    /// Re-encoding concatenation with a crossfade between each pair of scenes.
    pub fn crossfade_invocation(
        &self,
        scenes: &[PathBuf],
        transition_seconds: f64,
        output: &Path,
    ) -> Invocation {
        let mut invocation =
            Invocation::new(&self.config.ffmpeg_path, self.config.timeout).arg("-y");
        for scene in scenes {
            invocation = invocation.arg("-i").arg(scene);
        }
        invocation
            .arg("-filter_complex")
            .arg(crossfade_filter_graph(
                scenes.len(),
                transition_seconds,
                self.config.transition_spacing_seconds,
            ))
            .args(["-map", "[v]", "-c:v", "libx264", "-preset"])
            .arg(&self.config.preset)
            .arg("-crf")
            .arg(self.config.crf.to_string())
            .arg(output)
    }
}

/// Concat-demuxer manifest listing `scenes` in order.
pub fn concat_manifest(scenes: &[PathBuf]) -> String {
    scenes
        .iter()
        .map(|scene| {
            let escaped = scene.display().to_string().replace('\'', r"'\''");
            format!("file '{escaped}'\n")
        })
        .collect()
}

/// Filter graph chaining `count - 1` crossfades into the `[v]` output pad.
///
/// Offsets follow a fixed `index * spacing` heuristic that does not look at
/// real scene durations.
pub fn crossfade_filter_graph(count: usize, transition_seconds: f64, spacing_seconds: f64) -> String {
    let transitions = count.saturating_sub(1);
    let mut current = "[0:v]".to_string();
    let mut stages = Vec::with_capacity(transitions);
    for index in 0..transitions {
        let next = format!("[{}:v]", index + 1);
        let label = if index + 1 == transitions {
            "[v]".to_string()
        } else {
            format!("[v{index}]")
        };
        let offset = index as f64 * spacing_seconds;
        stages.push(format!(
            "{current}{next}xfade=transition=fade:duration={transition_seconds}:offset={offset}{label}"
        ));
        current = label;
    }
    stages.join(";")
}
