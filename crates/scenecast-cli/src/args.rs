//! Command-line surface for `scenecast-cli`.

#![deny(clippy::all, clippy::pedantic)]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "scenecast-cli",
    version,
    about = "Client for the scenecast render and merge API",
    long_about = None
)]
pub struct Cli {
    /// Service base URL, e.g. <http://127.0.0.1:8000>
    #[arg(long, env = "SCENECAST_SERVER_URL")]
    pub server: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "SCENECAST_CLIENT_TIMEOUT_SECONDS", default_value_t = 600)]
    pub timeout_seconds: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render an animation script into a video file
    Compile(CompileArgs),
    /// Merge rendered scenes into a single video file
    Merge(MergeArgs),
    /// Show renderer and ffmpeg availability
    Health,
}

#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Script source inline
    #[arg(long, conflicts_with = "script_file")]
    pub script: Option<String>,
    /// Read script source from file
    #[arg(long)]
    pub script_file: Option<PathBuf>,
    /// Entry-point class to render (server default when omitted)
    #[arg(long)]
    pub class_name: Option<String>,
    /// Quality preset (`low_quality`, `medium_quality` or `high_quality`)
    #[arg(long)]
    pub quality: Option<String>,
    /// Where to write the rendered video
    #[arg(long, short = 'o')]
    pub out: PathBuf,
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Scene locations (http, https or file URLs) in playback order
    #[arg(required = true)]
    pub urls: Vec<String>,
    /// Blend neighbouring scenes with crossfades
    #[arg(long)]
    pub transitions: bool,
    /// Crossfade length in seconds
    #[arg(long)]
    pub transition_duration: Option<f64>,
    /// Where to write the merged video
    #[arg(long, short = 'o')]
    pub out: PathBuf,
}
