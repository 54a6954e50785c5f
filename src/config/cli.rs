use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the scenecast binary.
#[derive(Debug, Parser)]
#[command(
    name = "scenecast",
    version,
    about = "Render-and-merge service for scripted animations"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "SCENECAST_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Check that the renderer and ffmpeg answer, print the report and exit.
    Probe(ProbeArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub tools: ToolOverrides,
}

/// Executable locations, shared by every command that spawns the external tools.
#[derive(Debug, Args, Default, Clone)]
pub struct ToolOverrides {
    /// Override the renderer executable.
    #[arg(long = "render-cli-path", value_name = "PATH")]
    pub render_cli_path: Option<PathBuf>,

    /// Override the ffmpeg executable.
    #[arg(long = "merge-ffmpeg-path", value_name = "PATH")]
    pub ffmpeg_path: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub tools: ToolOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the per-request time bound.
    #[arg(long = "server-request-timeout-seconds", value_name = "SECONDS")]
    pub server_request_timeout_seconds: Option<u64>,

    /// Override the maximum request body size in bytes.
    #[arg(long = "server-max-request-bytes", value_name = "BYTES")]
    pub server_max_request_bytes: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the renderer time bound.
    #[arg(long = "render-timeout-seconds", value_name = "SECONDS")]
    pub render_timeout_seconds: Option<u64>,

    /// Override the quality used when a request names none.
    #[arg(long = "render-default-quality", value_name = "QUALITY")]
    pub render_default_quality: Option<String>,

    /// Override the directory under which scratch workspaces are created.
    #[arg(long = "render-scratch-root", value_name = "PATH")]
    pub render_scratch_root: Option<PathBuf>,

    /// Override the ffmpeg time bound.
    #[arg(long = "merge-timeout-seconds", value_name = "SECONDS")]
    pub merge_timeout_seconds: Option<u64>,

    /// Override the artifact download time bound.
    #[arg(long = "fetch-timeout-seconds", value_name = "SECONDS")]
    pub fetch_timeout_seconds: Option<u64>,

    /// Override the maximum size of a downloaded artifact in bytes.
    #[arg(long = "fetch-max-artifact-bytes", value_name = "BYTES")]
    pub fetch_max_artifact_bytes: Option<u64>,
}
