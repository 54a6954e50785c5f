//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::NonZeroU64,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::{
    application::{
        fetch::FetchConfig, health::HealthProbeConfig, merge::MergePipelineConfig,
        render::RenderPipelineConfig,
    },
    domain::{request::DEFAULT_TRANSITION_SECONDS, types::Quality},
};

mod cli;

pub use cli::{CliArgs, Command, ProbeArgs, ServeArgs, ServeOverrides, ToolOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "scenecast";
const ENV_PREFIX: &str = "SCENECAST";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MAX_REQUEST_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_RENDER_CLI_PATH: &str = "manim";
const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 240;
const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";
const DEFAULT_MERGE_TIMEOUT_SECS: u64 = 240;
const DEFAULT_TRANSITION_SPACING_SECS: f64 = 10.0;
const DEFAULT_CRF: u8 = 23;
const MAX_CRF: u8 = 51;
const DEFAULT_PRESET: &str = "medium";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_ARTIFACT_BYTES: u64 = 512 * 1024 * 1024;
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub render: RenderSettings,
    pub merge: MergeSettings,
    pub fetch: FetchSettings,
    pub health: HealthSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
    pub request_timeout: Duration,
    pub max_request_bytes: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub cli_path: PathBuf,
    pub timeout: Duration,
    pub default_quality: Quality,
    /// `None` uses the system temp directory.
    pub scratch_root: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct MergeSettings {
    pub ffmpeg_path: PathBuf,
    pub timeout: Duration,
    pub transition_spacing_seconds: f64,
    pub default_transition_seconds: f64,
    pub crf: u8,
    pub preset: String,
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub max_artifact_bytes: NonZeroU64,
    pub user_agent: String,
    /// Accept `file` merge locations; off unless explicitly enabled.
    pub allow_file_locations: bool,
}

#[derive(Debug, Clone)]
pub struct HealthSettings {
    pub probe_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Probe(args)) => raw.apply_tool_overrides(&args.tools),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    render: RawRenderSettings,
    merge: RawMergeSettings,
    fetch: RawFetchSettings,
    health: RawHealthSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.server_request_timeout_seconds {
            self.server.request_timeout_seconds = Some(seconds);
        }
        if let Some(bytes) = overrides.server_max_request_bytes {
            self.server.max_request_bytes = Some(bytes);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(seconds) = overrides.render_timeout_seconds {
            self.render.timeout_seconds = Some(seconds);
        }
        if let Some(quality) = overrides.render_default_quality.as_ref() {
            self.render.default_quality = Some(quality.clone());
        }
        if let Some(root) = overrides.render_scratch_root.as_ref() {
            self.render.scratch_root = Some(root.clone());
        }
        if let Some(seconds) = overrides.merge_timeout_seconds {
            self.merge.timeout_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.fetch_timeout_seconds {
            self.fetch.timeout_seconds = Some(seconds);
        }
        if let Some(bytes) = overrides.fetch_max_artifact_bytes {
            self.fetch.max_artifact_bytes = Some(bytes);
        }

        self.apply_tool_overrides(&overrides.tools);
    }

    fn apply_tool_overrides(&mut self, overrides: &ToolOverrides) {
        if let Some(path) = overrides.render_cli_path.as_ref() {
            self.render.cli_path = Some(path.clone());
        }
        if let Some(path) = overrides.ffmpeg_path.as_ref() {
            self.merge.ffmpeg_path = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            render,
            merge,
            fetch,
            health,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let render = build_render_settings(render)?;
        let merge = build_merge_settings(merge)?;
        let fetch = build_fetch_settings(fetch)?;
        let health = build_health_settings(health)?;

        let settings = Self {
            server,
            logging,
            render,
            merge,
            fetch,
            health,
        };
        settings.check_time_bounds()?;
        Ok(settings)
    }

    /// Every inner bound must elapse before the request bound does, so a
    /// stuck tool is reported as its own timeout rather than a request timeout.
    fn check_time_bounds(&self) -> Result<(), LoadError> {
        let request = self.server.request_timeout;
        for (key, bound) in [
            ("render.timeout_seconds", self.render.timeout),
            ("merge.timeout_seconds", self.merge.timeout),
            ("fetch.timeout_seconds", self.fetch.timeout),
            ("health.probe_timeout_seconds", self.health.probe_timeout),
        ] {
            if bound >= request {
                return Err(LoadError::invalid(
                    key,
                    format!(
                        "must be shorter than server.request_timeout_seconds ({}s)",
                        request.as_secs()
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl From<&Settings> for RenderPipelineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            cli_path: settings.render.cli_path.clone(),
            timeout: settings.render.timeout,
            scratch_root: settings.render.scratch_root.clone(),
        }
    }
}

impl From<&Settings> for MergePipelineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            ffmpeg_path: settings.merge.ffmpeg_path.clone(),
            timeout: settings.merge.timeout,
            scratch_root: settings.render.scratch_root.clone(),
            transition_spacing_seconds: settings.merge.transition_spacing_seconds,
            crf: settings.merge.crf,
            preset: settings.merge.preset.clone(),
        }
    }
}

impl From<&FetchSettings> for FetchConfig {
    fn from(fetch: &FetchSettings) -> Self {
        Self {
            timeout: fetch.timeout,
            max_artifact_bytes: fetch.max_artifact_bytes.get(),
            user_agent: fetch.user_agent.clone(),
            allow_file_locations: fetch.allow_file_locations,
        }
    }
}

impl From<&Settings> for HealthProbeConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            renderer_path: settings.render.cli_path.clone(),
            ffmpeg_path: settings.merge.ffmpeg_path.clone(),
            timeout: settings.health.probe_timeout,
        }
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_shutdown = seconds(
        server
            .graceful_shutdown_seconds
            .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS),
        "server.graceful_shutdown_seconds",
    )?;
    let request_timeout = seconds(
        server
            .request_timeout_seconds
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        "server.request_timeout_seconds",
    )?;

    let max_request_bytes_value = server
        .max_request_bytes
        .unwrap_or(DEFAULT_MAX_REQUEST_BYTES);
    let max_request_bytes = NonZeroU64::new(max_request_bytes_value).ok_or_else(|| {
        LoadError::invalid("server.max_request_bytes", "must be greater than zero")
    })?;
    usize::try_from(max_request_bytes_value).map_err(|_| {
        LoadError::invalid(
            "server.max_request_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown,
        request_timeout,
        max_request_bytes,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let cli_path = render
        .cli_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RENDER_CLI_PATH));
    non_empty_path(&cli_path, "render.cli_path")?;

    let timeout = seconds(
        render.timeout_seconds.unwrap_or(DEFAULT_RENDER_TIMEOUT_SECS),
        "render.timeout_seconds",
    )?;

    let default_quality = match render.default_quality {
        Some(raw) => raw
            .parse::<Quality>()
            .map_err(|err| LoadError::invalid("render.default_quality", err.message()))?,
        None => Quality::default(),
    };

    let scratch_root = match render.scratch_root {
        Some(root) if root.as_os_str().is_empty() => {
            return Err(LoadError::invalid(
                "render.scratch_root",
                "path must not be empty",
            ));
        }
        other => other,
    };

    Ok(RenderSettings {
        cli_path,
        timeout,
        default_quality,
        scratch_root,
    })
}

fn build_merge_settings(merge: RawMergeSettings) -> Result<MergeSettings, LoadError> {
    let ffmpeg_path = merge
        .ffmpeg_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_FFMPEG_PATH));
    non_empty_path(&ffmpeg_path, "merge.ffmpeg_path")?;

    let timeout = seconds(
        merge.timeout_seconds.unwrap_or(DEFAULT_MERGE_TIMEOUT_SECS),
        "merge.timeout_seconds",
    )?;

    let transition_spacing_seconds = positive_seconds(
        merge
            .transition_spacing_seconds
            .unwrap_or(DEFAULT_TRANSITION_SPACING_SECS),
        "merge.transition_spacing_seconds",
    )?;
    let default_transition_seconds = positive_seconds(
        merge
            .default_transition_seconds
            .unwrap_or(DEFAULT_TRANSITION_SECONDS),
        "merge.default_transition_seconds",
    )?;

    let crf = merge.crf.unwrap_or(DEFAULT_CRF);
    if crf > MAX_CRF {
        return Err(LoadError::invalid(
            "merge.crf",
            format!("must be between 0 and {MAX_CRF}"),
        ));
    }

    let preset = merge
        .preset
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_PRESET.to_string());
    if preset.is_empty() {
        return Err(LoadError::invalid("merge.preset", "must not be empty"));
    }

    Ok(MergeSettings {
        ffmpeg_path,
        timeout,
        transition_spacing_seconds,
        default_transition_seconds,
        crf,
        preset,
    })
}

fn build_fetch_settings(fetch: RawFetchSettings) -> Result<FetchSettings, LoadError> {
    let timeout = seconds(
        fetch.timeout_seconds.unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
        "fetch.timeout_seconds",
    )?;

    let max_artifact_bytes = NonZeroU64::new(
        fetch
            .max_artifact_bytes
            .unwrap_or(DEFAULT_MAX_ARTIFACT_BYTES),
    )
    .ok_or_else(|| LoadError::invalid("fetch.max_artifact_bytes", "must be greater than zero"))?;

    let user_agent = fetch
        .user_agent
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(default_user_agent);

    Ok(FetchSettings {
        timeout,
        max_artifact_bytes,
        user_agent,
        allow_file_locations: fetch.allow_file_locations.unwrap_or(false),
    })
}

fn build_health_settings(health: RawHealthSettings) -> Result<HealthSettings, LoadError> {
    let probe_timeout = seconds(
        health
            .probe_timeout_seconds
            .unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS),
        "health.probe_timeout_seconds",
    )?;
    Ok(HealthSettings { probe_timeout })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
    request_timeout_seconds: Option<u64>,
    max_request_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    cli_path: Option<PathBuf>,
    timeout_seconds: Option<u64>,
    default_quality: Option<String>,
    scratch_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMergeSettings {
    ffmpeg_path: Option<PathBuf>,
    timeout_seconds: Option<u64>,
    transition_spacing_seconds: Option<f64>,
    default_transition_seconds: Option<f64>,
    crf: Option<u8>,
    preset: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFetchSettings {
    timeout_seconds: Option<u64>,
    max_artifact_bytes: Option<u64>,
    user_agent: Option<String>,
    allow_file_locations: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawHealthSettings {
    probe_timeout_seconds: Option<u64>,
}

fn default_user_agent() -> String {
    format!("scenecast/{}", env!("CARGO_PKG_VERSION"))
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn seconds(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

fn positive_seconds(value: f64, key: &'static str) -> Result<f64, LoadError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(LoadError::invalid(key, "must be a positive number of seconds"));
    }
    Ok(value)
}

fn non_empty_path(path: &std::path::Path, key: &'static str) -> Result<(), LoadError> {
    if path.as_os_str().is_empty() {
        return Err(LoadError::invalid(key, "path must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests;
