#![deny(clippy::all, clippy::pedantic)]

use std::time::Duration;

use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::args::Cli;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("server URL is required (use --server or SCENECAST_SERVER_URL)")]
    MissingServer,
    #[error("failed to read input file {path}: {source}")]
    InputFile {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to write output file {path}: {source}")]
    OutputFile {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server error: {0}")]
    Server(String),
    #[error("{kind}: {message}")]
    Failed { kind: String, message: String },
    #[error("service is unhealthy")]
    Unhealthy,
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Clone, Debug)]
pub struct Ctx {
    pub client: Client,
    pub base: Url,
}

impl Ctx {
    pub fn new(server: &str, timeout: Duration) -> Result<Self, CliError> {
        let base = Url::parse(server)?.join("/")?;
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()?;
        Ok(Self { client, base })
    }

    pub fn user_agent() -> &'static str {
        concat!("scenecast-cli/", env!("CARGO_PKG_VERSION"))
    }

    pub fn url(&self, path: &str) -> Result<Url, CliError> {
        self.base.join(path).map_err(CliError::Url)
    }

    /// Sends a request and decodes the JSON envelope.
    ///
    /// Statuses listed in `accepted` are decoded like successes because the
    /// service still answers them with a well-formed envelope.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&impl Serialize>,
        accepted: &[StatusCode],
    ) -> Result<T, CliError> {
        let mut req = self.client.request(method, self.url(path)?);
        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = req.send().await?;
        Self::handle(resp, accepted).await
    }

    async fn handle<T: DeserializeOwned>(
        resp: Response,
        accepted: &[StatusCode],
    ) -> Result<T, CliError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() && !accepted.contains(&status) {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            return Err(CliError::Server(format!("status {status} body {text}")));
        }
        let val = serde_json::from_slice(&bytes)
            .map_err(|e| CliError::Server(format!("failed to parse body: {e}")))?;
        Ok(val)
    }
}

pub fn build_ctx_from_cli(cli: &Cli) -> Result<Ctx, CliError> {
    let server = cli.server.as_deref().ok_or(CliError::MissingServer)?;
    if cli.timeout_seconds == 0 {
        return Err(CliError::InvalidInput(
            "timeout must be greater than zero".into(),
        ));
    }
    Ctx::new(server, Duration::from_secs(cli.timeout_seconds))
}
