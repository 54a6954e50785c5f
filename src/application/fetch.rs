//! Downloading previously rendered artifacts.

use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::Client;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::domain::outcome::FailureKind;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unsupported artifact location `{0}`")]
    UnsupportedLocation(String),
    #[error("failed to build http client: {0}")]
    Client(reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Http { url: String, source: reqwest::Error },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("{url} exceeds the artifact size limit of {limit} bytes")]
    TooLarge { url: String, limit: u64 },
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::UnsupportedLocation(_) => FailureKind::InvalidRequest,
            FetchError::Client(_) | FetchError::Write { .. } => FailureKind::Unexpected,
            FetchError::Http { .. }
            | FetchError::Status { .. }
            | FetchError::TooLarge { .. }
            | FetchError::Read { .. } => FailureKind::TransportFailure,
        }
    }
}

/// Seam between the merge pipeline and remote storage.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Load the whole artifact into memory.
    async fn fetch(&self, location: &Url) -> Result<Bytes, FetchError>;

    /// Stream the artifact into `destination`, returning the byte count.
    async fn fetch_to_file(&self, location: &Url, destination: &Path) -> Result<u64, FetchError>;
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub max_artifact_bytes: u64,
    pub user_agent: String,
    /// Serve `file` locations from local disk.
    pub allow_file_locations: bool,
}

/// Fetches `http(s)` locations with reqwest and, when enabled, `file` locations from local disk.
#[derive(Debug, Clone)]
pub struct HttpArtifactFetcher {
    client: Client,
    max_artifact_bytes: u64,
    allow_file_locations: bool,
}

impl HttpArtifactFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            max_artifact_bytes: config.max_artifact_bytes,
            allow_file_locations: config.allow_file_locations,
        })
    }

    async fn open(&self, location: &Url) -> Result<reqwest::Response, FetchError> {
        let url = location.to_string();
        let response = self
            .client
            .get(location.clone())
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }
        if response
            .content_length()
            .is_some_and(|len| len > self.max_artifact_bytes)
        {
            return Err(self.too_large(location));
        }
        Ok(response)
    }

    async fn next_chunk(
        response: &mut reqwest::Response,
        location: &Url,
    ) -> Result<Option<Bytes>, FetchError> {
        response.chunk().await.map_err(|source| FetchError::Http {
            url: location.to_string(),
            source,
        })
    }

    async fn local_size(&self, path: &Path, location: &Url) -> Result<u64, FetchError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| FetchError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        if metadata.len() > self.max_artifact_bytes {
            return Err(self.too_large(location));
        }
        Ok(metadata.len())
    }

    fn too_large(&self, location: &Url) -> FetchError {
        FetchError::TooLarge {
            url: location.to_string(),
            limit: self.max_artifact_bytes,
        }
    }
}

#[async_trait]
impl ArtifactFetcher for HttpArtifactFetcher {
    async fn fetch(&self, location: &Url) -> Result<Bytes, FetchError> {
        match Source::of(location, self.allow_file_locations)? {
            Source::Local(path) => {
                self.local_size(&path, location).await?;
                let data = tokio::fs::read(&path)
                    .await
                    .map_err(|source| FetchError::Read { path, source })?;
                Ok(Bytes::from(data))
            }
            Source::Remote => {
                let mut response = self.open(location).await?;
                let mut buffer = BytesMut::new();
                while let Some(chunk) = Self::next_chunk(&mut response, location).await? {
                    if (buffer.len() + chunk.len()) as u64 > self.max_artifact_bytes {
                        return Err(self.too_large(location));
                    }
                    buffer.extend_from_slice(&chunk);
                }
                Ok(buffer.freeze())
            }
        }
    }

    async fn fetch_to_file(&self, location: &Url, destination: &Path) -> Result<u64, FetchError> {
        let write_error = |source: io::Error| FetchError::Write {
            path: destination.to_path_buf(),
            source,
        };

        match Source::of(location, self.allow_file_locations)? {
            Source::Local(path) => {
                self.local_size(&path, location).await?;
                tokio::fs::copy(&path, destination)
                    .await
                    .map_err(|source| FetchError::Read { path, source })
            }
            Source::Remote => {
                let mut response = self.open(location).await?;
                let mut file = tokio::fs::File::create(destination)
                    .await
                    .map_err(write_error)?;
                let mut written: u64 = 0;
                while let Some(chunk) = Self::next_chunk(&mut response, location).await? {
                    written += chunk.len() as u64;
                    if written > self.max_artifact_bytes {
                        return Err(self.too_large(location));
                    }
                    file.write_all(&chunk).await.map_err(write_error)?;
                }
                file.flush().await.map_err(write_error)?;
                Ok(written)
            }
        }
    }
}

enum Source {
    Local(PathBuf),
    Remote,
}

impl Source {
    fn of(location: &Url, allow_file: bool) -> Result<Self, FetchError> {
        match location.scheme() {
            "http" | "https" => Ok(Source::Remote),
            "file" if allow_file => location
                .to_file_path()
                .map(Source::Local)
                .map_err(|()| FetchError::UnsupportedLocation(location.to_string())),
            _ => Err(FetchError::UnsupportedLocation(location.to_string())),
        }
    }
}
