//! Per-request scratch directories.

use std::{
    io,
    path::{Path, PathBuf},
};

use tempfile::TempDir;
use thiserror::Error;
use walkdir::WalkDir;

const WORKSPACE_PREFIX: &str = "scenecast-";

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to create scratch workspace: {0}")]
    Create(io::Error),
    #[error("workspace i/o failed for {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to scan workspace: {0}")]
    Scan(#[from] walkdir::Error),
    #[error("workspace scan task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A directory owned by exactly one request.
///
/// The directory and everything in it is removed when the value is dropped,
/// which covers early returns, failures and aborted request futures alike.
#[derive(Debug)]
pub struct ScratchWorkspace {
    dir: TempDir,
}

impl ScratchWorkspace {
    /// Create a fresh workspace under `root`, or the system temp dir when `None`.
    pub fn create(root: Option<&Path>) -> Result<Self, WorkspaceError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(WorkspaceError::Create)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(name)
    }

    pub async fn write_file(
        &self,
        name: impl AsRef<Path>,
        contents: impl AsRef<[u8]>,
    ) -> Result<PathBuf, WorkspaceError> {
        let path = self.join(name);
        tokio::fs::write(&path, contents)
            .await
            .map_err(|source| WorkspaceError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    pub async fn read_file(&self, path: &Path) -> Result<Vec<u8>, WorkspaceError> {
        tokio::fs::read(path)
            .await
            .map_err(|source| WorkspaceError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    /// First file named `file_name` anywhere below the workspace, in sorted walk order.
    pub async fn find_file(&self, file_name: &str) -> Result<Option<PathBuf>, WorkspaceError> {
        let root = self.path().to_path_buf();
        let wanted = file_name.to_owned();
        tokio::task::spawn_blocking(move || {
            for entry in WalkDir::new(&root).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file() && entry.file_name() == wanted.as_str() {
                    return Ok(Some(entry.into_path()));
                }
            }
            Ok(None)
        })
        .await?
    }

    /// Every file and directory below the workspace, relative to its root.
    pub async fn list_entries(&self) -> Result<Vec<PathBuf>, WorkspaceError> {
        let root = self.path().to_path_buf();
        tokio::task::spawn_blocking(move || {
            let mut entries = Vec::new();
            for entry in WalkDir::new(&root).min_depth(1).sort_by_file_name() {
                let entry = entry?;
                let relative = entry
                    .path()
                    .strip_prefix(&root)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| entry.path().to_path_buf());
                entries.push(relative);
            }
            Ok(entries)
        })
        .await?
    }
}
