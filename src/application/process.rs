//! Bounded subprocess execution.

use std::{
    ffi::{OsStr, OsString},
    io::{self, ErrorKind},
    path::PathBuf,
    process::Stdio,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// A fully described external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    /// Shell-like rendering for logs; not meant to be re-parsed.
    pub fn command_line(&self) -> String {
        let mut line = self.program_name();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ProcessOutput {
    /// Both streams, stdout first.
    pub fn combined(&self) -> String {
        let mut combined = String::with_capacity(self.stdout.len() + self.stderr.len());
        combined.push_str(&self.stdout);
        combined.push_str(&self.stderr);
        combined
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("executable `{program}` not found: {source}")]
    NotFound { program: String, source: io::Error },
    #[error("failed to spawn `{program}`: {source}")]
    Spawn { program: String, source: io::Error },
    #[error("failed to collect output of `{program}`: {source}")]
    Wait { program: String, source: io::Error },
    #[error("`{program}` exceeded its time limit of {}s", .limit.as_secs_f64())]
    Timeout { program: String, limit: Duration },
}

/// Seam between the pipelines and the operating system.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ProcessError>;
}

/// Runs invocations with `tokio::process`, killing the child when its bound elapses.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ProcessError> {
        let program = invocation.program_name();
        let started_at = Instant::now();

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = invocation.working_dir.as_deref() {
            command.current_dir(dir);
        }

        debug!(
            target = "application::process",
            op = "process::run",
            command = %invocation.command_line(),
            timeout_ms = invocation.timeout.as_millis() as u64,
            "Spawning subprocess"
        );

        let child = command.spawn().map_err(|source| {
            warn!(
                target = "application::process",
                op = "process::run",
                result = "error",
                error_code = "spawn",
                program = %program,
                error = %source,
                "Failed to spawn subprocess"
            );
            if source.kind() == ErrorKind::NotFound {
                ProcessError::NotFound {
                    program: program.clone(),
                    source,
                }
            } else {
                ProcessError::Spawn {
                    program: program.clone(),
                    source,
                }
            }
        })?;

        // Dropping the pending future drops the child, and kill_on_drop terminates it.
        let output = match tokio::time::timeout(invocation.timeout, child.wait_with_output()).await
        {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => return Err(ProcessError::Wait { program, source }),
            Err(_) => {
                warn!(
                    target = "application::process",
                    op = "process::run",
                    result = "timeout",
                    program = %program,
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "Subprocess exceeded its time limit and was killed"
                );
                return Err(ProcessError::Timeout {
                    program,
                    limit: invocation.timeout,
                });
            }
        };

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            elapsed: started_at.elapsed(),
        })
    }
}

/// Writes an executable shell script; used by subprocess tests across the crate.
#[cfg(all(test, unix))]
pub(crate) fn write_script(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
    use std::{fs, os::unix::fs::PermissionsExt};

    let path = dir.join(name);
    fs::write(&path, body).expect("write script");
    let mut perms = fs::metadata(&path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("set perms");
    path
}
