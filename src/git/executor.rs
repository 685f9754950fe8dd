use crate::error::GitError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// A single git invocation: argv without the leading "git", plus the
/// directory to run in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitInvocation {
    pub args: Vec<String>,
    pub workdir: PathBuf,
}

impl GitInvocation {
    pub fn new<I, S, P>(args: I, workdir: P) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            workdir: workdir.into(),
        }
    }
}

/// Result of executing a git command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub success: bool,
}

/// Runs git processes to completion
///
/// A non-zero exit is a normal result here; callers decide whether it is an
/// error. `run` only fails when the process cannot be started, cannot be
/// awaited, or the operation is cancelled.
#[async_trait]
pub trait GitExecutor: Send + Sync {
    async fn run(
        &self,
        invocation: GitInvocation,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, GitError>;
}

/// Production executor shelling out to the git binary
#[derive(Debug, Clone)]
pub struct CliGitExecutor {
    git_binary: String,
}

impl CliGitExecutor {
    /// Create an executor using the given git binary name or path
    pub fn new<S: Into<String>>(git_binary: S) -> Self {
        Self {
            git_binary: git_binary.into(),
        }
    }

    pub fn git_binary(&self) -> &str {
        &self.git_binary
    }
}

impl Default for CliGitExecutor {
    fn default() -> Self {
        Self::new("git")
    }
}

#[async_trait]
impl GitExecutor for CliGitExecutor {
    async fn run(
        &self,
        invocation: GitInvocation,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, GitError> {
        if cancel.is_cancelled() {
            return Err(GitError::Cancelled);
        }

        trace!(
            args = %invocation.args.join(" "),
            workdir = %invocation.workdir.display(),
            "running git"
        );

        let mut command = Command::new(&self.git_binary);
        command
            .args(&invocation.args)
            .current_dir(&invocation.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(GitError::Spawn)?;

        // Dropping the wait future on cancellation kills the child via
        // kill_on_drop, so no process outlives its token.
        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(GitError::Cancelled),
            output = child.wait_with_output() => output?,
        };

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            success: output.status.success(),
        };

        if !result.success {
            debug!(
                exit_code = result.exit_code,
                stderr = %result.stderr.trim(),
                "git exited non-zero"
            );
        }

        Ok(result)
    }
}
