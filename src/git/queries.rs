use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{GitError, GitResult};
use crate::git::executor::{CommandOutput, GitExecutor, GitInvocation};
use crate::git::model::{
    CommitEntry, DiffDocument, RefEntry, RepoContext, StashEntry, StatusEntry,
};
use crate::git::parser;

const STATUS_ARGS: [&str; 4] = ["status", "--porcelain=v2", "--branch", "-z"];

const LOG_FORMAT: &str = "--pretty=format:%H%x1f%P%x1f%an%x1f%ad%x1f%s%x1f%D%x1e";

const REF_FORMAT: &str = "--format=%(refname:short)%x1f%(refname)%x1f%(objectname)%x1f\
                          %(committerdate:iso-strict)%x1f%(upstream:short)%x1f%(ahead)%x1f%(behind)%x1e";

const STASH_FORMAT: &str = "--format=%gd%x1f%cd%x1f%gs%x1e";

/// Which diff to compute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffTarget {
    /// Working tree against HEAD
    WorkingTree,
    /// Index against HEAD
    Index,
    /// A given commit, or the latest one when the reference is None
    Commit(Option<String>),
    /// A given stash, or the latest one when the reference is None
    Stash(Option<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRequest {
    pub root: PathBuf,
    pub target: DiffTarget,
    /// Restrict the diff to one path
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRequest {
    pub root: PathBuf,
    /// Defaults to HEAD when blank or absent
    pub reference: Option<String>,
    pub skip: usize,
    pub take: usize,
    /// Restrict history to commits touching one path
    pub path: Option<String>,
}

/// Read-only queries against a repository, all answered by running git
/// and parsing its output
///
/// Every operation takes the repository root explicitly, so one instance
/// serves any number of repositories.
pub struct GitQueries {
    executor: Arc<dyn GitExecutor>,
}

impl GitQueries {
    pub fn new(executor: Arc<dyn GitExecutor>) -> Self {
        Self { executor }
    }

    /// Identify the repository and summarize its current state
    pub async fn repo_context(
        &self,
        root: impl AsRef<Path>,
        cancel: &CancellationToken,
    ) -> GitResult<RepoContext> {
        let root = require_root(root.as_ref())?;

        let git_dir = self
            .run_checked(["rev-parse", "--git-dir"], root, cancel)
            .await?;
        let is_bare = self
            .run_checked(["rev-parse", "--is-bare-repository"], root, cancel)
            .await?;
        let status = self.run_checked(STATUS_ARGS, root, cancel).await?;

        let parsed = parser::parse_status(&status.stdout);
        Ok(RepoContext {
            root: root.to_path_buf(),
            git_dir: PathBuf::from(git_dir.stdout.trim()),
            is_bare: is_bare.stdout.trim().eq_ignore_ascii_case("true"),
            head: parsed.head,
            upstream: parsed.upstream,
            dirty: parsed.summary,
            refreshed_at: Utc::now(),
        })
    }

    /// List every pending change in the working tree and index
    pub async fn status(
        &self,
        root: impl AsRef<Path>,
        cancel: &CancellationToken,
    ) -> GitResult<Vec<StatusEntry>> {
        let root = require_root(root.as_ref())?;
        let output = self.run_checked(STATUS_ARGS, root, cancel).await?;
        Ok(parser::parse_status(&output.stdout).entries)
    }

    /// Compute the patch for the requested target
    pub async fn diff(
        &self,
        request: &DiffRequest,
        cancel: &CancellationToken,
    ) -> GitResult<DiffDocument> {
        let root = require_root(&request.root)?;

        let mut args = match &request.target {
            DiffTarget::WorkingTree => string_args(["diff", "--no-color", "--patch"]),
            DiffTarget::Index => string_args(["diff", "--cached", "--no-color", "--patch"]),
            DiffTarget::Commit(reference) => {
                let mut args = string_args(["show", "--no-color", "--patch"]);
                push_reference(&mut args, reference.as_deref());
                args
            }
            DiffTarget::Stash(reference) => {
                let mut args = string_args(["stash", "show", "-p", "--no-color"]);
                push_reference(&mut args, reference.as_deref());
                args
            }
        };
        push_path_filter(&mut args, request.path.as_deref());

        let output = self.run_checked(args, root, cancel).await?;
        Ok(parser::parse_diff(&output.stdout))
    }

    /// Fetch one page of history for a ref, newest first
    pub async fn log_page(
        &self,
        request: &LogRequest,
        cancel: &CancellationToken,
    ) -> GitResult<Vec<CommitEntry>> {
        let root = require_root(&request.root)?;

        let reference = match request.reference.as_deref() {
            Some(reference) if !reference.trim().is_empty() => reference,
            _ => "HEAD",
        };

        let mut args = vec![
            "log".to_string(),
            reference.to_string(),
            "--date=iso-strict".to_string(),
            LOG_FORMAT.to_string(),
            format!("--max-count={}", request.take),
            format!("--skip={}", request.skip),
        ];
        push_path_filter(&mut args, request.path.as_deref());

        let output = self.run_checked(args, root, cancel).await?;
        Ok(parser::parse_log(&output.stdout))
    }

    /// List local branches, remote branches and tags
    pub async fn refs(
        &self,
        root: impl AsRef<Path>,
        cancel: &CancellationToken,
    ) -> GitResult<Vec<RefEntry>> {
        let root = require_root(root.as_ref())?;
        let args = [
            "for-each-ref",
            "refs/heads",
            "refs/remotes",
            "refs/tags",
            REF_FORMAT,
        ];

        let output = self.run_checked(args, root, cancel).await?;
        Ok(parser::parse_refs(&output.stdout))
    }

    /// List stashes, newest first
    pub async fn stashes(
        &self,
        root: impl AsRef<Path>,
        cancel: &CancellationToken,
    ) -> GitResult<Vec<StashEntry>> {
        let root = require_root(root.as_ref())?;
        let args = ["stash", "list", "--date=iso-strict", STASH_FORMAT];

        let output = self.run_checked(args, root, cancel).await?;
        Ok(parser::parse_stashes(&output.stdout))
    }

    /// Run one git command, treating a non-zero exit as failure of the
    /// whole query and carrying git's stderr in the error
    async fn run_checked<I, S>(
        &self,
        args: I,
        root: &Path,
        cancel: &CancellationToken,
    ) -> GitResult<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let invocation = GitInvocation::new(args, root);
        let output = self.executor.run(invocation, cancel).await?;
        if !output.success {
            return Err(GitError::CommandFailed(output.stderr));
        }
        Ok(output)
    }
}

pub(crate) fn require_root(root: &Path) -> GitResult<&Path> {
    if root.as_os_str().to_string_lossy().trim().is_empty() {
        return Err(GitError::MissingRepoRoot);
    }
    Ok(root)
}

fn string_args<const N: usize>(args: [&str; N]) -> Vec<String> {
    args.into_iter().map(String::from).collect()
}

fn push_reference(args: &mut Vec<String>, reference: Option<&str>) {
    if let Some(reference) = reference {
        if !reference.trim().is_empty() {
            args.push(reference.to_string());
        }
    }
}

// Paths go after a bare "--" as their own argv entry, so spaces survive.
fn push_path_filter(args: &mut Vec<String>, path: Option<&str>) {
    if let Some(path) = path {
        if !path.trim().is_empty() {
            args.push("--".to_string());
            args.push(path.to_string());
        }
    }
}
