use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{GitError, GitResult};
use crate::git::executor::{GitExecutor, GitInvocation};
use crate::git::model::RepoContext;
use crate::git::queries::{require_root, GitQueries};

/// Answers "is this path inside a git repository, and which one?"
///
/// Probe failures mean "not a repository" and fold to None; only
/// cancellation and process-level failures surface as errors.
pub struct RepoLocator {
    executor: Arc<dyn GitExecutor>,
    queries: GitQueries,
}

impl RepoLocator {
    pub fn new(executor: Arc<dyn GitExecutor>) -> Self {
        Self {
            queries: GitQueries::new(executor.clone()),
            executor,
        }
    }

    /// Resolve the repository containing `path`, if any
    pub async fn locate(
        &self,
        path: impl AsRef<Path>,
        cancel: &CancellationToken,
    ) -> GitResult<Option<RepoContext>> {
        let path = require_root(path.as_ref())?;

        let toplevel = self
            .executor
            .run(
                GitInvocation::new(["rev-parse", "--show-toplevel"], path),
                cancel,
            )
            .await?;
        if !toplevel.success {
            debug!(path = %path.display(), "not inside a git repository");
            return Ok(None);
        }

        let root = toplevel.stdout.trim();
        if root.is_empty() {
            return Ok(None);
        }

        match self.queries.repo_context(root, cancel).await {
            Ok(context) => Ok(Some(context)),
            Err(GitError::CommandFailed(_)) => Ok(None),
            Err(other) => Err(other),
        }
    }
}
