pub mod executor;
pub mod locator;
pub mod model;
pub mod parser;
pub mod queries;
pub mod version;

// Re-export commonly used types
pub use executor::{CliGitExecutor, CommandOutput, GitExecutor, GitInvocation};
pub use locator::RepoLocator;
pub use model::{
    ChangeGroup, CommitEntry, DiffDocument, DiffFile, DiffHunk, DiffLine, DiffLineKind, DiffStats,
    DirtySummary, HeadInfo, RefEntry, RepoContext, StashEntry, StatusEntry, UpstreamInfo,
};
pub use parser::{parse_diff, parse_log, parse_refs, parse_stashes, parse_status, ParsedStatus};
pub use queries::{DiffRequest, DiffTarget, GitQueries, LogRequest};
pub use version::GitVersion;
