use chrono::{DateTime, FixedOffset, Utc};
use std::path::PathBuf;

/// Which bucket of the working tree a status entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeGroup {
    Staged,
    Unstaged,
    Untracked,
    Conflicts,
    Ignored,
}

/// One changed path from `git status --porcelain=v2`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub group: ChangeGroup,
    /// Raw two-character XY code, kept verbatim for display
    pub code: String,
    pub path: String,
    /// Pre-rename path; present exactly when the entry came from a rename/copy record
    pub original_path: Option<String>,
    pub submodule: bool,
}

/// Current HEAD of a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadInfo {
    /// Branch name, or the sentinel git prints when detached
    pub ref_name: String,
    pub commit_hash: String,
    pub detached: bool,
}

impl HeadInfo {
    /// True when the branch has no commits yet. Porcelain status reports
    /// the oid of an unborn branch as the literal `(initial)`.
    pub fn is_unborn(&self) -> bool {
        self.commit_hash.is_empty() || self.commit_hash == "(initial)"
    }
}

/// The branch being tracked, plus how far apart the two sides are
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamInfo {
    pub name: String,
    pub ahead: u32,
    pub behind: u32,
}

/// Per-group counts of pending changes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtySummary {
    pub staged: usize,
    pub unstaged: usize,
    pub untracked: usize,
    pub conflicts: usize,
    pub ignored: usize,
}

impl DirtySummary {
    pub fn total(&self) -> usize {
        self.staged + self.unstaged + self.untracked + self.conflicts + self.ignored
    }

    /// Ignored files do not make a repository dirty
    pub fn is_clean(&self) -> bool {
        self.staged == 0 && self.unstaged == 0 && self.untracked == 0 && self.conflicts == 0
    }
}

/// Snapshot of a repository's identity and headline state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoContext {
    pub root: PathBuf,
    pub git_dir: PathBuf,
    pub is_bare: bool,
    pub head: HeadInfo,
    pub upstream: Option<UpstreamInfo>,
    pub dirty: DirtySummary,
    /// When this snapshot was taken
    pub refreshed_at: DateTime<Utc>,
}

/// One commit from `git log`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEntry {
    pub hash: String,
    pub parents: Vec<String>,
    pub author: String,
    pub date: DateTime<FixedOffset>,
    pub subject: String,
    /// Ref names decorating the commit, e.g. `HEAD -> main`
    pub decorations: Vec<String>,
}

/// One ref from `git for-each-ref`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefEntry {
    pub name: String,
    pub full_name: String,
    pub hash: String,
    pub date: Option<DateTime<FixedOffset>>,
    pub upstream: Option<String>,
    pub ahead: Option<u32>,
    pub behind: Option<u32>,
}

/// One stash from `git stash list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StashEntry {
    /// Reflog selector, e.g. `stash@{0}`
    pub name: String,
    pub date: DateTime<FixedOffset>,
    pub message: String,
}

/// Classification of a single line inside a diff hunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLineKind {
    Context,
    Add,
    Remove,
    /// Marker lines such as `\ No newline at end of file`, kept verbatim
    Meta,
}

/// One line of hunk body, stored without its leading marker character
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub kind: DiffLineKind,
    pub text: String,
}

impl DiffLine {
    /// Restore the unified-diff form of this line, marker included
    pub fn to_patch_line(&self) -> String {
        match self.kind {
            DiffLineKind::Context => format!(" {}", self.text),
            DiffLineKind::Add => format!("+{}", self.text),
            DiffLineKind::Remove => format!("-{}", self.text),
            DiffLineKind::Meta => self.text.clone(),
        }
    }
}

/// One `@@`-delimited range of changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffHunk {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    pub lines: Vec<DiffLine>,
}

impl DiffHunk {
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_count, self.new_start, self.new_count
        )
    }
}

/// Added/removed line totals for one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffStats {
    pub added: usize,
    pub deleted: usize,
}

/// All hunks touching a single file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffFile {
    pub old_path: String,
    pub new_path: String,
    pub hunks: Vec<DiffHunk>,
    /// Absent when the file has no added or removed lines at all
    pub stats: Option<DiffStats>,
}

/// A parsed patch, possibly spanning several files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffDocument {
    pub files: Vec<DiffFile>,
}

impl DiffDocument {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
