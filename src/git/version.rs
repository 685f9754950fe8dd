use crate::error::{GitError, GitResult};
use std::process::Command;

/// Minimum git version with stable porcelain v2, -z status output and
/// iso-strict dates everywhere we need them
const MIN_GIT_VERSION: (u32, u32) = (2, 25);

/// Version of the git binary we shell out to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GitVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl GitVersion {
    /// Detect the version of the given git binary
    pub fn detect(git_binary: &str) -> GitResult<Self> {
        let output = Command::new(git_binary)
            .arg("--version")
            .output()
            .map_err(|e| {
                GitError::GitVersionDetectionFailed(format!("Failed to execute git: {}", e))
            })?;

        if !output.status.success() {
            return Err(GitError::GitVersionDetectionFailed(
                "git --version command failed".to_string(),
            ));
        }

        Self::parse(&String::from_utf8_lossy(&output.stdout))
    }

    /// Parse output like "git version 2.39.2" or "git version 2.39.2 (Apple Git-143)"
    pub fn parse(version_str: &str) -> GitResult<Self> {
        let rest = version_str.trim().strip_prefix("git version ").ok_or_else(|| {
            GitError::GitVersionDetectionFailed(format!(
                "Unexpected git version format: {}",
                version_str.trim()
            ))
        })?;

        // First whitespace token holds the dotted version; anything after
        // it is vendor decoration.
        let dotted = rest.split_whitespace().next().unwrap_or(rest);
        let mut nums = dotted.split('.');

        let major = parse_component(nums.next(), dotted)?;
        let minor = parse_component(nums.next(), dotted)?;
        // Suffixes like "2.39.2.windows.1" make the patch non-numeric; it
        // never matters for the support check.
        let patch = nums.next().and_then(|n| n.parse().ok()).unwrap_or(0);

        Ok(GitVersion {
            major,
            minor,
            patch,
        })
    }

    /// Check whether this version meets the minimum requirement
    pub fn is_supported(&self) -> bool {
        self.major > MIN_GIT_VERSION.0
            || (self.major == MIN_GIT_VERSION.0 && self.minor >= MIN_GIT_VERSION.1)
    }

    /// Detect the installed version and fail if it is too old
    pub fn validate(git_binary: &str) -> GitResult<Self> {
        let version = Self::detect(git_binary)?;

        if !version.is_supported() {
            return Err(GitError::GitVersionTooOld(format!(
                "{}\n\nPlease upgrade git to version {}.{} or higher.\nVisit: https://git-scm.com/downloads",
                version, MIN_GIT_VERSION.0, MIN_GIT_VERSION.1
            )));
        }

        Ok(version)
    }
}

fn parse_component(component: Option<&str>, dotted: &str) -> GitResult<u32> {
    component
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| {
            GitError::GitVersionDetectionFailed(format!("Invalid version number: {}", dotted))
        })
}

impl std::fmt::Display for GitVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
