pub mod config;
pub mod error;
pub mod git;
pub mod state;
pub mod tasks;

// Re-export commonly used types for convenience
pub use error::{AppError, AppResult, GitError, GitResult};
pub use git::{GitQueries, GitVersion, RepoLocator};
