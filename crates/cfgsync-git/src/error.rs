//! Error types for cfgsync-git.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during git operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No repository exists at the managed directory.
    #[error("not a git repository")]
    NotARepository,

    /// The repository has no working tree.
    #[error("repository is bare - a working tree is required")]
    BareRepository,

    /// Reference not found.
    #[error("reference not found: {0}")]
    RefNotFound(String),

    /// Remote not found.
    #[error("remote not found: {0}")]
    RemoteNotFound(String),

    /// A logical path escapes the working tree or is not valid UTF-8.
    #[error("invalid repository path: {0}")]
    InvalidPath(String),

    /// The merge left conflicting entries in the index.
    #[error("merge conflict in: {0:?}")]
    MergeConflict(Vec<String>),

    /// Working tree I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Underlying git2 error.
    #[error("git error: {0}")]
    Git2(#[from] git2::Error),
}
