//! Error types for cfgsync-core.

use crate::batch::BatchFailure;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in cfgsync-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The remote rejected credentials twice in a row.
    #[error("authentication failed for {endpoint} - credentials were rejected after a reset")]
    Authentication {
        /// Endpoint that refused access.
        endpoint: String,
    },

    /// Network or protocol failure other than authentication.
    #[error("transport error for {endpoint}: {message}")]
    Transport {
        /// Endpoint being talked to.
        endpoint: String,
        /// Backend message.
        message: String,
    },

    /// The progress token asked to stop.
    #[error("operation cancelled")]
    Cancelled,

    /// No upstream URL is configured.
    #[error("no upstream configured - run `cfgsync upstream <url>` first")]
    NoUpstream,

    /// A merge stopped with conflicts; the repository is left mid-merge.
    #[error("merge conflict in {}", .0.join(", "))]
    MergeConflict(Vec<String>),

    /// Some operations of a batch failed.
    #[error("{} operation(s) failed: {}", .0.len(), summarize(.0))]
    Aggregate(Vec<BatchFailure>),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Git operation error.
    #[error("git error: {0}")]
    Git(cfgsync_git::Error),

    /// TOML parsing error.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("toml error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl From<cfgsync_git::Error> for Error {
    fn from(err: cfgsync_git::Error) -> Self {
        match err {
            cfgsync_git::Error::MergeConflict(paths) => Self::MergeConflict(paths),
            other => Self::Git(other),
        }
    }
}

fn summarize(failures: &[BatchFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.label, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_conflict_lifted() {
        let err: Error = cfgsync_git::Error::MergeConflict(vec!["a.xml".into()]).into();
        assert!(matches!(err, Error::MergeConflict(ref paths) if paths == &["a.xml"]));
        assert_eq!(err.to_string(), "merge conflict in a.xml");
    }

    #[test]
    fn test_aggregate_message() {
        let err = Error::Aggregate(vec![
            BatchFailure {
                label: "ide".into(),
                error: Error::Cancelled,
            },
            BatchFailure {
                label: "shared".into(),
                error: Error::NoUpstream,
            },
        ]);
        let message = err.to_string();
        assert!(message.starts_with("2 operation(s) failed"));
        assert!(message.contains("ide: operation cancelled"));
    }
}
