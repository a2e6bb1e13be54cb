//! Commit message formatting.

/// Produces the single-line prefix put in front of every commit message.
pub trait CommitMessageFormatter: Send + Sync {
    /// Prefix for commit messages, may be empty.
    fn prefix(&self) -> String;

    /// Full commit message for `body`.
    fn message(&self, body: &str) -> String {
        format!("{}{body}", self.prefix())
    }
}

/// Formatter with a fixed prefix, usually taken from configuration.
#[derive(Debug, Clone, Default)]
pub struct PrefixFormatter {
    prefix: String,
}

impl PrefixFormatter {
    /// Create a formatter using `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl CommitMessageFormatter for PrefixFormatter {
    fn prefix(&self) -> String {
        self.prefix.clone()
    }
}
