//! Checking whether a directory holds a repository.

use std::path::Path;

use cfgsync_git::Repository;

/// Whether `dir` holds a repository: it has a `.git` entry, or it opens
/// as a bare repository. Failing to open means "no", never an error.
#[must_use]
pub fn is_valid_repository(dir: impl AsRef<Path>) -> bool {
    Repository::is_valid(dir)
}

/// Repository checks an orchestrator can swap out.
pub trait RepositoryService: Send + Sync {
    /// Whether `dir` holds a usable repository.
    fn is_valid_repository(&self, dir: &Path) -> bool;
}

/// [`RepositoryService`] backed by git.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitRepositoryService;

impl RepositoryService for GitRepositoryService {
    fn is_valid_repository(&self, dir: &Path) -> bool {
        is_valid_repository(dir)
    }
}
