//! The synchronization manager.
//!
//! A [`SyncManager`] owns one working directory backed by a git
//! repository. History-mutating operations (commit, merge, reset,
//! migration) take the manager's history lock first and the repository
//! handle second, so they never interleave and never deadlock.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cfgsync_git::{
    CredentialsProvider, CredentialsStore, GitOps, Progress, PushReport, Repository, or_noop,
};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::handle::HandleCell;
use crate::lifecycle::ShutdownRegistry;
use crate::message::{CommitMessageFormatter, PrefixFormatter};
use crate::retry::{push_with_retry, resolve_push_refspecs};

/// Keeps one directory of settings in sync with an upstream repository.
pub struct SyncManager {
    handle: Arc<HandleCell<Repository>>,
    history: Mutex<()>,
    credentials: CredentialsProvider,
    config: Config,
    formatter: Box<dyn CommitMessageFormatter>,
}

impl SyncManager {
    /// Create a manager for `dir`. Nothing is opened until first use.
    ///
    /// With a `shutdown` registry, one callback is registered that closes
    /// the repository handle; without one nothing is registered.
    #[must_use]
    pub fn new(
        dir: impl Into<PathBuf>,
        store: Arc<dyn CredentialsStore>,
        config: Config,
        shutdown: Option<&ShutdownRegistry>,
    ) -> Self {
        let dir = dir.into();
        let handle = Arc::new(HandleCell::new(dir.clone(), |dir: &Path| {
            Repository::open(dir)
        }));

        if let Some(registry) = shutdown {
            let weak = Arc::downgrade(&handle);
            registry.register(format!("close repository at {}", dir.display()), move || {
                if let Some(cell) = weak.upgrade() {
                    cell.close();
                }
            });
        }

        let formatter = Box::new(PrefixFormatter::new(config.commit.message_prefix.clone()));
        Self {
            handle,
            history: Mutex::new(()),
            credentials: CredentialsProvider::new(store),
            config,
            formatter,
        }
    }

    /// Use `formatter` for commit messages instead of the configured prefix.
    #[must_use]
    pub fn with_formatter(mut self, formatter: impl CommitMessageFormatter + 'static) -> Self {
        self.formatter = Box::new(formatter);
        self
    }

    /// Working directory of the repository.
    #[must_use]
    pub fn dir(&self) -> PathBuf {
        self.handle.dir()
    }

    /// Configuration this manager was created with.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Credentials shared by every transport of this manager.
    #[must_use]
    pub const fn credentials(&self) -> &CredentialsProvider {
        &self.credentials
    }

    /// Commit message formatter.
    #[must_use]
    pub fn formatter(&self) -> &dyn CommitMessageFormatter {
        self.formatter.as_ref()
    }

    /// Move the manager to another directory. The open handle is thrown
    /// away and a new one is opened on next use.
    pub fn change_directory(&self, dir: impl Into<PathBuf>) {
        let _guard = self.lock_history();
        self.handle.relocate(dir);
    }

    /// Release the repository handle. Safe to call repeatedly.
    pub fn close(&self) {
        self.handle.close();
    }

    /// Create the repository unless one already exists.
    ///
    /// Returns whether a repository was created.
    ///
    /// # Errors
    /// Returns error if the directory or repository can't be created.
    pub fn create_repository_if_need(&self) -> Result<bool> {
        let _guard = self.lock_history();
        let dir = self.handle.dir();
        if Repository::exists_at(&dir) {
            return Ok(false);
        }

        let repo = Repository::init(&dir, &self.config.upstream.branch)?;
        repo.disable_auto_crlf()?;
        self.handle.install(repo);
        log::info!("created repository at {}", dir.display());
        Ok(true)
    }

    /// Release the handle and remove the repository directory.
    ///
    /// # Errors
    /// Returns error if the directory exists but can't be removed.
    pub fn delete_repository(&self) -> Result<()> {
        let _guard = self.lock_history();
        self.handle.close();

        let dir = self.handle.dir();
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                log::info!("deleted repository at {}", dir.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether the repository's object database exists on disk.
    #[must_use]
    pub fn is_repository_exists(&self) -> bool {
        Repository::exists_at(self.handle.dir())
    }

    /// URL of the upstream remote, `None` when unset.
    ///
    /// # Errors
    /// Returns error if the repository configuration can't be read.
    pub fn upstream(&self) -> Result<Option<String>> {
        if !self.is_repository_exists() {
            return Ok(None);
        }
        self.handle
            .with(|repo| Ok(repo.upstream_url(self.remote())?))
    }

    /// Whether an upstream URL is configured.
    ///
    /// # Errors
    /// Returns error if the repository configuration can't be read.
    pub fn has_upstream(&self) -> Result<bool> {
        Ok(self.upstream()?.is_some())
    }

    /// Set the upstream URL and branch; a blank or missing URL removes it.
    ///
    /// # Errors
    /// Returns error if the repository configuration can't be written.
    pub fn set_upstream(&self, url: Option<&str>, branch: Option<&str>) -> Result<()> {
        let branch = branch.unwrap_or(&self.config.upstream.branch);
        self.handle
            .with(|repo| Ok(repo.set_upstream(self.remote(), url, branch)?))
    }

    /// Write `content` at `path` and stage it.
    ///
    /// # Errors
    /// Returns error if the path is invalid or the write fails.
    pub fn add_to_index(&self, path: &str, content: &[u8]) -> Result<()> {
        self.handle
            .with(|repo| Ok(repo.add_to_index(path, content)?))
    }

    /// Remove the file or directory at `path` and unstage it.
    ///
    /// # Errors
    /// Returns error if the path is invalid or removal fails.
    pub fn delete_from_index(&self, path: &str, is_file: bool) -> Result<()> {
        self.handle
            .with(|repo| Ok(repo.delete_from_index(path, is_file)?))
    }

    /// Commit pending changes.
    ///
    /// Returns whether a commit was made.
    ///
    /// # Errors
    /// Returns `Cancelled` if the token asks to stop, or the commit error.
    pub fn commit(&self, progress: Option<&dyn Progress>) -> Result<bool> {
        let progress = or_noop(progress);
        let _guard = self.lock_history();
        self.handle.with(|repo| self.commit_in(repo, progress))
    }

    /// Whether the repository is clean enough to commit (no unresolved merge).
    ///
    /// # Errors
    /// Returns error if the repository can't be opened.
    pub fn can_commit(&self) -> Result<bool> {
        self.handle.with(|repo| Ok(repo.can_commit()))
    }

    /// Number of local commits the upstream doesn't have yet.
    ///
    /// # Errors
    /// Returns error if history can't be walked.
    pub fn ahead_commits_count(&self) -> Result<usize> {
        self.handle.with(|repo| self.ahead_in(repo))
    }

    /// Push the current branch (or the configured push mapping) upstream.
    ///
    /// # Errors
    /// Returns `NoUpstream`, `Authentication`, `Transport` or `Cancelled`.
    pub fn push(&self, progress: Option<&dyn Progress>) -> Result<Vec<PushReport>> {
        let progress = or_noop(progress);
        self.handle.with(|repo| {
            let remote = self.remote();
            if repo.upstream_url(remote)?.is_none() {
                return Err(Error::NoUpstream);
            }

            let refspecs = resolve_push_refspecs(repo, remote)?;
            let endpoints = repo.push_endpoints(remote)?;
            let reports = push_with_retry(repo, &endpoints, &refspecs, &self.credentials, progress)?;
            self.record_push(repo, &reports)?;
            Ok(reports)
        })
    }

    pub(crate) fn lock_history(&self) -> MutexGuard<'_, ()> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn handle(&self) -> &HandleCell<Repository> {
        &self.handle
    }

    pub(crate) fn remote(&self) -> &str {
        &self.config.upstream.remote
    }

    pub(crate) fn branch_in(&self, repo: &Repository) -> Result<String> {
        Ok(repo.upstream_branch(&self.config.upstream.branch)?)
    }

    pub(crate) fn commit_in(&self, repo: &Repository, progress: &dyn Progress) -> Result<bool> {
        if progress.is_cancelled() {
            return Err(Error::Cancelled);
        }
        progress.set_text("Committing local changes");

        let message = self.formatter.message("Update settings");
        match repo.commit_all(&message, &self.config.identity())? {
            Some(oid) => {
                log::info!("committed local changes as {oid}");
                Ok(true)
            }
            None => {
                log::debug!("nothing to commit");
                Ok(false)
            }
        }
    }

    pub(crate) fn ahead_in(&self, repo: &Repository) -> Result<usize> {
        let branch = self.branch_in(repo)?;
        Ok(repo.ahead_commits_count(self.remote(), &branch)?)
    }

    /// Move remote-tracking refs to what the remote accepted.
    pub(crate) fn record_push(&self, repo: &Repository, reports: &[PushReport]) -> Result<()> {
        let accepted = reports
            .iter()
            .flat_map(|report| report.updates.iter())
            .filter(|update| update.rejection.is_none());

        for update in accepted {
            let Some(branch) = update.refname.strip_prefix("refs/heads/") else {
                continue;
            };
            if let Some(oid) = repo.ref_oid(&update.refname)? {
                repo.update_tracking_ref(self.remote(), branch, oid)?;
            }
        }

        for report in reports {
            for rejected in report.rejected() {
                log::warn!(
                    "{} rejected {}: {}",
                    report.endpoint,
                    rejected.refname,
                    rejected.rejection.as_deref().unwrap_or("unknown reason")
                );
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for SyncManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncManager")
            .field("handle", &self.handle)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
