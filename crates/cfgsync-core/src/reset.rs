//! Conflict resolution: take the remote state or force the local one.

use std::path::PathBuf;

use cfgsync_git::{GitOps, Progress, or_noop};

use crate::error::{Error, Result};
use crate::manager::SyncManager;
use crate::pull::UpdateResult;
use crate::retry::{forced, push_with_retry, resolve_push_refspecs};

/// Callback that repopulates the working tree before a forced publish.
pub type LocalInitializer<'a> = &'a mut dyn FnMut(&LocalStager<'_>) -> Result<()>;

/// Staging-only view of a manager, handed to a [`LocalInitializer`].
///
/// The initializer runs under the history lock, so it only gets the
/// operations that don't take it.
#[derive(Debug)]
pub struct LocalStager<'m> {
    manager: &'m SyncManager,
}

impl LocalStager<'_> {
    /// Working directory being reset.
    #[must_use]
    pub fn dir(&self) -> PathBuf {
        self.manager.dir()
    }

    /// Write `content` at `path` and stage it.
    ///
    /// # Errors
    /// Returns error if the path is invalid or the write fails.
    pub fn add_to_index(&self, path: &str, content: &[u8]) -> Result<()> {
        self.manager.add_to_index(path, content)
    }

    /// Remove the file or directory at `path` and unstage it.
    ///
    /// # Errors
    /// Returns error if the path is invalid or removal fails.
    pub fn delete_from_index(&self, path: &str, is_file: bool) -> Result<()> {
        self.manager.delete_from_index(path, is_file)
    }
}

impl SyncManager {
    /// Abort any merge and make the local branch identical to upstream.
    ///
    /// Returns the paths that changed locally. When the remote has no
    /// branch yet, nothing is reset.
    ///
    /// # Errors
    /// Returns any fetch error, or the reset error.
    pub fn reset_to_theirs(&self, progress: Option<&dyn Progress>) -> Result<UpdateResult> {
        let progress = or_noop(progress);
        let _guard = self.lock_history();

        self.handle().with(|repo| {
            repo.abort_merge()?;
            let before = repo.head_oid()?;
            let Some(theirs) = self.fetch_in(repo, progress)? else {
                log::warn!("upstream has nothing to reset to");
                return Ok(UpdateResult::default());
            };

            progress.set_text("Resetting to upstream");
            repo.reset_hard(theirs)?;
            log::info!("reset local branch to upstream {theirs}");
            Ok(repo.changes_between(before, Some(theirs))?.into())
        })
    }

    /// Abort any merge, commit local state and force-push it upstream.
    ///
    /// `initializer` runs first and may stage files through the
    /// [`LocalStager`] it is given.
    ///
    /// # Errors
    /// Returns the initializer's error, `NoUpstream`, or any push error.
    pub fn reset_to_my(
        &self,
        progress: Option<&dyn Progress>,
        initializer: Option<LocalInitializer<'_>>,
    ) -> Result<()> {
        let progress = or_noop(progress);
        let _guard = self.lock_history();

        self.handle().with(|repo| Ok(repo.abort_merge()?))?;
        if let Some(initialize) = initializer {
            log::info!("re-initializing local settings");
            initialize(&LocalStager { manager: self })?;
        }

        self.handle().with(|repo| {
            self.commit_in(repo, progress)?;
            if repo.head_oid()?.is_none() {
                log::warn!("nothing committed locally, nothing to publish");
                return Ok(());
            }

            let remote = self.remote();
            if repo.upstream_url(remote)?.is_none() {
                return Err(Error::NoUpstream);
            }
            let refspecs = forced(&resolve_push_refspecs(repo, remote)?);
            let endpoints = repo.push_endpoints(remote)?;
            let reports =
                push_with_retry(repo, &endpoints, &refspecs, self.credentials(), progress)?;
            self.record_push(repo, &reports)?;
            log::info!("published local state to {remote}");
            Ok(())
        })
    }
}
