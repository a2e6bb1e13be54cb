//! Fetching upstream state and merging it.
//!
//! Fetch and merge are split: [`SyncManager::fetch`] talks to the remote
//! and records which commit to merge, [`Updater::merge`] later merges
//! exactly that commit without going back to the network.

use cfgsync_git::{ChangeSet, GitOps, NoProgress, Oid, Progress, Repository, or_noop, tracking_ref};

use crate::error::{Error, Result};
use crate::manager::SyncManager;
use crate::retry::run_with_retry;

/// Paths an update touched, for reloading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateResult {
    /// Added or modified paths.
    pub changed: Vec<String>,
    /// Deleted paths.
    pub deleted: Vec<String>,
}

impl UpdateResult {
    /// Whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deleted.is_empty()
    }
}

impl From<ChangeSet> for UpdateResult {
    fn from(changes: ChangeSet) -> Self {
        Self {
            changed: changes.changed,
            deleted: changes.deleted,
        }
    }
}

enum MergeStep {
    Skip,
    Nothing,
    Merged(UpdateResult),
}

/// Deferred merge produced by a fetch.
#[derive(Debug)]
pub struct Updater<'m> {
    manager: &'m SyncManager,
    ref_to_merge: Option<Oid>,
    definitely_skip_push: bool,
}

impl Updater<'_> {
    /// Commit captured during the fetch, `None` when HEAD already has it.
    #[must_use]
    pub const fn ref_to_merge(&self) -> Option<Oid> {
        self.ref_to_merge
    }

    /// Set by [`merge`](Self::merge) when there is provably nothing to push.
    #[must_use]
    pub const fn definitely_skip_push(&self) -> bool {
        self.definitely_skip_push
    }

    /// Commit local changes, then merge the captured commit.
    ///
    /// Returns `None` when nothing was merged. When additionally nothing
    /// was committed and no local commits are ahead of upstream, the
    /// skip-push flag is set.
    ///
    /// # Errors
    /// Returns `MergeConflict` when the merge stops with conflicts; the
    /// repository is then left mid-merge.
    pub fn merge(&mut self) -> Result<Option<UpdateResult>> {
        let manager = self.manager;
        let ref_to_merge = self.ref_to_merge;
        let _guard = manager.lock_history();

        let step = manager.handle().with(|repo| {
            let committed = manager.commit_in(repo, &NoProgress)?;
            if ref_to_merge.is_none() && !committed && manager.ahead_in(repo)? == 0 {
                return Ok(MergeStep::Skip);
            }
            match ref_to_merge {
                Some(target) => manager.merge_in(repo, target).map(MergeStep::Merged),
                None => Ok(MergeStep::Nothing),
            }
        })?;

        match step {
            MergeStep::Skip => {
                log::debug!("nothing to merge, commit or push");
                self.definitely_skip_push = true;
                Ok(None)
            }
            MergeStep::Nothing => Ok(None),
            MergeStep::Merged(result) => Ok(Some(result)),
        }
    }
}

impl SyncManager {
    /// Fetch the upstream branch and capture the commit to merge.
    ///
    /// The working tree is not touched.
    ///
    /// # Errors
    /// Returns `NoUpstream`, `Authentication`, `Transport` or `Cancelled`.
    pub fn fetch(&self, progress: Option<&dyn Progress>) -> Result<Updater<'_>> {
        let progress = or_noop(progress);
        let ref_to_merge = self.handle().with(|repo| {
            let Some(fetched) = self.fetch_in(repo, progress)? else {
                return Ok(None);
            };
            if repo.is_merged(fetched)? {
                log::debug!("{fetched} is already merged");
                return Ok(None);
            }
            Ok(Some(fetched))
        })?;

        Ok(Updater {
            manager: self,
            ref_to_merge,
            definitely_skip_push: false,
        })
    }

    /// Fetch and merge in one go.
    ///
    /// # Errors
    /// Returns any error of [`fetch`](Self::fetch) or [`Updater::merge`].
    pub fn pull(&self, progress: Option<&dyn Progress>) -> Result<Option<UpdateResult>> {
        self.fetch(progress)?.merge()
    }

    /// Fetch the upstream branch into its remote-tracking ref.
    ///
    /// Returns the fetched commit, `None` when the remote has no such branch.
    pub(crate) fn fetch_in(&self, repo: &Repository, progress: &dyn Progress) -> Result<Option<Oid>> {
        let remote = self.remote();
        if repo.upstream_url(remote)?.is_none() {
            return Err(Error::NoUpstream);
        }
        let endpoint = repo.fetch_endpoint(remote)?.ok_or(Error::NoUpstream)?;
        let branch = self.branch_in(repo)?;
        let refspecs = vec![format!(
            "+refs/heads/{branch}:{}",
            tracking_ref(remote, &branch)
        )];

        progress.set_text(&format!("Fetching from {endpoint}"));
        repo.clear_fetch_head()?;
        let received = run_with_retry(repo, &endpoint, self.credentials(), progress, |transport| {
            transport.fetch(&refspecs, self.credentials(), progress)
        })?;
        log::debug!("received {received} objects from {endpoint}");

        let fetched = repo.record_fetch(remote, &branch)?;
        if fetched.is_none() {
            log::info!("{endpoint} has no branch {branch} yet");
        }
        Ok(fetched)
    }

    pub(crate) fn merge_in(&self, repo: &Repository, target: Oid) -> Result<UpdateResult> {
        let branch = self.branch_in(repo)?;
        let message = self
            .formatter()
            .message(&format!("Merge {}/{branch}", self.remote()));

        let before = repo.head_oid()?;
        let outcome = repo.merge_commit(target, &message, &self.config().identity())?;
        let after = repo.head_oid()?;
        log::info!("merged {target}: {outcome:?}");

        Ok(repo.changes_between(before, after)?.into())
    }
}
