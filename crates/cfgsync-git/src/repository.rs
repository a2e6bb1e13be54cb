//! Repository wrapper providing high-level git operations.

use std::fs;
use std::io;
use std::path::{Component, Path};

use git2::build::CheckoutBuilder;
use git2::{
    Delta, ErrorCode, Index, IndexAddOption, Oid, RepositoryInitOptions, RepositoryState,
    ResetType, Signature,
};

use crate::error::{Error, Result};
use crate::traits::GitOps;
use crate::transport::{GitTransport, Transport, TransportOpener};

/// Author/committer identity used when git config has none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Author name.
    pub name: String,
    /// Author email.
    pub email: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: "cfgsync".into(),
            email: "cfgsync@localhost".into(),
        }
    }
}

/// Paths touched between two commits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Added or modified paths.
    pub changed: Vec<String>,
    /// Deleted paths.
    pub deleted: Vec<String>,
}

impl ChangeSet {
    /// Whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deleted.is_empty()
    }
}

/// What a merge did to the current branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// HEAD already contained the target.
    UpToDate,
    /// The branch was moved forward to the target.
    FastForward {
        /// Previous HEAD, `None` on an unborn branch.
        from: Option<Oid>,
        /// New HEAD.
        to: Oid,
    },
    /// A merge commit was created.
    Merged {
        /// Previous HEAD.
        from: Oid,
        /// The merge commit.
        commit: Oid,
    },
}

/// High-level wrapper around a git repository with a working tree.
pub struct Repository {
    inner: git2::Repository,
}

impl Repository {
    /// Create a repository at `path` with `initial_branch` as HEAD.
    ///
    /// # Errors
    /// Returns error if the directory or repository can't be created.
    pub fn init(path: impl AsRef<Path>, initial_branch: &str) -> Result<Self> {
        let path = path.as_ref();
        fs::create_dir_all(path)?;

        let mut opts = RepositoryInitOptions::new();
        opts.initial_head(initial_branch);
        let inner = git2::Repository::init_opts(path, &opts)?;
        Ok(Self { inner })
    }

    /// Open the repository whose working tree is `path`.
    ///
    /// Parent directories are not searched.
    ///
    /// # Errors
    /// Returns `NotARepository` if there is no repository at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        match git2::Repository::open(path.as_ref()) {
            Ok(inner) => Ok(Self { inner }),
            Err(e) if e.code() == ErrorCode::NotFound => Err(Error::NotARepository),
            Err(e) => Err(e.into()),
        }
    }

    /// Structural check: does `workdir` hold an object database?
    #[must_use]
    pub fn exists_at(workdir: impl AsRef<Path>) -> bool {
        workdir.as_ref().join(".git").join("objects").is_dir()
    }

    /// Whether `dir` is a repository: it has a `.git` entry, or it opens
    /// as a bare repository. Open failures mean "not a repository".
    #[must_use]
    pub fn is_valid(dir: impl AsRef<Path>) -> bool {
        let dir = dir.as_ref();
        if dir.join(".git").exists() {
            return true;
        }

        match git2::Repository::open_bare(dir) {
            Ok(_) => true,
            Err(e) => {
                log::debug!("{} is not a bare repository: {e}", dir.display());
                false
            }
        }
    }

    /// Get the path to the .git directory.
    #[must_use]
    pub fn git_dir(&self) -> &Path {
        self.inner.path()
    }

    /// Get the current repository state.
    #[must_use]
    pub fn state(&self) -> RepositoryState {
        self.inner.state()
    }

    /// Name of the checked-out branch, `None` when detached.
    ///
    /// # Errors
    /// Returns error if HEAD can't be read.
    pub fn current_branch(&self) -> Result<Option<String>> {
        Ok(self
            .head_symbolic_target()?
            .and_then(|target| target.strip_prefix("refs/heads/").map(String::from)))
    }

    /// Get a reference to the underlying git2 repository.
    ///
    /// Use sparingly - prefer high-level methods.
    #[must_use]
    pub const fn inner(&self) -> &git2::Repository {
        &self.inner
    }

    fn workdir_path(&self) -> Result<&Path> {
        self.inner.workdir().ok_or(Error::BareRepository)
    }

    fn head_commit(&self) -> Result<Option<git2::Commit<'_>>> {
        match self.inner.head() {
            Ok(head) => Ok(Some(head.peel_to_commit()?)),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn signature(&self, identity: &Identity) -> Result<Signature<'static>> {
        match self.inner.signature() {
            Ok(sig) => Ok(sig),
            Err(_) => Ok(Signature::now(&identity.name, &identity.email)?),
        }
    }

    fn merge_heads(&self) -> Result<Vec<Oid>> {
        if self.inner.state() != RepositoryState::Merge {
            return Ok(Vec::new());
        }

        let content = match fs::read_to_string(self.inner.path().join("MERGE_HEAD")) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| Oid::from_str(line).map_err(Error::from))
            .collect()
    }

    fn find_remote(&self, name: &str) -> Result<Option<git2::Remote<'_>>> {
        match self.inner.find_remote(name) {
            Ok(remote) => Ok(Some(remote)),
            Err(e) if matches!(e.code(), ErrorCode::NotFound | ErrorCode::InvalidSpec) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn tracking_id(&self, remote: &str, branch: &str) -> Result<Option<Oid>> {
        self.ref_oid(&tracking_ref(remote, branch))
    }

    fn tree_of(&self, oid: Option<Oid>) -> Result<Option<git2::Tree<'_>>> {
        let Some(oid) = oid else {
            return Ok(None);
        };
        Ok(Some(self.inner.find_commit(oid)?.tree()?))
    }

    fn commit_tree(&self, tree_id: Oid, message: &str, identity: &Identity) -> Result<Oid> {
        let tree = self.inner.find_tree(tree_id)?;
        let sig = self.signature(identity)?;
        let merge_heads = self.merge_heads()?;

        let mut parents: Vec<git2::Commit<'_>> = self.head_commit()?.into_iter().collect();
        for oid in &merge_heads {
            parents.push(self.inner.find_commit(*oid)?);
        }
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();

        let oid = self
            .inner
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)?;
        if !merge_heads.is_empty() {
            self.inner.cleanup_state()?;
        }
        log::debug!("committed {oid}: {message}");
        Ok(oid)
    }

    fn fetch_head_id(&self, branch: &str) -> Result<Option<Oid>> {
        let wanted = format!("refs/heads/{branch}");
        let mut found = None;
        let scanned = self.inner.fetchhead_foreach(|refname, _url, oid, _is_merge| {
            if refname == wanted {
                found = Some(*oid);
            }
            true
        });

        match scanned {
            Ok(()) => Ok(found),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl GitOps for Repository {
    fn workdir(&self) -> Option<&Path> {
        self.inner.workdir()
    }

    fn can_commit(&self) -> bool {
        match self.inner.state() {
            RepositoryState::Clean => true,
            RepositoryState::Merge => self
                .inner
                .index()
                .map(|index| !index.has_conflicts())
                .unwrap_or(false),
            _ => false,
        }
    }

    fn head_oid(&self) -> Result<Option<Oid>> {
        Ok(self.head_commit()?.map(|commit| commit.id()))
    }

    fn head_symbolic_target(&self) -> Result<Option<String>> {
        let head = self.inner.find_reference("HEAD")?;
        Ok(head.symbolic_target().map(String::from))
    }

    fn disable_auto_crlf(&self) -> Result<()> {
        let mut config = self.inner.config()?;
        config.set_bool("core.autocrlf", false)?;
        Ok(())
    }

    fn upstream_url(&self, remote: &str) -> Result<Option<String>> {
        let config = self.inner.config()?;
        match config.get_string(&format!("remote.{remote}.url")) {
            Ok(url) if url.trim().is_empty() => Ok(None),
            Ok(url) => Ok(Some(url)),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_upstream(&self, remote: &str, url: Option<&str>, branch: &str) -> Result<()> {
        let Some(url) = url.map(str::trim).filter(|url| !url.is_empty()) else {
            if self.find_remote(remote)?.is_some() {
                self.inner.remote_delete(remote)?;
                log::info!("removed remote {remote}");
            }
            return Ok(());
        };

        if self.find_remote(remote)?.is_some() {
            self.inner.remote_set_url(remote, url)?;
        } else {
            self.inner.remote(remote, url)?;
        }

        let local = self.current_branch()?.unwrap_or_else(|| branch.to_string());
        let mut config = self.inner.config()?;
        config.set_str(&format!("branch.{local}.remote"), remote)?;
        config.set_str(
            &format!("branch.{local}.merge"),
            &format!("refs/heads/{branch}"),
        )?;
        log::info!("upstream set to {url} ({branch})");
        Ok(())
    }

    fn upstream_branch(&self, default: &str) -> Result<String> {
        let Some(local) = self.current_branch()? else {
            return Ok(default.to_string());
        };

        let config = self.inner.config()?;
        match config.get_string(&format!("branch.{local}.merge")) {
            Ok(merge) => Ok(merge
                .strip_prefix("refs/heads/")
                .unwrap_or(&merge)
                .to_string()),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(default.to_string()),
            Err(e) => Err(e.into()),
        }
    }

    fn push_ref_specs(&self, remote: &str) -> Result<Vec<String>> {
        let Some(remote) = self.find_remote(remote)? else {
            return Ok(Vec::new());
        };
        let specs = remote.push_refspecs()?;
        Ok(specs.iter().flatten().map(String::from).collect())
    }

    fn push_endpoints(&self, remote: &str) -> Result<Vec<String>> {
        let found = self
            .find_remote(remote)?
            .ok_or_else(|| Error::RemoteNotFound(remote.into()))?;
        Ok(found
            .pushurl()
            .or_else(|| found.url())
            .map(String::from)
            .into_iter()
            .collect())
    }

    fn fetch_endpoint(&self, remote: &str) -> Result<Option<String>> {
        let found = self
            .find_remote(remote)?
            .ok_or_else(|| Error::RemoteNotFound(remote.into()))?;
        Ok(found.url().map(String::from))
    }

    fn add_to_index(&self, path: &str, content: &[u8]) -> Result<()> {
        let relative = checked_path(path)?;
        let full = self.workdir_path()?.join(relative);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full, content)?;

        let mut index = self.inner.index()?;
        index.add_path(relative)?;
        index.write()?;
        Ok(())
    }

    fn delete_from_index(&self, path: &str, is_file: bool) -> Result<()> {
        let relative = checked_path(path)?;
        let full = self.workdir_path()?.join(relative);
        let removed = if is_file {
            fs::remove_file(&full)
        } else {
            fs::remove_dir_all(&full)
        };
        match removed {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut index = self.inner.index()?;
        if is_file {
            index.remove_path(relative)?;
        } else {
            index.remove_dir(relative, 0)?;
        }
        index.write()?;
        Ok(())
    }

    fn stage_paths(&self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut index = self.inner.index()?;
        index.add_all(paths.iter().map(String::as_str), IndexAddOption::DEFAULT, None)?;
        index.write()?;
        Ok(())
    }

    fn remove_from_index(&self, paths: &[String]) -> Result<usize> {
        let mut index = self.inner.index()?;
        let before = index.len();
        for path in paths {
            let relative = checked_path(path)?;
            index.remove_path(relative)?;
            index.remove_dir(relative, 0)?;
        }
        index.write()?;
        Ok(before - index.len())
    }

    fn commit_all(&self, message: &str, identity: &Identity) -> Result<Option<Oid>> {
        let mut index = self.inner.index()?;
        // Staging the working tree would erase conflict entries.
        if index.has_conflicts() {
            return Err(Error::MergeConflict(conflict_paths(&index)?));
        }
        index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"], None)?;
        index.write()?;
        let tree_id = index.write_tree()?;

        if self.merge_heads()?.is_empty() {
            let unchanged = match self.head_commit()? {
                Some(commit) => commit.tree_id() == tree_id,
                None => self.inner.find_tree(tree_id)?.is_empty(),
            };
            if unchanged {
                return Ok(None);
            }
        }

        self.commit_tree(tree_id, message, identity).map(Some)
    }

    fn commit_index(&self, message: &str, identity: &Identity) -> Result<Oid> {
        let mut index = self.inner.index()?;
        if index.has_conflicts() {
            return Err(Error::MergeConflict(conflict_paths(&index)?));
        }
        let tree_id = index.write_tree()?;
        self.commit_tree(tree_id, message, identity)
    }

    fn ahead_commits_count(&self, remote: &str, branch: &str) -> Result<usize> {
        let Some(head) = self.head_oid()? else {
            return Ok(0);
        };

        if let Some(upstream) = self.tracking_id(remote, branch)? {
            let (ahead, _behind) = self.inner.graph_ahead_behind(head, upstream)?;
            return Ok(ahead);
        }

        let mut revwalk = self.inner.revwalk()?;
        revwalk.push(head)?;
        Ok(revwalk.count())
    }

    fn clear_fetch_head(&self) -> Result<()> {
        match fs::remove_file(self.inner.path().join("FETCH_HEAD")) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn record_fetch(&self, remote: &str, branch: &str) -> Result<Option<Oid>> {
        let fetched = self.fetch_head_id(branch)?;
        if let Some(oid) = fetched {
            self.inner
                .reference(&tracking_ref(remote, branch), oid, true, "cfgsync: fetch")?;
        }
        Ok(fetched)
    }

    fn ref_oid(&self, refname: &str) -> Result<Option<Oid>> {
        match self.inner.refname_to_id(refname) {
            Ok(oid) => Ok(Some(oid)),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn update_tracking_ref(&self, remote: &str, branch: &str, oid: Oid) -> Result<()> {
        self.inner
            .reference(&tracking_ref(remote, branch), oid, true, "cfgsync: push")?;
        Ok(())
    }

    fn is_merged(&self, oid: Oid) -> Result<bool> {
        let Some(head) = self.head_oid()? else {
            return Ok(false);
        };
        Ok(head == oid || self.inner.graph_descendant_of(head, oid)?)
    }

    fn merge_commit(
        &self,
        target: Oid,
        message: &str,
        identity: &Identity,
    ) -> Result<MergeOutcome> {
        let annotated = self.inner.find_annotated_commit(target)?;
        let (analysis, _preference) = self.inner.merge_analysis(&[&annotated])?;
        if analysis.is_up_to_date() {
            return Ok(MergeOutcome::UpToDate);
        }

        let refname = self
            .head_symbolic_target()?
            .ok_or_else(|| Error::RefNotFound("HEAD".into()))?;
        let head = self.head_oid()?;

        if analysis.is_unborn() || analysis.is_fast_forward() {
            let object = self.inner.find_object(target, None)?;
            self.inner
                .checkout_tree(&object, Some(CheckoutBuilder::new().force()))?;
            self.inner
                .reference(&refname, target, true, "cfgsync: fast-forward")?;
            self.inner.set_head(&refname)?;
            return Ok(MergeOutcome::FastForward {
                from: head,
                to: target,
            });
        }

        let from = head.ok_or_else(|| Error::RefNotFound("HEAD".into()))?;
        self.inner.merge(&[&annotated], None, None)?;

        let mut index = self.inner.index()?;
        if index.has_conflicts() {
            return Err(Error::MergeConflict(conflict_paths(&index)?));
        }

        let tree_id = index.write_tree()?;
        let tree = self.inner.find_tree(tree_id)?;
        let sig = self.signature(identity)?;
        let ours = self.inner.find_commit(from)?;
        let theirs = self.inner.find_commit(target)?;
        let commit = self
            .inner
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&ours, &theirs])?;
        self.inner.cleanup_state()?;

        Ok(MergeOutcome::Merged { from, commit })
    }

    fn abort_merge(&self) -> Result<()> {
        if self.inner.state() == RepositoryState::Clean {
            return Ok(());
        }

        if let Some(head) = self.head_commit()? {
            self.inner.reset(
                head.as_object(),
                ResetType::Hard,
                Some(CheckoutBuilder::new().force()),
            )?;
        }
        self.inner.cleanup_state()?;
        log::info!("aborted in-progress merge");
        Ok(())
    }

    fn reset_hard(&self, target: Oid) -> Result<()> {
        let commit = self.inner.find_commit(target)?;
        if let Some(refname) = self.head_symbolic_target()? {
            self.inner.reference(
                &refname,
                target,
                true,
                &format!("cfgsync: reset to {}", &target.to_string()[..8]),
            )?;
        }

        self.inner.reset(
            commit.as_object(),
            ResetType::Hard,
            Some(CheckoutBuilder::new().force().remove_untracked(true)),
        )?;
        self.inner.cleanup_state()?;
        Ok(())
    }

    fn changes_between(&self, old: Option<Oid>, new: Option<Oid>) -> Result<ChangeSet> {
        let old_tree = self.tree_of(old)?;
        let new_tree = self.tree_of(new)?;

        let diff = self
            .inner
            .diff_tree_to_tree(old_tree.as_ref(), new_tree.as_ref(), None)?;
        let mut changes = ChangeSet::default();
        for delta in diff.deltas() {
            if delta.status() == Delta::Deleted {
                if let Some(path) = delta.old_file().path() {
                    changes.deleted.push(path.to_string_lossy().into_owned());
                }
            } else if let Some(path) = delta.new_file().path() {
                changes.changed.push(path.to_string_lossy().into_owned());
            }
        }
        Ok(changes)
    }
}

impl TransportOpener for Repository {
    fn open_transport(&self, endpoint: &str) -> Result<Box<dyn Transport + '_>> {
        Ok(Box::new(GitTransport::open(&self.inner, endpoint)?))
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("path", &self.git_dir())
            .finish()
    }
}

/// Name of the remote-tracking ref for `branch` on `remote`.
#[must_use]
pub fn tracking_ref(remote: &str, branch: &str) -> String {
    format!("refs/remotes/{remote}/{branch}")
}

/// Validate a logical repository path: relative, no `..`, not inside `.git`.
///
/// # Errors
/// Returns `InvalidPath` for anything that could leave the working tree.
pub fn checked_path(path: &str) -> Result<&Path> {
    let relative = Path::new(path);
    let valid = relative.components().next().is_some()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        && relative
            .components()
            .next()
            .is_none_or(|first| first.as_os_str() != ".git");

    if valid {
        Ok(relative)
    } else {
        Err(Error::InvalidPath(path.into()))
    }
}

fn conflict_paths(index: &Index) -> Result<Vec<String>> {
    let mut paths = Vec::new();
    for conflict in index.conflicts()? {
        let conflict = conflict?;
        let entry = conflict.our.or(conflict.their).or(conflict.ancestor);
        if let Some(entry) = entry {
            paths.push(String::from_utf8_lossy(&entry.path).into_owned());
        }
    }
    paths.sort();
    paths.dedup();
    Ok(paths)
}
