//! Trait abstractions for git operations.
//!
//! This module defines the `GitOps` trait: the narrow versioned-backend
//! interface the synchronization manager consumes (create, stage, commit,
//! remote configuration, fetch bookkeeping, merge and reset).

use std::path::Path;

use git2::Oid;

use crate::Result;
use crate::repository::{ChangeSet, Identity, MergeOutcome};
use crate::transport::TransportOpener;

/// Trait for git repository operations.
///
/// This trait abstracts git operations, allowing for:
/// - Dependency injection in the sync manager
/// - Mock implementations for testing
///
/// Note: git operations are synchronous since git2 is a synchronous
/// library.
#[allow(clippy::missing_errors_doc)]
pub trait GitOps: TransportOpener {
    // === Repository Info ===

    /// Get the working directory path.
    fn workdir(&self) -> Option<&Path>;

    /// Whether the repository is in a committable state (not mid-conflict).
    fn can_commit(&self) -> bool;

    /// Commit currently at HEAD, `None` on an unborn branch.
    fn head_oid(&self) -> Result<Option<Oid>>;

    /// Ref HEAD points at symbolically, `None` when detached.
    fn head_symbolic_target(&self) -> Result<Option<String>>;

    // === Configuration ===

    /// Turn off `core.autocrlf` line-ending translation.
    fn disable_auto_crlf(&self) -> Result<()>;

    /// URL of `remote`, `None` when unset or blank.
    fn upstream_url(&self, remote: &str) -> Result<Option<String>>;

    /// Point `remote` at `url` and track `branch`; `None` removes the remote.
    fn set_upstream(&self, remote: &str, url: Option<&str>, branch: &str) -> Result<()>;

    /// Branch on the remote that the current branch tracks.
    fn upstream_branch(&self, default: &str) -> Result<String>;

    /// Push ref-specs configured for `remote`.
    fn push_ref_specs(&self, remote: &str) -> Result<Vec<String>>;

    /// URLs to push to: push URLs if configured, else the fetch URL.
    fn push_endpoints(&self, remote: &str) -> Result<Vec<String>>;

    /// URL to fetch from.
    fn fetch_endpoint(&self, remote: &str) -> Result<Option<String>>;

    // === Index / Commit Operations ===

    /// Write `content` at `path` in the working tree and stage it.
    fn add_to_index(&self, path: &str, content: &[u8]) -> Result<()>;

    /// Remove `path` from the working tree and the index.
    fn delete_from_index(&self, path: &str, is_file: bool) -> Result<()>;

    /// Stage working-tree paths (files or directories).
    fn stage_paths(&self, paths: &[String]) -> Result<()>;

    /// Drop the index entry of each path, and every entry below it when
    /// it names a directory. Returns how many entries were dropped.
    fn remove_from_index(&self, paths: &[String]) -> Result<usize>;

    /// Stage all working-tree changes and commit if anything differs from HEAD.
    fn commit_all(&self, message: &str, identity: &Identity) -> Result<Option<Oid>>;

    /// Commit the index exactly as staged, even when it matches HEAD.
    fn commit_index(&self, message: &str, identity: &Identity) -> Result<Oid>;

    /// Local commits not present on the remote-tracking ref.
    fn ahead_commits_count(&self, remote: &str, branch: &str) -> Result<usize>;

    // === Fetch / Merge / Reset ===

    /// Forget the previous fetch result.
    fn clear_fetch_head(&self) -> Result<()>;

    /// Commit the last fetch brought for `branch`, also stored in the
    /// remote-tracking ref. `None` when the remote has no such branch.
    fn record_fetch(&self, remote: &str, branch: &str) -> Result<Option<Oid>>;

    /// Commit a ref points at, `None` when it doesn't exist.
    fn ref_oid(&self, refname: &str) -> Result<Option<Oid>>;

    /// Move the remote-tracking ref for `branch` to `oid`.
    fn update_tracking_ref(&self, remote: &str, branch: &str, oid: Oid) -> Result<()>;

    /// Whether `oid` is already contained in HEAD.
    fn is_merged(&self, oid: Oid) -> Result<bool>;

    /// Merge `target` into the current branch.
    fn merge_commit(&self, target: Oid, message: &str, identity: &Identity)
    -> Result<MergeOutcome>;

    /// Abort an in-progress merge, restoring HEAD.
    fn abort_merge(&self) -> Result<()>;

    /// Point the current branch, index and working tree at `target`.
    fn reset_hard(&self, target: Oid) -> Result<()>;

    /// Paths changed or deleted between two commits.
    fn changes_between(&self, old: Option<Oid>, new: Option<Oid>) -> Result<ChangeSet>;
}
