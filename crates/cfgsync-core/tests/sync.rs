//! End-to-end tests against a local bare repository acting as upstream.
#![allow(clippy::unwrap_used)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use cfgsync_core::{Config, Error, LocalStager, RENAME_COMMIT_MESSAGE, SyncManager};
use cfgsync_git::StaticCredentialsStore;
use tempfile::TempDir;

/// Creates a bare upstream and returns its URL.
fn bare_upstream(temp: &TempDir) -> String {
    let path = temp.path().join("upstream.git");
    git2::Repository::init_bare(&path).unwrap();
    path.to_string_lossy().into_owned()
}

fn manager(dir: &Path, upstream: &str) -> SyncManager {
    let manager = SyncManager::new(
        dir,
        Arc::new(StaticCredentialsStore::new()),
        Config::default(),
        None,
    );
    assert!(manager.create_repository_if_need().unwrap());
    manager.set_upstream(Some(upstream), None).unwrap();
    manager
}

fn head(dir: &Path) -> git2::Oid {
    git2::Repository::open(dir)
        .unwrap()
        .head()
        .unwrap()
        .peel_to_commit()
        .unwrap()
        .id()
}

fn upstream_master(url: &str) -> Option<git2::Oid> {
    git2::Repository::open_bare(url)
        .unwrap()
        .refname_to_id("refs/heads/master")
        .ok()
}

fn commit_count(dir: &Path) -> usize {
    let repo = git2::Repository::open(dir).unwrap();
    let mut walk = repo.revwalk().unwrap();
    walk.push_head().unwrap();
    walk.count()
}

/// Two machines sharing one upstream, both at the same first commit.
fn two_machines() -> (TempDir, String, SyncManager, SyncManager) {
    let temp = TempDir::new().unwrap();
    let url = bare_upstream(&temp);

    let laptop = manager(&temp.path().join("laptop"), &url);
    laptop
        .add_to_index("options/editor.xml", b"<editor font=\"12\"/>")
        .unwrap();
    assert!(laptop.commit(None).unwrap());
    laptop.push(None).unwrap();

    let desktop = manager(&temp.path().join("desktop"), &url);
    let update = desktop.pull(None).unwrap().unwrap();
    assert_eq!(update.changed, vec!["options/editor.xml".to_string()]);

    (temp, url, laptop, desktop)
}

#[test]
fn test_push_sends_head_branch() {
    let temp = TempDir::new().unwrap();
    let url = bare_upstream(&temp);
    let laptop = manager(&temp.path().join("laptop"), &url);
    laptop.add_to_index("keymap.xml", b"<keymap/>").unwrap();
    laptop.commit(None).unwrap();
    assert_eq!(laptop.ahead_commits_count().unwrap(), 1);

    let reports = laptop.push(None).unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].updates.len(), 1);
    assert_eq!(reports[0].updates[0].refname, "refs/heads/master");
    assert_eq!(upstream_master(&url), Some(head(laptop.dir().as_path())));
    assert_eq!(laptop.ahead_commits_count().unwrap(), 0);
}

#[test]
fn test_detached_head_pushes_nothing() {
    let temp = TempDir::new().unwrap();
    let url = bare_upstream(&temp);
    let laptop = manager(&temp.path().join("laptop"), &url);
    laptop.add_to_index("keymap.xml", b"<keymap/>").unwrap();
    laptop.commit(None).unwrap();

    let repo = git2::Repository::open(laptop.dir()).unwrap();
    repo.set_head_detached(head(&laptop.dir())).unwrap();

    let reports = laptop.push(None).unwrap();
    assert!(reports.is_empty());
    assert_eq!(upstream_master(&url), None);
}

#[test]
fn test_nothing_to_do_skips_push() {
    let (_temp, _url, laptop, desktop) = two_machines();

    for machine in [&laptop, &desktop] {
        let mut updater = machine.fetch(None).unwrap();
        assert_eq!(updater.ref_to_merge(), None);
        assert_eq!(updater.merge().unwrap(), None);
        assert!(updater.definitely_skip_push());
    }
}

#[test]
fn test_local_changes_do_not_skip_push() {
    let (_temp, _url, _laptop, desktop) = two_machines();
    desktop.add_to_index("options/ui.xml", b"<ui/>").unwrap();

    let mut updater = desktop.fetch(None).unwrap();
    assert_eq!(updater.merge().unwrap(), None);
    assert!(!updater.definitely_skip_push());
    assert_eq!(desktop.ahead_commits_count().unwrap(), 1);
}

#[test]
fn test_merge_uses_captured_ref() {
    let (_temp, _url, laptop, desktop) = two_machines();

    laptop.add_to_index("options/a.xml", b"a").unwrap();
    laptop.commit(None).unwrap();
    laptop.push(None).unwrap();
    let first = head(&laptop.dir());

    let mut updater = desktop.fetch(None).unwrap();
    assert_eq!(updater.ref_to_merge(), Some(first));

    // Upstream moves on after the fetch
    laptop.add_to_index("options/b.xml", b"b").unwrap();
    laptop.commit(None).unwrap();
    laptop.push(None).unwrap();

    let update = updater.merge().unwrap().unwrap();
    assert_eq!(update.changed, vec!["options/a.xml".to_string()]);
    assert_eq!(head(&desktop.dir()), first);
    assert!(!desktop.dir().join("options/b.xml").exists());
}

#[test]
fn test_diverged_histories_merge() {
    let (_temp, _url, laptop, desktop) = two_machines();

    laptop.add_to_index("options/a.xml", b"a").unwrap();
    laptop.commit(None).unwrap();
    laptop.push(None).unwrap();

    desktop.add_to_index("options/b.xml", b"b").unwrap();
    let update = desktop.pull(None).unwrap().unwrap();

    assert_eq!(update.changed, vec!["options/a.xml".to_string()]);
    assert!(desktop.dir().join("options/b.xml").exists());
    assert_eq!(desktop.ahead_commits_count().unwrap(), 2);
    desktop.push(None).unwrap();
    assert_eq!(upstream_master(&laptop_url(&laptop)), Some(head(&desktop.dir())));
}

fn laptop_url(manager: &SyncManager) -> String {
    manager.upstream().unwrap().unwrap()
}

/// Both machines edit the same file; the desktop's pull conflicts.
fn conflicting() -> (TempDir, String, SyncManager, SyncManager) {
    let (temp, url, laptop, desktop) = two_machines();

    laptop
        .add_to_index("options/editor.xml", b"<editor font=\"14\"/>")
        .unwrap();
    laptop.commit(None).unwrap();
    laptop.push(None).unwrap();

    desktop
        .add_to_index("options/editor.xml", b"<editor font=\"16\"/>")
        .unwrap();
    let err = desktop.pull(None).unwrap_err();
    assert!(matches!(err, Error::MergeConflict(ref paths) if paths == &["options/editor.xml"]));
    assert!(!desktop.can_commit().unwrap());

    (temp, url, laptop, desktop)
}

#[test]
fn test_commit_refused_while_conflicted() {
    let (_temp, _url, _laptop, desktop) = conflicting();
    let before = head(&desktop.dir());

    let err = desktop.commit(None).unwrap_err();

    assert!(matches!(err, Error::MergeConflict(ref paths) if paths == &["options/editor.xml"]));
    assert!(!desktop.can_commit().unwrap());
    assert_eq!(head(&desktop.dir()), before);
}

#[test]
fn test_pull_refused_while_conflicted() {
    let (_temp, _url, _laptop, desktop) = conflicting();
    let before = head(&desktop.dir());

    for _ in 0..2 {
        let err = desktop.pull(None).unwrap_err();
        assert!(matches!(err, Error::MergeConflict(_)));
    }

    assert!(!desktop.can_commit().unwrap());
    assert_eq!(head(&desktop.dir()), before);
    let repo = git2::Repository::open(desktop.dir()).unwrap();
    assert_eq!(repo.head().unwrap().peel_to_commit().unwrap().parent_count(), 1);
}

#[test]
fn test_resolved_conflict_commits_merge() {
    let (_temp, _url, _laptop, desktop) = conflicting();

    desktop
        .add_to_index("options/editor.xml", b"<editor font=\"15\"/>")
        .unwrap();
    assert!(desktop.commit(None).unwrap());

    assert!(desktop.can_commit().unwrap());
    let repo = git2::Repository::open(desktop.dir()).unwrap();
    let merge = repo.head().unwrap().peel_to_commit().unwrap();
    assert_eq!(merge.parent_count(), 2);
    let blob = merge
        .tree()
        .unwrap()
        .get_path(Path::new("options/editor.xml"))
        .unwrap()
        .to_object(&repo)
        .unwrap()
        .peel_to_blob()
        .unwrap();
    assert_eq!(blob.content(), b"<editor font=\"15\"/>");
}

#[test]
fn test_reset_to_theirs_after_conflict() {
    let (_temp, _url, laptop, desktop) = conflicting();

    let update = desktop.reset_to_theirs(None).unwrap();

    assert!(desktop.can_commit().unwrap());
    assert_eq!(update.changed, vec!["options/editor.xml".to_string()]);
    assert_eq!(head(&desktop.dir()), head(&laptop.dir()));
    assert_eq!(
        fs::read(desktop.dir().join("options/editor.xml")).unwrap(),
        b"<editor font=\"14\"/>"
    );
}

#[test]
fn test_reset_to_my_after_conflict() {
    let (_temp, url, laptop, desktop) = conflicting();

    let mut initialize = |stager: &LocalStager<'_>| {
        stager.add_to_index("options/editor.xml", b"<editor font=\"18\"/>")
    };
    desktop.reset_to_my(None, Some(&mut initialize)).unwrap();

    assert!(desktop.can_commit().unwrap());
    assert_eq!(upstream_master(&url), Some(head(&desktop.dir())));
    assert_eq!(desktop.ahead_commits_count().unwrap(), 0);

    laptop.reset_to_theirs(None).unwrap();
    assert_eq!(
        fs::read(laptop.dir().join("options/editor.xml")).unwrap(),
        b"<editor font=\"18\"/>"
    );
}

#[test]
fn test_reset_to_theirs_ignores_deleted_remote_branch() {
    let temp = TempDir::new().unwrap();
    let url = bare_upstream(&temp);
    let laptop = manager(&temp.path().join("laptop"), &url);
    laptop.add_to_index("a.xml", b"pushed").unwrap();
    laptop.commit(None).unwrap();
    laptop.push(None).unwrap();

    git2::Repository::open_bare(&url)
        .unwrap()
        .find_reference("refs/heads/master")
        .unwrap()
        .delete()
        .unwrap();

    laptop.add_to_index("b.xml", b"local only").unwrap();
    laptop.commit(None).unwrap();
    let local = head(&laptop.dir());

    assert_eq!(laptop.fetch(None).unwrap().ref_to_merge(), None);
    let update = laptop.reset_to_theirs(None).unwrap();

    assert!(update.is_empty());
    assert_eq!(head(&laptop.dir()), local);
    assert!(laptop.dir().join("b.xml").exists());
}

#[test]
fn test_reset_to_theirs_with_empty_upstream() {
    let temp = TempDir::new().unwrap();
    let url = bare_upstream(&temp);
    let laptop = manager(&temp.path().join("laptop"), &url);

    let update = laptop.reset_to_theirs(None).unwrap();
    assert!(update.is_empty());
    assert!(laptop.can_commit().unwrap());
}

#[test]
fn test_rename_moves_files_in_one_commit() {
    let temp = TempDir::new().unwrap();
    let url = bare_upstream(&temp);
    let laptop = manager(&temp.path().join("laptop"), &url);
    laptop.add_to_index("old/a/f.txt", b"f").unwrap();
    laptop.add_to_index("keep.txt", b"k").unwrap();
    laptop.commit(None).unwrap();
    let before = commit_count(&laptop.dir());

    assert!(laptop.rename_directory(&[("old/a", Some("new/a"))]).unwrap());

    let dir = laptop.dir();
    assert!(dir.join("new/a/f.txt").exists());
    assert!(!dir.join("old/a").exists());
    assert_eq!(commit_count(&dir), before + 1);

    let repo = git2::Repository::open(&dir).unwrap();
    let index = repo.index().unwrap();
    assert!(index.get_path(Path::new("old/a/f.txt"), 0).is_none());
    assert!(index.get_path(Path::new("new/a/f.txt"), 0).is_some());

    let commit = repo.head().unwrap().peel_to_commit().unwrap();
    assert_eq!(
        commit.message(),
        Some(format!("cfgsync: {RENAME_COMMIT_MESSAGE}").as_str())
    );
    let tree = commit.tree().unwrap();
    assert!(tree.get_path(Path::new("new/a/f.txt")).is_ok());
    assert!(tree.get_path(Path::new("old/a/f.txt")).is_err());
    assert!(tree.get_path(Path::new("keep.txt")).is_ok());
}

#[test]
fn test_rename_drops_hidden_files() {
    let temp = TempDir::new().unwrap();
    let url = bare_upstream(&temp);
    let laptop = manager(&temp.path().join("laptop"), &url);
    laptop.add_to_index("old/b/.hidden", b"h").unwrap();
    laptop.commit(None).unwrap();

    assert!(laptop.rename_directory(&[("old/b", None)]).unwrap());

    let dir = laptop.dir();
    assert!(!dir.join("old/b").exists());
    assert!(!dir.join(".hidden").exists());

    let repo = git2::Repository::open(&dir).unwrap();
    let tree = repo.head().unwrap().peel_to_commit().unwrap().tree().unwrap();
    assert!(tree.is_empty());
}

#[test]
fn test_rename_without_existing_directories_commits_nothing() {
    let temp = TempDir::new().unwrap();
    let url = bare_upstream(&temp);
    let laptop = manager(&temp.path().join("laptop"), &url);
    laptop.add_to_index("a.txt", b"a").unwrap();
    laptop.commit(None).unwrap();
    let before = commit_count(&laptop.dir());

    assert!(!laptop.rename_directory(&[("nothing/here", Some("there"))]).unwrap());
    assert_eq!(commit_count(&laptop.dir()), before);
}

#[test]
fn test_rename_rejects_paths_outside_repository() {
    let temp = TempDir::new().unwrap();
    let url = bare_upstream(&temp);
    let laptop = manager(&temp.path().join("laptop"), &url);
    laptop.add_to_index("old/a/f.txt", b"f").unwrap();
    laptop.commit(None).unwrap();
    let before = commit_count(&laptop.dir());

    let outside = temp.path().join("outside");
    fs::create_dir_all(&outside).unwrap();
    fs::write(outside.join("secret.txt"), b"s").unwrap();
    let absolute = outside.to_string_lossy().into_owned();

    let batches: [&[(&str, Option<&str>)]; 4] = [
        &[(absolute.as_str(), Some("stolen"))],
        &[("old/a", Some("new/a")), ("../outside", Some("stolen"))],
        &[("old/a", Some("a/../../escaped"))],
        &[("old/a", Some(".git/hooks"))],
    ];
    for pairs in batches {
        let err = laptop.rename_directory(pairs).unwrap_err();
        assert!(
            matches!(err, Error::Git(cfgsync_git::Error::InvalidPath(_))),
            "{pairs:?} gave {err:?}"
        );
    }

    let dir = laptop.dir();
    assert!(outside.join("secret.txt").exists());
    assert!(dir.join("old/a/f.txt").exists());
    assert!(!dir.join("stolen").exists());
    assert!(!dir.join("new").exists());
    assert!(!temp.path().join("escaped").exists());
    assert_eq!(commit_count(&dir), before);
}

#[test]
fn test_rename_removes_tracked_legacy_file() {
    let temp = TempDir::new().unwrap();
    let url = bare_upstream(&temp);
    let laptop = manager(&temp.path().join("laptop"), &url);
    laptop.add_to_index("legacy.xml", b"l").unwrap();
    laptop.add_to_index("keep.xml", b"k").unwrap();
    laptop.commit(None).unwrap();
    let before = commit_count(&laptop.dir());

    assert!(laptop.rename_directory(&[("legacy.xml", Some("new"))]).unwrap());

    let dir = laptop.dir();
    assert!(!dir.join("legacy.xml").exists());
    assert_eq!(commit_count(&dir), before + 1);

    let repo = git2::Repository::open(&dir).unwrap();
    assert!(repo.index().unwrap().get_path(Path::new("legacy.xml"), 0).is_none());
    let tree = repo.head().unwrap().peel_to_commit().unwrap().tree().unwrap();
    assert!(tree.get_path(Path::new("legacy.xml")).is_err());
    assert!(tree.get_path(Path::new("keep.xml")).is_ok());
    assert!(laptop.can_commit().unwrap());
}

#[test]
fn test_create_repository_once() {
    let temp = TempDir::new().unwrap();
    let manager = SyncManager::new(
        temp.path(),
        Arc::new(StaticCredentialsStore::new()),
        Config::default(),
        None,
    );
    assert!(manager.create_repository_if_need().unwrap());
    assert!(!manager.create_repository_if_need().unwrap());
    assert!(cfgsync_core::is_valid_repository(temp.path()));
}

#[test]
fn test_fetch_without_upstream() {
    let temp = TempDir::new().unwrap();
    let manager = SyncManager::new(
        temp.path(),
        Arc::new(StaticCredentialsStore::new()),
        Config::default(),
        None,
    );
    manager.create_repository_if_need().unwrap();
    assert!(matches!(manager.fetch(None), Err(Error::NoUpstream)));
}
