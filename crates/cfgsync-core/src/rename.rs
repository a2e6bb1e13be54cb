//! Moving directories inside the repository in a single commit.

use std::fs::{self, DirEntry};
use std::io;
use std::path::Path;

use cfgsync_git::{GitOps, checked_path};

use crate::error::Result;
use crate::manager::SyncManager;

/// Body of the commit produced by [`SyncManager::rename_directory`].
pub const RENAME_COMMIT_MESSAGE: &str = "Get rid of $ROOT_CONFIG$";

impl SyncManager {
    /// Move the contents of each old directory to its new location, `None`
    /// meaning the repository root, and record everything in one commit.
    ///
    /// Hidden entries are deleted instead of moved. A file that can't be
    /// moved or deleted is logged and skipped. A legacy path that is a plain
    /// file is deleted and dropped from the index.
    ///
    /// Every path is validated before anything on disk is touched.
    ///
    /// Returns whether a commit was made.
    ///
    /// # Errors
    /// Returns `InvalidPath` if a path is absolute, climbs with `..` or
    /// points into `.git`; otherwise error if the index can't be updated
    /// or the commit fails.
    pub fn rename_directory(&self, pairs: &[(&str, Option<&str>)]) -> Result<bool> {
        for &(old_path, new_path) in pairs {
            checked_path(old_path)?;
            if let Some(new_path) = new_path {
                checked_path(new_path)?;
            }
        }

        let _guard = self.lock_history();
        let dir = self.dir();

        let mut to_add = Vec::new();
        let mut to_remove = Vec::new();
        let mut moved_directories = false;
        for &(old_path, new_path) in pairs {
            let old = dir.join(old_path);
            if !old.exists() {
                continue;
            }
            log::info!("rename {old_path} to {}", new_path.unwrap_or("<root>"));

            if old.is_dir() {
                let target = new_path.map_or_else(|| dir.clone(), |path| dir.join(path));
                match fs::read_dir(&old) {
                    Ok(entries) => {
                        for entry in entries {
                            match move_entry(entry, &target, new_path) {
                                Ok(Some(added)) => to_add.push(added),
                                Ok(None) => {}
                                Err(e) => log::error!("failed to move entry of {old_path}: {e}"),
                            }
                        }
                        moved_directories = true;
                    }
                    Err(e) => {
                        log::error!("cannot list {old_path}: {e}");
                        continue;
                    }
                }
            }
            to_remove.push(old_path.to_string());

            if let Err(e) = remove_path(&old) {
                log::error!("cannot remove {old_path}: {e}");
            }
        }

        if to_add.is_empty() && to_remove.is_empty() {
            return Ok(false);
        }

        self.handle().with(|repo| {
            let removed = repo.remove_from_index(&to_remove)?;
            repo.stage_paths(&to_add)?;
            log::debug!(
                "removed {removed} index entries, staged {} moved paths",
                to_add.len()
            );
            if to_add.is_empty() && !moved_directories && removed == 0 {
                log::debug!("legacy paths were never tracked, nothing to commit");
                return Ok(false);
            }

            let message = self.formatter().message(RENAME_COMMIT_MESSAGE);
            let oid = repo.commit_index(&message, &self.config().identity())?;
            log::info!("committed directory rename as {oid}");
            Ok(true)
        })
    }
}

/// Move one directory entry into `target`, or delete it when hidden.
///
/// Returns the entry's new logical path when it was moved.
fn move_entry(
    entry: io::Result<DirEntry>,
    target: &Path,
    new_path: Option<&str>,
) -> io::Result<Option<String>> {
    let entry = entry?;
    let name = entry.file_name().to_string_lossy().into_owned();
    if name.starts_with('.') {
        remove_path(&entry.path())?;
        return Ok(None);
    }

    fs::create_dir_all(target)?;
    fs::rename(entry.path(), target.join(&name))?;
    Ok(Some(match new_path {
        Some(prefix) => format!("{prefix}/{name}"),
        None => name,
    }))
}

fn remove_path(path: &Path) -> io::Result<()> {
    let removed = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match removed {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use cfgsync_git::StaticCredentialsStore;
    use tempfile::TempDir;

    use crate::config::Config;

    fn manager(dir: &Path) -> SyncManager {
        let manager = SyncManager::new(
            dir,
            Arc::new(StaticCredentialsStore::new()),
            Config::default(),
            None,
        );
        manager.create_repository_if_need().unwrap();
        manager
    }

    #[test]
    fn test_missing_directories_do_nothing() {
        let temp = TempDir::new().unwrap();
        let manager = manager(temp.path());
        assert!(!manager.rename_directory(&[("nope", Some("new"))]).unwrap());
    }

    #[test]
    fn test_hidden_entry_deleted() {
        let temp = TempDir::new().unwrap();
        let old = temp.path().join("old");
        fs::create_dir_all(&old).unwrap();
        fs::write(old.join(".hidden"), b"x").unwrap();

        let target = temp.path().join("new");
        let moved = move_entry(fs::read_dir(&old).unwrap().next().unwrap(), &target, Some("new")).unwrap();
        assert_eq!(moved, None);
        assert!(!old.join(".hidden").exists());
        assert!(!target.exists());
    }

    #[test]
    fn test_entry_moved_to_root() {
        let temp = TempDir::new().unwrap();
        let old = temp.path().join("old");
        fs::create_dir_all(&old).unwrap();
        fs::write(old.join("ui.xml"), b"x").unwrap();

        let moved = move_entry(fs::read_dir(&old).unwrap().next().unwrap(), temp.path(), None).unwrap();
        assert_eq!(moved.as_deref(), Some("ui.xml"));
        assert!(temp.path().join("ui.xml").exists());
    }
}
