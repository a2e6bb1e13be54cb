use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use cfgsync_core::{Config, ShutdownRegistry, SyncManager};

use super::GlobalArgs;
use crate::{credentials, output};

/// Settings directory: `--dir`, else the current directory.
pub fn settings_dir(global: &GlobalArgs) -> Result<PathBuf> {
    match &global.dir {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir().context("Cannot determine current directory"),
    }
}

/// Build a manager for the settings directory, without requiring a repository.
pub fn manager(global: &GlobalArgs) -> Result<SyncManager> {
    let dir = settings_dir(global)?;
    let config = Config::load(Config::path_for(&dir))
        .with_context(|| format!("Failed to load configuration in {}", dir.display()))?;
    let store = credentials::store(global.username.as_deref());
    Ok(SyncManager::new(
        dir,
        store,
        config,
        Some(ShutdownRegistry::global()),
    ))
}

/// Build a manager and make sure the repository exists.
pub fn open_manager(global: &GlobalArgs) -> Result<SyncManager> {
    let manager = manager(global)?;
    if !manager.is_repository_exists() {
        bail!(
            "No settings repository in {} - run `cfgsync init` first",
            manager.dir().display()
        );
    }
    Ok(manager)
}

/// Make sure an upstream is configured.
pub fn require_upstream(manager: &SyncManager) -> Result<String> {
    manager
        .upstream()?
        .context("No upstream configured - run `cfgsync upstream <url>` first")
}

/// Turn a merge conflict into guidance; other errors pass through.
pub fn explain_conflict(err: cfgsync_core::Error) -> anyhow::Error {
    if let cfgsync_core::Error::MergeConflict(paths) = &err {
        output::error("Merge stopped with conflicts in:");
        for path in paths {
            output::detail(&format!("  {path}"));
        }
        output::detail("Resolve with `cfgsync reset --theirs` or `cfgsync reset --mine`.");
    }
    err.into()
}
