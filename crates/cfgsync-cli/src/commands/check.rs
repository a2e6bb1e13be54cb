//! `cfgsync check` command - Check whether a directory holds a repository.

use std::path::Path;

use anyhow::{Result, bail};

use crate::output;

/// Run the check command.
pub fn run(dir: &Path) -> Result<()> {
    if !cfgsync_core::is_valid_repository(dir) {
        bail!("{} is not a git repository", dir.display());
    }
    output::success(&format!("{} is a git repository", dir.display()));
    Ok(())
}
