//! `cfgsync commit` command - Commit pending changes.

use anyhow::Result;

use super::GlobalArgs;
use super::utils;
use crate::output;

/// Run the commit command.
pub fn run(global: &GlobalArgs) -> Result<()> {
    let manager = utils::open_manager(global)?;

    if manager.commit(None)? {
        output::success("Committed local changes");
        output::info(&format!(
            "{} commit(s) not pushed yet",
            manager.ahead_commits_count()?
        ));
    } else {
        output::info("Nothing to commit");
    }
    Ok(())
}
