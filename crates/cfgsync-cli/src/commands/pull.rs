//! `cfgsync pull` command - Fetch upstream and merge it.

use anyhow::Result;

use super::GlobalArgs;
use super::utils;
use crate::output;
use crate::progress::Spinner;

/// Run the pull command.
pub fn run(global: &GlobalArgs) -> Result<()> {
    let manager = utils::open_manager(global)?;
    utils::require_upstream(&manager)?;

    let spinner = Spinner::start("Fetching");
    let result = manager.pull(Some(&spinner));
    spinner.finish();

    match result.map_err(utils::explain_conflict)? {
        Some(update) => {
            output::success("Merged upstream changes");
            output::update_summary(&update.changed, &update.deleted);
        }
        None => output::info("Already up to date"),
    }
    Ok(())
}
