//! `cfgsync sync` command - Commit, pull and push.

use anyhow::Result;
use cfgsync_core::UpdateResult;
use cfgsync_git::{Progress, PushReport};

use super::GlobalArgs;
use super::push::print_reports;
use super::utils;
use crate::output;
use crate::progress::Spinner;

/// Run the sync command.
pub fn run(global: &GlobalArgs) -> Result<()> {
    let manager = utils::open_manager(global)?;
    utils::require_upstream(&manager)?;

    let spinner = Spinner::start("Fetching");
    let outcome = sync(&manager, &spinner);
    spinner.finish();

    let (update, reports) = outcome.map_err(utils::explain_conflict)?;
    match update {
        Some(update) => {
            output::success("Merged upstream changes");
            output::update_summary(&update.changed, &update.deleted);
        }
        None => output::info("No upstream changes"),
    }

    match reports {
        Some(reports) => print_reports(&reports),
        None => {
            output::success("Everything up to date");
            Ok(())
        }
    }
}

/// Merge first, then push unless the merge proved there is nothing to push.
fn sync(
    manager: &cfgsync_core::SyncManager,
    progress: &dyn Progress,
) -> cfgsync_core::Result<(Option<UpdateResult>, Option<Vec<PushReport>>)> {
    let mut updater = manager.fetch(Some(progress))?;
    progress.set_text("Merging");
    let update = updater.merge()?;
    if updater.definitely_skip_push() {
        return Ok((update, None));
    }

    progress.set_text("Pushing");
    let reports = manager.push(Some(progress))?;
    Ok((update, Some(reports)))
}
