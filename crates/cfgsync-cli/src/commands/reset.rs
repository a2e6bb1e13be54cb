//! `cfgsync reset` command - Resolve a conflict by taking one side.

use anyhow::{Context, Result};
use inquire::Confirm;

use super::GlobalArgs;
use super::utils;
use crate::output;
use crate::progress::Spinner;

/// Which side wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Upstream state replaces local state.
    Theirs,
    /// Local state is force-pushed upstream.
    Mine,
}

/// Run the reset command.
pub fn run(global: &GlobalArgs, side: Side, yes: bool) -> Result<()> {
    let manager = utils::open_manager(global)?;
    utils::require_upstream(&manager)?;

    let question = match side {
        Side::Theirs => "Discard local settings and take the upstream state?",
        Side::Mine => "Overwrite the upstream with local settings?",
    };
    if !yes && !confirm(question)? {
        output::info("Reset cancelled");
        return Ok(());
    }

    let spinner = Spinner::start("Resetting");
    match side {
        Side::Theirs => {
            let update = manager.reset_to_theirs(Some(&spinner));
            spinner.finish();
            let update = update?;
            output::success("Local settings now match upstream");
            output::update_summary(&update.changed, &update.deleted);
        }
        Side::Mine => {
            let published = manager.reset_to_my(Some(&spinner), None);
            spinner.finish();
            published?;
            output::success("Upstream now matches local settings");
        }
    }
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    Confirm::new(question)
        .with_default(false)
        .prompt()
        .context("Confirmation cancelled")
}
