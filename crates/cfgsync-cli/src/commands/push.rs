//! `cfgsync push` command - Push local commits upstream.

use anyhow::{Result, bail};
use cfgsync_git::PushReport;

use super::GlobalArgs;
use super::utils;
use crate::output;
use crate::progress::Spinner;

/// Run the push command.
pub fn run(global: &GlobalArgs) -> Result<()> {
    let manager = utils::open_manager(global)?;
    utils::require_upstream(&manager)?;

    let spinner = Spinner::start("Pushing");
    let reports = manager.push(Some(&spinner));
    spinner.finish();

    print_reports(&reports?)
}

/// Print per-ref results; fails when the upstream rejected anything.
pub fn print_reports(reports: &[PushReport]) -> Result<()> {
    if reports.is_empty() {
        output::warn("Nothing to push - HEAD is not on a branch");
        return Ok(());
    }

    let mut rejected = 0;
    for report in reports {
        for update in &report.updates {
            match &update.rejection {
                None => output::success(&format!("{} → {}", update.refname, report.endpoint)),
                Some(reason) => {
                    rejected += 1;
                    output::warn(&format!("{} rejected: {reason}", update.refname));
                }
            }
        }
    }

    if rejected > 0 {
        bail!("Upstream rejected {rejected} ref(s) - run `cfgsync pull` first");
    }
    Ok(())
}
