//! `cfgsync upstream` command - Show, set or remove the upstream.

use anyhow::Result;

use super::GlobalArgs;
use super::utils;
use crate::output;

/// Run the upstream command.
pub fn run(global: &GlobalArgs, url: Option<&str>, branch: Option<&str>, unset: bool) -> Result<()> {
    let manager = utils::open_manager(global)?;

    if unset {
        manager.set_upstream(None, None)?;
        output::success("Upstream removed");
        return Ok(());
    }

    let Some(url) = url else {
        match manager.upstream()? {
            Some(current) => output::essential(&current),
            None => output::info("No upstream configured"),
        }
        return Ok(());
    };

    manager.set_upstream(Some(url), branch)?;
    match manager.upstream()? {
        Some(current) => output::success(&format!(
            "Upstream set to {current} ({})",
            branch.unwrap_or(&manager.config().upstream.branch)
        )),
        None => output::success("Upstream removed"),
    }
    Ok(())
}
