//! `cfgsync init` command - Create the settings repository.

use anyhow::{Context, Result};
use cfgsync_core::Config;

use super::GlobalArgs;
use super::utils;
use crate::output;

/// Run the init command.
pub fn run(global: &GlobalArgs, upstream: Option<&str>, branch: Option<&str>) -> Result<()> {
    let manager = utils::manager(global)?;

    let created = manager
        .create_repository_if_need()
        .context("Failed to create settings repository")?;

    let config_path = Config::path_for(manager.dir());
    if !config_path.exists() {
        manager
            .config()
            .save(&config_path)
            .context("Failed to write configuration")?;
    }

    if created {
        output::success(&format!(
            "Initialized settings repository in {}",
            manager.dir().display()
        ));
        output::info(&format!("Configuration stored in: {}", config_path.display()));
    } else {
        output::warn("Settings repository already exists");
    }

    if let Some(url) = upstream {
        manager.set_upstream(Some(url), branch)?;
        output::success(&format!("Upstream set to {url}"));
    }

    Ok(())
}
