//! `cfgsync migrate` command - Move directories in one commit.

use anyhow::{Result, bail};

use super::GlobalArgs;
use super::utils;
use crate::output;

/// Run the migrate command.
pub fn run(global: &GlobalArgs, pairs: &[String]) -> Result<()> {
    let parsed = pairs
        .iter()
        .map(|raw| parse_pair(raw))
        .collect::<Result<Vec<_>>>()?;
    let borrowed: Vec<(&str, Option<&str>)> = parsed
        .iter()
        .map(|(old, new)| (old.as_str(), new.as_deref()))
        .collect();

    let manager = utils::open_manager(global)?;
    if manager.rename_directory(&borrowed)? {
        output::success("Migrated directories in one commit");
        for (old, new) in &borrowed {
            output::detail(&format!("  {old} → {}", new.unwrap_or(".")));
        }
    } else {
        output::info("Nothing to migrate");
    }
    Ok(())
}

/// Parse `OLD=NEW`; `OLD` or `OLD=` targets the repository root.
fn parse_pair(raw: &str) -> Result<(String, Option<String>)> {
    let (old, new) = match raw.split_once('=') {
        Some((old, new)) => (old.trim(), new.trim()),
        None => (raw.trim(), ""),
    };
    if old.is_empty() {
        bail!("Invalid migration '{raw}' - expected OLD=NEW");
    }

    let new = (!new.is_empty()).then(|| new.trim_end_matches('/').to_string());
    Ok((old.trim_end_matches('/').to_string(), new))
}
