//! `cfgsync add` / `cfgsync rm` commands - Stage settings files.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};

use super::GlobalArgs;
use super::utils;
use crate::output;

/// Write content at `path` and stage it.
pub fn add(global: &GlobalArgs, path: &str, from: Option<&Path>) -> Result<()> {
    let manager = utils::open_manager(global)?;

    let content = match from {
        Some(file) => {
            fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?
        }
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    manager.add_to_index(path, &content)?;
    output::success(&format!("Staged {path} ({} bytes)", content.len()));
    Ok(())
}

/// Remove `path` from the working tree and the index.
pub fn remove(global: &GlobalArgs, path: &str, recursive: bool) -> Result<()> {
    let manager = utils::open_manager(global)?;
    manager.delete_from_index(path, !recursive)?;
    output::success(&format!("Removed {path}"));
    Ok(())
}
