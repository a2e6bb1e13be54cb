//! `cfgsync status` command - Display repository and upstream state.

use anyhow::Result;
use cfgsync_core::SyncManager;
use cfgsync_git::{GitOps, Repository, RepositoryState};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

use super::GlobalArgs;
use super::utils;
use crate::output;

/// Run the status command.
pub fn run(global: &GlobalArgs, json: bool) -> Result<()> {
    let manager = utils::manager(global)?;
    let status = collect(&manager)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct StatusOutput {
    directory: String,
    repository: bool,
    upstream: Option<String>,
    branch: Option<String>,
    ahead: usize,
    can_commit: bool,
    merging: bool,
    last_commit: Option<LastCommit>,
}

#[derive(Debug, Serialize)]
struct LastCommit {
    id: String,
    summary: String,
    time: Option<DateTime<Utc>>,
}

fn collect(manager: &SyncManager) -> Result<StatusOutput> {
    let directory = manager.dir().display().to_string();
    if !manager.is_repository_exists() {
        return Ok(StatusOutput {
            directory,
            repository: false,
            upstream: None,
            branch: None,
            ahead: 0,
            can_commit: false,
            merging: false,
            last_commit: None,
        });
    }

    let repo = Repository::open(manager.dir())?;
    let last_commit = match repo.head_oid()? {
        Some(oid) => {
            let commit = repo.inner().find_commit(oid)?;
            Some(LastCommit {
                id: oid.to_string(),
                summary: commit.summary().unwrap_or_default().to_string(),
                time: DateTime::from_timestamp(commit.time().seconds(), 0),
            })
        }
        None => None,
    };

    Ok(StatusOutput {
        directory,
        repository: true,
        upstream: manager.upstream()?,
        branch: repo.current_branch()?,
        ahead: manager.ahead_commits_count()?,
        can_commit: manager.can_commit()?,
        merging: repo.state() == RepositoryState::Merge,
        last_commit,
    })
}

fn print_status(status: &StatusOutput) {
    println!();
    println!("  {} {}", "Settings".bold(), status.directory);
    output::hr();

    if !status.repository {
        output::info("No settings repository yet. Use `cfgsync init` to create one.");
        return;
    }

    let upstream = status
        .upstream
        .as_deref()
        .map_or_else(|| "none".dimmed().to_string(), ToString::to_string);
    output::detail(&format!("  Upstream     {upstream}"));
    output::detail(&format!(
        "  Branch       {}",
        status.branch.as_deref().unwrap_or("(detached)")
    ));
    output::detail(&format!("  Ahead        {}", output::ahead(status.ahead)));

    let state = if status.merging && !status.can_commit {
        "merge conflict - run `cfgsync reset --theirs` or `--mine`".red().to_string()
    } else if status.merging {
        "merge in progress".yellow().to_string()
    } else {
        "clean".green().to_string()
    };
    output::detail(&format!("  State        {state}"));

    if let Some(commit) = &status.last_commit {
        let when = commit
            .time
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        output::detail(&format!(
            "  Last commit  {} {} {}",
            commit.id[..7].yellow(),
            commit.summary,
            when.dimmed()
        ));
    }
    println!();
}
