//! Command definitions and dispatch helpers.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use clap_complete::Shell;

pub mod check;
pub mod commit;
pub mod completions;
pub mod index;
pub mod init;
pub mod migrate;
pub mod pull;
pub mod push;
pub mod reset;
pub mod status;
pub mod sync;
pub mod upstream;
pub mod utils;

/// cfgsync - keep a directory of settings in sync with a git upstream.
#[derive(Parser)]
#[command(name = "cfgsync", version, about, propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Settings directory (defaults to the current directory)
    #[arg(short = 'C', long, global = true, env = "CFGSYNC_DIR")]
    pub dir: Option<PathBuf>,

    /// Username for the upstream; the password is read from CFGSYNC_PASSWORD
    #[arg(short, long, global = true, env = "CFGSYNC_USERNAME")]
    pub username: Option<String>,

    /// Only print errors and essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Show diagnostic logs (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the settings repository if it doesn't exist
    Init {
        /// Upstream URL to synchronize with
        #[arg(long)]
        upstream: Option<String>,

        /// Upstream branch
        #[arg(long, requires = "upstream")]
        branch: Option<String>,
    },

    /// Show repository and upstream state
    #[command(alias = "st")]
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show, set or remove the upstream
    Upstream {
        /// New upstream URL
        url: Option<String>,

        /// Upstream branch
        #[arg(long, requires = "url")]
        branch: Option<String>,

        /// Remove the upstream
        #[arg(long, conflicts_with = "url")]
        unset: bool,
    },

    /// Write a file into the repository and stage it
    Add {
        /// Path inside the repository
        path: String,

        /// Read content from this file instead of stdin
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Remove a file or directory from the repository
    Rm {
        /// Path inside the repository
        path: String,

        /// Remove a whole directory
        #[arg(short, long)]
        recursive: bool,
    },

    /// Commit pending changes
    #[command(alias = "ci")]
    Commit,

    /// Push local commits upstream
    Push,

    /// Fetch upstream and merge it
    Pull,

    /// Commit, pull and push in one go
    Sync,

    /// Resolve a conflict by taking one side
    Reset {
        /// Make local settings identical to upstream
        #[arg(long, conflicts_with = "mine", required_unless_present = "mine")]
        theirs: bool,

        /// Force local settings onto upstream
        #[arg(long)]
        mine: bool,

        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Move directories inside the repository in one commit
    Migrate {
        /// OLD=NEW pairs; OLD alone moves the content to the repository root
        #[arg(required = true)]
        pairs: Vec<String>,
    },

    /// Check whether a directory holds a git repository
    Check {
        /// Directory to check
        path: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
