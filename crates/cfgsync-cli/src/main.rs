//! cfgsync CLI - keep a directory of settings in sync with a git upstream.

use clap::Parser;

use cfgsync_core::ShutdownRegistry;

mod commands;
mod credentials;
mod logger;
mod output;
mod progress;

use commands::reset::Side;
use commands::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    output::set_quiet(cli.global.quiet);
    logger::init(cli.global.verbose);

    let global = &cli.global;
    let result = match cli.command {
        Commands::Init { upstream, branch } => {
            commands::init::run(global, upstream.as_deref(), branch.as_deref())
        }
        Commands::Status { json } => commands::status::run(global, json),
        Commands::Upstream { url, branch, unset } => {
            commands::upstream::run(global, url.as_deref(), branch.as_deref(), unset)
        }
        Commands::Add { path, from } => commands::index::add(global, &path, from.as_deref()),
        Commands::Rm { path, recursive } => commands::index::remove(global, &path, recursive),
        Commands::Commit => commands::commit::run(global),
        Commands::Push => commands::push::run(global),
        Commands::Pull => commands::pull::run(global),
        Commands::Sync => commands::sync::run(global),
        Commands::Reset { theirs, mine, yes } => {
            let side = if mine && !theirs { Side::Mine } else { Side::Theirs };
            commands::reset::run(global, side, yes)
        }
        Commands::Migrate { pairs } => commands::migrate::run(global, &pairs),
        Commands::Check { path } => commands::check::run(&path),
        Commands::Completions { shell } => commands::completions::run(shell),
    };

    ShutdownRegistry::global().run();

    if let Err(e) = result {
        output::error(&format!("{e:#}"));
        std::process::exit(1);
    }
}
