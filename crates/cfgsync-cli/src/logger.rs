//! Diagnostic logging setup.
//!
//! Library crates log through the `log` facade. The level comes from
//! `RUST_LOG`; without it only warnings are shown, `-v` shows info and
//! `-vv` shows debug output such as server messages and per-ref results.

use std::io::Write;

use log::LevelFilter;

/// Level used when `RUST_LOG` isn't set.
const fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

/// Initialize the global logger. Calling it twice is harmless.
pub fn init(verbose: u8) {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse::<LevelFilter>().ok())
        .unwrap_or_else(|| level_for(verbose));

    env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{:5}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_level(level)
        .target(env_logger::Target::Stderr)
        .try_init()
        .ok();
}
