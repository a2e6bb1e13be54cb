//! Terminal output formatting utilities.

use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;

static QUIET_MODE: AtomicBool = AtomicBool::new(false);

/// Set quiet mode globally. Call once at startup.
pub fn set_quiet(quiet: bool) {
    QUIET_MODE.store(quiet, Ordering::Relaxed);
}

/// Whether quiet mode is on.
pub fn is_quiet() -> bool {
    QUIET_MODE.load(Ordering::Relaxed)
}

/// Print a success message (suppressed in quiet mode).
pub fn success(msg: &str) {
    if !is_quiet() {
        println!("{} {}", "✓".green(), msg);
    }
}

/// Print an error message (always prints to stderr).
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a warning message (always prints to stderr).
pub fn warn(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

/// Print an info message (suppressed in quiet mode).
pub fn info(msg: &str) {
    if !is_quiet() {
        println!("{} {}", "→".blue(), msg);
    }
}

/// Print a detail line without prefix (suppressed in quiet mode).
///
/// Use for indented detail lines that accompany info or warn messages.
pub fn detail(msg: &str) {
    if !is_quiet() {
        println!("{msg}");
    }
}

/// Print essential machine-readable output (always prints).
pub fn essential(msg: &str) {
    println!("{msg}");
}

/// Print the paths an update touched, grouped by kind.
pub fn update_summary(changed: &[String], deleted: &[String]) {
    for path in changed {
        detail(&format!("  {} {path}", "M".yellow()));
    }
    for path in deleted {
        detail(&format!("  {} {path}", "D".red()));
    }
}

/// Format an ahead count for display.
#[must_use]
pub fn ahead(count: usize) -> String {
    match count {
        0 => "up to date".green().to_string(),
        n => format!("{n}↑").yellow().to_string(),
    }
}

/// Print a horizontal line (suppressed in quiet mode).
pub fn hr() {
    if !is_quiet() {
        println!("{}", "─".repeat(50).dimmed());
    }
}
