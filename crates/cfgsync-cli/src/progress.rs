//! Terminal spinner reporting remote operation progress.

use std::time::Duration;

use cfgsync_git::Progress;
use indicatif::{ProgressBar, ProgressStyle};

use crate::output;

/// Spinner shown while talking to the upstream; hidden in quiet mode.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    /// Start a spinner with an initial message.
    pub fn start(message: &str) -> Self {
        let bar = if output::is_quiet() {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner:.cyan} {msg} {prefix:.dim}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        bar.set_message(message.to_string());
        Self { bar }
    }

    /// Remove the spinner from the terminal.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Progress for Spinner {
    fn set_text(&self, text: &str) {
        self.bar.set_prefix("");
        self.bar.set_message(text.to_string());
    }

    fn set_fraction(&self, fraction: f64) {
        self.bar.set_prefix(format!("{:.0}%", fraction * 100.0));
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.finish();
    }
}
