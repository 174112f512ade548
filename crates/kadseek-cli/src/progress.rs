//! Search progress display.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner shown while results trickle in
pub struct SearchProgress {
    bar: ProgressBar,
}

impl SearchProgress {
    /// Start a spinner for `keywords`
    #[must_use]
    pub fn new(keywords: &[String]) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        bar.set_message(format!("Searching: {}", keywords.join(" ")));
        Self { bar }
    }

    /// Record the running result count
    pub fn found(&self, count: usize) {
        self.bar.set_message(format!("{count} results so far"));
    }

    /// Print a line above the spinner
    pub fn println(&self, line: impl AsRef<str>) {
        self.bar.println(line);
    }

    /// Finish with a summary line
    pub fn finish_with_message(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Format bytes in human-readable format
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{size:.2} {}", UNITS[unit_idx])
}

/// Format duration in human-readable format
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}
