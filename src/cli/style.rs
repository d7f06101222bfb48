//! Terminal styling helpers
//!
//! Output goes through `anstream`, which strips the colors when stdout is
//! not a terminal.

use indicatif::ProgressStyle;
use owo_colors::OwoColorize;
use std::fmt::Display;

/// Success mark
pub const CHECK: &str = "✓";
/// Failure mark
pub const CROSS: &str = "✗";
/// Warning mark
pub const WARN: &str = "⚠";
/// Step arrow
pub const ARROW: &str = "→";

/// Semantic styles for CLI output
pub trait Stylize: Display {
    /// Headings and key terms
    fn emphasis(&self) -> String {
        self.bold().to_string()
    }

    /// Branch names, counts, PR numbers
    fn accent(&self) -> String {
        self.cyan().to_string()
    }

    /// Secondary information
    fn muted(&self) -> String {
        self.dimmed().to_string()
    }

    /// Completed steps
    fn success(&self) -> String {
        self.green().to_string()
    }

    /// Best-effort failures and blocked items
    fn warn(&self) -> String {
        self.yellow().to_string()
    }

    /// Fatal failures
    fn failure(&self) -> String {
        self.red().bold().to_string()
    }
}

impl<T: Display + ?Sized> Stylize for T {}

/// Green check mark
pub fn check() -> String {
    CHECK.success()
}

/// Dimmed step arrow
pub fn arrow() -> String {
    ARROW.muted()
}

/// Spinner used while fetching
pub fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
}

/// `text` as a clickable link when the terminal supports it.
pub fn hyperlink(text: &str, url: &str) -> String {
    if supports_hyperlinks::on(supports_hyperlinks::Stream::Stdout) {
        terminal_link::Link::new(text, url).to_string()
    } else {
        format!("{text} ({url})")
    }
}
