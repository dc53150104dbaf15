//! Formatting of greensf output: titles, tables and human-readable values.

use std::fmt;

use log;

const GREENSF_BANNER_LENGTH: usize = 103;

/// Logs a warning to the `greensf-output` logger.
macro_rules! greensf_warn {
    ($fmt:expr $(, $($arg:tt)*)?) => {
        log::warn!($fmt, $($($arg)*)?);
        log::warn!(target: "greensf-output", $fmt, $($($arg)*)?);
    }
}

/// Logs a main output line to the `greensf-output` logger.
macro_rules! greensf_output {
    ($fmt:expr $(, $($arg:tt)*)?) => { log::info!(target: "greensf-output", $fmt, $($($arg)*)?); }
}

pub(crate) use {greensf_output, greensf_warn};

/// Logs a nicely formatted section title to the `greensf-output` logger.
pub(crate) fn log_title(title: &str) {
    let length = title.chars().count().max(GREENSF_BANNER_LENGTH - 6);
    let bar = "─".repeat(length);
    greensf_output!("┌──{bar}──┐");
    greensf_output!("│§ {title:^length$} §│");
    greensf_output!("└──{bar}──┘");
}

/// Logs a nicely formatted subtitle to the `greensf-output` logger.
pub(crate) fn log_subtitle(subtitle: &str) {
    let length = subtitle.chars().count();
    let bar = "═".repeat(length);
    greensf_output!("{}", subtitle);
    greensf_output!("{}", bar);
}

/// Returns the dotted horizontal rule framing greensf tables.
pub(crate) fn table_rule(width: usize) -> String {
    "┈".repeat(width)
}

/// Turns an optional limit into its value, or `all` when absent.
pub(crate) fn nice_limit(limit: Option<usize>) -> String {
    limit
        .map(|n| n.to_string())
        .unwrap_or_else(|| "all".to_string())
}

/// Turns a boolean into a string of `yes` or `no`.
pub(crate) fn nice_bool(b: bool) -> String {
    if b {
        "yes".to_string()
    } else {
        "no".to_string()
    }
}

/// A trait for logging greensf outputs nicely.
pub(crate) trait GreensfOutput: fmt::Debug + fmt::Display {
    /// Logs display output nicely.
    fn log_output_display(&self) {
        let lines = self.to_string();
        lines.lines().for_each(|line| {
            greensf_output!("{line}");
        })
    }
}

// Blanket implementation
impl<T> GreensfOutput for T where T: fmt::Debug + fmt::Display {}
