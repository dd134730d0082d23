//! Terminal output module
//!
//! Provides the live progress display and console formatting.

mod formatter;
mod progress;

pub use formatter::ConsoleFormatter;
pub use progress::ProgressDisplay;
