//! Text formatting helpers for terminal output.

pub mod format;

pub use format::{format_date, pluralize, relative_time, single_line, truncate_string};
