//! Progress display for a dump run.
//!
//! The engine reports finished tables through a plain callback; this module
//! turns that into an `indicatif` bar counting tables.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// A progress bar over `total` tables
pub fn table_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} tables {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▓▒░  ")
    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Callback for [`Dumper::with_progress`](crate::dumper::Dumper::with_progress)
/// that advances `pb` and shows the last finished table
pub fn table_callback(pb: ProgressBar) -> impl Fn(usize, usize, &str) + 'static {
    move |done: usize, total: usize, table: &str| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
        pb.set_message(table.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_advances_bar() {
        let pb = ProgressBar::hidden();
        let callback = table_callback(pb.clone());
        callback(1, 3, "users");
        callback(2, 3, "orders");
        assert_eq!(pb.position(), 2);
        assert_eq!(pb.length(), Some(3));
        assert_eq!(pb.message(), "orders");
    }
}
