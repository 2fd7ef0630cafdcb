//! Human-readable size and speed strings.
//!
//! The engine reports sizes and speeds as display strings; these helpers
//! produce the same shape for the in-memory engine and the CLI.

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Format a byte count with two decimals, e.g. `"1.50 MB"`.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in UNITS {
        if value < 1024.0 {
            return format!("{value:.2} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.2} PB")
}

/// Format a transfer rate in bytes per second, e.g. `"15.30 MB/s"`.
#[must_use]
pub fn format_speed(bytes_per_second: f64) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let bytes = bytes_per_second.max(0.0) as u64;
    format!("{}/s", format_size(bytes))
}
