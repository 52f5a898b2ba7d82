//! # Utility Functions and Helper Module
//!
//! Small helpers shared by the runner, the results printer and the command
//! line front end.
//!
//! ## Key Functionality Categories
//!
//! - **Formatting**: Human-readable display of durations, bytes and rates
//! - **Validation**: Checks on run parameters with clear error messages
//! - **System Information**: CPU detection for the results metadata
//! - **Display Helpers**: Plain-text table rows and separators
//!
//! ## Usage Examples
//!
//! ```rust
//! use s3_benchmark::utils::*;
//! use std::time::Duration;
//!
//! // Format durations for display
//! let duration_str = format_duration(Duration::from_micros(1500));
//! assert_eq!(duration_str, "1.50ms");
//!
//! // Format operation rates
//! assert_eq!(format_ops_rate(750.0), "750 ops/s");
//!
//! // Validate run parameters
//! # fn main() -> anyhow::Result<()> {
//! validate_threads(8)?; // OK
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use std::time::Duration;

use crate::operations::OperationKind;

/// Format a duration in a human-readable way
///
/// Picks the most significant unit for the value so that both sub-millisecond
/// request latencies and multi-minute test runs read naturally.
///
/// ## Unit Selection
///
/// - Nanoseconds: < 1μs (e.g., "750ns")
/// - Microseconds: < 1ms (e.g., "1.25μs")
/// - Milliseconds: < 1s (e.g., "2.50ms")
/// - Seconds: < 1m (e.g., "12.50s")
/// - Compound: ≥ 1m (e.g., "1m 30s", "2h 5m 0s")
///
/// ## Precision
///
/// - Sub-minute units use 2 decimal places
/// - Compound units show whole seconds only
///
/// ## Examples
///
/// ```rust
/// # use s3_benchmark::utils::format_duration;
/// # use std::time::Duration;
/// assert_eq!(format_duration(Duration::from_nanos(750)), "750ns");
/// assert_eq!(format_duration(Duration::from_nanos(1250)), "1.25μs");
/// assert_eq!(format_duration(Duration::from_micros(2500)), "2.50ms");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ns = duration.as_nanos();

    if total_ns < 1_000 {
        format!("{}ns", total_ns)
    } else if total_ns < 1_000_000 {
        format!("{:.2}μs", total_ns as f64 / 1_000.0)
    } else if total_ns < 1_000_000_000 {
        format!("{:.2}ms", total_ns as f64 / 1_000_000.0)
    } else if total_ns < 60_000_000_000 {
        format!("{:.2}s", total_ns as f64 / 1_000_000_000.0)
    } else {
        let seconds = duration.as_secs();
        let minutes = seconds / 60;
        let remaining_seconds = seconds % 60;

        if minutes < 60 {
            format!("{}m {}s", minutes, remaining_seconds)
        } else {
            let hours = minutes / 60;
            let remaining_minutes = minutes % 60;
            format!("{}h {}m {}s", hours, remaining_minutes, remaining_seconds)
        }
    }
}

/// Format an object size in a human-readable way
///
/// Uses binary (1024-based) scaling, which is how object sizes are usually
/// quoted for storage benchmarks.
///
/// ## Examples
///
/// ```rust
/// # use s3_benchmark::utils::format_bytes;
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(65536), "64.00 KB");
/// assert_eq!(format_bytes(2621440), "2.50 MB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    format_bytes_f64(bytes as f64)
}

/// Format bytes (as f64) in a human-readable way
///
/// Shared implementation behind [`format_bytes`] and [`format_rate`].
///
/// ## Unit Scaling
///
/// - Bytes: < 1024 (e.g., "500 B")
/// - Kilobytes: < 1024² (e.g., "1.50 KB")
/// - Megabytes: < 1024³ (e.g., "2.25 MB")
/// - Gigabytes: ≥ 1024³ (e.g., "1.75 GB")
pub fn format_bytes_f64(bytes: f64) -> String {
    if bytes < 1024.0 {
        format!("{:.0} B", bytes)
    } else if bytes < 1024.0 * 1024.0 {
        format!("{:.2} KB", bytes / 1024.0)
    } else if bytes < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.2} MB", bytes / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a data rate (bytes per second), e.g. "1.50 MB/s"
pub fn format_rate(bytes_per_second: f64) -> String {
    format!("{}/s", format_bytes_f64(bytes_per_second))
}

/// Format an operation rate in a human-readable way
///
/// Uses decimal scaling (powers of 1000):
/// - Operations/sec: < 1,000 (e.g., "750 ops/s")
/// - Thousands: < 1,000,000 (e.g., "15.50K ops/s")
/// - Millions: ≥ 1,000,000 (e.g., "2.30M ops/s")
///
/// ## Examples
///
/// ```rust
/// # use s3_benchmark::utils::format_ops_rate;
/// assert_eq!(format_ops_rate(750.0), "750 ops/s");
/// assert_eq!(format_ops_rate(15500.0), "15.50K ops/s");
/// assert_eq!(format_ops_rate(2300000.0), "2.30M ops/s");
/// ```
pub fn format_ops_rate(ops_per_second: f64) -> String {
    if ops_per_second < 1000.0 {
        format!("{:.0} ops/s", ops_per_second)
    } else if ops_per_second < 1_000_000.0 {
        format!("{:.2}K ops/s", ops_per_second / 1000.0)
    } else {
        format!("{:.2}M ops/s", ops_per_second / 1_000_000.0)
    }
}

/// Validate the worker count
///
/// ## Validation Rules
///
/// - **Minimum**: 1 worker
/// - **Maximum**: [`crate::defaults::MAX_THREADS`] workers
///
/// Each worker is a tokio task holding its own connection pool entry, so the
/// upper bound keeps a typo from opening thousands of sockets.
pub fn validate_threads(threads: usize) -> Result<()> {
    if threads == 0 {
        anyhow::bail!("Thread count cannot be zero");
    }
    if threads > crate::defaults::MAX_THREADS {
        anyhow::bail!(
            "Thread count {} is too high (maximum {})",
            threads,
            crate::defaults::MAX_THREADS
        );
    }
    Ok(())
}

/// Validate the per-worker operation count
pub fn validate_operation_count(n: usize) -> Result<()> {
    if n == 0 {
        anyhow::bail!("Operation count must be greater than zero");
    }
    Ok(())
}

/// Validate the object size for the selected operation
///
/// ## Validation Rules
///
/// - Operations that upload a generated payload need a non-zero size
/// - All other operations ignore the size
pub fn validate_object_size(kind: OperationKind, size: u64) -> Result<()> {
    if kind.uploads_payload() && size == 0 {
        anyhow::bail!("Object size must be greater than zero for {}", kind);
    }
    Ok(())
}

/// Get the number of logical CPU cores available
///
/// Recorded in the results metadata so runs on different hosts can be told
/// apart. Uses the `num_cpus` crate, which honours cgroup limits.
pub fn get_cpu_cores() -> usize {
    num_cpus::get()
}

/// Render one table row
///
/// Each column is left-aligned and padded to its width; columns without a
/// width fall back to 10 characters.
///
/// ## Visual Example
///
/// ```text
/// +------------------------+----------------------+
/// | Operation              | UPLOAD               |
/// | Samples                | 4000                 |
/// +------------------------+----------------------+
/// ```
///
/// ## Examples
///
/// ```rust
/// # use s3_benchmark::utils::{table_row, table_separator};
/// let widths = [6, 4];
/// assert_eq!(table_separator(&widths), "+--------+------+");
/// assert_eq!(table_row(&["Op", "GET"], &widths), "| Op     | GET  |");
/// ```
pub fn table_row(columns: &[&str], widths: &[usize]) -> String {
    let mut row = String::from("|");
    for (i, column) in columns.iter().enumerate() {
        let width = widths.get(i).copied().unwrap_or(10);
        row.push_str(&format!(" {:width$} |", column, width = width));
    }
    row
}

/// Render a table separator matching [`table_row`] column widths
pub fn table_separator(widths: &[usize]) -> String {
    let mut line = String::from("+");
    for &width in widths {
        line.push_str(&"-".repeat(width + 2));
        line.push('+');
    }
    line
}
