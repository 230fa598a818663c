use std::time::Duration;

/// Format a `Duration` as a human-readable string with automatic unit scaling.
///
/// Produces output like `1.94ms`, `2.34s` using Rust's Debug format.
pub fn fmt_duration(d: Duration) -> String {
    format!("{d:.2?}")
}

/// `ceil(total / page_size)`, treating a zero page size as a single page.
pub fn page_count(total: u32, page_size: u32) -> u32 {
    if page_size == 0 {
        return 1;
    }
    total.div_ceil(page_size)
}
