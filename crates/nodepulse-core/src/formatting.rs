//! Formatting utilities for consistent display across the application
//!
//! Node ages, refresh timestamps and short labels used by the table and
//! the change log.

use chrono::{DateTime, Duration, Local, Utc};

/// Format the age of a resource created at `created`
///
/// Whole days if at least one day old, else whole hours, else minutes.
///
/// # Examples
///
/// ```
/// use nodepulse_core::formatting::format_age;
/// use chrono::{Duration, Utc};
///
/// let now = Utc::now();
/// assert_eq!(format_age(now - Duration::hours(50), now), "2d");
/// assert_eq!(format_age(now - Duration::minutes(90), now), "1h");
/// assert_eq!(format_age(now - Duration::seconds(30), now), "0m");
/// ```
pub fn format_age(created: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(created).max(Duration::zero());

    if age.num_days() > 0 {
        format!("{}d", age.num_days())
    } else if age.num_hours() > 0 {
        format!("{}h", age.num_hours())
    } else {
        format!("{}m", age.num_minutes())
    }
}

/// Format a number of seconds using the most appropriate unit
///
/// # Examples
///
/// ```
/// use nodepulse_core::formatting::format_duration_secs;
///
/// assert_eq!(format_duration_secs(30), "30s");
/// assert_eq!(format_duration_secs(300), "5m");
/// assert_eq!(format_duration_secs(7200), "2h");
/// ```
pub fn format_duration_secs(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}

/// Format time relative to `now` (e.g., "5s ago")
pub fn format_time_ago(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(timestamp);
    if elapsed < Duration::zero() {
        "just now".to_string()
    } else {
        format!("{} ago", format_duration_secs(elapsed.num_seconds() as u64))
    }
}

/// Wall-clock time of a change, in local time
pub fn format_clock(timestamp: DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%H:%M:%S")
        .to_string()
}

/// Format a timestamp for the change journal
pub fn format_journal_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Truncate a string to a maximum length with ellipsis
///
/// # Examples
///
/// ```
/// use nodepulse_core::formatting::truncate_string;
///
/// assert_eq!(truncate_string("Hello, World!", 10), "Hello, ...");
/// assert_eq!(truncate_string("Short", 10), "Short");
/// ```
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format a count with singular/plural form
pub fn pluralize(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}
