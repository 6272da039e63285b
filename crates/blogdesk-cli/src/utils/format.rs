use chrono::{DateTime, Utc};

/// Truncate a string to a maximum length, adding ellipsis if needed
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

/// Collapse whitespace runs (including newlines) to single spaces for one-line previews
pub fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Format a timestamp as e.g. "May 01, 2024"
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%b %d, %Y").to_string()
}

/// Human-readable age of `then` relative to `now`, e.g. "5m ago", "2d ago".
/// Older than a month falls back to the calendar date.
pub fn relative_time(then: &DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - *then).num_minutes();
    if minutes < 1 {
        // Also covers clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else if minutes < 1440 * 30 {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    } else {
        format_date(then)
    }
}

/// "1 comment", "3 comments"
pub fn pluralize(count: i64, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(minutes_ago: i64) -> (DateTime<Utc>, DateTime<Utc>) {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        (now - Duration::minutes(minutes_ago), now)
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("héllo wörld", 8), "héllo...");
    }

    #[test]
    fn test_single_line() {
        assert_eq!(single_line("first\n\n  second\tthird "), "first second third");
    }

    #[test]
    fn test_relative_time() {
        let (then, now) = at(0);
        assert_eq!(relative_time(&then, now), "just now");
        let (then, now) = at(-5);
        assert_eq!(relative_time(&then, now), "just now");
        let (then, now) = at(42);
        assert_eq!(relative_time(&then, now), "42m ago");
        let (then, now) = at(90);
        assert_eq!(relative_time(&then, now), "2h ago");
        let (then, now) = at(60 * 24 + 60);
        assert_eq!(relative_time(&then, now), "1d ago");
        let (then, now) = at(60 * 24 * 45);
        assert_eq!(relative_time(&then, now), "Mar 26, 2024");
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize(1, "comment"), "1 comment");
        assert_eq!(pluralize(0, "comment"), "0 comments");
    }
}
