use chrono::{DateTime, Utc};

/// Format a class start time for display, e.g. "5 January 2030, 06:30"
pub fn format_class_time(time: Option<&DateTime<Utc>>) -> String {
    match time {
        Some(dt) => dt.format("%-d %B %Y, %H:%M").to_string(),
        None => "N/A".to_string(),
    }
}

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

/// Format an optional string, returning a default if None
pub fn format_optional(value: Option<&str>, default: &str) -> String {
    value.unwrap_or(default).to_string()
}

/// Fixed-width text progress bar, e.g. "[#####-----] 50%"
pub fn progress_bar(percent: u32, width: usize) -> String {
    let percent = percent.min(100);
    let filled = (width * percent as usize) / 100;
    format!(
        "[{}{}] {}%",
        "#".repeat(filled),
        "-".repeat(width - filled),
        percent
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_class_time() {
        let dt = Utc.with_ymd_and_hms(2030, 1, 5, 6, 30, 0).unwrap();
        assert_eq!(format_class_time(Some(&dt)), "5 January 2030, 06:30");
        assert_eq!(format_class_time(None), "N/A");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(50, 10), "[#####-----] 50%");
        assert_eq!(progress_bar(0, 4), "[----] 0%");
        assert_eq!(progress_bar(150, 4), "[####] 100%");
    }
}
