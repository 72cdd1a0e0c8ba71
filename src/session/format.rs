use chrono::NaiveTime;

/// Display placeholder for "no value yet".
pub const EMPTY_DISPLAY: &str = "--:--";

/// Renders a duration as `"{hours}h {minutes}m"`, or `--:--` when there is
/// nothing to show.
pub fn format_duration(total_seconds: Option<i64>) -> String {
    match total_seconds {
        Some(secs) if secs > 0 => format!("{}h {}m", secs / 3600, (secs % 3600) / 60),
        _ => EMPTY_DISPLAY.to_string(),
    }
}

/// 12-hour wall clock, e.g. `09:05 AM`.
pub fn format_clock(time: Option<NaiveTime>) -> String {
    match time {
        Some(t) => t.format("%I:%M %p").to_string(),
        None => EMPTY_DISPLAY.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_missing_durations_use_placeholder() {
        assert_eq!(format_duration(Some(0)), "--:--");
        assert_eq!(format_duration(None), "--:--");
        assert_eq!(format_duration(Some(-60)), "--:--");
    }

    #[test]
    fn durations_truncate_to_minutes() {
        assert_eq!(format_duration(Some(30_600)), "8h 30m");
        assert_eq!(format_duration(Some(59)), "0h 0m");
        assert_eq!(format_duration(Some(3_599)), "0h 59m");
        assert_eq!(format_duration(Some(90_000)), "25h 0m");
    }

    #[test]
    fn clock_uses_twelve_hour_format() {
        let t = NaiveTime::from_hms_opt(17, 5, 0).unwrap();
        assert_eq!(format_clock(Some(t)), "05:05 PM");
        assert_eq!(format_clock(None), "--:--");
    }
}
