use chrono::{DateTime, Datelike, Utc};

/// Compact age of a timestamp relative to `now`: `now`, `5m`, `3h`, `2d`,
/// then a calendar date (`Mar 04`, or `Mar 04 2023` outside the current year).
pub fn format_relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(at).num_seconds();

    // Clock skew between client and backend
    if diff < 60 {
        return "now".to_string();
    }
    if diff < 3600 {
        return format!("{}m", diff / 60);
    }
    if diff < 86_400 {
        return format!("{}h", diff / 3600);
    }
    if diff < 7 * 86_400 {
        return format!("{}d", diff / 86_400);
    }

    if at.year() == now.year() {
        at.format("%b %d").to_string()
    } else {
        at.format("%b %d %Y").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_recent_and_future_are_now() {
        assert_eq!(format_relative_time(now(), now()), "now");
        assert_eq!(format_relative_time(now() + Duration::hours(2), now()), "now");
    }

    #[test]
    fn test_minutes_hours_days() {
        assert_eq!(format_relative_time(now() - Duration::minutes(5), now()), "5m");
        assert_eq!(format_relative_time(now() - Duration::hours(3), now()), "3h");
        assert_eq!(format_relative_time(now() - Duration::days(2), now()), "2d");
    }

    #[test]
    fn test_older_shows_date() {
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        assert_eq!(format_relative_time(at, now()), "Mar 04");

        let at = Utc.with_ymd_and_hms(2023, 3, 4, 9, 0, 0).unwrap();
        assert_eq!(format_relative_time(at, now()), "Mar 04 2023");
    }
}
