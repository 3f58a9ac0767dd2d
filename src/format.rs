//! Timestamp display helpers for the transcript and bookmark pane.

use chrono::{DateTime, Local, NaiveDateTime, Utc};

/// Long form used on bookmark cards, e.g. "March 4, 2026, 3:07 PM".
pub fn format_date(instant: DateTime<Utc>) -> String {
    long_form(instant.with_timezone(&Local).naive_local())
}

/// Short clock form shown under each message, e.g. "3:07 PM".
pub fn format_time(instant: DateTime<Utc>) -> String {
    clock_form(instant.with_timezone(&Local).naive_local())
}

fn long_form(local: NaiveDateTime) -> String {
    local.format("%B %-d, %Y, %-I:%M %p").to_string()
}

fn clock_form(local: NaiveDateTime) -> String {
    local.format("%-I:%M %p").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 4)
            .unwrap()
            .and_hms_opt(15, 7, 0)
            .unwrap()
    }

    #[test]
    fn long_form_matches_display_style() {
        assert_eq!(long_form(sample()), "March 4, 2026, 3:07 PM");
    }

    #[test]
    fn clock_form_is_twelve_hour() {
        assert_eq!(clock_form(sample()), "3:07 PM");
    }

    #[test]
    fn clock_form_handles_morning_hours() {
        let morning = NaiveDate::from_ymd_opt(2026, 3, 4)
            .unwrap()
            .and_hms_opt(9, 5, 0)
            .unwrap();
        assert_eq!(clock_form(morning), "9:05 AM");
    }
}
