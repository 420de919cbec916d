//! Broadcast message rendering.
//!
//! # Invariants
//! - Every rendered body ends with `OPT_OUT_NOTICE`.
//! - Bodies never exceed `MAX_SMS_BODY_CHARS` characters; overflow lines are
//!   replaced by a marker, never the footer.
//! - Only stored assignments are announced.

use crate::model::week::WeekView;
use crate::sms::MAX_SMS_BODY_CHARS;

/// Compliance footer appended to every broadcast.
pub const OPT_OUT_NOTICE: &str = "Reply STOP to opt out";

const OVERFLOW_MARKER: &str = "…more shifts in the app";
const DAY_FORMAT: &str = "%a %m/%d";

/// Renders the SMS body announcing `week`.
pub fn format_schedule_message(week: &WeekView) -> String {
    let header = format!(
        "☕ CupsUp schedule, week of {}",
        week.week_start.format(DAY_FORMAT)
    );
    let lines = week
        .stored_assignments()
        .map(|assignment| {
            format!(
                "📅 {}: {} {}-{}",
                assignment.date.format(DAY_FORMAT),
                assignment.name.trim(),
                assignment.start,
                assignment.end
            )
        })
        .collect::<Vec<_>>();

    let footer_len = OPT_OUT_NOTICE.chars().count() + 1;
    let marker_len = OVERFLOW_MARKER.chars().count() + 1;
    let mut body = header;
    if lines.is_empty() {
        body.push_str("\nNo shifts scheduled.");
    }

    for (index, line) in lines.iter().enumerate() {
        let is_last = index + 1 == lines.len();
        let reserve = if is_last { footer_len } else { footer_len + marker_len };
        let used = body.chars().count() + line.chars().count() + 1;
        if used + reserve > MAX_SMS_BODY_CHARS {
            body.push('\n');
            body.push_str(OVERFLOW_MARKER);
            break;
        }
        body.push('\n');
        body.push_str(line);
    }

    body.push('\n');
    body.push_str(OPT_OUT_NOTICE);
    body
}

#[cfg(test)]
mod tests {
    use super::{format_schedule_message, OPT_OUT_NOTICE, OVERFLOW_MARKER};
    use crate::model::assignment::Assignment;
    use crate::model::week::{EntrySource, WeekEntry, WeekView};
    use crate::sms::MAX_SMS_BODY_CHARS;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).expect("valid date")
    }

    fn entry(name: &str, d: u32, source: EntrySource) -> WeekEntry {
        WeekEntry {
            assignment: Assignment::new(name, day(d), "09:00", "13:00"),
            source,
        }
    }

    #[test]
    fn lists_stored_entries_and_skips_suggestions() {
        let week = WeekView {
            week_start: day(3),
            entries: vec![
                entry("Alice", 3, EntrySource::Stored),
                entry("Ghost", 4, EntrySource::Calendar),
            ],
        };
        let body = format_schedule_message(&week);
        assert!(body.starts_with("☕ CupsUp schedule, week of Mon 03/03"));
        assert!(body.contains("📅 Mon 03/03: Alice 09:00-13:00"));
        assert!(!body.contains("Ghost"));
        assert!(body.ends_with(OPT_OUT_NOTICE));
    }

    #[test]
    fn empty_week_still_carries_opt_out() {
        let week = WeekView {
            week_start: day(3),
            entries: Vec::new(),
        };
        let body = format_schedule_message(&week);
        assert!(body.contains("No shifts scheduled."));
        assert!(body.ends_with(OPT_OUT_NOTICE));
    }

    #[test]
    fn oversized_week_is_truncated_but_keeps_footer() {
        let entries = (0..200)
            .map(|index| entry(&format!("Employee number {index}"), 3, EntrySource::Stored))
            .collect();
        let week = WeekView {
            week_start: day(3),
            entries,
        };
        let body = format_schedule_message(&week);
        assert!(body.chars().count() <= MAX_SMS_BODY_CHARS);
        assert!(body.contains(OVERFLOW_MARKER));
        assert!(body.ends_with(OPT_OUT_NOTICE));
    }
}
