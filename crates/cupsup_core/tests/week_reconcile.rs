use chrono::NaiveDate;
use cupsup_core::db::open_db_in_memory;
use cupsup_core::{
    Assignment, AssignmentStore, CalendarEvent, DateRange, EntrySource, SqliteAssignmentRepository,
    SqliteCalendarSource, WeekError, WeekReconciler,
};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

fn event(subject: &str, d: u32, start: &str, end: &str) -> CalendarEvent {
    CalendarEvent {
        subject: subject.to_string(),
        date: day(d),
        start: start.to_string(),
        end: end.to_string(),
    }
}

#[test]
fn saved_assignment_round_trips_through_week_view() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteAssignmentRepository::new(&conn);
    let saved = Assignment::new("Alice", day(5), "07:30", "11:45");
    store.upsert(&saved).unwrap();

    let reconciler =
        WeekReconciler::new(SqliteCalendarSource::new(&conn), &store, "cafe".to_string());
    let week = reconciler.get_week(day(3)).unwrap();

    assert_eq!(week.week_start, day(3));
    assert_eq!(week.entries.len(), 1);
    assert_eq!(week.entries[0].assignment, saved);
    assert_eq!(week.entries[0].source, EntrySource::Stored);
}

#[test]
fn calendar_suggestions_fill_slots_without_stored_records() {
    let conn = open_db_in_memory().unwrap();
    let calendar = SqliteCalendarSource::new(&conn);
    calendar
        .replace_events(
            "cafe",
            DateRange::week_from(day(3)),
            &[
                event("Alice", 3, "08:00", "12:00"),
                event("Bob", 4, "12:00", "16:00"),
            ],
        )
        .unwrap();
    let store = SqliteAssignmentRepository::new(&conn);
    store
        .upsert(&Assignment::new("Alice", day(3), "09:00", "13:00"))
        .unwrap();

    let week = WeekReconciler::new(&calendar, &store, "cafe")
        .get_week(day(3))
        .unwrap();

    let summary = week
        .entries
        .iter()
        .map(|entry| {
            (
                entry.assignment.name.as_str(),
                entry.assignment.start.as_str(),
                entry.source,
            )
        })
        .collect::<Vec<_>>();
    assert_eq!(
        summary,
        vec![
            ("Alice", "09:00", EntrySource::Stored),
            ("Bob", "12:00", EntrySource::Calendar),
        ]
    );
}

#[test]
fn unconfigured_calendar_reports_cannot_access_calendar() {
    let conn = open_db_in_memory().unwrap();
    let reconciler = WeekReconciler::new(
        SqliteCalendarSource::new(&conn),
        SqliteAssignmentRepository::new(&conn),
        String::new(),
    );

    let err = reconciler.get_week(day(3)).unwrap_err();
    assert!(matches!(err, WeekError::CalendarUnavailable(_)));
    assert!(err.to_string().contains("Cannot access calendar"));
}
