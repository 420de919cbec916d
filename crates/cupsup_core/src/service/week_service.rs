//! Week reconciliation use-case.
//!
//! # Responsibility
//! - Merge calendar events and stored assignments into one `WeekView`.
//!
//! # Invariants
//! - Stored assignments win over calendar events for the same
//!   `(date, employee)` pair; names compare trimmed and case-insensitive.
//! - Calendar events that would fail assignment validation are dropped.
//! - Calendar failures surface as `CalendarUnavailable` and are not retried.

use crate::model::week::{DateRange, EntrySource, WeekEntry, WeekView};
use crate::repo::assignment_repo::{AssignmentStore, RepoError};
use crate::repo::calendar_repo::{CalendarError, CalendarSource};
use chrono::NaiveDate;
use log::{info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failure while assembling a week view.
#[derive(Debug)]
pub enum WeekError {
    CalendarUnavailable(CalendarError),
    StoreUnavailable(RepoError),
}

impl Display for WeekError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CalendarUnavailable(err) => write!(f, "{err}"),
            Self::StoreUnavailable(err) => write!(f, "Cannot access assignment store: {err}"),
        }
    }
}

impl Error for WeekError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CalendarUnavailable(err) => Some(err),
            Self::StoreUnavailable(err) => Some(err),
        }
    }
}

impl From<CalendarError> for WeekError {
    fn from(value: CalendarError) -> Self {
        Self::CalendarUnavailable(value)
    }
}

impl From<RepoError> for WeekError {
    fn from(value: RepoError) -> Self {
        Self::StoreUnavailable(value)
    }
}

/// Reconciles one calendar with the assignment store.
pub struct WeekReconciler<C: CalendarSource, A: AssignmentStore> {
    calendar: C,
    store: A,
    calendar_id: String,
}

impl<C: CalendarSource, A: AssignmentStore> WeekReconciler<C, A> {
    pub fn new(calendar: C, store: A, calendar_id: impl Into<String>) -> Self {
        Self {
            calendar,
            store,
            calendar_id: calendar_id.into(),
        }
    }

    /// Builds the view for `[week_start, week_start + 7 days)`.
    pub fn get_week(&self, week_start: NaiveDate) -> Result<WeekView, WeekError> {
        let range = DateRange::week_from(week_start);
        let events = self.calendar.events_in_range(&self.calendar_id, range)?;
        let stored = self.store.list_in_range(range)?;

        let taken = stored
            .iter()
            .map(|assignment| assignment.slot_key())
            .collect::<HashSet<_>>();

        let mut entries = stored
            .into_iter()
            .map(|assignment| WeekEntry {
                assignment,
                source: EntrySource::Stored,
            })
            .collect::<Vec<_>>();

        let mut suggested = HashSet::new();
        let mut dropped = 0usize;
        for event in events {
            if !range.contains(event.date) {
                continue;
            }
            let assignment = event.to_assignment();
            if assignment.validate().is_err() {
                dropped += 1;
                continue;
            }
            let key = assignment.slot_key();
            if taken.contains(&key) || !suggested.insert(key) {
                continue;
            }
            entries.push(WeekEntry {
                assignment,
                source: EntrySource::Calendar,
            });
        }

        if dropped > 0 {
            warn!("event=week_reconcile module=service status=partial dropped_events={dropped}");
        }

        entries.sort_by(|left, right| {
            (
                left.assignment.date,
                &left.assignment.start,
                &left.assignment.name,
            )
                .cmp(&(
                    right.assignment.date,
                    &right.assignment.start,
                    &right.assignment.name,
                ))
        });

        info!(
            "event=week_reconcile module=service status=ok week_start={week_start} entries={}",
            entries.len()
        );
        Ok(WeekView {
            week_start,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{WeekError, WeekReconciler};
    use crate::model::assignment::Assignment;
    use crate::model::week::{CalendarEvent, DateRange, EntrySource};
    use crate::repo::assignment_repo::{AssignmentStore, RepoResult};
    use crate::repo::calendar_repo::{CalendarError, CalendarSource};
    use chrono::NaiveDate;
    use std::cell::Cell;

    struct FakeCalendar {
        events: Result<Vec<CalendarEvent>, CalendarError>,
    }

    impl CalendarSource for FakeCalendar {
        fn events_in_range(
            &self,
            _calendar_id: &str,
            _range: DateRange,
        ) -> Result<Vec<CalendarEvent>, CalendarError> {
            self.events.clone()
        }
    }

    struct FakeStore {
        rows: Vec<Assignment>,
        reads: Cell<usize>,
    }

    impl AssignmentStore for FakeStore {
        fn list_in_range(&self, _range: DateRange) -> RepoResult<Vec<Assignment>> {
            self.reads.set(self.reads.get() + 1);
            Ok(self.rows.clone())
        }

        fn upsert(&self, _assignment: &Assignment) -> RepoResult<()> {
            Ok(())
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).expect("valid date")
    }

    fn event(subject: &str, d: u32, start: &str, end: &str) -> CalendarEvent {
        CalendarEvent {
            subject: subject.to_string(),
            date: day(d),
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    fn store(rows: Vec<Assignment>) -> FakeStore {
        FakeStore {
            rows,
            reads: Cell::new(0),
        }
    }

    #[test]
    fn stored_assignment_overrides_calendar_event_for_same_slot() {
        let calendar = FakeCalendar {
            events: Ok(vec![
                event("alice ", 3, "08:00", "12:00"),
                event("Bob", 3, "12:00", "16:00"),
            ]),
        };
        let reconciler = WeekReconciler::new(
            calendar,
            store(vec![Assignment::new("Alice", day(3), "09:00", "13:00")]),
            "cafe",
        );

        let week = reconciler.get_week(day(3)).expect("week");
        assert_eq!(week.entries.len(), 2);
        assert_eq!(week.entries[0].assignment.name, "Alice");
        assert_eq!(week.entries[0].assignment.start, "09:00");
        assert_eq!(week.entries[0].source, EntrySource::Stored);
        assert_eq!(week.entries[1].assignment.name, "Bob");
        assert_eq!(week.entries[1].source, EntrySource::Calendar);
    }

    #[test]
    fn malformed_and_out_of_range_events_are_dropped() {
        let calendar = FakeCalendar {
            events: Ok(vec![
                event("", 3, "08:00", "12:00"),
                event("Cara", 4, "14:00", "13:00"),
                event("Dan", 20, "08:00", "12:00"),
                event("Eve", 5, "08:00", "12:00"),
                event("Eve", 5, "08:00", "12:00"),
            ]),
        };
        let reconciler = WeekReconciler::new(calendar, store(Vec::new()), "cafe");

        let week = reconciler.get_week(day(3)).expect("week");
        let names = week
            .entries
            .iter()
            .map(|entry| entry.assignment.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Eve"]);
    }

    #[test]
    fn entries_are_sorted_by_date_then_start() {
        let calendar = FakeCalendar {
            events: Ok(vec![event("Zed", 3, "06:00", "07:00")]),
        };
        let reconciler = WeekReconciler::new(
            calendar,
            store(vec![
                Assignment::new("Amy", day(4), "06:00", "07:00"),
                Assignment::new("Ben", day(3), "09:00", "10:00"),
            ]),
            "cafe",
        );

        let week = reconciler.get_week(day(3)).expect("week");
        let names = week
            .entries
            .iter()
            .map(|entry| entry.assignment.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Zed", "Ben", "Amy"]);
    }

    #[test]
    fn calendar_failure_is_surfaced_before_store_read() {
        let calendar = FakeCalendar {
            events: Err(CalendarError::Unavailable {
                calendar_id: "cafe".to_string(),
                cause: "timed out".to_string(),
            }),
        };
        let fake_store = store(Vec::new());
        let reconciler = WeekReconciler::new(calendar, &fake_store, "cafe");

        let err = reconciler.get_week(day(3)).expect_err("must fail");
        assert!(matches!(err, WeekError::CalendarUnavailable(_)));
        assert!(err.to_string().contains("Cannot access calendar"));
        assert_eq!(fake_store.reads.get(), 0);
    }
}
