//! Week window, calendar events and the reconciled week view.

use crate::model::assignment::Assignment;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Number of days covered by one week view.
pub const WEEK_LENGTH_DAYS: u64 = 7;

/// Half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Returns `[week_start, week_start + 7 days)`.
    ///
    /// Saturates at the maximum representable date.
    pub fn week_from(week_start: NaiveDate) -> Self {
        let end = week_start
            .checked_add_days(Days::new(WEEK_LENGTH_DAYS))
            .unwrap_or(NaiveDate::MAX);
        Self {
            start: week_start,
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }
}

/// One event read from the calendar feed.
///
/// `subject` carries the employee name the shift belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub subject: String,
    pub date: NaiveDate,
    pub start: String,
    pub end: String,
}

impl CalendarEvent {
    /// Projects the event onto the assignment shape.
    pub fn to_assignment(&self) -> Assignment {
        Assignment::new(self.subject.trim(), self.date, &self.start, &self.end)
    }
}

/// Where a week entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    /// Authoritative, editable record from the assignment store.
    Stored,
    /// Read-only suggestion derived from a calendar event.
    Calendar,
}

/// Assignment annotated with its origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekEntry {
    #[serde(flatten)]
    pub assignment: Assignment,
    pub source: EntrySource,
}

impl WeekEntry {
    pub fn is_editable(&self) -> bool {
        self.source == EntrySource::Stored
    }
}

/// Reconciled schedule for one 7-day window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekView {
    pub week_start: NaiveDate,
    /// Sorted by `date`, then `start`, then `name`.
    pub entries: Vec<WeekEntry>,
}

impl WeekView {
    /// Returns only the authoritative stored entries.
    pub fn stored_assignments(&self) -> impl Iterator<Item = &Assignment> {
        self.entries
            .iter()
            .filter(|entry| entry.is_editable())
            .map(|entry| &entry.assignment)
    }
}
