//! Calendar source contract and the SQLite-mirrored feed.
//!
//! # Responsibility
//! - Return calendar events for a date range, ordered by date and start.
//! - Report an unreachable calendar as one distinct condition.
//!
//! # Invariants
//! - Any failure to read the feed maps to `CalendarError::Unavailable`.
//! - Rows are returned as stored; shape checks belong to the reconciler.

use crate::model::week::{CalendarEvent, DateRange};
use crate::repo::assignment_repo::{date_to_db, parse_db_date};
use log::{error, info};
use rusqlite::{params, Connection};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Calendar feed failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    /// Feed unreachable, timed out, or returned unreadable data.
    Unavailable { calendar_id: String, cause: String },
}

impl Display for CalendarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable { calendar_id, cause } => {
                write!(f, "Cannot access calendar `{calendar_id}`: {cause}")
            }
        }
    }
}

impl Error for CalendarError {}

/// Source of externally managed calendar events.
pub trait CalendarSource {
    fn events_in_range(
        &self,
        calendar_id: &str,
        range: DateRange,
    ) -> Result<Vec<CalendarEvent>, CalendarError>;
}

impl<T: CalendarSource + ?Sized> CalendarSource for &T {
    fn events_in_range(
        &self,
        calendar_id: &str,
        range: DateRange,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        (**self).events_in_range(calendar_id, range)
    }
}

/// Calendar feed mirrored into the local `calendar_events` table.
pub struct SqliteCalendarSource<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCalendarSource<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Replaces all mirrored events of `calendar_id` inside `range`.
    ///
    /// Returns the number of events written.
    pub fn replace_events(
        &self,
        calendar_id: &str,
        range: DateRange,
        events: &[CalendarEvent],
    ) -> rusqlite::Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM calendar_events WHERE calendar_id = ?1 AND date >= ?2 AND date < ?3;",
            params![calendar_id, date_to_db(range.start), date_to_db(range.end)],
        )?;

        let mut written = 0;
        for event in events.iter().filter(|event| range.contains(event.date)) {
            tx.execute(
                "INSERT INTO calendar_events (uuid, calendar_id, subject, date, start_time, end_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    Uuid::new_v4().to_string(),
                    calendar_id,
                    event.subject.as_str(),
                    date_to_db(event.date),
                    event.start.as_str(),
                    event.end.as_str(),
                ],
            )?;
            written += 1;
        }
        tx.commit()?;

        info!("event=calendar_import module=calendar status=ok events={written}");
        Ok(written)
    }

    fn query_events(
        &self,
        calendar_id: &str,
        range: DateRange,
    ) -> Result<Vec<CalendarEvent>, String> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT subject, date, start_time, end_time
                 FROM calendar_events
                 WHERE calendar_id = ?1 AND date >= ?2 AND date < ?3
                 ORDER BY date ASC, start_time ASC, subject ASC;",
            )
            .map_err(|err| err.to_string())?;
        let mut rows = stmt
            .query(params![
                calendar_id,
                date_to_db(range.start),
                date_to_db(range.end)
            ])
            .map_err(|err| err.to_string())?;

        let mut events = Vec::new();
        while let Some(row) = rows.next().map_err(|err| err.to_string())? {
            let date_text: String = row.get("date").map_err(|err| err.to_string())?;
            let date = parse_db_date(&date_text, "calendar_events.date")
                .map_err(|err| err.to_string())?;
            events.push(CalendarEvent {
                subject: row.get("subject").map_err(|err| err.to_string())?,
                date,
                start: row.get("start_time").map_err(|err| err.to_string())?,
                end: row.get("end_time").map_err(|err| err.to_string())?,
            });
        }
        Ok(events)
    }
}

impl CalendarSource for SqliteCalendarSource<'_> {
    fn events_in_range(
        &self,
        calendar_id: &str,
        range: DateRange,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        if calendar_id.trim().is_empty() {
            return Err(CalendarError::Unavailable {
                calendar_id: String::new(),
                cause: "no calendar configured".to_string(),
            });
        }

        match self.query_events(calendar_id, range) {
            Ok(events) => {
                info!(
                    "event=calendar_fetch module=calendar status=ok events={}",
                    events.len()
                );
                Ok(events)
            }
            Err(cause) => {
                error!(
                    "event=calendar_fetch module=calendar status=error error_code=calendar_unavailable error={cause}"
                );
                Err(CalendarError::Unavailable {
                    calendar_id: calendar_id.to_string(),
                    cause,
                })
            }
        }
    }
}
