//! Assignment store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide range reads and single-record upserts over `assignments`.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths call `Assignment::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - One `(date, name)` pair holds at most one assignment, with names
//!   trimmed and compared case-insensitively; writes are single-statement
//!   upserts, so a write fully applies or fails.
//! - The latest write decides the stored spelling of the name.

use crate::db::DbError;
use crate::model::assignment::{Assignment, AssignmentValidationError};
use crate::model::week::DateRange;
use chrono::NaiveDate;
use log::{error, info};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by all SQLite-backed stores.
#[derive(Debug)]
pub enum RepoError {
    Validation(AssignmentValidationError),
    Db(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<AssignmentValidationError> for RepoError {
    fn from(value: AssignmentValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Persisted assignment records.
pub trait AssignmentStore {
    /// Returns assignments with `range.start <= date < range.end`, ordered by
    /// date, start time and name.
    fn list_in_range(&self, range: DateRange) -> RepoResult<Vec<Assignment>>;
    /// Inserts or replaces the assignment for its `(date, name)` slot.
    fn upsert(&self, assignment: &Assignment) -> RepoResult<()>;
}

impl<T: AssignmentStore + ?Sized> AssignmentStore for &T {
    fn list_in_range(&self, range: DateRange) -> RepoResult<Vec<Assignment>> {
        (**self).list_in_range(range)
    }

    fn upsert(&self, assignment: &Assignment) -> RepoResult<()> {
        (**self).upsert(assignment)
    }
}

/// SQLite-backed assignment store.
pub struct SqliteAssignmentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAssignmentRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AssignmentStore for SqliteAssignmentRepository<'_> {
    fn list_in_range(&self, range: DateRange) -> RepoResult<Vec<Assignment>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, name, start_time, end_time
             FROM assignments
             WHERE date >= ?1 AND date < ?2
             ORDER BY date ASC, start_time ASC, name ASC;",
        )?;

        let mut rows = stmt.query(params![
            date_to_db(range.start),
            date_to_db(range.end)
        ])?;
        let mut assignments = Vec::new();
        while let Some(row) = rows.next()? {
            assignments.push(parse_assignment_row(row)?);
        }

        Ok(assignments)
    }

    fn upsert(&self, assignment: &Assignment) -> RepoResult<()> {
        let assignment = assignment.clone().normalized();
        assignment.validate()?;

        let result = self.conn.execute(
            "INSERT INTO assignments (date, name, start_time, end_time)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (date, name) DO UPDATE SET
                name = excluded.name,
                start_time = excluded.start_time,
                end_time = excluded.end_time,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                date_to_db(assignment.date),
                assignment.name.as_str(),
                assignment.start.as_str(),
                assignment.end.as_str(),
            ],
        );

        match result {
            Ok(_) => {
                info!(
                    "event=assignment_upsert module=repo status=ok date={}",
                    date_to_db(assignment.date)
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=assignment_upsert module=repo status=error error_code=store_write_failed error={err}"
                );
                Err(err.into())
            }
        }
    }
}

fn parse_assignment_row(row: &Row<'_>) -> RepoResult<Assignment> {
    let date_text: String = row.get("date")?;
    let date = parse_db_date(&date_text, "assignments.date")?;

    let assignment = Assignment {
        name: row.get("name")?,
        date,
        start: row.get("start_time")?,
        end: row.get("end_time")?,
    };
    assignment.validate().map_err(|err| {
        RepoError::InvalidData(format!(
            "assignment `{}` on {date_text} is invalid: {err}",
            assignment.name
        ))
    })?;
    Ok(assignment)
}

pub(crate) fn date_to_db(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn parse_db_date(value: &str, column: &str) -> RepoResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| RepoError::InvalidData(format!("invalid date `{value}` in {column}")))
}
