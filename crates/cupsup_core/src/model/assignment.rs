//! Assignment domain model and validator.
//!
//! # Responsibility
//! - Define one employee's scheduled shift for one day.
//! - Decide whether an assignment is well-formed.
//!
//! # Invariants
//! - Validation rules run in fixed order; the first failure wins.
//! - `start < end` is compared lexicographically, which equals
//!   minutes-since-midnight order for fixed-width `HH:MM`.
//! - One employee-date slot is `(date, trimmed name)` compared ASCII
//!   case-insensitively, matching the `COLLATE NOCASE` store key.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static TIME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2}:\d{2}$").expect("valid time regex"));

/// One employee's shift on one calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// Employee identifier (display name from the roster).
    #[serde(default)]
    pub name: String,
    /// Shift date, `YYYY-MM-DD` on the wire.
    pub date: NaiveDate,
    /// Shift start, `HH:MM`.
    #[serde(default)]
    pub start: String,
    /// Shift end, `HH:MM`. Must sort after `start`.
    #[serde(default)]
    pub end: String,
}

/// Reason an assignment was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentValidationError {
    MissingName,
    BadTimeFormat,
    InvertedRange,
}

impl AssignmentValidationError {
    /// Stable machine-readable code used in API envelopes.
    pub fn code(self) -> &'static str {
        match self {
            Self::MissingName => "missing_name",
            Self::BadTimeFormat => "bad_time_format",
            Self::InvertedRange => "inverted_range",
        }
    }
}

impl Display for AssignmentValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingName => write!(f, "assignment name is required"),
            Self::BadTimeFormat => write!(f, "start and end must use HH:MM format"),
            Self::InvertedRange => write!(f, "start time must be before end time"),
        }
    }
}

impl Error for AssignmentValidationError {}

impl Assignment {
    pub fn new(
        name: impl Into<String>,
        date: NaiveDate,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            date,
            start: start.into(),
            end: end.into(),
        }
    }

    /// Validates the assignment without side effects.
    ///
    /// # Errors
    /// - `MissingName` when `name` is empty or whitespace only.
    /// - `BadTimeFormat` when either time is not `HH:MM`.
    /// - `InvertedRange` when `start >= end`.
    pub fn validate(&self) -> Result<(), AssignmentValidationError> {
        if self.name.trim().is_empty() {
            return Err(AssignmentValidationError::MissingName);
        }
        if !is_valid_time(&self.start) || !is_valid_time(&self.end) {
            return Err(AssignmentValidationError::BadTimeFormat);
        }
        if self.start >= self.end {
            return Err(AssignmentValidationError::InvertedRange);
        }
        Ok(())
    }

    /// Returns the assignment in its stored form (name trimmed).
    pub fn normalized(mut self) -> Self {
        let trimmed = self.name.trim();
        if trimmed.len() != self.name.len() {
            self.name = trimmed.to_string();
        }
        self
    }

    /// Key used to pair stored assignments with calendar events.
    pub(crate) fn slot_key(&self) -> (NaiveDate, String) {
        (self.date, self.name.trim().to_ascii_lowercase())
    }
}

/// Returns whether `value` is a zero-padded `HH:MM` string.
pub fn is_valid_time(value: &str) -> bool {
    TIME_RE.is_match(value)
}
