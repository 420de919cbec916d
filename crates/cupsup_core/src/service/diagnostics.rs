//! Deployment self-check.
//!
//! Mirrors the admin "run tests" menu: each check inspects one collaborator
//! and reports `pass`, `warn` or `fail`. `run_diagnostics` never sends SMS
//! and never writes to the store. `check_send_test` is the one opt-in check
//! that sends, and it never touches the broadcast cooldown.

use crate::config::AppConfig;
use crate::logging::redact_phone;
use crate::model::roster::{is_valid_phone, Settings};
use crate::model::week::DateRange;
use crate::repo::assignment_repo::SqliteAssignmentRepository;
use crate::repo::calendar_repo::{CalendarSource, SqliteCalendarSource};
use crate::repo::settings_repo::{SettingsProvider, SqliteSettingsRepository};
use crate::service::message::OPT_OUT_NOTICE;
use crate::service::week_service::WeekReconciler;
use crate::sms::SmsTransport;
use chrono::NaiveDate;
use log::{info, warn};
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub detail: String,
}

impl CheckResult {
    fn new(name: &'static str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name,
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticReport {
    pub checks: Vec<CheckResult>,
}

impl DiagnosticReport {
    pub fn passed(&self) -> bool {
        self.checks
            .iter()
            .all(|check| check.status != CheckStatus::Fail)
    }

    pub fn count(&self, status: CheckStatus) -> usize {
        self.checks
            .iter()
            .filter(|check| check.status == status)
            .count()
    }
}

/// Runs every check against `conn` for the week starting at `week_start`.
pub fn run_diagnostics(
    conn: &Connection,
    config: &AppConfig,
    week_start: NaiveDate,
) -> DiagnosticReport {
    let mut checks = Vec::new();

    let settings = match SqliteSettingsRepository::new(conn).load_settings() {
        Ok(settings) => {
            checks.push(check_settings(&settings));
            Some(settings)
        }
        Err(err) => {
            checks.push(CheckResult::new("settings", CheckStatus::Fail, err.to_string()));
            None
        }
    };

    if let Some(settings) = &settings {
        checks.push(check_employees(settings));
        checks.push(check_calendar(conn, settings, week_start));
    }
    checks.push(check_sms_credentials(config));
    if let Some(settings) = &settings {
        checks.push(check_fetch_week(conn, settings, week_start));
        checks.push(check_group_numbers(settings));
    }

    let report = DiagnosticReport { checks };
    info!(
        "event=diagnostics module=service status={} pass={} warn={} fail={}",
        if report.passed() { "ok" } else { "error" },
        report.count(CheckStatus::Pass),
        report.count(CheckStatus::Warn),
        report.count(CheckStatus::Fail)
    );
    report
}

/// Header line of the diagnostic test message.
pub const TEST_MESSAGE_HEADER: &str = "☕ CupsUp test message";

/// Sends one test SMS to `phone` through `transport`.
///
/// Fails without sending when `phone` is not `+1##########`.
pub fn check_send_test<T: SmsTransport>(transport: T, phone: &str) -> CheckResult {
    if !is_valid_phone(phone) {
        return CheckResult::new(
            "send_test",
            CheckStatus::Fail,
            "phone must match +1##########",
        );
    }

    let body = format!("{TEST_MESSAGE_HEADER}\n{OPT_OUT_NOTICE}");
    match transport.send(phone, &body) {
        Ok(receipt) => {
            info!(
                "event=diagnostics_send module=service status=ok to={} message_id={}",
                redact_phone(phone),
                receipt.message_id
            );
            CheckResult::new(
                "send_test",
                CheckStatus::Pass,
                format!("sent {}", receipt.message_id),
            )
        }
        Err(err) => {
            warn!(
                "event=diagnostics_send module=service status=error to={} class={:?} code={:?}",
                redact_phone(phone),
                err.class,
                err.code
            );
            CheckResult::new("send_test", CheckStatus::Fail, err.to_string())
        }
    }
}

fn check_settings(settings: &Settings) -> CheckResult {
    if settings.calendar_id.trim().is_empty() {
        return CheckResult::new("settings", CheckStatus::Fail, "calendar id is not set");
    }
    CheckResult::new(
        "settings",
        CheckStatus::Pass,
        format!("cooldown {} ms", settings.cooldown_ms),
    )
}

fn check_employees(settings: &Settings) -> CheckResult {
    if settings.employees.is_empty() {
        return CheckResult::new("employees", CheckStatus::Warn, "roster is empty");
    }
    let invalid = settings
        .employees
        .iter()
        .filter(|employee| employee.name.trim().is_empty() || !employee.has_valid_phone())
        .map(|employee| employee.name.clone())
        .collect::<Vec<_>>();
    if invalid.is_empty() {
        CheckResult::new(
            "employees",
            CheckStatus::Pass,
            format!("{} employees", settings.employees.len()),
        )
    } else {
        CheckResult::new(
            "employees",
            CheckStatus::Warn,
            format!("invalid name or phone for: {}", invalid.join(", ")),
        )
    }
}

fn check_calendar(conn: &Connection, settings: &Settings, week_start: NaiveDate) -> CheckResult {
    match SqliteCalendarSource::new(conn)
        .events_in_range(&settings.calendar_id, DateRange::week_from(week_start))
    {
        Ok(events) => CheckResult::new(
            "calendar",
            CheckStatus::Pass,
            format!("{} events this week", events.len()),
        ),
        Err(err) => CheckResult::new("calendar", CheckStatus::Fail, err.to_string()),
    }
}

fn check_sms_credentials(config: &AppConfig) -> CheckResult {
    match &config.sms_credentials {
        Some(credentials) if is_valid_phone(&credentials.from) => {
            CheckResult::new("sms_credentials", CheckStatus::Pass, "credentials present")
        }
        Some(_) => CheckResult::new(
            "sms_credentials",
            CheckStatus::Warn,
            "sender number is not +1##########",
        ),
        None => CheckResult::new(
            "sms_credentials",
            CheckStatus::Fail,
            "TWILIO_SID, TWILIO_AUTH and TWILIO_FROM must all be set",
        ),
    }
}

fn check_fetch_week(conn: &Connection, settings: &Settings, week_start: NaiveDate) -> CheckResult {
    let reconciler = WeekReconciler::new(
        SqliteCalendarSource::new(conn),
        SqliteAssignmentRepository::new(conn),
        settings.calendar_id.clone(),
    );
    match reconciler.get_week(week_start) {
        Ok(week) => CheckResult::new(
            "fetch_week",
            CheckStatus::Pass,
            format!("{} entries", week.entries.len()),
        ),
        Err(err) => CheckResult::new("fetch_week", CheckStatus::Fail, err.to_string()),
    }
}

fn check_group_numbers(settings: &Settings) -> CheckResult {
    if settings.group_numbers.is_empty() {
        return CheckResult::new(
            "group_numbers",
            CheckStatus::Warn,
            "no group numbers; broadcasts go to the roster",
        );
    }
    let invalid = settings
        .group_numbers
        .iter()
        .filter(|phone| !is_valid_phone(phone))
        .count();
    if invalid == 0 {
        CheckResult::new(
            "group_numbers",
            CheckStatus::Pass,
            format!("{} numbers", settings.group_numbers.len()),
        )
    } else {
        CheckResult::new(
            "group_numbers",
            CheckStatus::Warn,
            format!("{invalid} numbers will be skipped"),
        )
    }
}
