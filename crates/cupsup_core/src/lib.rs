//! Core domain logic for the CupsUp shift scheduler.
//! This crate is the single source of truth for scheduling invariants.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sms;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::AppConfig;
pub use logging::{default_log_level, init_logging, logging_status, redact_phone, LoggingError};
pub use model::assignment::{Assignment, AssignmentValidationError};
pub use model::roster::{is_valid_phone, Employee, Settings, DEFAULT_COOLDOWN_MS};
pub use model::week::{CalendarEvent, DateRange, EntrySource, WeekEntry, WeekView};
pub use repo::assignment_repo::{AssignmentStore, RepoError, RepoResult, SqliteAssignmentRepository};
pub use repo::calendar_repo::{CalendarError, CalendarSource, SqliteCalendarSource};
pub use repo::dispatch_state_repo::{CooldownClaim, DispatchStateStore, SqliteDispatchStateStore};
pub use repo::settings_repo::{SettingsProvider, SqliteSettingsRepository};
pub use service::diagnostics::{
    check_send_test, run_diagnostics, CheckResult, CheckStatus, DiagnosticReport,
    TEST_MESSAGE_HEADER,
};
pub use service::dispatch_service::{
    BroadcastOutcome, DispatchError, FailureReason, NotificationDispatcher, Recipient,
    RecipientFailure,
};
pub use service::message::{format_schedule_message, OPT_OUT_NOTICE};
pub use service::week_service::{WeekError, WeekReconciler};
pub use sms::{
    ProviderError, ProviderErrorClass, SmsReceipt, SmsTransport, TwilioCredentials,
    TwilioTransport, UnconfiguredTransport,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
