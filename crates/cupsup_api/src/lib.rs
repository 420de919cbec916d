//! UI-facing RPC surface for the scheduler.
//!
//! # Responsibility
//! - Expose the closed set of operations the admin UI invokes by name.
//! - Translate every internal outcome into one `{status, data|error}` envelope.
//!
//! # Invariants
//! - `ApiRouter::handle` and `ApiRouter::handle_json` never panic and never
//!   return a raw failure; panics inside handlers become `internal` errors.
//! - Validation rejections never reach the store.
//! - Calendar and store failures are reported, not retried.

use chrono::NaiveDate;
use cupsup_core::{
    Assignment, AssignmentStore, AssignmentValidationError, BroadcastOutcome, Clock, DispatchError,
    NotificationDispatcher, Recipient, RepoError, Settings, SettingsProvider, SmsTransport,
    SqliteAssignmentRepository, SqliteCalendarSource, SqliteDispatchStateStore,
    SqliteSettingsRepository, WeekError, WeekReconciler, WeekView,
};
use log::{error, info, warn};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::{Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

/// Operations the UI may invoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ApiRequest {
    GetBootstrap,
    GetWeek { week_start: NaiveDate },
    SaveAssignment { assignment: Assignment },
    SendGroupChat { week_start: NaiveDate },
}

impl ApiRequest {
    pub fn op_name(&self) -> &'static str {
        match self {
            Self::GetBootstrap => "getBootstrap",
            Self::GetWeek { .. } => "getWeek",
            Self::SaveAssignment { .. } => "saveAssignment",
            Self::SendGroupChat { .. } => "sendGroupChat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStatus {
    Ok,
    Error,
}

/// Error half of the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable cause for display.
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Uniform response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: ApiStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,
}

impl ApiResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            status: ApiStatus::Ok,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: ApiStatus::Error,
            data: None,
            error: Some(ApiErrorBody {
                code: code.into(),
                message: message.into(),
                details: None,
            }),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ApiStatus::Ok
    }

    fn from_failure(failure: &ApiFailure) -> Self {
        let mut response = Self::error(failure.code(), failure.to_string());
        if let (ApiFailure::Validation(reason), Some(body)) = (failure, response.error.as_mut()) {
            body.details = Some(json!({ "reason": reason.code() }));
        }
        response
    }
}

/// Internal failure taxonomy before envelope translation.
#[derive(Debug)]
enum ApiFailure {
    BadRequest(String),
    Validation(AssignmentValidationError),
    Week(WeekError),
    Store(RepoError),
    Dispatch(DispatchError),
    Internal(String),
}

impl ApiFailure {
    fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Validation(_) => "validation_error",
            Self::Week(WeekError::CalendarUnavailable(_)) => "calendar_unavailable",
            Self::Week(WeekError::StoreUnavailable(_)) | Self::Store(_) | Self::Dispatch(_) => {
                "store_unavailable"
            }
            Self::Internal(_) => "internal",
        }
    }
}

impl Display for ApiFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(message) => write!(f, "bad request: {message}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Week(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "Cannot access assignment store: {err}"),
            Self::Dispatch(err) => write!(f, "{err}"),
            Self::Internal(message) => write!(f, "internal error: {message}"),
        }
    }
}

impl From<WeekError> for ApiFailure {
    fn from(value: WeekError) -> Self {
        Self::Week(value)
    }
}

impl From<RepoError> for ApiFailure {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(reason) => Self::Validation(reason),
            other => Self::Store(other),
        }
    }
}

impl From<DispatchError> for ApiFailure {
    fn from(value: DispatchError) -> Self {
        Self::Dispatch(value)
    }
}

impl From<serde_json::Error> for ApiFailure {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

/// Dispatches UI requests against one database connection.
pub struct ApiRouter<'conn, T: SmsTransport, K: Clock> {
    conn: &'conn Connection,
    transport: T,
    clock: K,
}

impl<'conn, T: SmsTransport, K: Clock> ApiRouter<'conn, T, K> {
    pub fn new(conn: &'conn Connection, transport: T, clock: K) -> Self {
        Self {
            conn,
            transport,
            clock,
        }
    }

    /// Handles one request and always returns an envelope.
    pub fn handle(&self, request: ApiRequest) -> ApiResponse {
        let started_at = Instant::now();
        let op = request.op_name();

        let result = catch_unwind(AssertUnwindSafe(|| self.dispatch(request)))
            .unwrap_or_else(|_| Err(ApiFailure::Internal("handler panicked".to_string())));

        match result {
            Ok(data) => {
                info!(
                    "event=api_call module=api op={op} status=ok duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                ApiResponse::ok(data)
            }
            Err(failure) => {
                let code = failure.code();
                if matches!(failure, ApiFailure::Validation(_) | ApiFailure::BadRequest(_)) {
                    warn!("event=api_call module=api op={op} status=rejected error_code={code}");
                } else {
                    error!(
                        "event=api_call module=api op={op} status=error duration_ms={} error_code={code} error={failure}",
                        started_at.elapsed().as_millis()
                    );
                }
                ApiResponse::from_failure(&failure)
            }
        }
    }

    /// Parses a JSON request, handles it and serializes the envelope.
    pub fn handle_json(&self, raw: &str) -> String {
        let response = match serde_json::from_str::<ApiRequest>(raw) {
            Ok(request) => self.handle(request),
            Err(err) => {
                warn!("event=api_call module=api status=rejected error_code=bad_request");
                ApiResponse::from_failure(&ApiFailure::BadRequest(err.to_string()))
            }
        };
        serde_json::to_string(&response).unwrap_or_else(|_| {
            r#"{"status":"error","error":{"code":"internal","message":"failed to encode response"}}"#
                .to_string()
        })
    }

    fn dispatch(&self, request: ApiRequest) -> Result<Value, ApiFailure> {
        match request {
            ApiRequest::GetBootstrap => self.get_bootstrap(),
            ApiRequest::GetWeek { week_start } => {
                let week = self.get_week_with(&self.settings()?, week_start)?;
                Ok(serde_json::to_value(week)?)
            }
            ApiRequest::SaveAssignment { assignment } => self.save_assignment(assignment),
            ApiRequest::SendGroupChat { week_start } => self.send_group_chat(week_start),
        }
    }

    fn settings(&self) -> Result<Settings, ApiFailure> {
        Ok(SqliteSettingsRepository::new(self.conn).load_settings()?)
    }

    fn get_bootstrap(&self) -> Result<Value, ApiFailure> {
        Ok(serde_json::to_value(self.settings()?)?)
    }

    fn get_week_with(
        &self,
        settings: &Settings,
        week_start: NaiveDate,
    ) -> Result<WeekView, ApiFailure> {
        let reconciler = WeekReconciler::new(
            SqliteCalendarSource::new(self.conn),
            SqliteAssignmentRepository::new(self.conn),
            settings.calendar_id.as_str(),
        );
        Ok(reconciler.get_week(week_start)?)
    }

    /// Echoes the record exactly as stored, so a later `getWeek` returns the
    /// same fields.
    fn save_assignment(&self, assignment: Assignment) -> Result<Value, ApiFailure> {
        let assignment = assignment.normalized();
        assignment.validate().map_err(ApiFailure::Validation)?;
        SqliteAssignmentRepository::new(self.conn).upsert(&assignment)?;
        Ok(serde_json::to_value(&assignment)?)
    }

    fn send_group_chat(&self, week_start: NaiveDate) -> Result<Value, ApiFailure> {
        let settings = self.settings()?;
        let week = self.get_week_with(&settings, week_start)?;
        let recipients = broadcast_recipients(&settings);

        let dispatcher = NotificationDispatcher::new(
            SqliteDispatchStateStore::new(self.conn),
            &self.transport,
            settings.cooldown_ms,
        );
        let outcome: BroadcastOutcome =
            dispatcher.broadcast(&week, &recipients, self.clock.now_ms())?;

        let mut data = serde_json::to_value(&outcome)?;
        if let Value::Object(fields) = &mut data {
            fields.insert("weekStart".to_string(), serde_json::to_value(week_start)?);
        }
        Ok(data)
    }
}

/// Group numbers when configured, otherwise the whole roster.
///
/// Numbers that belong to a roster employee carry that employee's name.
fn broadcast_recipients(settings: &Settings) -> Vec<Recipient> {
    if settings.group_numbers.is_empty() {
        return settings.employees.iter().map(Recipient::from).collect();
    }

    settings
        .group_numbers
        .iter()
        .map(|phone| Recipient {
            name: settings
                .employees
                .iter()
                .find(|employee| employee.phone == *phone)
                .map(|employee| employee.name.clone()),
            phone: phone.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{broadcast_recipients, ApiRequest, ApiResponse, ApiStatus};
    use cupsup_core::{Employee, Settings};
    use serde_json::json;

    #[test]
    fn requests_parse_from_op_tagged_json() {
        let request: ApiRequest =
            serde_json::from_value(json!({ "op": "getWeek", "weekStart": "2025-03-03" }))
                .expect("parse");
        assert_eq!(request.op_name(), "getWeek");

        let request: ApiRequest =
            serde_json::from_value(json!({ "op": "getBootstrap" })).expect("parse");
        assert_eq!(request, ApiRequest::GetBootstrap);

        assert!(serde_json::from_value::<ApiRequest>(json!({ "op": "deleteEverything" })).is_err());
    }

    #[test]
    fn error_envelope_omits_data() {
        let json = serde_json::to_value(ApiResponse::error("throttled", "wait")).expect("json");
        assert_eq!(json["status"], "error");
        assert!(json.get("data").is_none());
        assert_eq!(json["error"]["code"], "throttled");
    }

    #[test]
    fn ok_envelope_omits_error() {
        let response = ApiResponse::ok(json!({ "a": 1 }));
        assert_eq!(response.status, ApiStatus::Ok);
        let json = serde_json::to_value(&response).expect("json");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn recipients_prefer_group_numbers_and_attach_roster_names() {
        let settings = Settings {
            employees: vec![Employee::new("Alice", "+15551230000")],
            group_numbers: vec!["+15551230000".to_string(), "+15559990000".to_string()],
            ..Settings::default()
        };
        let recipients = broadcast_recipients(&settings);
        assert_eq!(recipients.len(), 2);
        assert_eq!(recipients[0].name.as_deref(), Some("Alice"));
        assert_eq!(recipients[1].name, None);

        let roster_only = Settings {
            employees: vec![
                Employee::new("Alice", "+15551230000"),
                Employee::new("Bob", "invalid"),
            ],
            ..Settings::default()
        };
        let recipients = broadcast_recipients(&roster_only);
        assert_eq!(recipients.len(), 2);
        assert_eq!(recipients[1].phone, "invalid");
    }
}
