use cupsup_api::{ApiRequest, ApiResponse, ApiRouter, ApiStatus};
use cupsup_core::db::open_db_in_memory;
use cupsup_core::{
    Employee, FixedClock, ProviderError, Settings, SmsReceipt, SmsTransport,
    SqliteSettingsRepository, OPT_OUT_NOTICE,
};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<(String, String)>>,
    failures: HashMap<String, u32>,
}

impl RecordingTransport {
    fn failing(phone: &str, code: u32) -> Self {
        Self {
            failures: HashMap::from([(phone.to_string(), code)]),
            ..Self::default()
        }
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl SmsTransport for RecordingTransport {
    fn send(&self, to: &str, body: &str) -> Result<SmsReceipt, ProviderError> {
        if let Some(code) = self.failures.get(to) {
            return Err(ProviderError::from_code(*code, "rejected by provider"));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((to.to_string(), body.to_string()));
        Ok(SmsReceipt {
            message_id: format!("SM{}", sent.len()),
        })
    }
}

fn seeded_db(employees: Vec<Employee>) -> Connection {
    let conn = open_db_in_memory().unwrap();
    SqliteSettingsRepository::new(&conn)
        .replace_settings(&Settings {
            calendar_id: "cafe".to_string(),
            employees,
            group_numbers: Vec::new(),
            cooldown_ms: 60_000,
        })
        .unwrap();
    conn
}

fn call(router: &ApiRouter<'_, &RecordingTransport, FixedClock>, request: Value) -> Value {
    let raw = router.handle_json(&request.to_string());
    serde_json::from_str(&raw).unwrap()
}

fn save(assignment: Value) -> Value {
    json!({ "op": "saveAssignment", "assignment": assignment })
}

#[test]
fn inverted_range_is_rejected_and_never_persisted() {
    let conn = seeded_db(Vec::new());
    let transport = RecordingTransport::default();
    let router = ApiRouter::new(&conn, &transport, FixedClock(0));

    let response = call(
        &router,
        save(json!({ "name": "Alice", "date": "2025-03-03", "start": "13:00", "end": "09:00" })),
    );
    assert_eq!(response["status"], "error");
    assert_eq!(response["error"]["code"], "validation_error");
    assert_eq!(response["error"]["details"]["reason"], "inverted_range");

    let week = call(&router, json!({ "op": "getWeek", "weekStart": "2025-03-03" }));
    assert_eq!(week["status"], "ok");
    assert_eq!(week["data"]["entries"], json!([]));
}

#[test]
fn empty_name_is_rejected_with_missing_name() {
    let conn = seeded_db(Vec::new());
    let transport = RecordingTransport::default();
    let router = ApiRouter::new(&conn, &transport, FixedClock(0));

    let response = call(
        &router,
        save(json!({ "name": "   ", "date": "2025-03-03", "start": "09:00", "end": "13:00" })),
    );
    assert_eq!(response["error"]["details"]["reason"], "missing_name");

    let response = call(
        &router,
        save(json!({ "name": "Alice", "date": "2025-03-03", "start": "9:00", "end": "13:00" })),
    );
    assert_eq!(response["error"]["details"]["reason"], "bad_time_format");
}

#[test]
fn saved_assignment_appears_in_week_view() {
    let conn = seeded_db(Vec::new());
    let transport = RecordingTransport::default();
    let router = ApiRouter::new(&conn, &transport, FixedClock(0));

    let saved = call(
        &router,
        save(json!({ "name": "Alice", "date": "2025-03-05", "start": "07:30", "end": "11:45" })),
    );
    assert_eq!(saved["status"], "ok");

    let week = call(&router, json!({ "op": "getWeek", "weekStart": "2025-03-03" }));
    let entries = week["data"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"], "Alice");
    assert_eq!(entries[0]["date"], "2025-03-05");
    assert_eq!(entries[0]["start"], "07:30");
    assert_eq!(entries[0]["end"], "11:45");
    assert_eq!(entries[0]["source"], "stored");
}

#[test]
fn padded_name_is_echoed_as_stored() {
    let conn = seeded_db(Vec::new());
    let transport = RecordingTransport::default();
    let router = ApiRouter::new(&conn, &transport, FixedClock(0));

    let saved = call(
        &router,
        save(json!({ "name": " Alice ", "date": "2025-03-05", "start": "09:00", "end": "13:00" })),
    );
    assert_eq!(saved["status"], "ok");

    let week = call(&router, json!({ "op": "getWeek", "weekStart": "2025-03-03" }));
    let entry = &week["data"]["entries"][0];
    for field in ["name", "date", "start", "end"] {
        assert_eq!(entry[field], saved["data"][field], "field {field}");
    }
    assert_eq!(entry["name"], "Alice");
}

#[test]
fn case_variant_names_update_the_same_slot() {
    let conn = seeded_db(Vec::new());
    let transport = RecordingTransport::default();
    let router = ApiRouter::new(&conn, &transport, FixedClock(0));

    call(
        &router,
        save(json!({ "name": "Alice", "date": "2025-03-05", "start": "09:00", "end": "13:00" })),
    );
    call(
        &router,
        save(json!({ "name": "alice", "date": "2025-03-05", "start": "10:00", "end": "14:00" })),
    );

    let week = call(&router, json!({ "op": "getWeek", "weekStart": "2025-03-03" }));
    let entries = week["data"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"], "alice");
    assert_eq!(entries[0]["start"], "10:00");
    assert_eq!(entries[0]["source"], "stored");
}

#[test]
fn roster_broadcast_skips_invalid_phone_and_reports_partial_failure() {
    let conn = seeded_db(vec![
        Employee::new("Alice", "+15551230000"),
        Employee::new("Bob", "invalid"),
    ]);
    let transport = RecordingTransport::default();
    let router = ApiRouter::new(&conn, &transport, FixedClock(1_000));

    let response = call(
        &router,
        json!({ "op": "sendGroupChat", "weekStart": "2025-03-03" }),
    );

    assert_eq!(response["status"], "ok");
    assert_eq!(response["data"]["outcome"], "partialFailure");
    assert_eq!(response["data"]["sent"], 1);
    assert_eq!(response["data"]["weekStart"], "2025-03-03");
    let failures = response["data"]["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["recipient"]["name"], "Bob");
    assert_eq!(failures[0]["reason"], "skipped_invalid_phone");

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "+15551230000");
    assert!(sent[0].1.ends_with(OPT_OUT_NOTICE));
}

#[test]
fn provider_invalid_number_is_classified_per_recipient() {
    let conn = seeded_db(vec![
        Employee::new("Alice", "+15551230000"),
        Employee::new("Carol", "+15557770000"),
    ]);
    let transport = RecordingTransport::failing("+15557770000", 21211);
    let router = ApiRouter::new(&conn, &transport, FixedClock(1_000));

    let response = call(
        &router,
        json!({ "op": "sendGroupChat", "weekStart": "2025-03-03" }),
    );

    assert_eq!(response["data"]["outcome"], "partialFailure");
    let failures = response["data"]["failures"].as_array().unwrap();
    assert_eq!(failures[0]["recipient"]["phone"], "+15557770000");
    assert_eq!(failures[0]["reason"], "invalid_number");
    assert_eq!(failures[0]["providerCode"], 21211);
    assert_eq!(transport.sent().len(), 1);
}

#[test]
fn second_broadcast_inside_cooldown_is_throttled() {
    let conn = seeded_db(vec![Employee::new("Alice", "+15551230000")]);
    let transport = RecordingTransport::default();
    let request = json!({ "op": "sendGroupChat", "weekStart": "2025-03-03" });

    let first = call(&ApiRouter::new(&conn, &transport, FixedClock(1_000)), request.clone());
    assert_eq!(first["data"]["outcome"], "sent");
    assert_eq!(first["data"]["sent"], 1);

    let second = call(&ApiRouter::new(&conn, &transport, FixedClock(60_999)), request.clone());
    assert_eq!(second["status"], "ok");
    assert_eq!(second["data"]["outcome"], "throttled");
    assert_eq!(second["data"]["retryAfterMs"], 1);
    assert_eq!(transport.sent().len(), 1);

    let third = call(&ApiRouter::new(&conn, &transport, FixedClock(61_000)), request);
    assert_eq!(third["data"]["outcome"], "sent");
    assert_eq!(transport.sent().len(), 2);
}

#[test]
fn week_without_calendar_reports_calendar_unavailable() {
    let conn = open_db_in_memory().unwrap();
    let transport = RecordingTransport::default();
    let router = ApiRouter::new(&conn, &transport, FixedClock(0));

    let response = router.handle(ApiRequest::GetWeek {
        week_start: chrono::NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
    });

    assert_eq!(response.status, ApiStatus::Error);
    let error = response.error.unwrap();
    assert_eq!(error.code, "calendar_unavailable");
    assert!(error.message.contains("Cannot access calendar"));
}

#[test]
fn malformed_and_unknown_requests_are_bad_requests() {
    let conn = seeded_db(Vec::new());
    let transport = RecordingTransport::default();
    let router = ApiRouter::new(&conn, &transport, FixedClock(0));

    for raw in ["not json", r#"{"op":"dropTables"}"#, r#"{"op":"getWeek"}"#] {
        let response: ApiResponse = serde_json::from_str(&router.handle_json(raw)).unwrap();
        assert!(!response.is_ok());
        assert_eq!(response.error.unwrap().code, "bad_request");
    }
}

#[test]
fn bootstrap_returns_roster_and_settings() {
    let conn = seeded_db(vec![Employee::new("Alice", "+15551230000")]);
    let transport = RecordingTransport::default();
    let router = ApiRouter::new(&conn, &transport, FixedClock(0));

    let response = call(&router, json!({ "op": "getBootstrap" }));
    assert_eq!(response["status"], "ok");
    assert_eq!(response["data"]["calendarId"], "cafe");
    assert_eq!(response["data"]["employees"][0]["name"], "Alice");
    assert_eq!(response["data"]["cooldownMs"], 60_000);
}
