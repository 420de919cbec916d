//! Settings and employee roster model.
//!
//! # Invariants
//! - `cooldown_ms` is never negative.
//! - Broadcast phones must match `^\+1\d{10}$`; the roster itself may hold
//!   invalid numbers, which are skipped at dispatch time.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default minimum gap between two successful broadcasts.
pub const DEFAULT_COOLDOWN_MS: i64 = 60_000;

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+1\d{10}$").expect("valid phone regex"));

/// One roster member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub name: String,
    pub phone: String,
}

impl Employee {
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
        }
    }

    pub fn has_valid_phone(&self) -> bool {
        is_valid_phone(&self.phone)
    }
}

/// Read-only configuration snapshot shared by all components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Identifier of the calendar feed events are read from.
    pub calendar_id: String,
    /// Roster in persisted order.
    pub employees: Vec<Employee>,
    /// Broadcast destinations, deduplicated and sorted.
    pub group_numbers: Vec<String>,
    pub cooldown_ms: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            calendar_id: String::new(),
            employees: Vec::new(),
            group_numbers: Vec::new(),
            cooldown_ms: DEFAULT_COOLDOWN_MS,
        }
    }
}

/// Returns whether `phone` is a US E.164 number (`+1##########`).
pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

#[cfg(test)]
mod tests {
    use super::{is_valid_phone, Employee, Settings, DEFAULT_COOLDOWN_MS};

    #[test]
    fn phone_validation_accepts_us_e164_only() {
        assert!(is_valid_phone("+15551230000"));
        assert!(!is_valid_phone("555-1234"));
        assert!(!is_valid_phone("+44123456789"));
        assert!(!is_valid_phone("+1555123000"));
        assert!(!is_valid_phone("+155512300001"));
        assert!(!is_valid_phone("15551230000"));
        assert!(!is_valid_phone("invalid"));
    }

    #[test]
    fn default_settings_use_one_minute_cooldown() {
        let settings = Settings::default();
        assert_eq!(settings.cooldown_ms, DEFAULT_COOLDOWN_MS);
        assert!(settings.employees.is_empty());
    }

    #[test]
    fn settings_serialize_with_camel_case_keys() {
        let settings = Settings {
            calendar_id: "cal".to_string(),
            employees: vec![Employee::new("Alice", "+15551230000")],
            group_numbers: vec!["+15551230000".to_string()],
            cooldown_ms: 1_000,
        };
        let json = serde_json::to_value(&settings).expect("serialize settings");
        assert_eq!(json["calendarId"], "cal");
        assert_eq!(json["groupNumbers"][0], "+15551230000");
        assert_eq!(json["cooldownMs"], 1_000);
        assert_eq!(json["employees"][0]["name"], "Alice");
    }
}
