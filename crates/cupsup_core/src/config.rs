//! Process configuration resolved from environment variables.
//!
//! # Responsibility
//! - Locate the SQLite database, log directory and level.
//! - Load SMS credentials without ever hard-coding them.
//!
//! # Invariants
//! - Blank variables are treated as unset.
//! - SMS credentials are all-or-nothing: a partial set counts as missing.

use crate::logging::default_log_level;
use crate::sms::TwilioCredentials;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DB_PATH: &str = "CUPSUP_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "CUPSUP_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "CUPSUP_LOG_DIR";
pub const ENV_SMS_TIMEOUT_MS: &str = "CUPSUP_SMS_TIMEOUT_MS";
pub const ENV_TWILIO_SID: &str = "TWILIO_SID";
pub const ENV_TWILIO_AUTH: &str = "TWILIO_AUTH";
pub const ENV_TWILIO_FROM: &str = "TWILIO_FROM";

const DEFAULT_DB_FILE_NAME: &str = "cupsup_scheduler.sqlite3";
const DEFAULT_SMS_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolved runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// Logging stays disabled when unset.
    pub log_dir: Option<PathBuf>,
    pub sms_credentials: Option<TwilioCredentials>,
    /// Upper bound for one SMS provider request.
    pub sms_timeout: Duration,
}

impl AppConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which returns a variable's value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let db_path = read(ENV_DB_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME));

        let sms_credentials = match (
            read(ENV_TWILIO_SID),
            read(ENV_TWILIO_AUTH),
            read(ENV_TWILIO_FROM),
        ) {
            (Some(account_sid), Some(auth_token), Some(from)) => Some(TwilioCredentials {
                account_sid,
                auth_token,
                from,
            }),
            _ => None,
        };

        let sms_timeout = read(ENV_SMS_TIMEOUT_MS)
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|millis| *millis > 0)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SMS_TIMEOUT);

        Self {
            db_path,
            log_level: read(ENV_LOG_LEVEL).unwrap_or_else(|| default_log_level().to_string()),
            log_dir: read(ENV_LOG_DIR).map(PathBuf::from),
            sms_credentials,
            sms_timeout,
        }
    }
}
