//! Outbound SMS transport contract and provider error classes.
//!
//! # Responsibility
//! - Define the single-message send contract used by the dispatcher.
//! - Map vendor error codes onto a closed set of error classes.
//!
//! # Invariants
//! - Every transport failure carries exactly one `ProviderErrorClass`.
//! - Unknown vendor codes map to `AccountError` so they are never mistaken
//!   for a bad recipient.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod twilio;

pub use twilio::{TwilioCredentials, TwilioTransport};

/// Maximum body length accepted by the provider for one message.
pub const MAX_SMS_BODY_CHARS: usize = 1600;

/// Categorized outcome of a failed send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorClass {
    /// Destination is not a valid phone number.
    InvalidNumber,
    /// Destination unverified, opted out, unreachable, or the request timed out.
    Unreachable,
    /// Credentials, permissions or account state prevent sending.
    AccountError,
}

/// Send failure reported by an SMS transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderError {
    pub class: ProviderErrorClass,
    /// Vendor error code when the provider returned one.
    pub code: Option<u32>,
    pub message: String,
}

impl ProviderError {
    pub fn new(class: ProviderErrorClass, code: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            class,
            code,
            message: message.into(),
        }
    }

    /// Builds an error from a vendor code using `classify_provider_code`.
    pub fn from_code(code: u32, message: impl Into<String>) -> Self {
        Self::new(classify_provider_code(code), Some(code), message)
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "provider error {code}: {}", self.message),
            None => write!(f, "provider error: {}", self.message),
        }
    }
}

impl Error for ProviderError {}

/// Provider acknowledgment for one accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsReceipt {
    pub message_id: String,
}

/// Sends one SMS to one destination.
///
/// Implementations must bound the call duration and report a timeout as
/// `ProviderErrorClass::Unreachable`.
pub trait SmsTransport {
    fn send(&self, to: &str, body: &str) -> Result<SmsReceipt, ProviderError>;
}

impl<T: SmsTransport + ?Sized> SmsTransport for &T {
    fn send(&self, to: &str, body: &str) -> Result<SmsReceipt, ProviderError> {
        (**self).send(to, body)
    }
}

/// Transport used when no SMS credentials are configured.
///
/// Every send fails with `AccountError`, so broadcasts surface the
/// misconfiguration per recipient instead of aborting.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredTransport;

impl SmsTransport for UnconfiguredTransport {
    fn send(&self, _to: &str, _body: &str) -> Result<SmsReceipt, ProviderError> {
        Err(ProviderError::new(
            ProviderErrorClass::AccountError,
            None,
            "SMS credentials are not configured",
        ))
    }
}

/// Maps a Twilio error code onto a provider error class.
pub fn classify_provider_code(code: u32) -> ProviderErrorClass {
    match code {
        // Invalid 'To' number, not a mobile number, invalid/unsupported format.
        21211 | 21217 | 21401 | 21407 | 21421 => ProviderErrorClass::InvalidNumber,
        // Unverified trial destination, opted-out, no route, unreachable handset.
        21608 | 21610 | 21612 | 21614 | 30003 | 30005 | 30006 => {
            ProviderErrorClass::Unreachable
        }
        // 20003 authentication, 20005/20008 account state, 21606 bad sender.
        _ => ProviderErrorClass::AccountError,
    }
}
