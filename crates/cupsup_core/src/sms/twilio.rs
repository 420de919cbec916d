//! Twilio Messages API transport.
//!
//! # Invariants
//! - Every request is bounded by the configured client timeout.
//! - Credentials come from configuration only and never appear in logs.

use super::{ProviderError, ProviderErrorClass, SmsReceipt, SmsTransport};
use crate::logging::redact_phone;
use log::{info, warn};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.twilio.com/2010-04-01";
/// Receipt id used when an accepted message came back without a readable sid.
pub const UNKNOWN_MESSAGE_ID: &str = "unknown";

/// Account credentials and sender number.
#[derive(Clone, PartialEq, Eq)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number in E.164 form.
    pub from: String,
}

impl std::fmt::Debug for TwilioCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioCredentials")
            .field("account_sid", &"<redacted>")
            .field("auth_token", &"<redacted>")
            .field("from", &self.from)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct MessageCreated {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<u32>,
    message: Option<String>,
}

/// Blocking HTTP transport for the Twilio Messages endpoint.
pub struct TwilioTransport {
    client: reqwest::blocking::Client,
    credentials: TwilioCredentials,
    base_url: String,
}

impl TwilioTransport {
    /// Builds a transport whose requests give up after `timeout`.
    pub fn new(credentials: TwilioCredentials, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| {
                ProviderError::new(
                    ProviderErrorClass::AccountError,
                    None,
                    format!("failed to build HTTP client: {err}"),
                )
            })?;
        Ok(Self {
            client,
            credentials,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Points the transport at a different API root (proxies, sandboxes).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Messages.json",
            self.base_url, self.credentials.account_sid
        )
    }
}

impl SmsTransport for TwilioTransport {
    fn send(&self, to: &str, body: &str) -> Result<SmsReceipt, ProviderError> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(
                &self.credentials.account_sid,
                Some(&self.credentials.auth_token),
            )
            .form(&[
                ("To", to),
                ("From", self.credentials.from.as_str()),
                ("Body", body),
            ])
            .send()
            .map_err(|err| {
                let class = if err.is_timeout() || err.is_connect() || err.is_request() {
                    ProviderErrorClass::Unreachable
                } else {
                    ProviderErrorClass::AccountError
                };
                warn!(
                    "event=sms_send module=sms status=error to={} error_code=transport_failed timeout={}",
                    redact_phone(to),
                    err.is_timeout()
                );
                ProviderError::new(class, None, format!("request failed: {err}"))
            })?;

        let status = response.status().as_u16();
        if response.status().is_success() {
            // The provider accepted the message; an unreadable body only loses the id.
            let receipt = parse_receipt(&response.text().unwrap_or_default());
            info!(
                "event=sms_send module=sms status=ok to={} message_id={}",
                redact_phone(to),
                receipt.message_id
            );
            return Ok(receipt);
        }

        let text = response.text().map_err(|err| {
            ProviderError::new(
                ProviderErrorClass::Unreachable,
                None,
                format!("failed to read response body: {err}"),
            )
        })?;
        let err = parse_error_body(status, &text);
        warn!(
            "event=sms_send module=sms status=error to={} http_status={} error_code={:?} class={:?}",
            redact_phone(to),
            status,
            err.code,
            err.class
        );
        Err(err)
    }
}

/// Reads the message id from a 2xx body, falling back to `UNKNOWN_MESSAGE_ID`.
fn parse_receipt(body: &str) -> SmsReceipt {
    let message_id = serde_json::from_str::<MessageCreated>(body)
        .map(|created| created.sid)
        .unwrap_or_else(|err| {
            warn!("event=sms_send module=sms status=degraded error_code=receipt_unparsed error={err}");
            UNKNOWN_MESSAGE_ID.to_string()
        });
    SmsReceipt { message_id }
}

/// Maps a non-2xx response onto a provider error.
///
/// Vendor codes win over HTTP status; without a code, 5xx is treated as an
/// unreachable provider and everything else as an account problem.
fn parse_error_body(status: u16, body: &str) -> ProviderError {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|error| error.message.clone())
        .unwrap_or_else(|| format!("HTTP {status}"));

    match parsed.and_then(|error| error.code) {
        Some(code) => ProviderError::from_code(code, message),
        None if status >= 500 => {
            ProviderError::new(ProviderErrorClass::Unreachable, None, message)
        }
        None => ProviderError::new(ProviderErrorClass::AccountError, None, message),
    }
}
