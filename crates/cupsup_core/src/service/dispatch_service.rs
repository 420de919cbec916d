//! Rate-limited schedule broadcast.
//!
//! # Responsibility
//! - Enforce one global cooldown window between successful broadcasts.
//! - Send one message per valid recipient and collect per-recipient failures.
//!
//! # Invariants
//! - A throttled broadcast sends nothing and mutates no state.
//! - Recipients failing `^\+1\d{10}$` are skipped, never sent to.
//! - One failing recipient never aborts the rest of the batch.
//! - `last_sent_at` only moves when at least one send succeeded: the window
//!   is claimed atomically up front and released when nothing went out.

use crate::logging::redact_phone;
use crate::model::roster::{is_valid_phone, Employee};
use crate::model::week::WeekView;
use crate::repo::assignment_repo::RepoError;
use crate::repo::dispatch_state_repo::{CooldownClaim, DispatchStateStore};
use crate::service::message::format_schedule_message;
use crate::sms::{ProviderError, ProviderErrorClass, SmsTransport};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Broadcast destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    /// Roster name when the number belongs to a known employee.
    pub name: Option<String>,
    pub phone: String,
}

impl Recipient {
    pub fn phone(phone: impl Into<String>) -> Self {
        Self {
            name: None,
            phone: phone.into(),
        }
    }
}

impl From<&Employee> for Recipient {
    fn from(employee: &Employee) -> Self {
        Self {
            name: Some(employee.name.clone()),
            phone: employee.phone.clone(),
        }
    }
}

/// Why one recipient did not receive the broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Phone failed local validation; no send was attempted.
    SkippedInvalidPhone,
    InvalidNumber,
    Unreachable,
    AccountError,
}

impl From<ProviderErrorClass> for FailureReason {
    fn from(value: ProviderErrorClass) -> Self {
        match value {
            ProviderErrorClass::InvalidNumber => Self::InvalidNumber,
            ProviderErrorClass::Unreachable => Self::Unreachable,
            ProviderErrorClass::AccountError => Self::AccountError,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientFailure {
    pub recipient: Recipient,
    pub reason: FailureReason,
    pub provider_code: Option<u32>,
    pub message: String,
}

impl RecipientFailure {
    fn skipped(recipient: Recipient) -> Self {
        Self {
            recipient,
            reason: FailureReason::SkippedInvalidPhone,
            provider_code: None,
            message: "phone must match +1##########".to_string(),
        }
    }

    fn provider(recipient: Recipient, err: ProviderError) -> Self {
        Self {
            recipient,
            reason: err.class.into(),
            provider_code: err.code,
            message: err.message,
        }
    }
}

/// Result of one broadcast attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "outcome",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum BroadcastOutcome {
    Sent { sent: usize },
    Throttled { retry_after_ms: i64 },
    PartialFailure {
        sent: usize,
        failures: Vec<RecipientFailure>,
    },
}

/// Cooldown state could not be read, claimed or released.
#[derive(Debug)]
pub enum DispatchError {
    StateUnavailable(RepoError),
}

impl Display for DispatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StateUnavailable(err) => write!(f, "Cannot access dispatch state: {err}"),
        }
    }
}

impl Error for DispatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StateUnavailable(err) => Some(err),
        }
    }
}

impl From<RepoError> for DispatchError {
    fn from(value: RepoError) -> Self {
        Self::StateUnavailable(value)
    }
}

/// Sends week schedules through an SMS transport under a global cooldown.
pub struct NotificationDispatcher<S: DispatchStateStore, T: SmsTransport> {
    state: S,
    transport: T,
    cooldown_ms: i64,
}

impl<S: DispatchStateStore, T: SmsTransport> NotificationDispatcher<S, T> {
    /// Negative cooldowns are clamped to zero.
    pub fn new(state: S, transport: T, cooldown_ms: i64) -> Self {
        Self {
            state,
            transport,
            cooldown_ms: cooldown_ms.max(0),
        }
    }

    /// Broadcasts `week` to `recipients` at time `now_ms`.
    ///
    /// # Errors
    /// - `StateUnavailable` when the cooldown state cannot be read or claimed,
    ///   or when a batch that sent nothing cannot hand its claim back.
    pub fn broadcast(
        &self,
        week: &WeekView,
        recipients: &[Recipient],
        now_ms: i64,
    ) -> Result<BroadcastOutcome, DispatchError> {
        let previous = match self.state.try_claim(now_ms, self.cooldown_ms)? {
            CooldownClaim::Granted { previous } => previous,
            CooldownClaim::Throttled { retry_after_ms } => {
                info!(
                    "event=broadcast module=dispatch status=throttled retry_after_ms={retry_after_ms}"
                );
                return Ok(BroadcastOutcome::Throttled { retry_after_ms });
            }
        };

        let batch_id = Uuid::new_v4();
        let body = format_schedule_message(week);
        let mut sent = 0usize;
        let mut failures = Vec::new();

        for recipient in recipients {
            if !is_valid_phone(&recipient.phone) {
                warn!(
                    "event=broadcast_recipient module=dispatch status=skipped batch_id={batch_id} to={}",
                    redact_phone(&recipient.phone)
                );
                failures.push(RecipientFailure::skipped(recipient.clone()));
                continue;
            }

            match self.transport.send(&recipient.phone, &body) {
                Ok(_) => sent += 1,
                Err(err) => {
                    warn!(
                        "event=broadcast_recipient module=dispatch status=error batch_id={batch_id} to={} class={:?} code={:?}",
                        redact_phone(&recipient.phone),
                        err.class,
                        err.code
                    );
                    failures.push(RecipientFailure::provider(recipient.clone(), err));
                }
            }
        }

        if sent == 0 {
            if let Err(err) = self.state.release(now_ms, previous) {
                error!(
                    "event=broadcast module=dispatch status=error batch_id={batch_id} error_code=claim_release_failed error={err}"
                );
                return Err(DispatchError::StateUnavailable(err));
            }
        }

        info!(
            "event=broadcast module=dispatch status=done batch_id={batch_id} sent={sent} failed={}",
            failures.len()
        );

        if failures.is_empty() {
            Ok(BroadcastOutcome::Sent { sent })
        } else {
            Ok(BroadcastOutcome::PartialFailure { sent, failures })
        }
    }
}
