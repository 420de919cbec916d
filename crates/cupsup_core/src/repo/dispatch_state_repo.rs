//! Durable broadcast cooldown state.
//!
//! # Responsibility
//! - Persist `last_sent_at` (epoch milliseconds) across process restarts.
//! - Provide an atomic claim of the cooldown window for concurrent workers.
//!
//! # Invariants
//! - A claim is granted only when `now - last_sent_at >= cooldown_ms` (or
//!   nothing was ever sent), decided inside one SQL statement.
//! - A refused claim never mutates state.
//! - `release` restores the previous value only if the claim is still the
//!   current value (compare-and-swap).

use crate::repo::assignment_repo::RepoResult;
use rusqlite::{params, Connection, OptionalExtension};

const LAST_SENT_AT_KEY: &str = "last_sent_at";

/// Result of trying to open a new broadcast window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownClaim {
    /// Window claimed; `previous` is the value the claim replaced.
    Granted { previous: Option<i64> },
    /// Another broadcast happened inside the window.
    Throttled { retry_after_ms: i64 },
}

/// Storage of the dispatcher's cooldown timestamp.
pub trait DispatchStateStore {
    fn last_sent_at(&self) -> RepoResult<Option<i64>>;
    /// Atomically sets `last_sent_at = now_ms` when the cooldown has elapsed.
    fn try_claim(&self, now_ms: i64, cooldown_ms: i64) -> RepoResult<CooldownClaim>;
    /// Undoes a granted claim that produced no successful send.
    fn release(&self, claimed_at: i64, previous: Option<i64>) -> RepoResult<()>;
}

impl<T: DispatchStateStore + ?Sized> DispatchStateStore for &T {
    fn last_sent_at(&self) -> RepoResult<Option<i64>> {
        (**self).last_sent_at()
    }

    fn try_claim(&self, now_ms: i64, cooldown_ms: i64) -> RepoResult<CooldownClaim> {
        (**self).try_claim(now_ms, cooldown_ms)
    }

    fn release(&self, claimed_at: i64, previous: Option<i64>) -> RepoResult<()> {
        (**self).release(claimed_at, previous)
    }
}

/// SQLite-backed dispatch state shared by every worker using the same file.
pub struct SqliteDispatchStateStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDispatchStateStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl DispatchStateStore for SqliteDispatchStateStore<'_> {
    fn last_sent_at(&self) -> RepoResult<Option<i64>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM dispatch_state WHERE key = ?1;",
                [LAST_SENT_AT_KEY],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn try_claim(&self, now_ms: i64, cooldown_ms: i64) -> RepoResult<CooldownClaim> {
        let previous = self.last_sent_at()?;

        // The conditional upsert is the critical section: concurrent callers
        // race on one statement and at most one of them changes the row.
        let changed = self.conn.execute(
            "INSERT INTO dispatch_state (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value
             WHERE ?2 - dispatch_state.value >= ?3;",
            params![LAST_SENT_AT_KEY, now_ms, cooldown_ms],
        )?;

        if changed == 1 {
            return Ok(CooldownClaim::Granted { previous });
        }

        let last = self.last_sent_at()?.unwrap_or(now_ms);
        let retry_after_ms = last.saturating_add(cooldown_ms).saturating_sub(now_ms).max(0);
        Ok(CooldownClaim::Throttled { retry_after_ms })
    }

    fn release(&self, claimed_at: i64, previous: Option<i64>) -> RepoResult<()> {
        match previous {
            Some(value) => self.conn.execute(
                "UPDATE dispatch_state SET value = ?1 WHERE key = ?2 AND value = ?3;",
                params![value, LAST_SENT_AT_KEY, claimed_at],
            )?,
            None => self.conn.execute(
                "DELETE FROM dispatch_state WHERE key = ?1 AND value = ?2;",
                params![LAST_SENT_AT_KEY, claimed_at],
            )?,
        };
        Ok(())
    }
}
