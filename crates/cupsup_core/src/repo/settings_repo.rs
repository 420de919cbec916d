//! Settings provider contract and SQLite implementation.
//!
//! # Responsibility
//! - Assemble the read-only `Settings` snapshot from the `settings`,
//!   `employees` and `group_numbers` tables.
//! - Offer an admin write path that replaces the whole configuration.
//!
//! # Invariants
//! - A missing settings row yields defaults (empty calendar id, 60 s cooldown).
//! - A negative persisted cooldown is reported as invalid data.
//! - `replace_settings` applies in one transaction.

use crate::model::roster::{Employee, Settings};
use crate::repo::assignment_repo::{RepoError, RepoResult};
use log::info;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;

/// Read-only access to scheduler configuration.
pub trait SettingsProvider {
    fn load_settings(&self) -> RepoResult<Settings>;
}

impl<T: SettingsProvider + ?Sized> SettingsProvider for &T {
    fn load_settings(&self) -> RepoResult<Settings> {
        (**self).load_settings()
    }
}

/// SQLite-backed settings provider.
pub struct SqliteSettingsRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSettingsRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Replaces settings, roster and group numbers atomically.
    ///
    /// Group numbers are deduplicated; roster order is preserved.
    pub fn replace_settings(&self, settings: &Settings) -> RepoResult<()> {
        if settings.cooldown_ms < 0 {
            return Err(RepoError::InvalidData(format!(
                "cooldown_ms must be >= 0, got {}",
                settings.cooldown_ms
            )));
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO settings (id, calendar_id, cooldown_ms) VALUES (1, ?1, ?2)
             ON CONFLICT (id) DO UPDATE SET
                calendar_id = excluded.calendar_id,
                cooldown_ms = excluded.cooldown_ms;",
            params![settings.calendar_id.trim(), settings.cooldown_ms],
        )?;

        tx.execute("DELETE FROM employees;", [])?;
        for (position, employee) in settings.employees.iter().enumerate() {
            tx.execute(
                "INSERT INTO employees (position, name, phone) VALUES (?1, ?2, ?3);",
                params![
                    i64::try_from(position).unwrap_or(i64::MAX),
                    employee.name.trim(),
                    employee.phone.trim()
                ],
            )?;
        }

        tx.execute("DELETE FROM group_numbers;", [])?;
        for phone in &settings.group_numbers {
            tx.execute(
                "INSERT OR IGNORE INTO group_numbers (phone) VALUES (?1);",
                [phone.trim()],
            )?;
        }
        tx.commit()?;

        info!(
            "event=settings_replace module=repo status=ok employees={} group_numbers={}",
            settings.employees.len(),
            settings.group_numbers.len()
        );
        Ok(())
    }
}

impl SettingsProvider for SqliteSettingsRepository<'_> {
    fn load_settings(&self) -> RepoResult<Settings> {
        let mut settings = Settings::default();

        let row = self
            .conn
            .query_row(
                "SELECT calendar_id, cooldown_ms FROM settings WHERE id = 1;",
                [],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;
        if let Some((calendar_id, cooldown_ms)) = row {
            if cooldown_ms < 0 {
                return Err(RepoError::InvalidData(format!(
                    "invalid cooldown_ms `{cooldown_ms}` in settings.cooldown_ms"
                )));
            }
            settings.calendar_id = calendar_id;
            settings.cooldown_ms = cooldown_ms;
        }

        let mut stmt = self
            .conn
            .prepare("SELECT name, phone FROM employees ORDER BY position ASC;")?;
        settings.employees = stmt
            .query_map([], |row| Ok(Employee::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self
            .conn
            .prepare("SELECT phone FROM group_numbers ORDER BY phone ASC;")?;
        let numbers = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        settings.group_numbers = numbers.into_iter().collect();

        Ok(settings)
    }
}
