//! Scheduling domain model.
//!
//! # Responsibility
//! - Define canonical data structures shared by store, reconciler and
//!   dispatcher.
//! - Own the pure validation rules for assignments and phone numbers.
//!
//! # Invariants
//! - An `Assignment` that fails `validate()` is never persisted or broadcast.
//! - Dates travel as `YYYY-MM-DD`, shift times as zero-padded `HH:MM`.

pub mod assignment;
pub mod roster;
pub mod week;
