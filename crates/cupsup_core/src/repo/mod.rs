//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the narrow storage contracts the core depends on
//!   (assignments, settings, calendar feed, dispatch state).
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Assignment writes enforce `Assignment::validate()` before persistence.
//! - Every contract is implemented for `&T`, so services can borrow stores.

pub mod assignment_repo;
pub mod calendar_repo;
pub mod dispatch_state_repo;
pub mod settings_repo;
