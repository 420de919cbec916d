//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository and transport calls into use-case level APIs.
//! - Keep the API layer decoupled from storage and vendor details.

pub mod diagnostics;
pub mod dispatch_service;
pub mod message;
pub mod week_service;
