//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository APIs take and return domain values, never SQLite rows.
//! - Storage failures are logged here and surfaced unchanged to callers.

pub mod device_repo;
pub mod query;
pub mod transaction;
