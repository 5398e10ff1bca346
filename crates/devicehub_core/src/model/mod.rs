//! Domain model for managed devices.
//!
//! # Responsibility
//! - Define the canonical device record shared by repository and service.
//! - Define request-scoped pagination bounds.
//!
//! # Invariants
//! - A device `id` is assigned once at registration and never rewritten.
//! - Deletion is a hard delete; there is no tombstone state.

pub mod device;
pub mod page;
