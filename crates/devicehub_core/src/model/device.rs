//! Device domain model.
//!
//! # Responsibility
//! - Define the single managed entity and its identity token.
//! - Provide the zero-value checks used by filter-by-example and
//!   partial updates.
//!
//! # Invariants
//! - `id` is immutable once assigned and unique across the store.
//! - `update_time >= create_time` once both are set.
//! - A zero-valued field (empty string, `0`) means "not provided".

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque device identity token.
///
/// The repository stores it verbatim; format validation (36-char UUID text)
/// is a service-level concern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Canonical device record.
///
/// Also used as a filter-by-example value: every non-zero field becomes an
/// equality constraint, zero-valued fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub id: DeviceId,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub version: String,
    /// Unix epoch milliseconds, stamped once on create.
    #[serde(default)]
    pub create_time: i64,
    /// Unix epoch milliseconds, bumped on every effective update.
    #[serde(default)]
    pub update_time: i64,
}

impl Device {
    /// Builds an unsaved device with mutable attributes only.
    pub fn new(
        model: impl Into<String>,
        color: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            color: color.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// Builds a patch that targets `id` and sets nothing else.
    pub fn with_id(id: impl Into<DeviceId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Returns whether every field other than `id` holds its zero value.
    ///
    /// An update carrying such a value cannot change any column.
    pub fn is_blank_except_id(&self) -> bool {
        *self == Self::with_id(self.id.clone())
    }
}

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
