//! Domain error-code registry and response envelope.
//!
//! # Responsibility
//! - Enumerate the closed set of outcomes a service call can report.
//! - Project each code to a numeric wire code, an HTTP status and a message.
//!
//! # Invariants
//! - No raw storage error crosses the service boundary; only these codes do.
//! - `SuccessButNotFound` is a success variant with empty-result semantics.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    Success,
    /// Call succeeded but matched or affected no rows.
    SuccessButNotFound,
    /// Structurally invalid or absent argument.
    BadRequest,
    /// Identity token is not a well-formed UUID.
    ParseUuidFail,
    DeviceDbFindFail,
    DeviceDbCreateFail,
    DeviceDbUpdateFail,
    DeviceDbDeleteFail,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 8] = [
        Self::Success,
        Self::SuccessButNotFound,
        Self::BadRequest,
        Self::ParseUuidFail,
        Self::DeviceDbFindFail,
        Self::DeviceDbCreateFail,
        Self::DeviceDbUpdateFail,
        Self::DeviceDbDeleteFail,
    ];

    /// Numeric code carried in the response envelope.
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 2_000_000,
            Self::SuccessButNotFound => 2_000_001,
            Self::BadRequest => 4_000_000,
            Self::ParseUuidFail => 4_000_001,
            Self::DeviceDbFindFail => 5_000_001,
            Self::DeviceDbCreateFail => 5_000_002,
            Self::DeviceDbUpdateFail => 5_000_003,
            Self::DeviceDbDeleteFail => 5_000_004,
        }
    }

    /// HTTP status the transport layer should answer with.
    pub fn status_code(self) -> u16 {
        match self {
            Self::Success | Self::SuccessButNotFound => 200,
            Self::BadRequest | Self::ParseUuidFail => 400,
            Self::DeviceDbFindFail
            | Self::DeviceDbCreateFail
            | Self::DeviceDbUpdateFail
            | Self::DeviceDbDeleteFail => 500,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::SuccessButNotFound => "Success but not found",
            Self::BadRequest => "Bad request",
            Self::ParseUuidFail => "Parse UUID fail",
            Self::DeviceDbFindFail => "Find device from database fail",
            Self::DeviceDbCreateFail => "Create device to database fail",
            Self::DeviceDbUpdateFail => "Update device to database fail",
            Self::DeviceDbDeleteFail => "Delete device from database fail",
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Success | Self::SuccessButNotFound)
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

/// JSON response body: `{code, data, msg}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: i32,
    pub data: Option<T>,
    pub msg: String,
}

impl<T> Envelope<T> {
    /// Wraps `data` under `code`; payloads of failed calls are dropped.
    pub fn from_code(code: ErrorCode, data: Option<T>) -> Self {
        Self {
            code: code.code(),
            data: if code.is_success() { data } else { None },
            msg: code.message().to_string(),
        }
    }
}
