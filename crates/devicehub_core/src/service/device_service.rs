//! Device use-case service.
//!
//! # Responsibility
//! - Assign identity and timestamps at registration.
//! - Validate identity tokens and derive pagination bounds.
//! - Translate repository outcomes into `ErrorCode` values.
//!
//! # Invariants
//! - No repository error is returned to callers; only error codes are.
//! - Update and delete never run against a malformed identity token.
//! - A zero-row update reports `Success`; a zero-row delete reports
//!   `SuccessButNotFound`.

use crate::error_code::ErrorCode;
use crate::model::device::{now_epoch_ms, Device, DeviceId};
use crate::model::page::Page;
use crate::repo::device_repo::{DeviceRepository, RepoError};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const UUID_TEXT_LEN: usize = 36;

/// Client pagination request: 1-based `page` index and `number` per page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub number: u32,
}

impl PageRequest {
    pub fn new(page: u32, number: u32) -> Self {
        Self { page, number }
    }

    pub fn to_page(self) -> Page {
        Page::from_request(self.page, self.number)
    }
}

/// Use-case service wrapper for device operations.
pub struct DeviceService<R: DeviceRepository> {
    repo: R,
}

impl<R: DeviceRepository> DeviceService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Lists devices matching `filter`, one page at a time.
    ///
    /// # Contract
    /// - Absent filter -> `BadRequest`.
    /// - Absent page -> unbounded listing.
    /// - Empty result -> `SuccessButNotFound` with no rows.
    pub fn find(
        &self,
        filter: Option<&Device>,
        page: Option<&PageRequest>,
    ) -> (Vec<Device>, ErrorCode) {
        let Some(filter) = filter else {
            return (Vec::new(), ErrorCode::BadRequest);
        };

        let page = page.map(|request| request.to_page()).unwrap_or_default();
        match self.repo.find_devices(&mutable_projection(filter), &page) {
            Ok(rows) if rows.is_empty() => (rows, ErrorCode::SuccessButNotFound),
            Ok(rows) => (rows, ErrorCode::Success),
            Err(_) => (Vec::new(), ErrorCode::DeviceDbFindFail),
        }
    }

    /// Fetches one device by identity token.
    pub fn get(&self, id: &str) -> (Option<Device>, ErrorCode) {
        let Some(id) = parse_device_id(id) else {
            return (None, ErrorCode::ParseUuidFail);
        };

        match self.repo.get_device(&id) {
            Ok(device) => (Some(device), ErrorCode::Success),
            Err(RepoError::NotFound(_)) => (None, ErrorCode::SuccessButNotFound),
            Err(_) => (None, ErrorCode::DeviceDbFindFail),
        }
    }

    /// Registers a new device under a freshly generated identity.
    ///
    /// Any caller-supplied `id` or timestamps are replaced.
    pub fn register(&self, device: Option<&Device>) -> (Option<Device>, ErrorCode) {
        let Some(device) = device else {
            return (None, ErrorCode::BadRequest);
        };

        let now = now_epoch_ms();
        let mut record = mutable_projection(device);
        record.id = DeviceId::from(Uuid::new_v4().to_string());
        record.create_time = now;
        record.update_time = now;

        match self.repo.create_device(&record) {
            Ok(created) => {
                info!(
                    "event=device_register module=service status=ok id={}",
                    created.id
                );
                (Some(created), ErrorCode::Success)
            }
            Err(_) => (None, ErrorCode::DeviceDbCreateFail),
        }
    }

    /// Applies a sparse patch to the device named by `patch.id`.
    ///
    /// Only `model`, `color` and `version` are taken from the patch.
    /// Returns the number of rows changed; `0` with `Success` covers both
    /// an empty patch and an unknown id.
    pub fn update(&self, patch: &Device) -> (u64, ErrorCode) {
        if parse_device_id(patch.id.as_str()).is_none() {
            return (0, ErrorCode::ParseUuidFail);
        }

        match self.repo.update_device(Some(&mutable_projection(patch))) {
            Ok(outcome) => (outcome.rows_affected, ErrorCode::Success),
            Err(_) => (0, ErrorCode::DeviceDbUpdateFail),
        }
    }

    /// Hard-deletes one device.
    pub fn delete(&self, id: &str) -> ErrorCode {
        let Some(id) = parse_device_id(id) else {
            return ErrorCode::ParseUuidFail;
        };

        match self.repo.delete_device(&id) {
            Ok(0) => {
                warn!("event=device_delete module=service status=not_found id={id}");
                ErrorCode::SuccessButNotFound
            }
            Ok(_) => ErrorCode::Success,
            Err(_) => ErrorCode::DeviceDbDeleteFail,
        }
    }
}

/// Validates a textual identity token.
///
/// Accepts only the 36-character hyphenated UUID form; the nil UUID is
/// rejected as unparseable.
pub fn parse_device_id(value: &str) -> Option<DeviceId> {
    if value.len() != UUID_TEXT_LEN {
        return None;
    }
    match Uuid::parse_str(value) {
        Ok(uuid) if !uuid.is_nil() => Some(DeviceId::from(value)),
        _ => None,
    }
}

/// Copies identity and mutable attributes, dropping caller timestamps.
fn mutable_projection(device: &Device) -> Device {
    Device {
        id: device.id.clone(),
        model: device.model.clone(),
        color: device.color.clone(),
        version: device.version.clone(),
        create_time: 0,
        update_time: 0,
    }
}
