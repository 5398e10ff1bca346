//! Core domain logic for the device registry.
//! This crate owns persistence, partial-update rules and error-code mapping.

pub mod config;
pub mod db;
pub mod error_code;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{Config, ConfigError, DatabaseConfig, LoggerConfig};
pub use error_code::{Envelope, ErrorCode};
pub use logging::{init_logging, logging_status};
pub use model::device::{now_epoch_ms, Device, DeviceId};
pub use model::page::Page;
pub use repo::device_repo::{
    sparse_update_map, DeviceRepository, RepoError, RepoResult, SqliteDeviceRepository,
    UpdateOutcome,
};
pub use repo::query::DeviceQuery;
pub use repo::transaction::DeviceTransaction;
pub use service::device_service::{parse_device_id, DeviceService, PageRequest};

