//! Device repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide get/create/update/delete/list/find APIs over the `device` table.
//! - Own the sparse partial-update algorithm.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - `id` and `create_time` are never part of an update statement.
//! - `update_time` is written on every effective update, even when zero.
//! - A patch that carries no mutable field never reaches storage.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::device::{now_epoch_ms, Device, DeviceId};
use crate::model::page::Page;
use crate::repo::query::{is_zero_value, parse_device_row, DeviceQuery, DEVICE_SELECT_SQL};
use crate::repo::transaction::DeviceTransaction;
use log::{debug, error};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from device persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// No row matched the requested id.
    NotFound(DeviceId),
    /// A transaction is already open on this connection.
    TransactionAlreadyActive,
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid device.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "device not found: {id}"),
            Self::TransactionAlreadyActive => {
                write!(f, "a transaction is already active on this connection")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "device repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "device repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "device repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted device data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Static description of one persisted device column.
///
/// The update diff and the filter-by-example query both iterate this table.
#[derive(Clone, Copy)]
pub(crate) struct DeviceColumn {
    pub(crate) name: &'static str,
    /// Whether the column may appear in an update statement.
    pub(crate) updatable: bool,
    /// Written even when the value is zero.
    pub(crate) always_include: bool,
    pub(crate) read: fn(&Device) -> Value,
}

pub(crate) const DEVICE_COLUMNS: &[DeviceColumn] = &[
    DeviceColumn {
        name: "id",
        updatable: false,
        always_include: false,
        read: read_id,
    },
    DeviceColumn {
        name: "model",
        updatable: true,
        always_include: false,
        read: read_model,
    },
    DeviceColumn {
        name: "color",
        updatable: true,
        always_include: false,
        read: read_color,
    },
    DeviceColumn {
        name: "version",
        updatable: true,
        always_include: false,
        read: read_version,
    },
    DeviceColumn {
        name: "create_time",
        updatable: false,
        always_include: false,
        read: read_create_time,
    },
    DeviceColumn {
        name: "update_time",
        updatable: true,
        always_include: true,
        read: read_update_time,
    },
];

fn read_id(device: &Device) -> Value {
    Value::Text(device.id.to_string())
}

fn read_model(device: &Device) -> Value {
    Value::Text(device.model.clone())
}

fn read_color(device: &Device) -> Value {
    Value::Text(device.color.clone())
}

fn read_version(device: &Device) -> Value {
    Value::Text(device.version.clone())
}

fn read_create_time(device: &Device) -> Value {
    Value::Integer(device.create_time)
}

fn read_update_time(device: &Device) -> Value {
    Value::Integer(device.update_time)
}

/// Builds the sparse `column -> value` set for one update statement.
///
/// Skips non-updatable columns and zero values, except columns flagged
/// `always_include`.
pub fn sparse_update_map(device: &Device) -> Vec<(&'static str, Value)> {
    DEVICE_COLUMNS
        .iter()
        .filter(|column| column.updatable)
        .filter_map(|column| {
            let value = (column.read)(device);
            if is_zero_value(&value) && !column.always_include {
                None
            } else {
                Some((column.name, value))
            }
        })
        .collect()
}

/// Outcome of a partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Row as stored after the update; `None` when nothing was written.
    pub device: Option<Device>,
    /// Rows reported as changed by the storage engine.
    pub rows_affected: u64,
}

impl UpdateOutcome {
    fn noop() -> Self {
        Self::default()
    }
}

/// Repository interface for device CRUD operations.
pub trait DeviceRepository {
    /// Fetches exactly one device; `NotFound` when no row matches.
    fn get_device(&self, id: &DeviceId) -> RepoResult<Device>;
    /// Stamps `create_time`, inserts, and returns the persisted row.
    fn create_device(&self, device: &Device) -> RepoResult<Device>;
    /// Applies a sparse patch; an absent or id-only patch is a no-op.
    fn update_device(&self, patch: Option<&Device>) -> RepoResult<UpdateOutcome>;
    /// Hard-deletes rows matching `id`; zero rows is not an error here.
    fn delete_device(&self, id: &DeviceId) -> RepoResult<u64>;
    /// Lists every device matching the non-zero fields of `filter`.
    fn list_devices(&self, filter: &Device) -> RepoResult<Vec<Device>>;
    /// Like `list_devices`, bounded by `page`.
    fn find_devices(&self, filter: &Device, page: &Page) -> RepoResult<Vec<Device>>;
}

/// SQLite-backed device repository.
///
/// The repository only borrows its connection; transactional work goes
/// through a `DeviceTransaction` scope instead of rebinding this handle.
/// While a scope is open the base handle refuses every operation with
/// `TransactionAlreadyActive`, so its work never joins the scope.
#[derive(Debug, Clone, Copy)]
pub struct SqliteDeviceRepository<'conn> {
    conn: &'conn Connection,
    /// Set for the repository handed out by a `DeviceTransaction`.
    scoped: bool,
}

impl<'conn> SqliteDeviceRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_device_connection_ready(conn)?;
        Ok(Self {
            conn,
            scoped: false,
        })
    }

    /// Binds to an open transaction on a connection verified by `try_new`.
    pub(crate) fn bound(conn: &'conn Connection) -> Self {
        Self { conn, scoped: true }
    }

    /// Returns the connection this repository reads and writes through.
    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    /// Starts a filtered query bound to this repository's connection.
    pub fn query<I, V>(&self, predicate: &str, args: I) -> DeviceQuery<'conn>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        DeviceQuery::new(self.conn)
            .scoped(self.scoped)
            .and_where(predicate, args)
    }

    /// Opens a transaction scope on this repository's connection.
    ///
    /// # Errors
    /// - `TransactionAlreadyActive` when the connection is already inside a
    ///   transaction; nesting is refused instead of delegated to SQLite.
    pub fn begin_transaction(&self) -> RepoResult<DeviceTransaction<'conn>> {
        if !self.conn.is_autocommit() {
            error!("event=tx_begin module=repo status=error error_code=tx_already_active");
            return Err(RepoError::TransactionAlreadyActive);
        }
        DeviceTransaction::begin(self.conn).inspect_err(|err| log_failure("tx_begin", err))
    }

    fn ensure_idle(&self) -> RepoResult<()> {
        ensure_handle_idle(self.conn, self.scoped)
    }

    fn update_row(&self, patch: &Device) -> RepoResult<UpdateOutcome> {
        let assignments = sparse_update_map(patch);
        let set_clause = assignments
            .iter()
            .map(|(column, _)| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut args: Vec<Value> = assignments.into_iter().map(|(_, value)| value).collect();
        args.push(Value::Text(patch.id.to_string()));

        let changed = self.conn.execute(
            &format!("UPDATE device SET {set_clause} WHERE id = ?;"),
            params_from_iter(args),
        )?;

        let device = if changed > 0 {
            Some(self.get_device(&patch.id)?)
        } else {
            None
        };

        Ok(UpdateOutcome {
            device,
            rows_affected: changed as u64,
        })
    }
}

impl DeviceRepository for SqliteDeviceRepository<'_> {
    fn get_device(&self, id: &DeviceId) -> RepoResult<Device> {
        let result = self
            .ensure_idle()
            .and_then(|()| {
                self.conn
                    .query_row(
                        &format!("{DEVICE_SELECT_SQL} WHERE id = ?1;"),
                        [id.as_str()],
                        |row| Ok(parse_device_row(row)),
                    )
                    .optional()
                    .map_err(RepoError::from)
            })
            .and_then(|row| match row {
                Some(parsed) => parsed,
                None => Err(RepoError::NotFound(id.clone())),
            });

        result.inspect_err(|err| log_failure("device_get", err))
    }

    fn create_device(&self, device: &Device) -> RepoResult<Device> {
        if let Err(err) = self.ensure_idle() {
            log_failure("device_create", &err);
            return Err(err);
        }

        let mut record = device.clone();
        record.create_time = now_epoch_ms();
        record.update_time = record.update_time.max(record.create_time);

        let inserted = self.conn.execute(
            "INSERT INTO device (
                id,
                model,
                color,
                version,
                create_time,
                update_time
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                record.id.as_str(),
                record.model.as_str(),
                record.color.as_str(),
                record.version.as_str(),
                record.create_time,
                record.update_time,
            ],
        );

        inserted
            .map_err(RepoError::from)
            .and_then(|_| self.get_device(&record.id))
            .inspect_err(|err| log_failure("device_create", err))
    }

    fn update_device(&self, patch: Option<&Device>) -> RepoResult<UpdateOutcome> {
        let Some(patch) = patch else {
            return Ok(UpdateOutcome::noop());
        };

        if patch.is_blank_except_id() {
            debug!(
                "event=device_update module=repo status=skipped reason=no_fields id={}",
                patch.id
            );
            return Ok(UpdateOutcome::noop());
        }

        let mut stamped = patch.clone();
        stamped.update_time = now_epoch_ms();

        self.ensure_idle()
            .and_then(|()| self.update_row(&stamped))
            .inspect_err(|err| log_failure("device_update", err))
    }

    fn delete_device(&self, id: &DeviceId) -> RepoResult<u64> {
        self.ensure_idle()
            .and_then(|()| {
                self.conn
                    .execute("DELETE FROM device WHERE id = ?1;", [id.as_str()])
                    .map_err(RepoError::from)
            })
            .map(|changed| changed as u64)
            .inspect_err(|err| log_failure("device_delete", err))
    }

    fn list_devices(&self, filter: &Device) -> RepoResult<Vec<Device>> {
        DeviceQuery::new(self.conn)
            .scoped(self.scoped)
            .filter_by(filter)
            .load()
            .inspect_err(|err| log_failure("device_list", err))
    }

    fn find_devices(&self, filter: &Device, page: &Page) -> RepoResult<Vec<Device>> {
        DeviceQuery::new(self.conn)
            .scoped(self.scoped)
            .filter_by(filter)
            .page(page)
            .load()
            .inspect_err(|err| log_failure("device_find", err))
    }
}

/// Refuses work on a base handle whose connection is inside a transaction.
pub(crate) fn ensure_handle_idle(conn: &Connection, scoped: bool) -> RepoResult<()> {
    if scoped || conn.is_autocommit() {
        Ok(())
    } else {
        Err(RepoError::TransactionAlreadyActive)
    }
}

pub(crate) fn log_failure(event: &str, err: &RepoError) {
    match err {
        RepoError::NotFound(id) => {
            debug!("event={event} module=repo status=not_found id={id}");
        }
        other => {
            error!("event={event} module=repo status=error error={other}");
        }
    }
}

fn ensure_device_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "device")? {
        return Err(RepoError::MissingRequiredTable("device"));
    }

    for column in DEVICE_COLUMNS {
        if !table_has_column(conn, "device", column.name)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "device",
                column: column.name,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get("name")?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::sparse_update_map;
    use crate::model::device::Device;
    use rusqlite::types::Value;

    #[test]
    fn sparse_map_skips_identity_and_create_time() {
        let mut patch = Device::new("Pro", "White", "v1.2");
        patch.id = "c9d7c314-fd95-448a-8db9-4756cc774f7d".into();
        patch.create_time = 42;
        patch.update_time = 99;

        let columns: Vec<&str> = sparse_update_map(&patch)
            .into_iter()
            .map(|(column, _)| column)
            .collect();
        assert_eq!(columns, vec!["model", "color", "version", "update_time"]);
    }

    #[test]
    fn sparse_map_skips_zero_values_but_keeps_update_time() {
        let mut patch = Device::with_id("c9d7c314-fd95-448a-8db9-4756cc774f7d");
        patch.version = "v1.6".to_string();

        let map = sparse_update_map(&patch);
        assert_eq!(
            map,
            vec![
                ("version", Value::Text("v1.6".to_string())),
                ("update_time", Value::Integer(0)),
            ]
        );
    }
}
