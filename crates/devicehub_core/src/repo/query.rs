//! Composable device query builder.
//!
//! # Responsibility
//! - Translate filter-by-example values and raw predicates into one
//!   parameterized `SELECT`.
//! - Apply `LIMIT`/`OFFSET` windows.
//!
//! # Invariants
//! - Results are returned in insertion order (`rowid ASC`).
//! - A query is bound to the connection it was created from, so a query
//!   built inside a transaction reads that transaction's writes.
//! - A query from the base repository refuses to run while a transaction
//!   scope is open on its connection.

use crate::model::device::{Device, DeviceId};
use crate::model::page::Page;
use crate::repo::device_repo::{
    ensure_handle_idle, log_failure, RepoError, RepoResult, DEVICE_COLUMNS,
};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};

pub(crate) const DEVICE_SELECT_SQL: &str = "SELECT
    id,
    model,
    color,
    version,
    create_time,
    update_time
FROM device";

/// Query handle returned by `SqliteDeviceRepository::query`.
///
/// Predicates are SQL fragments using `?` placeholders; they are joined
/// with `AND` in the order they were added.
#[derive(Debug, Clone)]
pub struct DeviceQuery<'conn> {
    conn: &'conn Connection,
    predicates: Vec<String>,
    args: Vec<Value>,
    limit: Option<u32>,
    offset: u32,
    scoped: bool,
}

impl<'conn> DeviceQuery<'conn> {
    pub(crate) fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            predicates: Vec::new(),
            args: Vec::new(),
            limit: None,
            offset: 0,
            scoped: false,
        }
    }

    /// Marks the query as issued from inside a transaction scope.
    pub(crate) fn scoped(mut self, scoped: bool) -> Self {
        self.scoped = scoped;
        self
    }

    /// Adds one raw predicate and its bind values.
    pub fn and_where<I, V>(mut self, predicate: &str, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.predicates.push(format!("({predicate})"));
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds one equality constraint per non-zero field of `example`.
    pub fn filter_by(mut self, example: &Device) -> Self {
        for column in DEVICE_COLUMNS {
            let value = (column.read)(example);
            if is_zero_value(&value) {
                continue;
            }
            self.predicates.push(format!("{} = ?", column.name));
            self.args.push(value);
        }
        self
    }

    /// Caps the row count. `0` leaves the query unbounded.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Applies both bounds of `page`.
    pub fn page(mut self, page: &Page) -> Self {
        if page.is_unbounded() {
            self.limit = None;
        } else {
            self.limit = Some(page.limit);
        }
        self.offset(page.offset)
    }

    /// Runs the query and returns all matching devices.
    pub fn fetch(&self) -> RepoResult<Vec<Device>> {
        self.load().inspect_err(|err| log_failure("device_query", err))
    }

    /// Returns the first matching device, if any.
    pub fn first(&self) -> RepoResult<Option<Device>> {
        let devices = self.clone().limit(1).fetch()?;
        Ok(devices.into_iter().next())
    }

    /// Counts matching rows, ignoring `LIMIT`/`OFFSET`.
    pub fn count(&self) -> RepoResult<u64> {
        self.load_count().inspect_err(|err| log_failure("device_count", err))
    }

    /// Runs the query without logging; callers log under their own event.
    pub(crate) fn load(&self) -> RepoResult<Vec<Device>> {
        ensure_handle_idle(self.conn, self.scoped)?;
        let (sql, args) = self.select_sql();
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(args))?;
        let mut devices = Vec::new();

        while let Some(row) = rows.next()? {
            devices.push(parse_device_row(row)?);
        }

        Ok(devices)
    }

    fn load_count(&self) -> RepoResult<u64> {
        ensure_handle_idle(self.conn, self.scoped)?;
        let sql = format!("SELECT COUNT(*) FROM device{}", self.where_clause());
        let count: i64 = self.conn.query_row(
            &sql,
            params_from_iter(self.args.iter().cloned()),
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative row count `{count}`")))
    }

    fn where_clause(&self) -> String {
        if self.predicates.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.predicates.join(" AND "))
        }
    }

    fn select_sql(&self) -> (String, Vec<Value>) {
        let mut sql = format!("{DEVICE_SELECT_SQL}{}", self.where_clause());
        let mut args = self.args.clone();

        sql.push_str(" ORDER BY rowid ASC");

        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            args.push(Value::Integer(i64::from(limit)));
            if self.offset > 0 {
                sql.push_str(" OFFSET ?");
                args.push(Value::Integer(i64::from(self.offset)));
            }
        } else if self.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            args.push(Value::Integer(i64::from(self.offset)));
        }

        (sql, args)
    }
}

/// Returns whether `value` is the zero value of its column type.
pub(crate) fn is_zero_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Integer(number) => *number == 0,
        Value::Real(number) => *number == 0.0,
        Value::Text(text) => text.is_empty(),
        Value::Blob(bytes) => bytes.is_empty(),
    }
}

pub(crate) fn parse_device_row(row: &Row<'_>) -> RepoResult<Device> {
    let id: String = row.get("id")?;
    if id.is_empty() {
        return Err(RepoError::InvalidData(
            "empty id value in device.id".to_string(),
        ));
    }

    Ok(Device {
        id: DeviceId::from(id),
        model: row.get("model")?,
        color: row.get("color")?,
        version: row.get("version")?,
        create_time: row.get("create_time")?,
        update_time: row.get("update_time")?,
    })
}

#[cfg(test)]
mod tests {
    use super::{is_zero_value, DeviceQuery};
    use crate::db::open_db_in_memory;
    use crate::model::device::Device;
    use crate::model::page::Page;
    use crate::repo::device_repo::RepoError;
    use rusqlite::types::Value;

    #[test]
    fn zero_values_are_detected_per_type() {
        assert!(is_zero_value(&Value::Text(String::new())));
        assert!(is_zero_value(&Value::Integer(0)));
        assert!(!is_zero_value(&Value::Text("Pro".to_string())));
        assert!(!is_zero_value(&Value::Integer(-1)));
    }

    #[test]
    fn empty_example_builds_unfiltered_select() {
        let conn = open_db_in_memory().unwrap();
        let (sql, args) = DeviceQuery::new(&conn)
            .filter_by(&Device::default())
            .select_sql();
        assert!(!sql.contains("WHERE"));
        assert!(args.is_empty());
    }

    #[test]
    fn example_fields_become_ordered_equality_predicates() {
        let conn = open_db_in_memory().unwrap();
        let example = Device::new("Pro", "", "v1.2");
        let (sql, args) = DeviceQuery::new(&conn).filter_by(&example).select_sql();
        assert!(sql.contains("WHERE model = ? AND version = ?"));
        assert_eq!(
            args,
            vec![
                Value::Text("Pro".to_string()),
                Value::Text("v1.2".to_string())
            ]
        );
    }

    #[test]
    fn offset_without_limit_uses_unbounded_limit() {
        let conn = open_db_in_memory().unwrap();
        let (sql, args) = DeviceQuery::new(&conn).limit(0).offset(3).select_sql();
        assert!(sql.ends_with("LIMIT -1 OFFSET ?"));
        assert_eq!(args, vec![Value::Integer(3)]);
    }

    #[test]
    fn unbounded_page_keeps_only_offset() {
        let conn = open_db_in_memory().unwrap();
        let (sql, args) = DeviceQuery::new(&conn)
            .limit(5)
            .page(&Page::from_request(2, 0))
            .select_sql();
        assert!(!sql.contains("LIMIT ?"));
        assert!(args.is_empty());

        let (sql, args) = DeviceQuery::new(&conn)
            .page(&Page::from_request(2, 3))
            .select_sql();
        assert!(sql.ends_with("LIMIT ? OFFSET ?"));
        assert_eq!(args, vec![Value::Integer(3), Value::Integer(3)]);
    }

    #[test]
    fn malformed_predicate_surfaces_storage_error() {
        let conn = open_db_in_memory().unwrap();
        let query = DeviceQuery::new(&conn).and_where("no_such_column = ?", [1_i64]);
        assert!(matches!(query.fetch(), Err(RepoError::Db(_))));
        assert!(matches!(query.first(), Err(RepoError::Db(_))));
        assert!(matches!(query.count(), Err(RepoError::Db(_))));
    }

    #[test]
    fn base_query_refuses_to_run_inside_foreign_transaction() {
        let conn = open_db_in_memory().unwrap();
        conn.execute_batch("BEGIN;").unwrap();
        let query = DeviceQuery::new(&conn);
        assert!(matches!(query.fetch(), Err(RepoError::TransactionAlreadyActive)));
        assert_eq!(query.clone().scoped(true).count().unwrap(), 0);
        conn.execute_batch("ROLLBACK;").unwrap();
    }
}
