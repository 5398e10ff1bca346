use devicehub_core::db::migrations::latest_version;
use devicehub_core::db::open_db_in_memory;
use devicehub_core::{Device, DeviceId, DeviceRepository, Page, RepoError, SqliteDeviceRepository};
use rusqlite::Connection;

const PRO_ID: &str = "c9d7c314-fd95-448a-8db9-4756cc774f7d";
const NORMAL_ID: &str = "99f970f5-b876-4c94-9190-34ee11d54edb";
const UNKNOWN_ID: &str = "5b0e8f3a-1c2d-4e5f-8a9b-0c1d2e3f4a5b";

#[test]
fn create_and_get_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDeviceRepository::try_new(&conn).unwrap();

    let created = repo.create_device(&pro_device()).unwrap();
    assert_eq!(created.id.as_str(), PRO_ID);
    assert!(created.create_time > 0);
    assert_eq!(created.update_time, created.create_time);

    let loaded = repo.get_device(&DeviceId::from(PRO_ID)).unwrap();
    assert_eq!(loaded, created);
    assert_eq!(loaded.model, "Pro");
    assert_eq!(loaded.color, "White");
    assert_eq!(loaded.version, "v1.2");
}

#[test]
fn get_unknown_id_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDeviceRepository::try_new(&conn).unwrap();

    let err = repo.get_device(&DeviceId::from(UNKNOWN_ID)).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id.as_str() == UNKNOWN_ID));
}

#[test]
fn create_duplicate_id_is_a_storage_error() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDeviceRepository::try_new(&conn).unwrap();

    repo.create_device(&pro_device()).unwrap();
    let err = repo.create_device(&pro_device()).unwrap_err();
    assert!(matches!(err, RepoError::Db(_)));
}

#[test]
fn absent_patch_is_a_noop() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDeviceRepository::try_new(&conn).unwrap();

    let outcome = repo.update_device(None).unwrap();
    assert_eq!(outcome.device, None);
    assert_eq!(outcome.rows_affected, 0);
}

#[test]
fn id_only_patch_does_not_touch_storage() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDeviceRepository::try_new(&conn).unwrap();
    let before = repo.create_device(&pro_device()).unwrap();

    let outcome = repo.update_device(Some(&Device::with_id(PRO_ID))).unwrap();
    assert_eq!(outcome.device, None);
    assert_eq!(outcome.rows_affected, 0);

    let after = repo.get_device(&before.id).unwrap();
    assert_eq!(after, before);
}

#[test]
fn sparse_patch_changes_only_provided_fields() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDeviceRepository::try_new(&conn).unwrap();
    let before = repo.create_device(&pro_device()).unwrap();

    let mut patch = Device::with_id(PRO_ID);
    patch.version = "v1.6".to_string();
    let outcome = repo.update_device(Some(&patch)).unwrap();

    assert_eq!(outcome.rows_affected, 1);
    let updated = outcome.device.unwrap();
    assert_eq!(updated.version, "v1.6");
    assert_eq!(updated.model, before.model);
    assert_eq!(updated.color, before.color);
    assert!(updated.update_time >= before.update_time);
    assert_eq!(updated, repo.get_device(&before.id).unwrap());
}

#[test]
fn update_never_rewrites_identity_or_create_time() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDeviceRepository::try_new(&conn).unwrap();
    let before = repo.create_device(&pro_device()).unwrap();

    let mut patch = Device::with_id(PRO_ID);
    patch.color = "Black".to_string();
    patch.create_time = 1;
    repo.update_device(Some(&patch)).unwrap();

    let after = repo.get_device(&before.id).unwrap();
    assert_eq!(after.id, before.id);
    assert_eq!(after.create_time, before.create_time);
    assert_eq!(after.color, "Black");
}

#[test]
fn update_unknown_id_reports_zero_rows() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDeviceRepository::try_new(&conn).unwrap();

    let mut patch = Device::with_id(UNKNOWN_ID);
    patch.model = "Ghost".to_string();
    let outcome = repo.update_device(Some(&patch)).unwrap();
    assert_eq!(outcome.rows_affected, 0);
    assert_eq!(outcome.device, None);
}

#[test]
fn delete_reports_affected_rows_without_not_found_error() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDeviceRepository::try_new(&conn).unwrap();
    repo.create_device(&pro_device()).unwrap();

    assert_eq!(repo.delete_device(&DeviceId::from(PRO_ID)).unwrap(), 1);
    assert_eq!(repo.delete_device(&DeviceId::from(PRO_ID)).unwrap(), 0);
    assert!(matches!(
        repo.get_device(&DeviceId::from(PRO_ID)),
        Err(RepoError::NotFound(_))
    ));
}

#[test]
fn list_filters_by_example() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDeviceRepository::try_new(&conn).unwrap();
    repo.create_device(&pro_device()).unwrap();
    repo.create_device(&normal_device()).unwrap();

    let all = repo.list_devices(&Device::default()).unwrap();
    assert_eq!(ids(&all), vec![PRO_ID, NORMAL_ID]);

    let black = repo.list_devices(&Device::new("", "Black", "")).unwrap();
    assert_eq!(ids(&black), vec![NORMAL_ID]);

    let shared_version = repo.list_devices(&Device::new("", "", "v1.2")).unwrap();
    assert_eq!(shared_version.len(), 2);

    let none = repo.list_devices(&Device::new("Pro", "Black", "")).unwrap();
    assert!(none.is_empty());
}

#[test]
fn find_applies_limit_and_offset_in_creation_order() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDeviceRepository::try_new(&conn).unwrap();
    repo.create_device(&pro_device()).unwrap();
    repo.create_device(&normal_device()).unwrap();

    let first = repo
        .find_devices(&Device::default(), &Page::from_request(1, 1))
        .unwrap();
    assert_eq!(ids(&first), vec![PRO_ID]);

    let second = repo
        .find_devices(&Device::default(), &Page::from_request(2, 1))
        .unwrap();
    assert_eq!(ids(&second), vec![NORMAL_ID]);
}

#[test]
fn find_past_the_end_is_empty_not_an_error() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDeviceRepository::try_new(&conn).unwrap();
    repo.create_device(&pro_device()).unwrap();
    repo.create_device(&normal_device()).unwrap();

    let page = Page {
        limit: 10,
        offset: 2,
    };
    assert!(repo.find_devices(&Device::default(), &page).unwrap().is_empty());

    let offset_only = Page {
        limit: 0,
        offset: 5,
    };
    assert!(repo
        .find_devices(&Device::default(), &offset_only)
        .unwrap()
        .is_empty());
}

#[test]
fn find_with_zero_limit_is_unbounded() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDeviceRepository::try_new(&conn).unwrap();
    repo.create_device(&pro_device()).unwrap();
    repo.create_device(&normal_device()).unwrap();

    let rows = repo
        .find_devices(&Device::default(), &Page::default())
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[test]
fn query_composes_predicates_with_example_filters() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDeviceRepository::try_new(&conn).unwrap();
    repo.create_device(&pro_device()).unwrap();
    repo.create_device(&normal_device()).unwrap();

    let query = repo.query("model IN (?, ?)", ["Pro".to_string(), "Normal".to_string()]);
    assert_eq!(query.count().unwrap(), 2);

    let narrowed = query.filter_by(&Device::new("", "Black", ""));
    assert_eq!(ids(&narrowed.fetch().unwrap()), vec![NORMAL_ID]);

    let first = repo
        .query("create_time > ?", [0_i64])
        .first()
        .unwrap()
        .unwrap();
    assert_eq!(first.id.as_str(), PRO_ID);

    let missing = repo
        .query("model = ?", ["Max".to_string()])
        .first()
        .unwrap();
    assert!(missing.is_none());
}

#[test]
fn repository_rejects_uninitialized_connection() {
    let conn = Connection::open_in_memory().unwrap();

    let result = SqliteDeviceRepository::try_new(&conn);
    match result {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn repository_rejects_connection_without_device_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    let result = SqliteDeviceRepository::try_new(&conn);
    assert!(matches!(
        result,
        Err(RepoError::MissingRequiredTable("device"))
    ));
}

#[test]
fn repository_rejects_connection_missing_timestamp_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE device (
            id TEXT PRIMARY KEY NOT NULL,
            model TEXT NOT NULL,
            color TEXT NOT NULL,
            version TEXT NOT NULL,
            create_time INTEGER NOT NULL
        );",
    )
    .unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    let result = SqliteDeviceRepository::try_new(&conn);
    assert!(matches!(
        result,
        Err(RepoError::MissingRequiredColumn {
            table: "device",
            column: "update_time"
        })
    ));
}

fn pro_device() -> Device {
    Device {
        id: DeviceId::from(PRO_ID),
        ..Device::new("Pro", "White", "v1.2")
    }
}

fn normal_device() -> Device {
    Device {
        id: DeviceId::from(NORMAL_ID),
        ..Device::new("Normal", "Black", "v1.2")
    }
}

fn ids(devices: &[Device]) -> Vec<&str> {
    devices.iter().map(|device| device.id.as_str()).collect()
}
