use super::{
    delete_task, get_task, insert_task, list_graveyard, list_tasks, list_tasks_in_range,
    open_connection, update_task, TaskChanges, CURRENT_SCHEMA_VERSION,
};
use crate::domain::TaskRecord;
use rusqlite::params;
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_db_path() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX_EPOCH")
        .as_nanos();
    std::env::temp_dir()
        .join(format!("dayboard-db-{}-{}.sqlite", nanos, uuid::Uuid::now_v7()))
        .display()
        .to_string()
}

fn cleanup_db_files(path: &str) {
    for suffix in ["", "-wal", "-shm"] {
        let candidate = format!("{path}{suffix}");
        let _ = std::fs::remove_file(candidate);
    }
}

fn table_exists(conn: &rusqlite::Connection, table_name: &str) -> bool {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
            params![table_name],
            |row| row.get(0),
        )
        .expect("table existence query should be readable");
    exists == 1
}

fn record(id: &str, date: Option<&str>, state: &str) -> TaskRecord {
    TaskRecord {
        id: id.to_string(),
        text: format!("task {id}"),
        completed: Some(state == "completed"),
        date: date.map(str::to_string),
        created_at: "2025-01-01T09:00:00Z".to_string(),
        category: Some("life".to_string()),
        state: Some(state.to_string()),
        order: Some("V".to_string()),
        punt_days: None,
    }
}

#[test]
fn configures_connection_pragmas() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    let journal_mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .expect("journal_mode pragma should be readable");
    assert_eq!(journal_mode.to_uppercase(), "WAL");

    let synchronous: i64 = conn
        .query_row("PRAGMA synchronous;", [], |row| row.get(0))
        .expect("synchronous pragma should be readable");
    assert_eq!(synchronous, 1);

    let busy_timeout: i64 = conn
        .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
        .expect("busy_timeout pragma should be readable");
    assert_eq!(busy_timeout, 5000);

    cleanup_db_files(&path);
}

#[test]
fn initializes_tables_and_reapplies_migrations_idempotently() {
    let path = unique_db_path();
    let conn_first = open_connection(&path).expect("first open should initialize schema");
    for table in ["schema_migrations", "meta", "tasks"] {
        assert!(
            table_exists(&conn_first, table),
            "expected table '{}' to exist",
            table
        );
    }
    drop(conn_first);

    let conn_second = open_connection(&path).expect("second open should be idempotent");
    let applied_count: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
            row.get(0)
        })
        .expect("schema_migrations count should be queryable");
    assert_eq!(applied_count, CURRENT_SCHEMA_VERSION);

    let schema_version: String = conn_second
        .query_row(
            "SELECT value FROM meta WHERE key='schema_version'",
            [],
            |row| row.get(0),
        )
        .expect("schema version should be queryable");
    assert_eq!(schema_version, CURRENT_SCHEMA_VERSION.to_string());

    cleanup_db_files(&path);
}

#[test]
fn stores_and_filters_tasks_by_location() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");
    insert_task(&conn, &record("a", Some("2025-01-02"), "active")).expect("insert a");
    insert_task(&conn, &record("b", Some("2025-01-05"), "completed")).expect("insert b");
    insert_task(&conn, &record("c", None, "active")).expect("insert c");

    let fetched = get_task(&conn, "b")
        .expect("get should succeed")
        .expect("task b should exist");
    assert_eq!(fetched.completed, Some(true));
    assert_eq!(fetched.order.as_deref(), Some("V"));

    assert_eq!(list_tasks(&conn).expect("list").len(), 3);
    let in_range = list_tasks_in_range(&conn, "2025-01-01", "2025-01-03").expect("range");
    assert_eq!(
        in_range.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        vec!["a"]
    );
    let buried = list_graveyard(&conn).expect("graveyard");
    assert_eq!(
        buried.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
        vec!["c"]
    );

    cleanup_db_files(&path);
}

#[test]
fn update_touches_only_given_columns_and_tracks_completed() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");
    insert_task(&conn, &record("a", Some("2025-01-02"), "active")).expect("insert a");

    let touched = update_task(
        &conn,
        "a",
        &TaskChanges {
            state: Some("completed"),
            ..TaskChanges::default()
        },
    )
    .expect("update should succeed");
    assert_eq!(touched, 1);
    let row = get_task(&conn, "a").expect("get").expect("exists");
    assert_eq!(row.state.as_deref(), Some("completed"));
    assert_eq!(row.completed, Some(true));
    assert_eq!(row.date.as_deref(), Some("2025-01-02"));

    update_task(
        &conn,
        "a",
        &TaskChanges {
            date: Some(None),
            state: Some("active"),
            ..TaskChanges::default()
        },
    )
    .expect("clearing date should succeed");
    let row = get_task(&conn, "a").expect("get").expect("exists");
    assert_eq!(row.date, None);
    assert_eq!(row.completed, Some(false));
    assert_eq!(row.text, "task a");

    let missing = update_task(&conn, "ghost", &TaskChanges::default()).expect("update");
    assert_eq!(missing, 0);
    assert_eq!(delete_task(&conn, "a").expect("delete"), 1);
    assert_eq!(delete_task(&conn, "a").expect("delete again"), 0);

    cleanup_db_files(&path);
}

#[test]
fn legacy_rows_without_state_columns_are_readable() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");
    conn.execute(
        "INSERT INTO tasks (id, text, completed, date, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params!["old", "legacy", 1, "2024-12-01", "2024-12-01T10:00:00Z"],
    )
    .expect("legacy insert should succeed");

    let row = get_task(&conn, "old").expect("get").expect("exists");
    assert_eq!(row.state, None);
    assert_eq!(row.category, None);
    assert_eq!(row.completed, Some(true));

    cleanup_db_files(&path);
}
