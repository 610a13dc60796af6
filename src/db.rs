use std::time::Duration;

use rusqlite::{params, Connection, DatabaseName, OptionalExtension, Result, Row};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::domain::TaskRecord;

pub const CURRENT_SCHEMA_VERSION: i64 = 3;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: [Migration; 3] = [
    Migration {
        version: 1,
        name: "baseline_tasks_v1",
        sql: r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    text TEXT NOT NULL,
    completed INTEGER NOT NULL DEFAULT 0,
    date TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_date ON tasks(date);
"#,
    },
    Migration {
        version: 2,
        name: "task_state_category_v1",
        sql: r#"
ALTER TABLE tasks ADD COLUMN category TEXT;
ALTER TABLE tasks ADD COLUMN state TEXT;
"#,
    },
    Migration {
        version: 3,
        name: "task_order_v1",
        sql: r#"
ALTER TABLE tasks ADD COLUMN order_key TEXT;

CREATE INDEX IF NOT EXISTS idx_tasks_container
    ON tasks(date, category, state, order_key);
"#,
    },
];

pub fn open_connection(path: &str) -> Result<Connection> {
    let mut conn = Connection::open(path)?;
    configure_for_speed(&conn)?;
    apply_migrations(&mut conn)?;
    Ok(conn)
}

fn configure_for_speed(conn: &Connection) -> Result<()> {
    conn.pragma_update(None::<DatabaseName>, "journal_mode", "WAL")?;
    conn.pragma_update(None::<DatabaseName>, "synchronous", "NORMAL")?;
    conn.pragma_update(None::<DatabaseName>, "foreign_keys", "ON")?;
    conn.pragma_update(None::<DatabaseName>, "temp_store", "MEMORY")?;
    conn.pragma_update(None::<DatabaseName>, "busy_timeout", 5000i64)?;
    conn.busy_timeout(Duration::from_millis(5000))?;
    Ok(())
}

fn apply_migrations(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL
);
"#,
    )?;

    for migration in MIGRATIONS {
        let already_applied: Option<i64> = tx
            .query_row(
                "SELECT version FROM schema_migrations WHERE version = ?1",
                params![migration.version],
                |row| row.get(0),
            )
            .optional()?;

        if already_applied.is_some() {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![migration.version, migration.name, now_utc_rfc3339()],
        )?;
    }

    tx.execute(
        r#"
INSERT INTO meta (key, value)
VALUES ('schema_version', ?1)
ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#,
        params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;

    tx.commit()
}

fn now_utc_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .expect("RFC3339 formatting for UTC timestamp should never fail")
}

const TASK_COLUMNS: &str = "id, text, completed, date, created_at, category, state, order_key";

fn task_from_row(row: &Row<'_>) -> Result<TaskRecord> {
    let completed: i64 = row.get(2)?;
    Ok(TaskRecord {
        id: row.get(0)?,
        text: row.get(1)?,
        completed: Some(completed != 0),
        date: row.get(3)?,
        created_at: row.get(4)?,
        category: row.get(5)?,
        state: row.get(6)?,
        order: row.get(7)?,
        punt_days: None,
    })
}

fn collect_tasks(
    conn: &Connection,
    sql: &str,
    args: impl rusqlite::Params,
) -> Result<Vec<TaskRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(args)?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        result.push(task_from_row(row)?);
    }
    Ok(result)
}

pub fn insert_task(conn: &Connection, record: &TaskRecord) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO tasks (id, text, completed, date, created_at, category, state, order_key)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
"#,
        params![
            record.id,
            record.text,
            record.completed.unwrap_or(false),
            record.date,
            record.created_at,
            record.category,
            record.state,
            record.order
        ],
    )?;
    Ok(())
}

pub fn get_task(conn: &Connection, id: &str) -> Result<Option<TaskRecord>> {
    conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
        params![id],
        task_from_row,
    )
    .optional()
}

pub fn list_tasks(conn: &Connection) -> Result<Vec<TaskRecord>> {
    collect_tasks(
        conn,
        &format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY date ASC, id ASC"),
        [],
    )
}

/// Dated tasks with `start <= date <= end`; dates compare as `YYYY-MM-DD` text.
pub fn list_tasks_in_range(
    conn: &Connection,
    start: &str,
    end: &str,
) -> Result<Vec<TaskRecord>> {
    collect_tasks(
        conn,
        &format!(
            "SELECT {TASK_COLUMNS} FROM tasks \
             WHERE date IS NOT NULL AND date >= ?1 AND date <= ?2 \
             ORDER BY date ASC, id ASC"
        ),
        params![start, end],
    )
}

pub fn list_graveyard(conn: &Connection) -> Result<Vec<TaskRecord>> {
    collect_tasks(
        conn,
        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE date IS NULL ORDER BY id ASC"),
        [],
    )
}

/// Column changes for one row. Outer `None` leaves a column alone; for
/// `date`, `Some(None)` clears it.
#[derive(Debug, Default)]
pub struct TaskChanges<'a> {
    pub text: Option<&'a str>,
    pub date: Option<Option<&'a str>>,
    pub category: Option<&'a str>,
    pub state: Option<&'a str>,
    pub order_key: Option<&'a str>,
}

/// Returns the number of rows touched (0 when the id is unknown).
pub fn update_task(conn: &Connection, id: &str, changes: &TaskChanges<'_>) -> Result<usize> {
    let completed = changes.state.map(|state| state == "completed");
    conn.execute(
        r#"
UPDATE tasks SET
    text = COALESCE(?2, text),
    date = CASE WHEN ?3 THEN ?4 ELSE date END,
    category = COALESCE(?5, category),
    state = COALESCE(?6, state),
    completed = COALESCE(?7, completed),
    order_key = COALESCE(?8, order_key)
WHERE id = ?1
"#,
        params![
            id,
            changes.text,
            changes.date.is_some(),
            changes.date.flatten(),
            changes.category,
            changes.state,
            completed,
            changes.order_key
        ],
    )
}

pub fn delete_task(conn: &Connection, id: &str) -> Result<usize> {
    conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])
}

#[cfg(test)]
mod tests;
