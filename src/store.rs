use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use time::Date;

use crate::db::{self, TaskChanges};
use crate::domain::dates::format_date;
use crate::domain::{Category, Location, Task, TaskId, TaskRecord, TaskState};
use crate::order_key::OrderKey;
use crate::port::{PortError, PuntBatch, ReorderMove, TaskPatch, TaskPort};

/// SQLite-backed port. Calls run on tokio's blocking pool; batches commit in
/// a single transaction.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = db::open_connection(&path.display().to_string())?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, op: F) -> Result<T, PortError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, PortError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| PortError::Unavailable("sqlite connection lock poisoned".into()))?;
            op(&mut guard)
        })
        .await
        .map_err(|err| PortError::Unavailable(format!("sqlite worker failed: {}", err)))?
    }

    async fn patch_all(&self, patches: Vec<(TaskId, TaskPatch)>) -> Result<(), PortError> {
        self.run(move |conn| {
            let tx = conn.transaction()?;
            for (id, patch) in &patches {
                write_patch(&tx, id, patch)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn fetch(
        &self,
        query: impl FnOnce(&Connection) -> rusqlite::Result<Vec<TaskRecord>> + Send + 'static,
    ) -> Result<Vec<Task>, PortError> {
        let records = self.run(move |conn| Ok(query(conn)?)).await?;
        records
            .into_iter()
            .map(|record| Task::try_from(record).map_err(PortError::from))
            .collect()
    }
}

fn write_patch(conn: &Connection, id: &TaskId, patch: &TaskPatch) -> Result<(), PortError> {
    let date = patch.location.map(|location| location.date().map(format_date));
    let changes = TaskChanges {
        text: patch.text.as_deref(),
        date: date.as_ref().map(|date| date.as_deref()),
        category: patch.category.map(Category::as_str),
        state: patch.state.map(TaskState::as_str),
        order_key: patch.order.as_ref().map(OrderKey::as_str),
    };
    match db::update_task(conn, id.as_str(), &changes)? {
        0 => Err(PortError::NotFound(id.clone())),
        _ => Ok(()),
    }
}

fn moved_to(location: Location, order: Option<OrderKey>) -> TaskPatch {
    TaskPatch {
        location: Some(location),
        state: Some(TaskState::Active),
        order,
        ..TaskPatch::default()
    }
}

fn reorder_patch(item: &ReorderMove) -> TaskPatch {
    let mut patch = TaskPatch {
        order: Some(item.order.clone()),
        ..TaskPatch::default()
    };
    if let Some(fields) = item.container {
        patch.location = Some(fields.location);
        patch.category = Some(fields.category);
        patch.state = Some(fields.state);
    }
    patch
}

impl TaskPort for SqliteStore {
    async fn create(&self, task: Task) -> Result<(), PortError> {
        let record = TaskRecord::from(task);
        self.run(move |conn| Ok(db::insert_task(conn, &record)?))
            .await
    }

    async fn update(&self, id: TaskId, patch: TaskPatch) -> Result<(), PortError> {
        self.run(move |conn| write_patch(conn, &id, &patch)).await
    }

    async fn delete(&self, id: TaskId) -> Result<(), PortError> {
        self.run(move |conn| match db::delete_task(conn, id.as_str())? {
            0 => Err(PortError::NotFound(id)),
            _ => Ok(()),
        })
        .await
    }

    async fn batch_punt(&self, batch: PuntBatch) -> Result<(), PortError> {
        let target = Location::Day(batch.target_date);
        let patches = batch
            .tasks
            .into_iter()
            .map(|punted| (punted.id, moved_to(target, punted.order)))
            .collect();
        self.patch_all(patches).await
    }

    async fn batch_set_state(&self, ids: Vec<TaskId>, state: TaskState) -> Result<(), PortError> {
        let patches = ids
            .into_iter()
            .map(|id| (id, TaskPatch::state(state)))
            .collect();
        self.patch_all(patches).await
    }

    async fn batch_graveyard(&self, ids: Vec<TaskId>) -> Result<(), PortError> {
        let patches = ids
            .into_iter()
            .map(|id| (id, moved_to(Location::Graveyard, None)))
            .collect();
        self.patch_all(patches).await
    }

    async fn reorder(&self, item: ReorderMove) -> Result<(), PortError> {
        self.patch_all(vec![(item.id.clone(), reorder_patch(&item))])
            .await
    }

    async fn batch_reorder(&self, items: Vec<ReorderMove>) -> Result<(), PortError> {
        let patches = items
            .iter()
            .map(|item| (item.id.clone(), reorder_patch(item)))
            .collect();
        self.patch_all(patches).await
    }

    async fn resurrect(&self, id: TaskId, target: Date) -> Result<(), PortError> {
        self.patch_all(vec![(id, moved_to(Location::Day(target), None))])
            .await
    }

    async fn fetch_all(&self) -> Result<Vec<Task>, PortError> {
        self.fetch(db::list_tasks).await
    }

    async fn fetch_range(&self, start: Date, end: Date) -> Result<Vec<Task>, PortError> {
        let (start, end) = (format_date(start), format_date(end));
        self.fetch(move |conn| db::list_tasks_in_range(conn, &start, &end))
            .await
    }

    async fn fetch_graveyard(&self) -> Result<Vec<Task>, PortError> {
        self.fetch(db::list_graveyard).await
    }
}
