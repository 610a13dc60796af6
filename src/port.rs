//! Boundary between the engine and wherever tasks are actually kept.

use std::error::Error;
use std::fmt;
use std::future::Future;

use time::Date;

use crate::domain::task::TaskRecordError;
use crate::domain::{Category, Location, Task, TaskId, TaskState};
use crate::order_key::OrderKey;

#[cfg(test)]
pub mod memory;

/// Field-level changes for a single task. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub location: Option<Location>,
    pub category: Option<Category>,
    pub state: Option<TaskState>,
    pub order: Option<OrderKey>,
}

impl TaskPatch {
    pub fn state(state: TaskState) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }

    /// Changes that turn `before` into `after`.
    pub fn diff(before: &Task, after: &Task) -> Self {
        Self {
            text: (before.text != after.text).then(|| after.text.clone()),
            location: (before.date != after.date).then(|| after.location()),
            category: (before.category != after.category).then_some(after.category),
            state: (before.state != after.state).then_some(after.state),
            order: if before.order != after.order {
                after.order.clone()
            } else {
                None
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.location.is_none()
            && self.category.is_none()
            && self.state.is_none()
            && self.order.is_none()
    }

    pub fn apply_to(&self, task: &mut Task) {
        if let Some(text) = &self.text {
            task.text = text.clone();
        }
        if let Some(location) = self.location {
            task.date = location.date();
        }
        if let Some(category) = self.category {
            task.category = category;
        }
        if let Some(state) = self.state {
            task.state = state;
        }
        if let Some(order) = &self.order {
            task.order = Some(order.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuntedTask {
    pub id: TaskId,
    pub order: Option<OrderKey>,
}

/// Tasks moved forward together. Every task lands on `target_date` as active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuntBatch {
    pub source_date: Date,
    pub target_date: Date,
    pub tasks: Vec<PuntedTask>,
}

impl PuntBatch {
    pub fn ids(&self) -> impl Iterator<Item = &TaskId> {
        self.tasks.iter().map(|task| &task.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerFields {
    pub location: Location,
    pub category: Category,
    pub state: TaskState,
}

impl ContainerFields {
    pub fn of(task: &Task) -> Self {
        Self {
            location: task.location(),
            category: task.category,
            state: task.state,
        }
    }
}

/// A new position, and for cross-container moves the new container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderMove {
    pub id: TaskId,
    pub order: OrderKey,
    pub container: Option<ContainerFields>,
}

impl ReorderMove {
    pub fn apply_to(&self, task: &mut Task) {
        task.order = Some(self.order.clone());
        if let Some(fields) = self.container {
            task.date = fields.location.date();
            task.category = fields.category;
            task.state = fields.state;
        }
    }
}

/// Remote store for tasks.
///
/// Batch calls are all-or-nothing: if any id is unknown nothing is written
/// and the call fails with [`PortError::NotFound`].
pub trait TaskPort: Send + Sync + 'static {
    fn create(&self, task: Task) -> impl Future<Output = Result<(), PortError>> + Send;

    fn update(
        &self,
        id: TaskId,
        patch: TaskPatch,
    ) -> impl Future<Output = Result<(), PortError>> + Send;

    fn delete(&self, id: TaskId) -> impl Future<Output = Result<(), PortError>> + Send;

    fn batch_punt(&self, batch: PuntBatch) -> impl Future<Output = Result<(), PortError>> + Send;

    fn batch_set_state(
        &self,
        ids: Vec<TaskId>,
        state: TaskState,
    ) -> impl Future<Output = Result<(), PortError>> + Send;

    fn batch_graveyard(
        &self,
        ids: Vec<TaskId>,
    ) -> impl Future<Output = Result<(), PortError>> + Send;

    fn reorder(&self, item: ReorderMove) -> impl Future<Output = Result<(), PortError>> + Send;

    fn batch_reorder(
        &self,
        items: Vec<ReorderMove>,
    ) -> impl Future<Output = Result<(), PortError>> + Send;

    fn resurrect(
        &self,
        id: TaskId,
        target: Date,
    ) -> impl Future<Output = Result<(), PortError>> + Send;

    fn fetch_all(&self) -> impl Future<Output = Result<Vec<Task>, PortError>> + Send;

    /// Tasks dated within `start..=end`.
    fn fetch_range(
        &self,
        start: Date,
        end: Date,
    ) -> impl Future<Output = Result<Vec<Task>, PortError>> + Send;

    fn fetch_graveyard(&self) -> impl Future<Output = Result<Vec<Task>, PortError>> + Send;
}

#[derive(Debug)]
pub enum PortError {
    NotFound(TaskId),
    Rejected(String),
    Db(rusqlite::Error),
    Unavailable(String),
}

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortError::NotFound(id) => write!(f, "task '{}' not found", id),
            PortError::Rejected(message) => write!(f, "write rejected: {}", message),
            PortError::Db(err) => write!(f, "database error: {}", err),
            PortError::Unavailable(message) => write!(f, "store unavailable: {}", message),
        }
    }
}

impl Error for PortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PortError::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for PortError {
    fn from(value: rusqlite::Error) -> Self {
        PortError::Db(value)
    }
}

impl From<TaskRecordError> for PortError {
    fn from(value: TaskRecordError) -> Self {
        PortError::Rejected(value.to_string())
    }
}
