use time::Date;

use crate::domain::{Task, TaskId, TaskState};
use crate::port::{PortError, PuntBatch, ReorderMove, TaskPatch, TaskPort};

/// The port call that persists one mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum RemoteWrite {
    Nothing,
    Create(Task),
    Update(TaskId, TaskPatch),
    Delete(TaskId),
    Punt(PuntBatch),
    SetState(Vec<TaskId>, TaskState),
    Graveyard(Vec<TaskId>),
    Reorder(ReorderMove),
    BatchReorder(Vec<ReorderMove>),
    Resurrect(TaskId, Date),
}

impl RemoteWrite {
    pub(super) fn update(id: TaskId, patch: TaskPatch) -> Self {
        if patch.is_empty() {
            RemoteWrite::Nothing
        } else {
            RemoteWrite::Update(id, patch)
        }
    }

    pub(super) fn is_nothing(&self) -> bool {
        matches!(self, RemoteWrite::Nothing)
    }

    pub(super) async fn send<P: TaskPort>(self, port: &P) -> Result<(), PortError> {
        match self {
            RemoteWrite::Nothing => Ok(()),
            RemoteWrite::Create(task) => port.create(task).await,
            RemoteWrite::Update(id, patch) => port.update(id, patch).await,
            RemoteWrite::Delete(id) => port.delete(id).await,
            RemoteWrite::Punt(batch) => port.batch_punt(batch).await,
            RemoteWrite::SetState(ids, state) => port.batch_set_state(ids, state).await,
            RemoteWrite::Graveyard(ids) => port.batch_graveyard(ids).await,
            RemoteWrite::Reorder(item) => port.reorder(item).await,
            RemoteWrite::BatchReorder(items) => port.batch_reorder(items).await,
            RemoteWrite::Resurrect(id, target) => port.resurrect(id, target).await,
        }
    }
}
