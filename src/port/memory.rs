use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use time::Date;
use tokio::sync::watch;

use super::{PortError, PuntBatch, ReorderMove, TaskPatch, TaskPort};
use crate::domain::{Task, TaskId, TaskState};
use crate::lifecycle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortCall {
    Create(TaskId),
    Update(TaskId, TaskPatch),
    Delete(TaskId),
    BatchPunt(PuntBatch),
    BatchSetState(Vec<TaskId>, TaskState),
    BatchGraveyard(Vec<TaskId>),
    Reorder(ReorderMove),
    BatchReorder(Vec<ReorderMove>),
    Resurrect(TaskId, Date),
}

impl PortCall {
    pub fn touches(&self, id: &TaskId) -> bool {
        match self {
            PortCall::Create(target)
            | PortCall::Update(target, _)
            | PortCall::Delete(target)
            | PortCall::Resurrect(target, _) => target == id,
            PortCall::BatchPunt(batch) => batch.ids().any(|target| target == id),
            PortCall::BatchSetState(ids, _) | PortCall::BatchGraveyard(ids) => ids.contains(id),
            PortCall::Reorder(item) => &item.id == id,
            PortCall::BatchReorder(items) => items.iter().any(|item| &item.id == id),
        }
    }
}

/// In-process port with failure injection, a call log, and a gate that
/// holds writes in flight until released.
pub struct MemoryPort {
    tasks: Mutex<BTreeMap<TaskId, Task>>,
    calls: Mutex<Vec<PortCall>>,
    fail_all: AtomicBool,
    fail_next: AtomicUsize,
    failing: Mutex<HashSet<TaskId>>,
    gate: watch::Sender<bool>,
}

impl MemoryPort {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            tasks: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_all: AtomicBool::new(false),
            fail_next: AtomicUsize::new(0),
            failing: Mutex::new(HashSet::new()),
            gate,
        }
    }

    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let port = Self::new();
        {
            let mut stored = port.tasks.lock().expect("memory port lock should not poison");
            for task in tasks {
                stored.insert(task.id.clone(), task);
            }
        }
        port
    }

    pub fn stored(&self, id: &TaskId) -> Option<Task> {
        self.tasks
            .lock()
            .expect("memory port lock should not poison")
            .get(id)
            .cloned()
    }

    pub fn calls(&self) -> Vec<PortCall> {
        self.calls
            .lock()
            .expect("memory port lock should not poison")
            .clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    pub fn fail_next_writes(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Rejects every write that touches `id`.
    pub fn fail_task(&self, id: &TaskId) {
        self.failing
            .lock()
            .expect("memory port lock should not poison")
            .insert(id.clone());
    }

    pub fn hold_writes(&self) {
        self.gate.send_replace(false);
    }

    pub fn release_writes(&self) {
        self.gate.send_replace(true);
    }

    fn should_fail(&self, call: &PortCall) -> bool {
        if self.fail_all.load(Ordering::SeqCst) {
            return true;
        }
        let failing = self.failing.lock().expect("memory port lock should not poison");
        if failing.iter().any(|id| call.touches(id)) {
            return true;
        }
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    async fn write<F>(&self, call: PortCall, apply: F) -> Result<(), PortError>
    where
        F: FnOnce(&mut BTreeMap<TaskId, Task>) -> Result<(), PortError> + Send,
    {
        let fail = {
            let mut calls = self.calls.lock().expect("memory port lock should not poison");
            calls.push(call.clone());
            self.should_fail(&call)
        };
        let mut gate = self.gate.subscribe();
        if gate.wait_for(|open| *open).await.is_err() {
            return Err(PortError::Unavailable("memory port closed".to_string()));
        }
        if fail {
            return Err(PortError::Unavailable("injected failure".to_string()));
        }
        let mut tasks = self.tasks.lock().expect("memory port lock should not poison");
        apply(&mut tasks)
    }
}

fn require_all<'a>(
    tasks: &BTreeMap<TaskId, Task>,
    ids: impl IntoIterator<Item = &'a TaskId>,
) -> Result<(), PortError> {
    for id in ids {
        if !tasks.contains_key(id) {
            return Err(PortError::NotFound(id.clone()));
        }
    }
    Ok(())
}

fn stored_mut<'a>(
    tasks: &'a mut BTreeMap<TaskId, Task>,
    id: &TaskId,
) -> Result<&'a mut Task, PortError> {
    tasks
        .get_mut(id)
        .ok_or_else(|| PortError::NotFound(id.clone()))
}

impl TaskPort for MemoryPort {
    async fn create(&self, task: Task) -> Result<(), PortError> {
        self.write(PortCall::Create(task.id.clone()), move |tasks| {
            tasks.insert(task.id.clone(), task);
            Ok(())
        })
        .await
    }

    async fn update(&self, id: TaskId, patch: TaskPatch) -> Result<(), PortError> {
        let call = PortCall::Update(id.clone(), patch.clone());
        self.write(call, move |tasks| {
            patch.apply_to(stored_mut(tasks, &id)?);
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: TaskId) -> Result<(), PortError> {
        self.write(PortCall::Delete(id.clone()), move |tasks| {
            tasks
                .remove(&id)
                .map(|_| ())
                .ok_or(PortError::NotFound(id))
        })
        .await
    }

    async fn batch_punt(&self, batch: PuntBatch) -> Result<(), PortError> {
        self.write(PortCall::BatchPunt(batch.clone()), move |tasks| {
            require_all(tasks, batch.ids())?;
            for punted in &batch.tasks {
                let task = stored_mut(tasks, &punted.id)?;
                task.date = Some(batch.target_date);
                task.state = TaskState::Active;
                task.order = punted.order.clone();
            }
            Ok(())
        })
        .await
    }

    async fn batch_set_state(&self, ids: Vec<TaskId>, state: TaskState) -> Result<(), PortError> {
        self.write(PortCall::BatchSetState(ids.clone(), state), move |tasks| {
            require_all(tasks, &ids)?;
            for id in &ids {
                stored_mut(tasks, id)?.state = state;
            }
            Ok(())
        })
        .await
    }

    async fn batch_graveyard(&self, ids: Vec<TaskId>) -> Result<(), PortError> {
        self.write(PortCall::BatchGraveyard(ids.clone()), move |tasks| {
            require_all(tasks, &ids)?;
            for id in &ids {
                let task = stored_mut(tasks, id)?;
                *task = lifecycle::graveyard(task.clone());
            }
            Ok(())
        })
        .await
    }

    async fn reorder(&self, item: ReorderMove) -> Result<(), PortError> {
        self.write(PortCall::Reorder(item.clone()), move |tasks| {
            item.apply_to(stored_mut(tasks, &item.id)?);
            Ok(())
        })
        .await
    }

    async fn batch_reorder(&self, items: Vec<ReorderMove>) -> Result<(), PortError> {
        self.write(PortCall::BatchReorder(items.clone()), move |tasks| {
            require_all(tasks, items.iter().map(|item| &item.id))?;
            for item in &items {
                item.apply_to(stored_mut(tasks, &item.id)?);
            }
            Ok(())
        })
        .await
    }

    async fn resurrect(&self, id: TaskId, target: Date) -> Result<(), PortError> {
        self.write(PortCall::Resurrect(id.clone(), target), move |tasks| {
            let task = stored_mut(tasks, &id)?;
            *task = lifecycle::resurrect(task.clone(), target);
            Ok(())
        })
        .await
    }

    async fn fetch_all(&self) -> Result<Vec<Task>, PortError> {
        Ok(self
            .tasks
            .lock()
            .expect("memory port lock should not poison")
            .values()
            .cloned()
            .collect())
    }

    async fn fetch_range(&self, start: Date, end: Date) -> Result<Vec<Task>, PortError> {
        Ok(self
            .tasks
            .lock()
            .expect("memory port lock should not poison")
            .values()
            .filter(|task| task.date.is_some_and(|date| date >= start && date <= end))
            .cloned()
            .collect())
    }

    async fn fetch_graveyard(&self) -> Result<Vec<Task>, PortError> {
        Ok(self
            .tasks
            .lock()
            .expect("memory port lock should not poison")
            .values()
            .filter(|task| task.is_graveyarded())
            .cloned()
            .collect())
    }
}
