//! Optimistic task engine.
//!
//! Every mutation is applied to the in-memory collection first and published
//! to subscribers, then persisted through a [`TaskPort`] on the tokio runtime
//! the engine was created on. When the port rejects a write, the tasks that
//! write touched are restored and a rollback notification is published.
//!
//! Rollbacks are guarded per task: a failed write only restores a task if no
//! later mutation has touched it since.

pub mod collection;
mod debounce;
pub mod events;
mod remote;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::error::Error;
use std::fmt;
use std::slice;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use time::Date;
use tokio::runtime::Handle;
use tokio::sync::broadcast;

pub use collection::TaskCollection;
pub use events::{Notification, NotificationKind, Operation, WriteOutcome, WriteTicket};

use crate::clock::Clock;
use crate::container::{container_of, neighbor_keys, ContainerKey, StateCounts};
use crate::domain::{Category, Task, TaskId, TaskState};
use crate::lifecycle::{self, LifecycleError};
use crate::order_key::OrderKey;
use crate::port::{
    ContainerFields, PortError, PuntBatch, PuntedTask, ReorderMove, TaskPatch, TaskPort,
};
use debounce::PendingWrite;
use remote::RemoteWrite;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(3000);
const NOTIFICATION_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Quiet window before a toggle burst is written.
    pub debounce: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

pub struct Engine<P: TaskPort> {
    shared: Arc<Shared<P>>,
}

struct Shared<P> {
    port: P,
    clock: Arc<dyn Clock>,
    runtime: Handle,
    debounce: Duration,
    events: broadcast::Sender<Notification>,
    state: Mutex<EngineState>,
}

#[derive(Default)]
struct EngineState {
    tasks: TaskCollection,
    revision: u64,
    /// Revision of the last mutation applied to each task.
    touched: HashMap<TaskId, u64>,
    pending: HashMap<TaskId, PendingWrite>,
    /// Writes sent to the port that have not settled, per task.
    in_flight: HashMap<TaskId, usize>,
    next_generation: u64,
    closed: bool,
}

/// How to put one task back if a write fails. `None` means the task did not
/// exist before.
struct Undo {
    id: TaskId,
    before: Option<Task>,
}

struct Plan {
    operation: Operation,
    upserts: Vec<Task>,
    removals: Vec<TaskId>,
    write: RemoteWrite,
}

impl Plan {
    fn upsert(operation: Operation, tasks: Vec<Task>, write: RemoteWrite) -> Self {
        Self {
            operation,
            upserts: tasks,
            removals: Vec::new(),
            write,
        }
    }
}

struct DueWrite {
    write: RemoteWrite,
    undo: Vec<Undo>,
    revision: u64,
}

#[derive(Debug, Clone, Copy)]
enum LoadScope {
    All,
    Range(Date, Date),
    Graveyard,
}

impl LoadScope {
    fn covers(self, task: &Task) -> bool {
        match self {
            LoadScope::All => true,
            LoadScope::Range(start, end) => {
                task.date.is_some_and(|date| date >= start && date <= end)
            }
            LoadScope::Graveyard => task.is_graveyarded(),
        }
    }
}

impl EngineState {
    fn task(&self, id: &TaskId) -> Result<&Task, EngineError> {
        self.tasks
            .get(id)
            .ok_or_else(|| EngineError::NotFound(id.clone()))
    }

    /// The version of a task the store is believed to hold: the debounce
    /// baseline while a toggle burst is pending, otherwise the current task.
    fn persisted<'a>(&'a self, id: &TaskId, current: &'a Task) -> &'a Task {
        self.pending
            .get(id)
            .map_or(current, |pending| &pending.baseline)
    }

    fn append_key(&self, key: ContainerKey, moving: Option<&TaskId>) -> OrderKey {
        let members = self.tasks.tasks_in(key);
        let keys = neighbor_keys(&members, moving);
        OrderKey::after(keys.last())
    }

    fn bump(&mut self, ids: &[TaskId]) -> u64 {
        self.revision += 1;
        for id in ids {
            self.touched.insert(id.clone(), self.revision);
        }
        self.revision
    }

    fn start_writes<'a>(&mut self, ids: impl IntoIterator<Item = &'a TaskId>) {
        for id in ids {
            *self.in_flight.entry(id.clone()).or_default() += 1;
        }
    }

    fn finish_writes<'a>(&mut self, ids: impl IntoIterator<Item = &'a TaskId>) {
        for id in ids {
            if let Some(count) = self.in_flight.get_mut(id) {
                *count -= 1;
                if *count == 0 {
                    self.in_flight.remove(id);
                }
            }
        }
    }

    fn cancel_pending(&mut self, id: &TaskId) -> Option<Task> {
        let pending = self.pending.remove(id)?;
        log::debug!(
            "event=toggle_write_cancelled task={} generation={}",
            id,
            pending.generation
        );
        Some(pending.cancel())
    }

    fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}

impl<P: TaskPort> Shared<P> {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(
        &self,
        kind: NotificationKind,
        operation: Operation,
        task_ids: Vec<TaskId>,
        snapshot: Arc<TaskCollection>,
        error: Option<String>,
    ) {
        // No receivers is not an error; nobody is watching yet.
        let _ = self.events.send(Notification {
            kind,
            operation,
            task_ids,
            snapshot,
            error,
        });
    }

    fn take_due(&self, id: &TaskId, generation: u64) -> Option<DueWrite> {
        let mut state = self.lock();
        if state.pending.get(id)?.generation != generation {
            return None;
        }
        let pending = state.pending.remove(id)?;
        let current = state.tasks.get(id)?;
        let patch = TaskPatch::diff(&pending.baseline, current);
        let write = RemoteWrite::update(id.clone(), patch);
        let revision = state.touched.get(id).copied().unwrap_or(state.revision);
        if !write.is_nothing() {
            state.start_writes([id]);
        }
        Some(DueWrite {
            write,
            undo: vec![Undo {
                id: id.clone(),
                before: Some(pending.baseline),
            }],
            revision,
        })
    }

    fn settle(
        &self,
        operation: Operation,
        undo: Vec<Undo>,
        revision: u64,
        result: Result<(), PortError>,
    ) -> WriteOutcome {
        let err = match result {
            Ok(()) => {
                self.lock().finish_writes(undo.iter().map(|entry| &entry.id));
                log::info!(
                    "event=write_committed op={} tasks={} revision={}",
                    operation,
                    undo.len(),
                    revision
                );
                return WriteOutcome::Committed;
            }
            Err(err) => err,
        };

        let (restored, snapshot) = {
            let mut state = self.lock();
            state.finish_writes(undo.iter().map(|entry| &entry.id));
            let mut restored = Vec::new();
            for entry in undo {
                if state.touched.get(&entry.id) != Some(&revision) {
                    continue;
                }
                match entry.before {
                    Some(task) => {
                        state.tasks.upsert(task);
                    }
                    None => {
                        state.tasks.remove(&entry.id);
                    }
                }
                restored.push(entry.id);
            }
            (restored, Arc::new(state.tasks.clone()))
        };

        log::warn!(
            "event=write_rolled_back op={} restored={} revision={} error={}",
            operation,
            restored.len(),
            revision,
            err
        );
        self.notify(
            NotificationKind::RolledBack,
            operation,
            restored,
            snapshot,
            Some(err.to_string()),
        );
        WriteOutcome::RolledBack(err)
    }
}

impl<P: TaskPort> Engine<P> {
    /// Must be called from within a tokio runtime; writes are spawned on it.
    pub fn new(
        port: P,
        clock: Arc<dyn Clock>,
        options: EngineOptions,
    ) -> Result<Self, EngineError> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        let (events, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Ok(Self {
            shared: Arc::new(Shared {
                port,
                clock,
                runtime,
                debounce: options.debounce,
                events,
                state: Mutex::new(EngineState::default()),
            }),
        })
    }

    pub fn port(&self) -> &P {
        &self.shared.port
    }

    pub fn today(&self) -> Date {
        self.shared.clock.today()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.shared.events.subscribe()
    }

    pub fn snapshot(&self) -> Arc<TaskCollection> {
        Arc::new(self.shared.lock().tasks.clone())
    }

    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.shared.lock().tasks.get(id).cloned()
    }

    pub fn containers(&self) -> BTreeMap<ContainerKey, Vec<Task>> {
        self.shared.lock().tasks.containers()
    }

    pub fn tasks_in(&self, key: ContainerKey) -> Vec<Task> {
        self.shared.lock().tasks.tasks_in(key)
    }

    pub fn counts_by_date(&self, category: Option<Category>) -> BTreeMap<Date, StateCounts> {
        self.shared.lock().tasks.counts_by_date(category)
    }

    /// Ids with a debounced write still waiting for its window.
    pub fn pending_writes(&self) -> usize {
        self.shared.lock().pending.len()
    }

    pub async fn load(&self) -> Result<usize, EngineError> {
        let since = self.shared.lock().revision;
        let fetched = self.shared.port.fetch_all().await.map_err(EngineError::Load)?;
        Ok(self.reconcile(LoadScope::All, fetched, since))
    }

    /// Merges the dated tasks in `start..=end` without touching other days.
    pub async fn load_range(&self, start: Date, end: Date) -> Result<usize, EngineError> {
        let since = self.shared.lock().revision;
        let fetched = self
            .shared
            .port
            .fetch_range(start, end)
            .await
            .map_err(EngineError::Load)?;
        Ok(self.reconcile(LoadScope::Range(start, end), fetched, since))
    }

    pub async fn load_graveyard(&self) -> Result<usize, EngineError> {
        let since = self.shared.lock().revision;
        let fetched = self
            .shared
            .port
            .fetch_graveyard()
            .await
            .map_err(EngineError::Load)?;
        Ok(self.reconcile(LoadScope::Graveyard, fetched, since))
    }

    /// Replaces the tasks in `scope` with `fetched`, except tasks mutated
    /// locally while the fetch was in flight and tasks whose writes have not
    /// settled yet.
    fn reconcile(&self, scope: LoadScope, fetched: Vec<Task>, since: u64) -> usize {
        let loaded = fetched.len();
        let (ids, snapshot) = {
            let mut state = self.shared.lock();
            let state = &mut *state;
            let keep_local: HashSet<TaskId> = state
                .touched
                .iter()
                .filter(|(_, revision)| **revision > since)
                .map(|(id, _)| id.clone())
                .chain(state.pending.keys().cloned())
                .chain(state.in_flight.keys().cloned())
                .collect();

            let stale = state
                .tasks
                .iter()
                .filter(|task| scope.covers(task) && !keep_local.contains(&task.id))
                .map(|task| task.id.clone())
                .collect::<Vec<_>>();
            for id in &stale {
                state.tasks.remove(id);
            }

            let mut ids = stale;
            for task in fetched {
                if keep_local.contains(&task.id) {
                    continue;
                }
                ids.push(task.id.clone());
                state.tasks.upsert(task);
            }
            ids.sort();
            ids.dedup();
            state.bump(&ids);
            (ids, Arc::new(state.tasks.clone()))
        };

        log::info!(
            "event=tasks_loaded scope={:?} fetched={} total={}",
            scope,
            loaded,
            snapshot.len()
        );
        self.shared.notify(
            NotificationKind::Loaded,
            Operation::Load,
            ids,
            snapshot,
            None,
        );
        loaded
    }

    /// Applies a planned mutation locally, publishes it, and spawns its
    /// write. A planner returning `None` means there is nothing to do.
    fn apply<F>(&self, planner: F) -> Result<WriteTicket, EngineError>
    where
        F: FnOnce(&EngineState) -> Result<Option<Plan>, EngineError>,
    {
        let (operation, ids, undo, write, revision, snapshot) = {
            let mut state = self.shared.lock();
            if state.closed {
                return Err(EngineError::Closed);
            }
            let Some(plan) = planner(&state)? else {
                return Ok(WriteTicket::committed());
            };

            let ids = plan
                .upserts
                .iter()
                .map(|task| task.id.clone())
                .chain(plan.removals.iter().cloned())
                .collect::<Vec<_>>();
            let mut undo = Vec::with_capacity(ids.len());
            for id in &ids {
                let before = match state.cancel_pending(id) {
                    Some(baseline) => Some(baseline),
                    None => state.tasks.get(id).cloned(),
                };
                undo.push(Undo {
                    id: id.clone(),
                    before,
                });
            }
            for task in plan.upserts {
                state.tasks.upsert(task);
            }
            for id in &plan.removals {
                state.tasks.remove(id);
            }
            let revision = state.bump(&ids);
            if !plan.write.is_nothing() {
                state.start_writes(&ids);
            }
            let snapshot = Arc::new(state.tasks.clone());
            (plan.operation, ids, undo, plan.write, revision, snapshot)
        };

        log::info!(
            "event=mutation_applied op={} tasks={} revision={}",
            operation,
            ids.len(),
            revision
        );
        self.shared
            .notify(NotificationKind::Applied, operation, ids, snapshot, None);

        if write.is_nothing() {
            return Ok(WriteTicket::committed());
        }
        let shared = Arc::clone(&self.shared);
        let handle = self.shared.runtime.spawn(async move {
            let result = write.send(&shared.port).await;
            shared.settle(operation, undo, revision, result)
        });
        Ok(WriteTicket::Pending(handle))
    }

    /// Adds an active task at the end of its day.
    pub fn create(
        &self,
        text: &str,
        date: Date,
        category: Category,
    ) -> Result<(Task, WriteTicket), EngineError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::EmptyText);
        }
        let created_at = self.shared.clock.now().replace_date(date);
        let mut task = Task::new(text, date, category, created_at);
        let mut created = task.clone();

        let ticket = self.apply(|state| {
            let key = ContainerKey::day(date, category, TaskState::Active);
            task.order = Some(state.append_key(key, None));
            created = task.clone();
            Ok(Some(Plan::upsert(
                Operation::Create,
                vec![task.clone()],
                RemoteWrite::Create(task),
            )))
        })?;
        Ok((created, ticket))
    }

    pub fn edit_text(&self, id: &TaskId, text: &str) -> Result<WriteTicket, EngineError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::EmptyText);
        }
        self.apply(|state| {
            let current = state.task(id)?;
            if current.text == text {
                return Ok(None);
            }
            let mut after = current.clone();
            after.text = text.to_string();
            let patch = TaskPatch::diff(state.persisted(id, current), &after);
            Ok(Some(Plan::upsert(
                Operation::EditText,
                vec![after],
                RemoteWrite::update(id.clone(), patch),
            )))
        })
    }

    pub fn delete(&self, id: &TaskId) -> Result<WriteTicket, EngineError> {
        self.apply(|state| {
            state.task(id)?;
            Ok(Some(Plan {
                operation: Operation::Delete,
                upserts: Vec::new(),
                removals: vec![id.clone()],
                write: RemoteWrite::Delete(id.clone()),
            }))
        })
    }

    /// Cycles the task's state. The write is debounced per task: only the
    /// state left at the end of the quiet window is persisted.
    pub fn toggle(&self, id: &TaskId) -> Result<WriteTicket, EngineError> {
        let (handle, snapshot, state_now) = {
            let mut state = self.shared.lock();
            if state.closed {
                return Err(EngineError::Closed);
            }
            let current = state.task(id)?.clone();
            let next = lifecycle::toggle(current.clone());
            let state_now = next.state;
            let baseline = state.cancel_pending(id).unwrap_or(current);

            state.tasks.upsert(next);
            state.bump(slice::from_ref(id));
            let generation = state.next_generation();
            let (pending, handle) =
                debounce::schedule(&self.shared, id.clone(), generation, baseline);
            state.pending.insert(id.clone(), pending);
            (handle, Arc::new(state.tasks.clone()), state_now)
        };

        log::debug!(
            "event=toggle_scheduled task={} state={} window_ms={}",
            id,
            state_now,
            self.shared.debounce.as_millis()
        );
        self.shared.notify(
            NotificationKind::Applied,
            Operation::Toggle,
            vec![id.clone()],
            snapshot,
            None,
        );
        Ok(WriteTicket::Pending(handle))
    }

    /// Jumps straight to `target`. Setting the current state is a no-op and
    /// sends nothing.
    pub fn set_state(&self, id: &TaskId, target: TaskState) -> Result<WriteTicket, EngineError> {
        self.apply(|state| {
            let current = state.task(id)?;
            if current.state == target {
                return Ok(None);
            }
            let after = lifecycle::set_state(current.clone(), target);
            let patch = TaskPatch::diff(state.persisted(id, current), &after);
            Ok(Some(Plan::upsert(
                Operation::SetState,
                vec![after],
                RemoteWrite::update(id.clone(), patch),
            )))
        })
    }

    pub fn set_state_all(
        &self,
        ids: &[TaskId],
        target: TaskState,
    ) -> Result<WriteTicket, EngineError> {
        self.set_states(Operation::SetStateAll, ids, target)
    }

    /// Marks every active task on `date` as failed.
    pub fn fail_all(
        &self,
        date: Date,
        category: Option<Category>,
    ) -> Result<WriteTicket, EngineError> {
        let ids = self.active_on(date, category);
        self.set_states(Operation::FailAll, &ids, TaskState::Failed)
    }

    fn set_states(
        &self,
        operation: Operation,
        ids: &[TaskId],
        target: TaskState,
    ) -> Result<WriteTicket, EngineError> {
        self.apply(|state| {
            let mut changed = Vec::new();
            for id in unique(ids) {
                let current = state.task(id)?;
                if current.state != target {
                    changed.push(lifecycle::set_state(current.clone(), target));
                }
            }
            if changed.is_empty() {
                return Ok(None);
            }
            let write_ids = changed.iter().map(|task| task.id.clone()).collect();
            Ok(Some(Plan::upsert(
                operation,
                changed,
                RemoteWrite::SetState(write_ids, target),
            )))
        })
    }

    fn active_on(&self, date: Date, category: Option<Category>) -> Vec<TaskId> {
        let state = self.shared.lock();
        let mut tasks = state
            .tasks
            .on_date(date)
            .filter(|task| task.state == TaskState::Active)
            .filter(|task| category.map_or(true, |wanted| wanted == task.category))
            .cloned()
            .collect::<Vec<_>>();
        tasks.sort_by(crate::container::compare_tasks);
        tasks.into_iter().map(|task| task.id).collect()
    }

    /// Moves the task to today if it is overdue, otherwise one day forward,
    /// appending it to the end of its new container.
    pub fn punt(&self, id: &TaskId) -> Result<WriteTicket, EngineError> {
        let today = self.today();
        self.apply(|state| {
            let current = state.task(id)?;
            let source = current
                .date
                .ok_or_else(|| LifecycleError::NotScheduled(id.clone()))?;
            let target = lifecycle::punt_target(source, today)?;
            let mut after = lifecycle::punt(current.clone(), today)?;
            after.order = Some(state.append_key(container_of(&after), Some(id)));
            let batch = PuntBatch {
                source_date: source,
                target_date: target,
                tasks: vec![PuntedTask {
                    id: id.clone(),
                    order: after.order.clone(),
                }],
            };
            Ok(Some(Plan::upsert(
                Operation::Punt,
                vec![after],
                RemoteWrite::Punt(batch),
            )))
        })
    }

    /// Punts every active task on `date` in one batch, keeping their
    /// relative order.
    pub fn punt_all(
        &self,
        date: Date,
        category: Option<Category>,
    ) -> Result<WriteTicket, EngineError> {
        let today = self.today();
        let ids = self.active_on(date, category);
        self.apply(|state| {
            if ids.is_empty() {
                return Ok(None);
            }
            let target = lifecycle::punt_target(date, today)?;
            let mut last_keys: HashMap<ContainerKey, OrderKey> = HashMap::new();
            let mut moved = Vec::with_capacity(ids.len());
            let mut punted = Vec::with_capacity(ids.len());
            for id in &ids {
                let mut after = lifecycle::punt(state.task(id)?.clone(), today)?;
                let destination = container_of(&after);
                let key = match last_keys.get(&destination) {
                    Some(previous) => OrderKey::after(Some(previous)),
                    None => state.append_key(destination, None),
                };
                last_keys.insert(destination, key.clone());
                after.order = Some(key.clone());
                punted.push(PuntedTask {
                    id: id.clone(),
                    order: Some(key),
                });
                moved.push(after);
            }
            let batch = PuntBatch {
                source_date: date,
                target_date: target,
                tasks: punted,
            };
            Ok(Some(Plan::upsert(
                Operation::PuntAll,
                moved,
                RemoteWrite::Punt(batch),
            )))
        })
    }

    pub fn graveyard(&self, id: &TaskId) -> Result<WriteTicket, EngineError> {
        self.bury(Operation::Graveyard, slice::from_ref(id))
    }

    pub fn graveyard_all(&self, ids: &[TaskId]) -> Result<WriteTicket, EngineError> {
        self.bury(Operation::GraveyardAll, ids)
    }

    fn bury(&self, operation: Operation, ids: &[TaskId]) -> Result<WriteTicket, EngineError> {
        self.apply(|state| {
            let mut buried = Vec::new();
            for id in unique(ids) {
                let current = state.task(id)?;
                if !current.is_graveyarded() {
                    buried.push(lifecycle::graveyard(current.clone()));
                }
            }
            if buried.is_empty() {
                return Ok(None);
            }
            let write_ids = buried.iter().map(|task| task.id.clone()).collect();
            Ok(Some(Plan::upsert(
                operation,
                buried,
                RemoteWrite::Graveyard(write_ids),
            )))
        })
    }

    /// Brings a graveyard task back onto `target` as active. The task keeps
    /// its order key.
    pub fn resurrect(&self, id: &TaskId, target: Date) -> Result<WriteTicket, EngineError> {
        self.apply(|state| {
            let current = state.task(id)?;
            if !current.is_graveyarded() {
                return Err(EngineError::NotInGraveyard(id.clone()));
            }
            let after = lifecycle::resurrect(current.clone(), target);
            Ok(Some(Plan::upsert(
                Operation::Resurrect,
                vec![after],
                RemoteWrite::Resurrect(id.clone(), target),
            )))
        })
    }

    /// Places the task at `index` among the other members of `destination`.
    ///
    /// Moving into a different container applies the matching lifecycle
    /// transition in the same step.
    pub fn reorder(
        &self,
        id: &TaskId,
        destination: ContainerKey,
        index: usize,
    ) -> Result<WriteTicket, EngineError> {
        self.apply(|state| {
            let current = state.task(id)?;
            let members = state.tasks.tasks_in(destination);
            let keys = neighbor_keys(&members, Some(id));
            let order = OrderKey::for_index(&keys, index).unwrap_or_else(|err| {
                log::warn!(
                    "event=order_key_fallback task={} container={} error={}",
                    id,
                    destination,
                    err
                );
                OrderKey::after(keys.last())
            });
            let persisted = state.persisted(id, current);
            let (after, item) = reorder_move(persisted, current, destination, order);
            Ok(Some(Plan::upsert(
                Operation::Reorder,
                vec![after],
                RemoteWrite::Reorder(item),
            )))
        })
    }

    /// Moves several tasks as one contiguous block starting at `index`.
    pub fn reorder_many(
        &self,
        ids: &[TaskId],
        destination: ContainerKey,
        index: usize,
    ) -> Result<WriteTicket, EngineError> {
        let ids = unique(ids).cloned().collect::<Vec<_>>();
        self.apply(|state| {
            if ids.is_empty() {
                return Ok(None);
            }
            let mut members = state.tasks.tasks_in(destination);
            members.retain(|task| !ids.contains(&task.id));
            let keys = neighbor_keys(&members, None);
            let orders = block_keys(&keys, index, ids.len());

            let mut moved = Vec::with_capacity(ids.len());
            let mut items = Vec::with_capacity(ids.len());
            for (id, order) in ids.iter().zip(orders) {
                let current = state.task(id)?;
                let (after, item) =
                    reorder_move(state.persisted(id, current), current, destination, order);
                moved.push(after);
                items.push(item);
            }
            Ok(Some(Plan::upsert(
                Operation::ReorderMany,
                moved,
                RemoteWrite::BatchReorder(items),
            )))
        })
    }

    /// Fires every pending debounced write now. Returns how many were due.
    pub fn flush(&self) -> usize {
        let state = self.shared.lock();
        for pending in state.pending.values() {
            pending.flush();
        }
        state.pending.len()
    }

    /// Cancels pending debounced writes and refuses further mutations.
    /// Writes already in flight still settle.
    pub fn shutdown(&self) {
        let mut state = self.shared.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        let cancelled = state.pending.len();
        for (_, pending) in state.pending.drain() {
            pending.cancel();
        }
        log::info!("event=engine_shutdown cancelled_writes={}", cancelled);
    }
}

impl<P: TaskPort> Drop for Engine<P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn unique(ids: &[TaskId]) -> impl Iterator<Item = &TaskId> {
    let mut seen = HashSet::new();
    ids.iter().filter(move |id| seen.insert(*id))
}

fn reorder_move(
    persisted: &Task,
    current: &Task,
    destination: ContainerKey,
    order: OrderKey,
) -> (Task, ReorderMove) {
    let mut after = lifecycle::relocate(current.clone(), destination);
    after.order = Some(order.clone());
    let fields = ContainerFields::of(&after);
    let item = ReorderMove {
        id: after.id.clone(),
        order,
        container: (ContainerFields::of(persisted) != fields).then_some(fields),
    };
    (after, item)
}

/// `count` ascending keys that all sort between the neighbors at `index`.
fn block_keys(keys: &[OrderKey], index: usize, count: usize) -> Vec<OrderKey> {
    let index = index.min(keys.len());
    let upper = keys.get(index);
    let mut lower = index.checked_sub(1).and_then(|at| keys.get(at)).cloned();
    let mut result = Vec::with_capacity(count);
    for _ in 0..count {
        let next = OrderKey::between(lower.as_ref(), upper).unwrap_or_else(|err| {
            log::warn!("event=order_key_fallback error={}", err);
            OrderKey::after(lower.as_ref().max(keys.last()))
        });
        lower = Some(next.clone());
        result.push(next);
    }
    result
}

#[derive(Debug)]
pub enum EngineError {
    NotFound(TaskId),
    NotInGraveyard(TaskId),
    EmptyText,
    Lifecycle(LifecycleError),
    Load(PortError),
    NoRuntime,
    Closed,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "task '{}' not found", id),
            EngineError::NotInGraveyard(id) => write!(f, "task '{}' is not in the graveyard", id),
            EngineError::EmptyText => write!(f, "task text must not be empty"),
            EngineError::Lifecycle(err) => write!(f, "{}", err),
            EngineError::Load(err) => write!(f, "failed to load tasks: {}", err),
            EngineError::NoRuntime => write!(f, "engine must be created inside a tokio runtime"),
            EngineError::Closed => write!(f, "engine has been shut down"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EngineError::Lifecycle(err) => Some(err),
            EngineError::Load(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LifecycleError> for EngineError {
    fn from(value: LifecycleError) -> Self {
        EngineError::Lifecycle(value)
    }
}
