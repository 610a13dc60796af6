//! Per-task coalescing of toggle writes.
//!
//! Each task id owns at most one scheduled write. Re-toggling aborts the
//! scheduled job and starts a new one that inherits the original baseline,
//! so a failed write always rolls back to the state before the burst.

use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::{AbortHandle, JoinHandle};

use super::events::{Operation, WriteOutcome};
use super::Shared;
use crate::domain::{Task, TaskId};
use crate::port::TaskPort;

pub(super) struct PendingWrite {
    pub(super) generation: u64,
    pub(super) baseline: Task,
    flush: Arc<Notify>,
    abort: AbortHandle,
}

impl PendingWrite {
    pub(super) fn flush(&self) {
        self.flush.notify_one();
    }

    /// Aborts the scheduled job and hands back the rollback baseline.
    pub(super) fn cancel(self) -> Task {
        self.abort.abort();
        self.baseline
    }
}

pub(super) fn schedule<P: TaskPort>(
    shared: &Arc<Shared<P>>,
    id: TaskId,
    generation: u64,
    baseline: Task,
) -> (PendingWrite, JoinHandle<WriteOutcome>) {
    let flush = Arc::new(Notify::new());
    let handle = shared.runtime.spawn(run(
        Arc::clone(shared),
        id,
        generation,
        Arc::clone(&flush),
    ));
    let pending = PendingWrite {
        generation,
        baseline,
        flush,
        abort: handle.abort_handle(),
    };
    (pending, handle)
}

async fn run<P: TaskPort>(
    shared: Arc<Shared<P>>,
    id: TaskId,
    generation: u64,
    flush: Arc<Notify>,
) -> WriteOutcome {
    tokio::select! {
        _ = tokio::time::sleep(shared.debounce) => {}
        _ = flush.notified() => {}
    }

    let Some(due) = shared.take_due(&id, generation) else {
        return WriteOutcome::Cancelled;
    };
    if due.write.is_nothing() {
        log::debug!("event=toggle_write_skipped task={} reason=unchanged", id);
        return WriteOutcome::Committed;
    }
    log::debug!(
        "event=toggle_write_due task={} generation={} revision={}",
        id,
        generation,
        due.revision
    );
    let result = due.write.send(&shared.port).await;
    shared.settle(Operation::Toggle, due.undo, due.revision, result)
}
