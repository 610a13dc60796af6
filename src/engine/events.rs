use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;

use super::collection::TaskCollection;
use crate::domain::TaskId;
use crate::port::PortError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Load,
    Create,
    EditText,
    Delete,
    Toggle,
    SetState,
    SetStateAll,
    FailAll,
    Punt,
    PuntAll,
    Graveyard,
    GraveyardAll,
    Resurrect,
    Reorder,
    ReorderMany,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Load => "load",
            Operation::Create => "create",
            Operation::EditText => "edit_text",
            Operation::Delete => "delete",
            Operation::Toggle => "toggle",
            Operation::SetState => "set_state",
            Operation::SetStateAll => "set_state_all",
            Operation::FailAll => "fail_all",
            Operation::Punt => "punt",
            Operation::PuntAll => "punt_all",
            Operation::Graveyard => "graveyard",
            Operation::GraveyardAll => "graveyard_all",
            Operation::Resurrect => "resurrect",
            Operation::Reorder => "reorder",
            Operation::ReorderMany => "reorder_many",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Loaded,
    Applied,
    RolledBack,
}

/// Sent to subscribers after every visible change to the collection.
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub operation: Operation,
    pub task_ids: Vec<TaskId>,
    pub snapshot: Arc<TaskCollection>,
    pub error: Option<String>,
}

#[derive(Debug)]
pub enum WriteOutcome {
    Committed,
    RolledBack(PortError),
    /// Superseded by a later write for the same task, or dropped at shutdown.
    Cancelled,
}

impl WriteOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, WriteOutcome::Committed)
    }
}

/// Handle on the remote half of a mutation.
///
/// Dropping a ticket does not cancel the write.
#[derive(Debug)]
pub enum WriteTicket {
    Immediate(WriteOutcome),
    Pending(JoinHandle<WriteOutcome>),
}

impl WriteTicket {
    pub fn committed() -> Self {
        WriteTicket::Immediate(WriteOutcome::Committed)
    }

    pub async fn outcome(self) -> WriteOutcome {
        match self {
            WriteTicket::Immediate(outcome) => outcome,
            WriteTicket::Pending(handle) => match handle.await {
                Ok(outcome) => outcome,
                Err(err) if err.is_cancelled() => WriteOutcome::Cancelled,
                Err(err) => WriteOutcome::RolledBack(PortError::Unavailable(err.to_string())),
            },
        }
    }
}
