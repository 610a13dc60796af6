//! Task lifecycle transitions.
//!
//! Every function here is a pure data transformation: it takes a task by
//! value and returns the task as it should look afterwards. Persisting the
//! result, and undoing it when persistence fails, is the engine's job.

use std::error::Error;
use std::fmt;

use time::Date;

use crate::container::ContainerKey;
use crate::domain::dates::days_between;
use crate::domain::{Task, TaskId, TaskState};

/// One-button control: active -> completed -> failed -> active.
pub fn toggle(task: Task) -> Task {
    let next = task.state.cycled();
    set_state(task, next)
}

pub fn set_state(mut task: Task, state: TaskState) -> Task {
    task.state = state;
    task
}

/// Overdue tasks collapse onto today; anything else moves one day forward.
pub fn punt_target(from: Date, today: Date) -> Result<Date, LifecycleError> {
    if from < today {
        return Ok(today);
    }
    from.next_day().ok_or(LifecycleError::DateOverflow(from))
}

pub fn punt(mut task: Task, today: Date) -> Result<Task, LifecycleError> {
    let from = task
        .date
        .ok_or_else(|| LifecycleError::NotScheduled(task.id.clone()))?;
    let target = punt_target(from, today)?;
    task.date = Some(target);
    task.state = TaskState::Active;
    task.punt_days = days_between(task.created_for(), target);
    Ok(task)
}

/// Parks the task outside the timeline. The state is reset so a resurrected
/// task never comes back pre-marked as failed.
pub fn graveyard(mut task: Task) -> Task {
    task.date = None;
    task.state = TaskState::Active;
    task.punt_days = 0;
    task
}

pub fn resurrect(mut task: Task, target: Date) -> Task {
    task.date = Some(target);
    task.state = TaskState::Active;
    task.punt_days = 0;
    task
}

/// Moves a dated task to another day without touching its state.
pub fn reschedule(mut task: Task, target: Date) -> Task {
    task.date = Some(target);
    task.punt_days = task.derived_punt_days();
    task
}

/// Moves a task into `destination` in one step.
///
/// Composed from the single-purpose transitions so the result is always a
/// member of exactly `destination`.
pub fn relocate(task: Task, destination: ContainerKey) -> Task {
    match destination {
        ContainerKey::Graveyard => {
            if task.is_graveyarded() {
                task
            } else {
                graveyard(task)
            }
        }
        ContainerKey::Day {
            date,
            category,
            state,
        } => {
            let mut moved = match task.date {
                None => resurrect(task, date),
                Some(current) if current != date => reschedule(task, date),
                Some(_) => task,
            };
            moved.category = category;
            set_state(moved, state)
        }
    }
}

pub fn punt_all(tasks: Vec<Task>, today: Date) -> Result<Vec<Task>, LifecycleError> {
    tasks.into_iter().map(|task| punt(task, today)).collect()
}

pub fn set_state_all(tasks: Vec<Task>, state: TaskState) -> Vec<Task> {
    tasks
        .into_iter()
        .map(|task| set_state(task, state))
        .collect()
}

pub fn graveyard_all(tasks: Vec<Task>) -> Vec<Task> {
    tasks.into_iter().map(graveyard).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    NotScheduled(TaskId),
    DateOverflow(Date),
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleError::NotScheduled(id) => {
                write!(f, "task '{}' is in the graveyard and has no day to punt from", id)
            }
            LifecycleError::DateOverflow(date) => {
                write!(f, "cannot move past {}", date)
            }
        }
    }
}

impl Error for LifecycleError {}
