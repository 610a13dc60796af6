use std::error::Error;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskState {
    #[default]
    Active,
    Completed,
    Failed,
}

impl TaskState {
    pub const ALL: [TaskState; 3] = [TaskState::Active, TaskState::Completed, TaskState::Failed];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Active => "active",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
        }
    }

    /// One-button cycle: active -> completed -> failed -> active.
    pub fn cycled(self) -> TaskState {
        match self {
            TaskState::Active => TaskState::Completed,
            TaskState::Completed => TaskState::Failed,
            TaskState::Failed => TaskState::Active,
        }
    }

    pub fn is_completed(self) -> bool {
        self == TaskState::Completed
    }

    /// Legacy rows only carried a `completed` flag.
    pub fn from_legacy_completed(completed: bool) -> TaskState {
        if completed {
            TaskState::Completed
        } else {
            TaskState::Active
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskState {
    type Err = ParseTaskStateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        let state = match normalized.as_str() {
            "active" | "open" | "todo" => TaskState::Active,
            "completed" | "complete" | "done" => TaskState::Completed,
            "failed" | "fail" => TaskState::Failed,
            _ => {
                return Err(ParseTaskStateError {
                    value: value.to_string(),
                });
            }
        };

        Ok(state)
    }
}

impl Serialize for TaskState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        TaskState::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTaskStateError {
    value: String,
}

impl fmt::Display for ParseTaskStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid task state '{}': expected one of {}",
            self.value,
            TaskState::ALL
                .iter()
                .map(|state| state.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl Error for ParseTaskStateError {}
