use std::error::Error;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::domain::category::{parse_category, Category, ParseCategoryError};
use crate::domain::dates::{
    days_between, format_date, format_timestamp, parse_date, parse_timestamp, DateParseError,
};
use crate::domain::state::{ParseTaskStateError, TaskState};
use crate::order_key::OrderKey;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Where a task sits on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    Day(Date),
    Graveyard,
}

impl Location {
    pub fn date(self) -> Option<Date> {
        match self {
            Location::Day(date) => Some(date),
            Location::Graveyard => None,
        }
    }
}

impl From<Option<Date>> for Location {
    fn from(value: Option<Date>) -> Self {
        value.map_or(Location::Graveyard, Location::Day)
    }
}

/// A todo item.
///
/// `state` is the only completion field; the legacy `completed` flag is
/// derived from it when the task is written out (see [`TaskRecord`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "TaskRecord", try_from = "TaskRecord")]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    /// `None` parks the task in the graveyard.
    pub date: Option<Date>,
    pub category: Category,
    pub state: TaskState,
    /// The day the task was created for; punt age is measured from here.
    pub created_at: OffsetDateTime,
    pub order: Option<OrderKey>,
    /// Cached punt age. Not persisted.
    pub punt_days: u32,
}

impl Task {
    pub fn new(
        text: impl Into<String>,
        date: Date,
        category: Category,
        created_at: OffsetDateTime,
    ) -> Self {
        Self {
            id: TaskId::generate(),
            text: text.into(),
            date: Some(date),
            category,
            state: TaskState::Active,
            created_at,
            order: None,
            punt_days: 0,
        }
    }

    pub fn completed(&self) -> bool {
        self.state.is_completed()
    }

    pub fn location(&self) -> Location {
        Location::from(self.date)
    }

    pub fn is_graveyarded(&self) -> bool {
        self.date.is_none()
    }

    pub fn is_punted(&self) -> bool {
        self.state == TaskState::Active && self.punt_days > 0
    }

    pub fn created_for(&self) -> Date {
        self.created_at.date()
    }

    /// Punt age as derivable from stored fields alone.
    pub fn derived_punt_days(&self) -> u32 {
        self.date
            .map_or(0, |date| days_between(self.created_for(), date))
    }
}

/// Wire and row form of a task.
///
/// Field names follow the dashboard's JSON. `completed` is always written so
/// older readers keep working; on read, a missing `state` is inferred from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub date: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub punt_days: Option<u32>,
}

impl From<Task> for TaskRecord {
    fn from(value: Task) -> Self {
        Self {
            completed: Some(value.completed()),
            id: value.id.0,
            text: value.text,
            date: value.date.map(format_date),
            created_at: format_timestamp(value.created_at),
            category: Some(value.category.as_str().to_string()),
            state: Some(value.state.as_str().to_string()),
            order: value.order.map(String::from),
            punt_days: Some(value.punt_days),
        }
    }
}

impl TryFrom<TaskRecord> for Task {
    type Error = TaskRecordError;

    fn try_from(value: TaskRecord) -> Result<Self, Self::Error> {
        let date = match value.date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_date(raw)?),
        };
        let state = match value.state.as_deref().map(str::trim) {
            None | Some("") => TaskState::from_legacy_completed(value.completed.unwrap_or(false)),
            Some(raw) => TaskState::from_str(raw)?,
        };
        // A key that does not parse cannot be ordered against the others;
        // it is treated like a task that was never ordered.
        let order = value
            .order
            .as_deref()
            .and_then(|raw| OrderKey::parse(raw).ok());

        let mut task = Task {
            id: TaskId(value.id),
            text: value.text,
            date,
            category: parse_category(value.category.as_deref())?,
            state,
            created_at: parse_timestamp(&value.created_at)?,
            order,
            punt_days: 0,
        };
        task.punt_days = value
            .punt_days
            .unwrap_or_else(|| task.derived_punt_days());
        Ok(task)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRecordError {
    Date(DateParseError),
    State(ParseTaskStateError),
    Category(ParseCategoryError),
}

impl fmt::Display for TaskRecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskRecordError::Date(err) => write!(f, "task record date error: {}", err),
            TaskRecordError::State(err) => write!(f, "task record state error: {}", err),
            TaskRecordError::Category(err) => write!(f, "task record category error: {}", err),
        }
    }
}

impl Error for TaskRecordError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TaskRecordError::Date(err) => Some(err),
            TaskRecordError::State(err) => Some(err),
            TaskRecordError::Category(err) => Some(err),
        }
    }
}

impl From<DateParseError> for TaskRecordError {
    fn from(value: DateParseError) -> Self {
        TaskRecordError::Date(value)
    }
}

impl From<ParseTaskStateError> for TaskRecordError {
    fn from(value: ParseTaskStateError) -> Self {
        TaskRecordError::State(value)
    }
}

impl From<ParseCategoryError> for TaskRecordError {
    fn from(value: ParseCategoryError) -> Self {
        TaskRecordError::Category(value)
    }
}
