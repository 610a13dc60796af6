use std::error::Error;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use time::{Date, Duration};

use crate::clock::Clock;
use crate::config::ConfigError;
use crate::container::{ContainerKey, ParseContainerKeyError, StateCounts};
use crate::domain::category::ParseCategoryError;
use crate::domain::dates::{format_date, parse_date, DateParseError};
use crate::domain::state::ParseTaskStateError;
use crate::domain::{Category, Task, TaskId, TaskState};
use crate::engine::events::{WriteOutcome, WriteTicket};
use crate::engine::{Engine, EngineError, EngineOptions};
use crate::port::PortError;
use crate::store::SqliteStore;

const MIN_ID_PREFIX: usize = 4;

pub struct App {
    engine: Engine<SqliteStore>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub category: Option<Category>,
    pub days: Option<(Date, Date)>,
    pub graveyard: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ContainerView {
    pub container: ContainerKey,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DayCounts {
    pub date: String,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

impl DayCounts {
    fn new(date: Date, counts: StateCounts) -> Self {
        Self {
            date: format_date(date),
            active: counts.active,
            completed: counts.completed,
            failed: counts.failed,
            total: counts.total(),
        }
    }
}

impl App {
    /// Opens the store and builds an engine. Must run inside a tokio runtime.
    pub fn open(
        db_path: &Path,
        clock: Arc<dyn Clock>,
        options: EngineOptions,
    ) -> Result<Self, AppError> {
        ensure_parent_dir(db_path)?;
        let store = SqliteStore::open(db_path)?;
        let engine = Engine::new(store, clock, options)?;
        Ok(Self { engine })
    }

    pub fn today(&self) -> Date {
        self.engine.today()
    }

    pub async fn load_all(&self) -> Result<usize, AppError> {
        Ok(self.engine.load().await?)
    }

    /// Loads only what `filter` can show.
    pub async fn load_for(&self, filter: &ListFilter) -> Result<usize, AppError> {
        let loaded = if filter.graveyard {
            self.engine.load_graveyard().await?
        } else if let Some((start, end)) = filter.days {
            self.engine.load_range(start, end).await?
        } else {
            self.engine.load().await?
        };
        Ok(loaded)
    }

    pub fn list(&self, filter: &ListFilter) -> Vec<ContainerView> {
        self.engine
            .containers()
            .into_iter()
            .filter(|(key, _)| container_matches(*key, filter))
            .map(|(container, mut tasks)| {
                if let Some(wanted) = filter.category {
                    tasks.retain(|task| task.category == wanted);
                }
                ContainerView { container, tasks }
            })
            .filter(|view| !view.tasks.is_empty())
            .collect()
    }

    pub fn show(&self, raw_id: &str) -> Result<Task, AppError> {
        let id = self.resolve(raw_id)?;
        self.engine
            .get(&id)
            .ok_or_else(|| AppError::NotFound(raw_id.to_string()))
    }

    pub fn counts(&self, category: Option<Category>) -> Vec<DayCounts> {
        self.engine
            .counts_by_date(category)
            .into_iter()
            .map(|(date, counts)| DayCounts::new(date, counts))
            .collect()
    }

    pub async fn add(&self, text: &str, date: Date, category: Category) -> Result<Task, AppError> {
        let (task, ticket) = self.engine.create(text, date, category)?;
        settle(ticket).await?;
        self.current(&task.id)
    }

    pub async fn edit(&self, raw_id: &str, text: &str) -> Result<Task, AppError> {
        let id = self.resolve(raw_id)?;
        settle(self.engine.edit_text(&id, text)?).await?;
        self.current(&id)
    }

    pub async fn remove(&self, raw_id: &str) -> Result<Task, AppError> {
        let id = self.resolve(raw_id)?;
        let removed = self.current(&id)?;
        settle(self.engine.delete(&id)?).await?;
        Ok(removed)
    }

    /// Toggles and sends the write right away instead of waiting out the
    /// debounce window.
    pub async fn toggle(&self, raw_id: &str) -> Result<Task, AppError> {
        let id = self.resolve(raw_id)?;
        let ticket = self.engine.toggle(&id)?;
        self.engine.flush();
        settle(ticket).await?;
        self.current(&id)
    }

    pub async fn set_state(&self, raw_id: &str, state: TaskState) -> Result<Task, AppError> {
        let id = self.resolve(raw_id)?;
        settle(self.engine.set_state(&id, state)?).await?;
        self.current(&id)
    }

    pub async fn punt(&self, raw_id: &str) -> Result<Task, AppError> {
        let id = self.resolve(raw_id)?;
        settle(self.engine.punt(&id)?).await?;
        self.current(&id)
    }

    /// Returns how many tasks moved.
    pub async fn punt_day(
        &self,
        date: Date,
        category: Option<Category>,
    ) -> Result<usize, AppError> {
        let moved = self.active_on(date, category).len();
        settle(self.engine.punt_all(date, category)?).await?;
        Ok(moved)
    }

    pub async fn fail_day(
        &self,
        date: Date,
        category: Option<Category>,
    ) -> Result<usize, AppError> {
        let failed = self.active_on(date, category).len();
        settle(self.engine.fail_all(date, category)?).await?;
        Ok(failed)
    }

    pub async fn bury(&self, raw_ids: &[String]) -> Result<Vec<Task>, AppError> {
        let ids = raw_ids
            .iter()
            .map(|raw| self.resolve(raw))
            .collect::<Result<Vec<_>, _>>()?;
        settle(self.engine.graveyard_all(&ids)?).await?;
        ids.iter().map(|id| self.current(id)).collect()
    }

    pub async fn bury_day(
        &self,
        date: Date,
        category: Option<Category>,
    ) -> Result<usize, AppError> {
        let ids = self.active_on(date, category);
        settle(self.engine.graveyard_all(&ids)?).await?;
        Ok(ids.len())
    }

    pub async fn resurrect(&self, raw_id: &str, target: Date) -> Result<Task, AppError> {
        let id = self.resolve(raw_id)?;
        settle(self.engine.resurrect(&id, target)?).await?;
        self.current(&id)
    }

    /// Moves one or more tasks to `index` within `destination`.
    pub async fn move_tasks(
        &self,
        raw_ids: &[String],
        destination: ContainerKey,
        index: usize,
    ) -> Result<Vec<Task>, AppError> {
        let ids = raw_ids
            .iter()
            .map(|raw| self.resolve(raw))
            .collect::<Result<Vec<_>, _>>()?;
        let ticket = match ids.as_slice() {
            [single] => self.engine.reorder(single, destination, index)?,
            _ => self.engine.reorder_many(&ids, destination, index)?,
        };
        settle(ticket).await?;
        ids.iter().map(|id| self.current(id)).collect()
    }

    fn current(&self, id: &TaskId) -> Result<Task, AppError> {
        self.engine
            .get(id)
            .ok_or_else(|| AppError::NotFound(id.to_string()))
    }

    fn active_on(&self, date: Date, category: Option<Category>) -> Vec<TaskId> {
        self.engine
            .snapshot()
            .on_date(date)
            .filter(|task| task.state == TaskState::Active)
            .filter(|task| category.map_or(true, |wanted| wanted == task.category))
            .map(|task| task.id.clone())
            .collect()
    }

    /// Accepts a full id or an unambiguous prefix or suffix of one.
    fn resolve(&self, raw: &str) -> Result<TaskId, AppError> {
        let raw = raw.trim();
        let snapshot = self.engine.snapshot();
        let exact = TaskId::from(raw);
        if snapshot.contains(&exact) {
            return Ok(exact);
        }
        if raw.len() < MIN_ID_PREFIX {
            return Err(AppError::NotFound(raw.to_string()));
        }
        let mut matches = snapshot
            .iter()
            .map(|task| &task.id)
            .filter(|id| id.as_str().starts_with(raw) || id.as_str().ends_with(raw));
        match (matches.next(), matches.next()) {
            (Some(id), None) => Ok(id.clone()),
            (None, _) => Err(AppError::NotFound(raw.to_string())),
            (Some(_), Some(_)) => Err(AppError::AmbiguousId(raw.to_string())),
        }
    }
}

fn container_matches(key: ContainerKey, filter: &ListFilter) -> bool {
    match key {
        ContainerKey::Graveyard => filter.graveyard || filter.days.is_none(),
        ContainerKey::Day { .. } if filter.graveyard => false,
        ContainerKey::Day { date, category, .. } => {
            let in_days = filter
                .days
                .map_or(true, |(start, end)| date >= start && date <= end);
            let in_category = filter.category.map_or(true, |wanted| wanted == category);
            in_days && in_category
        }
    }
}

async fn settle(ticket: WriteTicket) -> Result<(), AppError> {
    match ticket.outcome().await {
        WriteOutcome::Committed => Ok(()),
        WriteOutcome::RolledBack(err) => Err(AppError::RolledBack(err)),
        WriteOutcome::Cancelled => Err(AppError::Cancelled),
    }
}

/// `today`, `tomorrow`, `yesterday`, or `YYYY-MM-DD`.
pub fn parse_day(raw: &str, today: Date) -> Result<Date, AppError> {
    let day = match raw.trim().to_ascii_lowercase().as_str() {
        "today" => Some(today),
        "tomorrow" => today.checked_add(Duration::days(1)),
        "yesterday" => today.checked_sub(Duration::days(1)),
        _ => return Ok(parse_date(raw.trim())?),
    };
    day.ok_or_else(|| AppError::InvalidArgument(format!("date '{}' is out of range", raw)))
}

/// Container key whose date part may use the relative names of [`parse_day`].
pub fn parse_destination(raw: &str, today: Date) -> Result<ContainerKey, AppError> {
    let trimmed = raw.trim();
    let Some((day, rest)) = trimmed.split_once('/') else {
        return Ok(trimmed.parse::<ContainerKey>()?);
    };
    let day = parse_day(day, today)?;
    Ok(format!("{}/{}", format_date(day), rest).parse::<ContainerKey>()?)
}

fn ensure_parent_dir(path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[derive(Debug)]
pub enum AppError {
    Io(std::io::Error),
    Db(rusqlite::Error),
    Config(ConfigError),
    Engine(EngineError),
    RolledBack(PortError),
    Cancelled,
    ParseDate(DateParseError),
    ParseState(ParseTaskStateError),
    ParseCategory(ParseCategoryError),
    ParseContainer(ParseContainerKeyError),
    InvalidArgument(String),
    NotFound(String),
    AmbiguousId(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Io(err) => write!(f, "I/O error: {}", err),
            AppError::Db(err) => write!(f, "database error: {}", err),
            AppError::Config(err) => write!(f, "config error: {}", err),
            AppError::Engine(err) => write!(f, "{}", err),
            AppError::RolledBack(err) => write!(f, "write rolled back: {}", err),
            AppError::Cancelled => write!(f, "write was cancelled before it was sent"),
            AppError::ParseDate(err) => write!(f, "{}", err),
            AppError::ParseState(err) => write!(f, "{}", err),
            AppError::ParseCategory(err) => write!(f, "{}", err),
            AppError::ParseContainer(err) => write!(f, "{}", err),
            AppError::InvalidArgument(message) => write!(f, "{}", message),
            AppError::NotFound(id) => write!(f, "task '{}' not found", id),
            AppError::AmbiguousId(raw) => {
                write!(f, "task id '{}' matches more than one task", raw)
            }
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Io(err) => Some(err),
            AppError::Db(err) => Some(err),
            AppError::Config(err) => Some(err),
            AppError::Engine(err) => Some(err),
            AppError::RolledBack(err) => Some(err),
            AppError::ParseDate(err) => Some(err),
            AppError::ParseState(err) => Some(err),
            AppError::ParseCategory(err) => Some(err),
            AppError::ParseContainer(err) => Some(err),
            AppError::Cancelled
            | AppError::InvalidArgument(_)
            | AppError::NotFound(_)
            | AppError::AmbiguousId(_) => None,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        AppError::Io(value)
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(value: rusqlite::Error) -> Self {
        AppError::Db(value)
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        AppError::Config(value)
    }
}

impl From<EngineError> for AppError {
    fn from(value: EngineError) -> Self {
        AppError::Engine(value)
    }
}

impl From<DateParseError> for AppError {
    fn from(value: DateParseError) -> Self {
        AppError::ParseDate(value)
    }
}

impl From<ParseTaskStateError> for AppError {
    fn from(value: ParseTaskStateError) -> Self {
        AppError::ParseState(value)
    }
}

impl From<ParseCategoryError> for AppError {
    fn from(value: ParseCategoryError) -> Self {
        AppError::ParseCategory(value)
    }
}

impl From<ParseContainerKeyError> for AppError {
    fn from(value: ParseContainerKeyError) -> Self {
        AppError::ParseContainer(value)
    }
}

#[cfg(test)]
mod tests;
