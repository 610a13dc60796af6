//! Derived grouping of tasks into containers.
//!
//! Containers are never stored. Every call recomputes them from the task
//! collection it is handed, which is bounded by one user's data.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use time::Date;

use crate::domain::dates::{format_date, parse_date};
use crate::domain::{Category, Location, Task, TaskId, TaskState};
use crate::order_key::{compare_optional, OrderKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContainerKey {
    Day {
        date: Date,
        category: Category,
        state: TaskState,
    },
    Graveyard,
}

impl ContainerKey {
    pub fn day(date: Date, category: Category, state: TaskState) -> Self {
        ContainerKey::Day {
            date,
            category,
            state,
        }
    }

    pub fn location(self) -> Location {
        match self {
            ContainerKey::Day { date, .. } => Location::Day(date),
            ContainerKey::Graveyard => Location::Graveyard,
        }
    }
}

impl fmt::Display for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKey::Day {
                date,
                category,
                state,
            } => write!(f, "{}/{}/{}", format_date(*date), category, state),
            ContainerKey::Graveyard => f.write_str("graveyard"),
        }
    }
}

/// Parses `graveyard`, `YYYY-MM-DD/category`, or `YYYY-MM-DD/category/state`.
/// A missing state means active.
impl FromStr for ContainerKey {
    type Err = ParseContainerKeyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("graveyard") {
            return Ok(ContainerKey::Graveyard);
        }
        let invalid = |reason: String| ParseContainerKeyError {
            value: value.to_string(),
            reason,
        };
        let parts = trimmed.split('/').collect::<Vec<_>>();
        let (date, category, state) = match parts.as_slice() {
            [date, category] => (*date, *category, None),
            [date, category, state] => (*date, *category, Some(*state)),
            _ => return Err(invalid("expected DATE/CATEGORY[/STATE]".to_string())),
        };
        let date = parse_date(date).map_err(|err| invalid(err.to_string()))?;
        let category = Category::from_str(category).map_err(|err| invalid(err.to_string()))?;
        let state = match state {
            Some(raw) => TaskState::from_str(raw).map_err(|err| invalid(err.to_string()))?,
            None => TaskState::Active,
        };
        Ok(ContainerKey::day(date, category, state))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseContainerKeyError {
    value: String,
    reason: String,
}

impl fmt::Display for ParseContainerKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid container '{}': {}", self.value, self.reason)
    }
}

impl Error for ParseContainerKeyError {}

impl Serialize for ContainerKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub fn container_of(task: &Task) -> ContainerKey {
    match task.date {
        Some(date) => ContainerKey::day(date, task.category, task.state),
        None => ContainerKey::Graveyard,
    }
}

/// Container order: present keys ascending, missing keys last, ties by id.
pub fn compare_tasks(a: &Task, b: &Task) -> Ordering {
    compare_optional(a.order.as_ref(), b.order.as_ref()).then_with(|| a.id.cmp(&b.id))
}

pub fn containers_for<'a, I>(tasks: I) -> BTreeMap<ContainerKey, Vec<Task>>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut containers: BTreeMap<ContainerKey, Vec<Task>> = BTreeMap::new();
    for task in tasks {
        containers
            .entry(container_of(task))
            .or_default()
            .push(task.clone());
    }
    for members in containers.values_mut() {
        members.sort_by(compare_tasks);
    }
    containers
}

pub fn tasks_in<'a, I>(tasks: I, key: ContainerKey) -> Vec<Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut members = tasks
        .into_iter()
        .filter(|task| container_of(task) == key)
        .cloned()
        .collect::<Vec<_>>();
    members.sort_by(compare_tasks);
    members
}

/// Ascending keys of a sorted container, skipping unordered tasks and the
/// task being moved.
pub fn neighbor_keys(members: &[Task], moving: Option<&TaskId>) -> Vec<OrderKey> {
    let mut keys = members
        .iter()
        .filter(|task| Some(&task.id) != moving)
        .filter_map(|task| task.order.clone())
        .collect::<Vec<_>>();
    keys.dedup();
    keys
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StateCounts {
    fn record(&mut self, state: TaskState) {
        match state {
            TaskState::Active => self.active += 1,
            TaskState::Completed => self.completed += 1,
            TaskState::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.active + self.completed + self.failed
    }
}

/// Per-day state tallies; graveyard tasks are not on any day.
pub fn counts_by_date<'a, I>(tasks: I, category: Option<Category>) -> BTreeMap<Date, StateCounts>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut counts: BTreeMap<Date, StateCounts> = BTreeMap::new();
    for task in tasks {
        if category.is_some_and(|wanted| wanted != task.category) {
            continue;
        }
        if let Some(date) = task.date {
            counts.entry(date).or_default().record(task.state);
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::{
        container_of, containers_for, counts_by_date, neighbor_keys, tasks_in, ContainerKey,
    };
    use crate::domain::{Category, Task, TaskId, TaskState};
    use crate::order_key::OrderKey;
    use time::macros::{date, datetime};
    use time::Date;

    fn task(id: &str, date: Option<Date>, category: Category, state: TaskState) -> Task {
        let mut task = Task::new(
            id,
            date!(2025 - 01 - 01),
            category,
            datetime!(2025-01-01 0:00 UTC),
        );
        task.id = TaskId::from(id);
        task.date = date;
        task.state = state;
        task
    }

    fn keyed(mut task: Task, order: &str) -> Task {
        task.order = Some(OrderKey::parse(order).expect("test key should parse"));
        task
    }

    #[test]
    fn every_task_lands_in_exactly_one_container() {
        let day = date!(2025 - 01 - 03);
        let tasks = vec![
            task("a", Some(day), Category::Life, TaskState::Active),
            task("b", Some(day), Category::Life, TaskState::Completed),
            task("c", Some(day), Category::Work, TaskState::Active),
            task("d", None, Category::Work, TaskState::Active),
            task("e", Some(date!(2025 - 01 - 04)), Category::Life, TaskState::Failed),
        ];

        let containers = containers_for(&tasks);
        for task in &tasks {
            let holders = containers
                .iter()
                .filter(|(_, members)| members.iter().any(|member| member.id == task.id))
                .map(|(key, _)| *key)
                .collect::<Vec<_>>();
            assert_eq!(holders, vec![container_of(task)], "task {}", task.id);
        }
        assert_eq!(containers.len(), 5);
        assert!(containers.contains_key(&ContainerKey::Graveyard));
    }

    #[test]
    fn container_sorts_by_key_then_missing_then_id() {
        let day = Some(date!(2025 - 01 - 03));
        let tasks = vec![
            task("z-unordered", day, Category::Life, TaskState::Active),
            keyed(task("b", day, Category::Life, TaskState::Active), "k"),
            keyed(task("a", day, Category::Life, TaskState::Active), "k"),
            keyed(task("c", day, Category::Life, TaskState::Active), "V"),
            task("a-unordered", day, Category::Life, TaskState::Active),
        ];

        let key = ContainerKey::day(date!(2025 - 01 - 03), Category::Life, TaskState::Active);
        let ids = tasks_in(&tasks, key)
            .into_iter()
            .map(|task| task.id.to_string())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["c", "a", "b", "a-unordered", "z-unordered"]);
    }

    #[test]
    fn neighbor_keys_skip_moving_task_and_unordered_entries() {
        let day = Some(date!(2025 - 01 - 03));
        let members = vec![
            keyed(task("a", day, Category::Life, TaskState::Active), "F"),
            keyed(task("b", day, Category::Life, TaskState::Active), "V"),
            task("c", day, Category::Life, TaskState::Active),
        ];
        let keys = neighbor_keys(&members, Some(&TaskId::from("a")));
        assert_eq!(keys, vec![OrderKey::parse("V").unwrap()]);
    }

    #[test]
    fn counts_group_states_per_day_with_category_filter() {
        let day = Some(date!(2025 - 01 - 03));
        let tasks = vec![
            task("a", day, Category::Life, TaskState::Active),
            task("b", day, Category::Life, TaskState::Completed),
            task("c", day, Category::Work, TaskState::Failed),
            task("d", None, Category::Life, TaskState::Active),
        ];

        let all = counts_by_date(&tasks, None);
        let counts = all[&date!(2025 - 01 - 03)];
        assert_eq!((counts.active, counts.completed, counts.failed), (1, 1, 1));
        assert_eq!(counts.total(), 3);

        let work = counts_by_date(&tasks, Some(Category::Work));
        assert_eq!(work[&date!(2025 - 01 - 03)].failed, 1);
        assert_eq!(work[&date!(2025 - 01 - 03)].total(), 1);
    }

    #[test]
    fn container_key_displays_as_path() {
        let key = ContainerKey::day(date!(2025 - 01 - 03), Category::Work, TaskState::Failed);
        assert_eq!(key.to_string(), "2025-01-03/work/failed");
        assert_eq!(ContainerKey::Graveyard.to_string(), "graveyard");
    }

    #[test]
    fn container_key_parses_its_display_form() {
        let key = ContainerKey::day(date!(2025 - 01 - 03), Category::Work, TaskState::Failed);
        let parsed: ContainerKey = key.to_string().parse().expect("display form should parse");
        assert_eq!(parsed, key);

        let short: ContainerKey = "2025-01-03/life".parse().expect("state may be omitted");
        assert_eq!(
            short,
            ContainerKey::day(date!(2025 - 01 - 03), Category::Life, TaskState::Active)
        );
        assert_eq!(
            "Graveyard".parse::<ContainerKey>().expect("graveyard parses"),
            ContainerKey::Graveyard
        );
        assert!("2025-01-03".parse::<ContainerKey>().is_err());
        assert!("2025-01-03/chores".parse::<ContainerKey>().is_err());
    }
}
