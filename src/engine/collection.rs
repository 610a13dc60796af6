use std::collections::{BTreeMap, BTreeSet, HashMap};

use time::Date;

use crate::container::{self, ContainerKey, StateCounts};
use crate::domain::{Category, Task, TaskId};

/// The engine's in-memory tasks, indexed by id and by day.
#[derive(Debug, Clone, Default)]
pub struct TaskCollection {
    tasks: HashMap<TaskId, Task>,
    by_date: BTreeMap<Date, BTreeSet<TaskId>>,
    graveyard: BTreeSet<TaskId>,
}

impl TaskCollection {
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let mut collection = Self::default();
        for task in tasks {
            collection.upsert(task);
        }
        collection
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Stores `task`, returning the version it replaced.
    pub fn upsert(&mut self, task: Task) -> Option<Task> {
        let previous = self.remove(&task.id);
        match task.date {
            Some(date) => {
                self.by_date.entry(date).or_default().insert(task.id.clone());
            }
            None => {
                self.graveyard.insert(task.id.clone());
            }
        }
        self.tasks.insert(task.id.clone(), task);
        previous
    }

    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        let task = self.tasks.remove(id)?;
        match task.date {
            Some(date) => {
                if let Some(ids) = self.by_date.get_mut(&date) {
                    ids.remove(id);
                    if ids.is_empty() {
                        self.by_date.remove(&date);
                    }
                }
            }
            None => {
                self.graveyard.remove(id);
            }
        }
        Some(task)
    }

    pub fn on_date(&self, date: Date) -> impl Iterator<Item = &Task> {
        self.by_date
            .get(&date)
            .into_iter()
            .flatten()
            .filter_map(|id| self.tasks.get(id))
    }

    pub fn in_range(&self, start: Date, end: Date) -> impl Iterator<Item = &Task> {
        self.by_date
            .range(start..=end)
            .flat_map(|(_, ids)| ids.iter())
            .filter_map(|id| self.tasks.get(id))
    }

    pub fn graveyard(&self) -> impl Iterator<Item = &Task> {
        self.graveyard.iter().filter_map(|id| self.tasks.get(id))
    }

    pub fn dates(&self) -> impl Iterator<Item = Date> + '_ {
        self.by_date.keys().copied()
    }

    /// Sorted members of one container.
    pub fn tasks_in(&self, key: ContainerKey) -> Vec<Task> {
        match key {
            ContainerKey::Day { date, .. } => container::tasks_in(self.on_date(date), key),
            ContainerKey::Graveyard => container::tasks_in(self.graveyard(), key),
        }
    }

    pub fn containers(&self) -> BTreeMap<ContainerKey, Vec<Task>> {
        container::containers_for(self.iter())
    }

    pub fn counts_by_date(&self, category: Option<Category>) -> BTreeMap<Date, StateCounts> {
        container::counts_by_date(self.iter(), category)
    }
}
