use anyhow::Context;
use tracing::{debug, info, instrument, warn};

use crate::datastore::{DataStore, SlotContents};
use crate::task::{Category, Task, generate_id, now_millis, seed_tasks};

/// Prepends a new task. Blank titles leave the list unchanged.
pub fn create(tasks: &[Task], title: &str, category: Category, now: i64) -> Vec<Task> {
    let title = title.trim();
    if title.is_empty() {
        return tasks.to_vec();
    }

    let task = Task::new(generate_id(tasks), title.to_string(), category, now);
    let mut out = Vec::with_capacity(tasks.len() + 1);
    out.push(task);
    out.extend_from_slice(tasks);
    out
}

pub fn update(tasks: &[Task], id: &str, title: &str, category: Category) -> Vec<Task> {
    let title = title.trim();
    if title.is_empty() {
        return tasks.to_vec();
    }

    tasks
        .iter()
        .map(|t| {
            if t.id == id {
                Task {
                    title: title.to_string(),
                    category,
                    ..t.clone()
                }
            } else {
                t.clone()
            }
        })
        .collect()
}

pub fn toggle(tasks: &[Task], id: &str) -> Vec<Task> {
    tasks
        .iter()
        .map(|t| {
            if t.id == id {
                Task {
                    completed: !t.completed,
                    ..t.clone()
                }
            } else {
                t.clone()
            }
        })
        .collect()
}

pub fn remove(tasks: &[Task], id: &str) -> Vec<Task> {
    tasks.iter().filter(|t| t.id != id).cloned().collect()
}

/// Owns the task list and keeps it synchronized with one storage slot.
#[derive(Debug)]
pub struct TaskStore {
    datastore: DataStore,
    key: String,
    tasks: Vec<Task>,
}

impl TaskStore {
    #[instrument(skip(datastore))]
    pub fn open(datastore: DataStore, key: &str) -> anyhow::Result<Self> {
        let mut store = Self {
            datastore,
            key: key.to_string(),
            tasks: vec![],
        };
        store.tasks = store.load()?;
        Ok(store)
    }

    /// Reads the persisted list, substituting the seed when the slot is
    /// absent or holds something other than a valid task list.
    #[instrument(skip(self), fields(key = %self.key))]
    pub fn load(&self) -> anyhow::Result<Vec<Task>> {
        match self.datastore.load_tasks(&self.key)? {
            SlotContents::Tasks(tasks) => Ok(tasks),
            SlotContents::Empty => {
                info!("no saved tasks, using seed list");
                Ok(seed_tasks(now_millis()))
            }
            SlotContents::Malformed(reason) => {
                warn!(%reason, "saved tasks are malformed, using seed list");
                Ok(seed_tasks(now_millis()))
            }
        }
    }

    #[instrument(skip(self), fields(key = %self.key, count = self.tasks.len()))]
    pub fn save(&self) -> anyhow::Result<()> {
        self.datastore
            .save_tasks(&self.key, &self.tasks)
            .context("failed to persist tasks")
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn find(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Unique task whose id starts with `prefix`.
    pub fn resolve(&self, prefix: &str) -> Option<&Task> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return None;
        }
        if let Some(exact) = self.find(prefix) {
            return Some(exact);
        }

        let mut matches = self.tasks.iter().filter(|t| t.id.starts_with(prefix));
        let first = matches.next()?;
        if matches.next().is_some() {
            debug!(prefix, "ambiguous id prefix");
            None
        } else {
            Some(first)
        }
    }

    /// Returns the new task's id, or `None` when the title was blank.
    #[instrument(skip(self))]
    pub fn create(&mut self, title: &str, category: Category) -> anyhow::Result<Option<String>> {
        let next = create(&self.tasks, title, category, now_millis());
        let added = (next.len() > self.tasks.len()).then(|| next[0].id.clone());
        self.replace(next)?;

        match &added {
            Some(id) => info!(id = %id, %category, "created task"),
            None => debug!("blank title, nothing created"),
        }
        Ok(added)
    }

    #[instrument(skip(self))]
    pub fn update(&mut self, id: &str, title: &str, category: Category) -> anyhow::Result<bool> {
        let next = update(&self.tasks, id, title, category);
        let changed = next != self.tasks;
        self.replace(next)?;
        debug!(changed, "update applied");
        Ok(changed)
    }

    #[instrument(skip(self))]
    pub fn toggle(&mut self, id: &str) -> anyhow::Result<bool> {
        let next = toggle(&self.tasks, id);
        let changed = next != self.tasks;
        self.replace(next)?;
        debug!(changed, "toggle applied");
        Ok(changed)
    }

    #[instrument(skip(self))]
    pub fn remove(&mut self, id: &str) -> anyhow::Result<bool> {
        let next = remove(&self.tasks, id);
        let changed = next.len() != self.tasks.len();
        self.replace(next)?;
        debug!(changed, "remove applied");
        Ok(changed)
    }

    fn replace(&mut self, next: Vec<Task>) -> anyhow::Result<()> {
        self.tasks = next;
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn task(id: &str, completed: bool, created_at: i64) -> Task {
        Task {
            completed,
            ..Task::new(id.to_string(), format!("task {id}"), Category::Work, created_at)
        }
    }

    #[test]
    fn create_prepends_one_fresh_task() {
        let before = seed_tasks(10);
        let after = create(&before, "  Buy milk ", Category::Personal, 99);

        assert_eq!(after.len(), before.len() + 1);
        let new = &after[0];
        assert_eq!(new.title, "Buy milk");
        assert_eq!(new.category, Category::Personal);
        assert!(!new.completed);
        assert_eq!(new.created_at, 99);
        assert!(before.iter().all(|t| t.id != new.id));
        assert_eq!(&after[1..], &before[..]);
    }

    #[test]
    fn create_with_blank_title_is_a_no_op() {
        let before = seed_tasks(10);
        assert_eq!(create(&before, "", Category::Work, 1), before);
        assert_eq!(create(&before, " \t\n", Category::Work, 1), before);
    }

    #[test]
    fn update_touches_only_title_and_category() {
        let before = vec![task("a", true, 5), task("b", false, 6)];
        let after = update(&before, "a", "Renamed", Category::Health);

        assert_eq!(after[0].id, "a");
        assert_eq!(after[0].title, "Renamed");
        assert_eq!(after[0].category, Category::Health);
        assert!(after[0].completed);
        assert_eq!(after[0].created_at, 5);
        assert_eq!(after[1], before[1]);
    }

    #[test]
    fn update_ignores_unknown_id_and_blank_title() {
        let before = vec![task("a", false, 5)];
        assert_eq!(update(&before, "zzz", "x", Category::School), before);
        assert_eq!(update(&before, "a", "   ", Category::School), before);
    }

    #[test]
    fn toggle_twice_restores_flag() {
        let before = vec![task("a", false, 1), task("b", true, 2)];
        let once = toggle(&before, "b");
        assert!(!once[1].completed);
        assert_eq!(toggle(&once, "b"), before);
        assert_eq!(toggle(&before, "missing"), before);
    }

    #[test]
    fn remove_is_idempotent() {
        let before = vec![task("a", false, 1), task("b", true, 2)];
        let once = remove(&before, "a");
        assert_eq!(once.len(), 1);
        assert_eq!(remove(&once, "a"), once);
    }

    #[test]
    fn store_falls_back_to_seed_on_corrupt_slot() {
        let temp = tempdir().expect("tempdir");
        let datastore = DataStore::open(temp.path()).expect("open datastore");
        datastore.write_slot("k", "[{\"id\": 3").expect("write");

        let store = TaskStore::open(datastore, "k").expect("open store");
        let ids: Vec<_> = store.tasks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn store_falls_back_to_seed_on_duplicate_ids() {
        let temp = tempdir().expect("tempdir");
        let datastore = DataStore::open(temp.path()).expect("open datastore");
        datastore
            .save_tasks("k", &[task("x", false, 1), task("x", false, 2)])
            .expect("save");

        let mut store = TaskStore::open(datastore, "k").expect("open store");
        assert!(store.find("x").is_none());
        assert_eq!(store.tasks().len(), 4);

        assert!(!store.toggle("x").expect("toggle"));
        let done: Vec<_> = store.tasks().iter().filter(|t| t.completed).collect();
        assert_eq!(done.len(), 1);
    }

    #[test]
    fn store_rejects_key_outside_data_dir() {
        let temp = tempdir().expect("tempdir");
        let datastore = DataStore::open(&temp.path().join("data")).expect("open datastore");
        assert!(TaskStore::open(datastore, "../escape").is_err());
    }

    #[test]
    fn store_persists_every_mutation() {
        let temp = tempdir().expect("tempdir");
        let mut store =
            TaskStore::open(DataStore::open(temp.path()).expect("open"), "k").expect("store");

        let id = store
            .create("Write report", Category::School)
            .expect("create")
            .expect("created");
        assert!(store.toggle(&id).expect("toggle"));
        assert!(store.update(&id, "Write final report", Category::Work).expect("update"));
        assert!(store.remove("1").expect("remove"));
        assert!(!store.remove("1").expect("remove again"));

        let reopened =
            TaskStore::open(DataStore::open(temp.path()).expect("open"), "k").expect("store");
        assert_eq!(reopened.tasks(), store.tasks());

        let saved = reopened.find(&id).expect("task present");
        assert!(saved.completed);
        assert_eq!(saved.title, "Write final report");
        assert_eq!(saved.category, Category::Work);
    }

    #[test]
    fn blank_create_returns_none() {
        let temp = tempdir().expect("tempdir");
        let mut store =
            TaskStore::open(DataStore::open(temp.path()).expect("open"), "k").expect("store");
        assert_eq!(store.create("   ", Category::Work).expect("create"), None);
        assert_eq!(store.tasks().len(), 4);
    }

    #[test]
    fn resolve_accepts_unique_prefixes_only() {
        let temp = tempdir().expect("tempdir");
        let datastore = DataStore::open(temp.path()).expect("open");
        let tasks = vec![task("abc123", false, 1), task("abd456", false, 2)];
        datastore.save_tasks("k", &tasks).expect("save");

        let store = TaskStore::open(datastore, "k").expect("store");
        assert_eq!(store.resolve("abc").map(|t| t.id.as_str()), Some("abc123"));
        assert_eq!(store.resolve("abd456").map(|t| t.id.as_str()), Some("abd456"));
        assert!(store.resolve("ab").is_none());
        assert!(store.resolve("x").is_none());
        assert!(store.resolve("").is_none());
    }
}
