use std::collections::HashSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::task::Task;

pub const DEFAULT_STORAGE_KEY: &str = "neon-tasker-data";

#[derive(Debug, PartialEq, Eq)]
pub enum SlotContents {
    /// Missing or blank.
    Empty,
    Tasks(Vec<Task>),
    Malformed(String),
}

/// Single-slot key-value storage on disk: each key is one `<key>.json` file.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened datastore");

        Ok(Self { data_dir })
    }

    /// Keys name a file directly inside `data_dir`, so they may not contain
    /// path separators or be `.`/`..`.
    pub fn slot_path(&self, key: &str) -> anyhow::Result<PathBuf> {
        if key.is_empty() || key == "." || key == ".." || key.contains(['/', '\\']) {
            bail!("invalid storage key '{key}'");
        }
        Ok(self.data_dir.join(format!("{key}.json")))
    }

    #[tracing::instrument(skip(self))]
    pub fn read_slot(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.slot_path(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => {
                debug!(file = %path.display(), bytes = raw.len(), "read slot");
                Ok(Some(raw))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(file = %path.display(), "slot is absent");
                Ok(None)
            }
            Err(err) => Err(err).with_context(|| format!("failed reading {}", path.display())),
        }
    }

    #[tracing::instrument(skip(self, contents))]
    pub fn write_slot(&self, key: &str, contents: &str) -> anyhow::Result<()> {
        let path = self.slot_path(key)?;
        debug!(file = %path.display(), bytes = contents.len(), "writing slot atomically");

        let mut temp = NamedTempFile::new_in(&self.data_dir)?;
        temp.write_all(contents.as_bytes())?;
        temp.flush()?;

        temp.persist(&path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

        Ok(())
    }

    /// I/O failures are errors; bad content is reported as
    /// [`SlotContents::Malformed`] so the caller can decide how to recover.
    #[tracing::instrument(skip(self))]
    pub fn load_tasks(&self, key: &str) -> anyhow::Result<SlotContents> {
        let Some(raw) = self.read_slot(key)? else {
            return Ok(SlotContents::Empty);
        };
        if raw.trim().is_empty() {
            return Ok(SlotContents::Empty);
        }

        let tasks: Vec<Task> = match serde_json::from_str(&raw) {
            Ok(tasks) => tasks,
            Err(err) => return Ok(SlotContents::Malformed(err.to_string())),
        };
        if let Some(id) = first_duplicate_id(&tasks) {
            return Ok(SlotContents::Malformed(format!("duplicate task id '{id}'")));
        }

        debug!(count = tasks.len(), "loaded tasks");
        Ok(SlotContents::Tasks(tasks))
    }

    #[tracing::instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub fn save_tasks(&self, key: &str, tasks: &[Task]) -> anyhow::Result<()> {
        let serialized = serde_json::to_string(tasks)?;
        self.write_slot(key, &serialized)
            .with_context(|| format!("failed to save {key}"))
    }
}

fn first_duplicate_id(tasks: &[Task]) -> Option<&str> {
    let mut seen = HashSet::with_capacity(tasks.len());
    tasks
        .iter()
        .map(|t| t.id.as_str())
        .find(|id| !seen.insert(*id))
}
