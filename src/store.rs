use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;

use crate::models::Task;

/// Fixed slot name the serialized task list lives under.
const TASKS_KEY: &str = "tasks";

/// Single-slot persistent store backed by SQLite.
///
/// The whole task collection is serialized to JSON and written under one
/// key, mirroring a browser localStorage slot: read once at startup,
/// overwritten after every mutation. A missing slot means an empty list.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open_default() -> Result<Self> {
        let path = match std::env::var("DAYPLAN_DB") {
            Ok(p) => PathBuf::from(p),
            Err(_) => {
                let home_dir = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home_dir).join(".dayplan.db")
            }
        };
        Self::open(path)
    }

    pub fn open(path: PathBuf) -> Result<Self> {
        let conn = Connection::open(&path)
            .with_context(|| format!("failed to open store at {}", path.display()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS slots (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        log::debug!("opened store at {}", path.display());
        Ok(Store { conn })
    }

    /// Loads the persisted task list. An absent slot is an empty list.
    pub fn load_tasks(&self) -> Result<Vec<Task>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM slots WHERE key = ?1",
                [TASKS_KEY],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(json) => {
                let tasks: Vec<Task> =
                    serde_json::from_str(&json).context("stored task list is not valid JSON")?;
                log::debug!("loaded {} tasks", tasks.len());
                Ok(tasks)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Overwrites the slot with the full serialized collection.
    pub fn save_tasks(&self, tasks: &[Task]) -> Result<()> {
        let json = serde_json::to_string(tasks)?;
        self.conn.execute(
            "INSERT INTO slots (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![TASKS_KEY, json],
        )?;
        log::debug!("saved {} tasks", tasks.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Task;
    use tempfile::tempdir;

    fn open_temp() -> (tempfile::TempDir, Store) {
        let dir = tempdir().expect("tempdir");
        let store = Store::open(dir.path().join("test.db")).expect("open store");
        (dir, store)
    }

    #[test]
    fn missing_slot_is_empty_list() {
        let (_dir, store) = open_temp();
        assert!(store.load_tasks().expect("load").is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let (_dir, store) = open_temp();
        let mut task = Task::new("09:00", "morning standup");
        task.is_completed = true;
        task.completed_at = Some("09:15".to_string());
        let tasks = vec![task, Task::new("指定なし", "lunch")];

        store.save_tasks(&tasks).expect("save");
        let loaded = store.load_tasks().expect("load");
        assert_eq!(loaded, tasks);
    }

    #[test]
    fn save_overwrites_previous_slot_contents() {
        let (_dir, store) = open_temp();
        store
            .save_tasks(&[Task::new("09:00", "a"), Task::new("10:00", "b")])
            .expect("save two");
        store.save_tasks(&[Task::new("11:00", "c")]).expect("save one");

        let loaded = store.load_tasks().expect("load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].task, "c");
    }
}
