//! Key/value persistence for the reminder collection.
//!
//! The store holds one JSON blob per key. The reminder collection lives
//! under [`REMINDERS_KEY`] as a JSON array with ISO-8601 dates.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{ReminderError, Result};
use crate::reminder::Reminder;

/// Key holding the serialized reminder collection.
pub const REMINDERS_KEY: &str = "reminders";

/// Durable key/value store for JSON blobs.
pub trait KeyValueStore: Send + Sync {
    /// Fetch the blob stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the blob stored under `key`.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Shared persistence handle.
pub type SharedKeyValueStore = Arc<dyn KeyValueStore>;

/// File-backed store: one `<key>.json` file per key inside a directory.
///
/// Writes go to a temp file first and are renamed into place, so a crash
/// mid-write leaves the previous blob intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `dir`. The directory is created lazily.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the key files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ReminderError::Persistence(format!(
                "cannot read {}: {e}",
                path.display()
            ))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            ReminderError::Persistence(format!(
                "cannot create store dir {}: {e}",
                self.dir.display()
            ))
        })?;

        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, value).map_err(|e| {
            ReminderError::Persistence(format!("cannot write {}: {e}", tmp_path.display()))
        })?;
        std::fs::rename(&tmp_path, &path).map_err(|e| {
            ReminderError::Persistence(format!("cannot finalize {}: {e}", path.display()))
        })?;
        Ok(())
    }
}

/// In-memory store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| ReminderError::Persistence("memory store lock poisoned".to_owned()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ReminderError::Persistence("memory store lock poisoned".to_owned()))?;
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ReminderError::Persistence(format!(
            "invalid store key '{key}'"
        )))
    }
}

/// Serialize the reminder collection to its persisted JSON form.
pub fn encode_reminders(reminders: &[Reminder]) -> Result<String> {
    serde_json::to_string(reminders)
        .map_err(|e| ReminderError::Persistence(format!("cannot serialize reminders: {e}")))
}

/// Parse the persisted JSON form back into reminders.
pub fn decode_reminders(json: &str) -> Result<Vec<Reminder>> {
    serde_json::from_str(json)
        .map_err(|e| ReminderError::Persistence(format!("cannot parse reminders: {e}")))
}

/// Load the reminder collection. A missing key is an empty collection.
pub fn load_reminders(store: &dyn KeyValueStore) -> Result<Vec<Reminder>> {
    match store.get(REMINDERS_KEY)? {
        Some(json) => decode_reminders(&json),
        None => Ok(Vec::new()),
    }
}

/// Save the full reminder collection.
pub fn save_reminders(store: &dyn KeyValueStore, reminders: &[Reminder]) -> Result<()> {
    let json = encode_reminders(reminders)?;
    store.set(REMINDERS_KEY, &json)
}
