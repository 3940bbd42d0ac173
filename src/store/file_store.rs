//! JSON file backed store

use std::{
    collections::BTreeMap,
    ffi::OsString,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::{StateStore, StoreChange, StoreError, CHANGE_CHANNEL_CAPACITY};

/// Store that keeps every key in one JSON object on disk.
///
/// Writes go to a sibling temp file which is then renamed over the real one,
/// so a process killed mid-write leaves the previous snapshot intact.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, Value>>,
    changes: broadcast::Sender<StoreChange>,
}

impl JsonFileStore {
    /// Open the store at `path`, creating parent directories as needed
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let entries = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                match serde_json::from_str(&contents) {
                    Ok(entries) => entries,
                    Err(e) => {
                        let aside = corrupt_path(&path);
                        warn!(
                            "State store {} is unreadable ({}), moving it to {} and starting empty",
                            path.display(),
                            e,
                            aside.display()
                        );
                        fs::rename(&path, &aside)?;
                        BTreeMap::new()
                    }
                }
            }
        } else {
            BTreeMap::new()
        };

        info!("Opened state store at {} ({} keys)", path.display(), entries.len());
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);

        Ok(Self {
            path,
            entries: Mutex::new(entries),
            changes,
        })
    }

    fn write_file(&self, entries: &BTreeMap<String, Value>) -> Result<(), StoreError> {
        let tmp_path = self.path.with_extension("json.tmp");
        let contents = serde_json::to_vec_pretty(entries)?;
        let mut file = File::create(&tmp_path)?;
        file.write_all(&contents)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// Where an unparsable store file is kept for inspection
fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".corrupt");
    PathBuf::from(name)
}

impl StateStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("Failed to lock store: {}", e)))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("Failed to lock store: {}", e)))?;

        let mut next = entries.clone();
        next.insert(key.to_string(), value.clone());
        self.write_file(&next)?;
        *entries = next;
        drop(entries);

        debug!("Stored key {}", key);
        // No receivers is fine: nobody is watching yet.
        let _ = self.changes.send(StoreChange {
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_survive_reopening() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("state.json");

        let store = JsonFileStore::open(&path).expect("open store");
        store.put("timer_state", json!({ "generation": 4 })).expect("put");
        drop(store);

        let reopened = JsonFileStore::open(&path).expect("reopen store");
        assert_eq!(
            reopened.get("timer_state").expect("get"),
            Some(json!({ "generation": 4 }))
        );
        assert_eq!(reopened.get("missing").expect("get"), None);
    }

    #[test]
    fn put_overwrites_and_notifies_subscribers() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = JsonFileStore::open(dir.path().join("state.json")).expect("open store");
        let mut changes = store.subscribe();

        store.put("timer_update", json!({ "time": 5 })).expect("first put");
        store.put("timer_update", json!({ "time": 4 })).expect("second put");

        assert_eq!(changes.try_recv().expect("first change").value, json!({ "time": 5 }));
        let second = changes.try_recv().expect("second change");
        assert_eq!(second.key, "timer_update");
        assert_eq!(second.value, json!({ "time": 4 }));
        assert_eq!(store.get("timer_update").expect("get"), Some(json!({ "time": 4 })));
    }

    #[test]
    fn empty_file_opens_as_empty_store() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("state.json");
        fs::write(&path, "").expect("write empty file");

        let store = JsonFileStore::open(&path).expect("open store");
        assert_eq!(store.get("timer_state").expect("get"), None);
    }

    #[test]
    fn unparsable_file_is_moved_aside_and_store_opens_empty() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("state.json");
        let truncated = r#"{"timer_state": {"remainingSec"#;
        fs::write(&path, truncated).expect("write truncated file");

        let store = JsonFileStore::open(&path).expect("open store despite corrupt file");
        assert_eq!(store.get("timer_state").expect("get"), None);

        let aside = dir.path().join("state.json.corrupt");
        assert_eq!(fs::read_to_string(&aside).expect("read aside"), truncated);
        assert!(!path.exists());

        store.put("timer_state", json!({ "generation": 1 })).expect("put after recovery");
        let reopened = JsonFileStore::open(&path).expect("reopen store");
        assert_eq!(
            reopened.get("timer_state").expect("get"),
            Some(json!({ "generation": 1 }))
        );
    }

    #[test]
    fn failed_write_keeps_previous_value_and_stays_silent() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("state.json");
        let store = JsonFileStore::open(&path).expect("open store");
        store.put("k", json!(1)).expect("put");
        let mut changes = store.subscribe();

        // A directory where the temp file should go makes the write fail.
        fs::create_dir(path.with_extension("json.tmp")).expect("block temp path");

        assert!(store.put("k", json!(2)).is_err());
        assert_eq!(store.get("k").expect("get"), Some(json!(1)));
        assert!(changes.try_recv().is_err());
    }
}
