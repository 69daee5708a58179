//! Local key-value storage, one string slot per feature

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

const SLOT_EXTENSION: &str = "json";
const TMP_SUFFIX: &str = "tmp";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage slot '{slot}': {source}")]
    Io {
        slot: String,
        #[source]
        source: io::Error,
    },
    #[error("storage slot '{0}' rejected the write")]
    WriteRejected(String),
    #[error("failed to encode slot value: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable string slots, as offered by a device's local storage
pub trait KeyValueStore {
    /// `None` when nothing has been written to the slot
    fn read(&self, slot: &str) -> Result<Option<String>, StoreError>;
    fn write(&self, slot: &str, value: &str) -> Result<(), StoreError>;
    /// Removing an empty slot is not an error
    fn remove(&self, slot: &str) -> Result<(), StoreError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &S {
    fn read(&self, slot: &str) -> Result<Option<String>, StoreError> {
        (**self).read(slot)
    }

    fn write(&self, slot: &str, value: &str) -> Result<(), StoreError> {
        (**self).write(slot, value)
    }

    fn remove(&self, slot: &str) -> Result<(), StoreError> {
        (**self).remove(slot)
    }
}

/// Filesystem-backed slots: `{root}/{slot}.json`
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn slot_path(&self, slot: &str) -> PathBuf {
        self.root.join(format!("{}.{}", slot, SLOT_EXTENSION))
    }
}

impl KeyValueStore for FileStore {
    fn read(&self, slot: &str) -> Result<Option<String>, StoreError> {
        let path = self.slot_path(slot);
        log::debug!("Reading slot {} from {}", slot, path.display());
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(slot, err)),
        }
    }

    fn write(&self, slot: &str, value: &str) -> Result<(), StoreError> {
        let path = self.slot_path(slot);
        log::debug!("Writing slot {} to {}", slot, path.display());
        fs::create_dir_all(&self.root).map_err(|err| io_error(slot, err))?;
        // write beside the target then rename so readers never see a partial blob
        let tmp = path.with_extension(format!("{}.{}", SLOT_EXTENSION, TMP_SUFFIX));
        fs::write(&tmp, value).map_err(|err| io_error(slot, err))?;
        fs::rename(&tmp, &path).map_err(|err| io_error(slot, err))
    }

    fn remove(&self, slot: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.slot_path(slot)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(slot, err)),
        }
    }
}

fn io_error(slot: &str, source: io::Error) -> StoreError {
    StoreError::Io {
        slot: slot.to_string(),
        source,
    }
}

/// In-process slots
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
    reject_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes and removals fail with `StoreError::WriteRejected`
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    fn check_writable(&self, slot: &str) -> Result<(), StoreError> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteRejected(slot.to_string()));
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, slot: &str) -> Result<Option<String>, StoreError> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(slots.get(slot).cloned())
    }

    fn write(&self, slot: &str, value: &str) -> Result<(), StoreError> {
        self.check_writable(slot)?;
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.insert(slot.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, slot: &str) -> Result<(), StoreError> {
        self.check_writable(slot)?;
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.remove(slot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_missing_slot_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));
        assert_eq!(store.read("anything").unwrap(), None);
    }

    #[test]
    fn file_store_write_read_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("data"));

        store.write("prefs", r#"{"a":1}"#).unwrap();
        assert!(store.slot_path("prefs").exists());
        assert_eq!(store.read("prefs").unwrap().as_deref(), Some(r#"{"a":1}"#));

        store.write("prefs", "{}").unwrap();
        assert_eq!(store.read("prefs").unwrap().as_deref(), Some("{}"));
        assert!(!dir.path().join("data/prefs.json.tmp").exists());

        store.remove("prefs").unwrap();
        assert_eq!(store.read("prefs").unwrap(), None);
        store.remove("prefs").unwrap();
    }

    #[test]
    fn file_store_write_fails_when_root_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let store = FileStore::new(&blocker);

        let err = store.write("prefs", "{}").unwrap_err();
        assert!(matches!(err, StoreError::Io { ref slot, .. } if slot == "prefs"));
    }

    #[test]
    fn memory_store_rejects_writes_on_request() {
        let store = MemoryStore::new();
        store.write("prefs", "1").unwrap();
        store.reject_writes(true);
        assert!(matches!(
            store.write("prefs", "2"),
            Err(StoreError::WriteRejected(_))
        ));
        assert_eq!(store.read("prefs").unwrap().as_deref(), Some("1"));
        store.reject_writes(false);
        store.write("prefs", "2").unwrap();
        assert_eq!(store.read("prefs").unwrap().as_deref(), Some("2"));
    }
}
