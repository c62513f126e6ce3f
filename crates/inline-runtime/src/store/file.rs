//! JSON file-backed module store.
//!
//! ```text
//! ~/.inline/state/
//! ├── modules.json        # {"lazy": {...}, "descriptions": {...}}
//! └── .modules.json.tmp   # transient, during writes
//! ```

use super::{LazyRecord, ModuleStore, StoreDocument, StoreError};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const FILE_NAME: &str = "modules.json";
const TEMP_NAME: &str = ".modules.json.tmp";

/// File-backed [`ModuleStore`].
///
/// The whole document is read once on open and rewritten on every change
/// (pretty JSON, write to a temp file then rename). The directory is created
/// on the first write.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    doc: Mutex<StoreDocument>,
}

impl JsonFileStore {
    /// Opens the store in `dir`.
    ///
    /// A missing directory or file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file exists but cannot be read or parsed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        let path = dir.join(FILE_NAME);

        let doc = if path.exists() {
            let json = std::fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
            serde_json::from_str(&json).map_err(|e| StoreError::json(&path, e))?
        } else {
            StoreDocument::default()
        };

        debug!(
            path = %path.display(),
            lazy = doc.lazy.len(),
            descriptions = doc.descriptions.len(),
            "Opened module store"
        );

        Ok(Self {
            dir,
            doc: Mutex::new(doc),
        })
    }

    /// Opens the store, falling back to an empty one if the file is corrupt.
    ///
    /// The corrupt file is left in place and overwritten on the next write.
    #[must_use]
    pub fn open_or_empty(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        match Self::open(&dir) {
            Ok(store) => store,
            Err(e) => {
                warn!(error = %e, "Module store unreadable, starting empty");
                Self {
                    dir,
                    doc: Mutex::new(StoreDocument::default()),
                }
            }
        }
    }

    /// Returns the path of the JSON document.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(FILE_NAME)
    }

    /// Returns the store directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn update(&self, change: impl FnOnce(&mut StoreDocument)) -> Result<(), StoreError> {
        let mut doc = self.doc.lock();
        let mut next = doc.clone();
        change(&mut next);
        if next == *doc {
            return Ok(());
        }
        self.persist(&next)?;
        *doc = next;
        Ok(())
    }

    fn persist(&self, doc: &StoreDocument) -> Result<(), StoreError> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        }

        let path = self.path();
        let temp_path = self.dir.join(TEMP_NAME);
        let json = serde_json::to_string_pretty(doc).map_err(|e| StoreError::json(&path, e))?;

        std::fs::write(&temp_path, json).map_err(|e| StoreError::io(&temp_path, e))?;
        std::fs::rename(&temp_path, &path).map_err(|e| StoreError::io(&path, e))?;
        Ok(())
    }
}

impl ModuleStore for JsonFileStore {
    fn lazy(&self, key: &str) -> Option<LazyRecord> {
        self.doc.lock().lazy.get(key).cloned()
    }

    fn save_lazy(&self, key: &str, record: LazyRecord) -> Result<(), StoreError> {
        self.update(|doc| doc.set_lazy(key, record))
    }

    fn clear_lazy(&self, key: &str) -> Result<(), StoreError> {
        self.update(|doc| {
            doc.lazy.remove(key);
        })
    }

    fn description(&self, key: &str) -> Option<String> {
        self.doc.lock().descriptions.get(key).cloned()
    }

    fn set_description(&self, key: &str, description: Option<String>) -> Result<(), StoreError> {
        self.update(|doc| doc.set_description(key, description))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CommandMeta;
    use tempfile::TempDir;

    fn sample_record() -> LazyRecord {
        let mut record = LazyRecord::default();
        record.commands.insert(
            "upper".into(),
            CommandMeta {
                description: Some("Uppercase the argument".into()),
                category: Some("Text".into()),
            },
        );
        record.commands.insert("lower".into(), CommandMeta::default());
        record
    }

    #[test]
    fn open_missing_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::open(temp.path().join("state")).unwrap();
        assert!(store.lazy("anything").is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("state");

        let store = JsonFileStore::open(&dir).unwrap();
        store.save_lazy("modules/text.lua", sample_record()).unwrap();
        store
            .set_description("modules/text.lua", Some("Text tools".into()))
            .unwrap();
        assert!(store.path().exists());
        assert!(!dir.join(TEMP_NAME).exists());

        let reopened = JsonFileStore::open(&dir).unwrap();
        assert_eq!(reopened.lazy("modules/text.lua"), Some(sample_record()));
        assert_eq!(
            reopened.description("modules/text.lua").as_deref(),
            Some("Text tools")
        );
    }

    #[test]
    fn clear_lazy_persists() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::open(temp.path()).unwrap();
        store.save_lazy("a", sample_record()).unwrap();
        store.clear_lazy("a").unwrap();

        let reopened = JsonFileStore::open(temp.path()).unwrap();
        assert!(reopened.lazy("a").is_none());
    }

    #[test]
    fn corrupt_file_is_an_error_unless_tolerated() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(FILE_NAME), "{ not json").unwrap();

        let err = JsonFileStore::open(temp.path()).unwrap_err();
        assert!(matches!(err, StoreError::Json { .. }));

        let store = JsonFileStore::open_or_empty(temp.path());
        assert!(store.lazy("a").is_none());
        store.save_lazy("a", sample_record()).unwrap();
        assert!(JsonFileStore::open(temp.path()).is_ok());
    }
}
