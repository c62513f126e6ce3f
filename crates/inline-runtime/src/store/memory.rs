use super::{LazyRecord, ModuleStore, StoreDocument, StoreError};
use parking_lot::Mutex;

/// Ephemeral [`ModuleStore`]. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    doc: Mutex<StoreDocument>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Module keys that currently have a lazy-load record.
    #[must_use]
    pub fn lazy_keys(&self) -> Vec<String> {
        self.doc.lock().lazy.keys().cloned().collect()
    }
}

impl ModuleStore for MemoryStore {
    fn lazy(&self, key: &str) -> Option<LazyRecord> {
        self.doc.lock().lazy.get(key).cloned()
    }

    fn save_lazy(&self, key: &str, record: LazyRecord) -> Result<(), StoreError> {
        self.doc.lock().set_lazy(key, record);
        Ok(())
    }

    fn clear_lazy(&self, key: &str) -> Result<(), StoreError> {
        self.doc.lock().lazy.remove(key);
        Ok(())
    }

    fn description(&self, key: &str) -> Option<String> {
        self.doc.lock().descriptions.get(key).cloned()
    }

    fn set_description(&self, key: &str, description: Option<String>) -> Result<(), StoreError> {
        self.doc.lock().set_description(key, description);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CommandMeta;

    #[test]
    fn lazy_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.lazy("a.lua").is_none());

        let mut record = LazyRecord::default();
        record.commands.insert(
            "upper".into(),
            CommandMeta {
                description: Some("Uppercase".into()),
                category: Some("Text".into()),
            },
        );
        store.save_lazy("a.lua", record.clone()).unwrap();
        assert_eq!(store.lazy("a.lua"), Some(record));
        assert_eq!(store.lazy_keys(), vec!["a.lua".to_string()]);

        store.clear_lazy("a.lua").unwrap();
        assert!(store.lazy("a.lua").is_none());
    }

    #[test]
    fn description_set_and_clear() {
        let store = MemoryStore::new();
        store.set_description("m", Some("hello".into())).unwrap();
        assert_eq!(store.description("m").as_deref(), Some("hello"));
        store.set_description("m", None).unwrap();
        assert!(store.description("m").is_none());
    }
}
