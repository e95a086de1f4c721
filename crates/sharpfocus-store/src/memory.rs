//! In-memory store for tests and ephemeral hosts

use crate::{ChangeNotifier, ChangeSet, KeyValueStore, StorageChange};
use serde_json::Value;
use sharpfocus_core::{FocusError, FocusResult};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
    notifier: ChangeNotifier,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            notifier: ChangeNotifier::new(),
        }
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> FocusResult<MutexGuard<'_, HashMap<String, Value>>> {
        self.entries
            .lock()
            .map_err(|_| FocusError::storage("memory store lock poisoned"))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> FocusResult<Option<Value>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set_many(&self, new_entries: Vec<(String, Value)>) -> FocusResult<()> {
        let mut changes = Vec::new();
        {
            let mut entries = self.entries()?;
            for (key, value) in new_entries {
                let old_value = entries.insert(key.clone(), value.clone());
                if old_value.as_ref() != Some(&value) {
                    changes.push(StorageChange {
                        key,
                        old_value,
                        new_value: Some(value),
                    });
                }
            }
        }
        self.notifier.publish(changes);
        Ok(())
    }

    fn remove(&self, key: &str) -> FocusResult<()> {
        let old_value = self.entries()?.remove(key);
        if old_value.is_some() {
            self.notifier.publish(vec![StorageChange {
                key: key.to_string(),
                old_value,
                new_value: None,
            }]);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeSet> {
        self.notifier.subscribe()
    }
}
