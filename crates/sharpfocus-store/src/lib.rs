//! Durable key-value storage for SharpFocus
//!
//! Every component shares one store. Values are JSON, keys are the names the
//! extension has always used (`focusState`, `extensionEnabled`, ...). Writes
//! are announced to subscribers as [`ChangeSet`]s so the coordinator and the
//! pages can react to settings flips without polling.

pub mod database;
pub mod memory;
pub mod settings;

use serde_json::Value;
use sharpfocus_core::FocusResult;
use tokio::sync::broadcast;

pub use database::SqliteStore;
pub use memory::MemoryStore;
pub use settings::ExtensionSettings;

/// Store keys read or written by the extension
pub mod keys {
    pub const FOCUS_STATE: &str = "focusState";
    pub const EXTENSION_ENABLED: &str = "extensionEnabled";
    pub const WHITELISTED_DOMAINS: &str = "whitelistedDomains";
    pub const THEME: &str = "theme";
    pub const FOCUS_SETTINGS: &str = "focusSettings";
}

/// Pending change sets kept per subscriber before it starts lagging
pub const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// One key's transition within a write
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// All key transitions produced by a single store write
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: Vec<StorageChange>,
}

impl ChangeSet {
    pub fn new(changes: Vec<StorageChange>) -> Self {
        Self { changes }
    }

    pub fn get(&self, key: &str) -> Option<&StorageChange> {
        self.changes.iter().find(|change| change.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// New value of `key`, if this change set touched it and did not remove it
    pub fn new_value(&self, key: &str) -> Option<&Value> {
        self.get(key).and_then(|change| change.new_value.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StorageChange> {
        self.changes.iter()
    }
}

/// A persistent key-value store scoped to the extension
pub trait KeyValueStore: Send + Sync {
    /// Read a key; `Ok(None)` when absent
    fn get(&self, key: &str) -> FocusResult<Option<Value>>;

    /// Write several keys as one change set
    fn set_many(&self, entries: Vec<(String, Value)>) -> FocusResult<()>;

    /// Delete a key; deleting an absent key is not an error
    fn remove(&self, key: &str) -> FocusResult<()>;

    /// Receive a [`ChangeSet`] for every write that changed something.
    ///
    /// A receiver more than [`CHANGE_CHANNEL_CAPACITY`] sets behind loses the
    /// oldest ones and sees `Lagged`; it should then re-read what it tracks,
    /// for instance through [`ExtensionSettings::resync_changes`].
    fn subscribe(&self) -> broadcast::Receiver<ChangeSet>;

    fn set(&self, key: &str, value: Value) -> FocusResult<()> {
        self.set_many(vec![(key.to_string(), value)])
    }
}

/// Fan-out of change sets to subscribers
#[derive(Debug)]
pub(crate) struct ChangeNotifier {
    tx: broadcast::Sender<ChangeSet>,
}

impl ChangeNotifier {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ChangeSet> {
        self.tx.subscribe()
    }

    pub(crate) fn publish(&self, changes: Vec<StorageChange>) {
        if changes.is_empty() {
            return;
        }
        // No subscribers is fine.
        let _ = self.tx.send(ChangeSet::new(changes));
    }
}
