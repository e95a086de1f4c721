use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use sharpfocus_core::{FocusError, FocusResult};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::{ChangeNotifier, ChangeSet, KeyValueStore, StorageChange};

/// Database schema version for migrations
const SCHEMA_VERSION: i32 = 1;

/// Key-value store persisted in a SQLite file
pub struct SqliteStore {
    conn: Mutex<Connection>,
    notifier: ChangeNotifier,
}

impl SqliteStore {
    /// Open (or create) the store at `path`
    pub fn open(path: &Path) -> FocusResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| FocusError::storage(format!("Failed to open store: {}", e)))?;
        log::info!("Opened store at {}", path.display());
        Self::with_connection(conn)
    }

    /// Store that lives only as long as the process
    pub fn open_in_memory() -> FocusResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| FocusError::storage(format!("Failed to open store: {}", e)))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> FocusResult<Self> {
        init_database(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            notifier: ChangeNotifier::new(),
        })
    }

    fn conn(&self) -> FocusResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| FocusError::storage("store connection lock poisoned"))
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> FocusResult<Option<Value>> {
        let conn = self.conn()?;
        read_value(&conn, key)
    }

    fn set_many(&self, entries: Vec<(String, Value)>) -> FocusResult<()> {
        let mut changes = Vec::new();
        {
            let mut conn = self.conn()?;
            let tx = conn
                .transaction()
                .map_err(|e| FocusError::storage(e.to_string()))?;

            for (key, value) in entries {
                let old_value = read_value(&tx, &key)?;
                if old_value.as_ref() == Some(&value) {
                    continue;
                }
                tx.execute(
                    "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    params![key, value.to_string(), Utc::now().timestamp()],
                )
                .map_err(|e| FocusError::storage(format!("Failed to write {}: {}", key, e)))?;

                changes.push(StorageChange {
                    key,
                    old_value,
                    new_value: Some(value),
                });
            }

            tx.commit()
                .map_err(|e| FocusError::storage(format!("Failed to commit write: {}", e)))?;
        }
        self.notifier.publish(changes);
        Ok(())
    }

    fn remove(&self, key: &str) -> FocusResult<()> {
        let old_value = {
            let conn = self.conn()?;
            let old_value = read_value(&conn, key)?;
            conn.execute("DELETE FROM kv WHERE key = ?1", params![key])
                .map_err(|e| FocusError::storage(format!("Failed to remove {}: {}", key, e)))?;
            old_value
        };

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

/// Create or migrate the schema
fn init_database(conn: &Connection) -> FocusResult<()> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get::<_, i32>(0).map(|count| count > 0),
        )
        .unwrap_or(false);

    let version: i32 = if table_exists {
        conn.query_row(
            "SELECT version FROM schema_version ORDER BY id DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| FocusError::storage(e.to_string()))?
        .unwrap_or(0)
    } else {
        0
    };

    if version < SCHEMA_VERSION {
        migrate_database(conn, version)?;
    }

    Ok(())
}

fn migrate_database(conn: &Connection, from_version: i32) -> FocusResult<()> {
    if from_version < 1 {
        create_schema_v1(conn)?;
    }
    Ok(())
}

fn create_schema_v1(conn: &Connection) -> FocusResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            version INTEGER NOT NULL,
            applied_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );
        "#,
    )
    .map_err(|e| FocusError::storage(format!("Failed to create schema: {}", e)))?;

    conn.execute(
        "INSERT INTO schema_version (version, applied_at) VALUES (?, ?)",
        params![SCHEMA_VERSION, Utc::now().timestamp()],
    )
    .map_err(|e| FocusError::storage(e.to_string()))?;

    Ok(())
}

fn read_value(conn: &Connection, key: &str) -> FocusResult<Option<Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
            row.get(0)
        })
        .optional()
        .map_err(|e| FocusError::storage(format!("Failed to read {}: {}", key, e)))?;

    match raw {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}
