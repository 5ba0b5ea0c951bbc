// 💾 Local Storage - key/value mirror of the in-memory collections
// Each collection is serialized whole under its own key on every change.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

// ============================================================================
// STORAGE KEYS
// ============================================================================

pub const KEY_PATIENTS: &str = "fisio_pacientes";
pub const KEY_RECORDS: &str = "fisio_prontuarios";
pub const KEY_TRANSACTIONS: &str = "fisio_transacoes";
pub const KEY_APPOINTMENTS: &str = "fisio_agendamentos";
pub const KEY_USERS: &str = "clinica_users";
pub const KEY_CURRENT_USER: &str = "clinica_currentUser";

// ============================================================================
// KEY/VALUE STORE
// ============================================================================

/// SQLite-backed key/value store holding one JSON document per key.
///
/// Cloning yields another handle to the same connection.
#[derive(Clone)]
pub struct KvStorage {
    conn: Arc<Mutex<Connection>>,
}

impl KvStorage {
    /// Open (or create) the store file at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open data file {}", path.display()))?;

        // WAL keeps the file readable if the process dies mid-write
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let storage = KvStorage {
            conn: Arc::new(Mutex::new(conn)),
        };
        storage.setup()?;
        log::debug!("opened key/value store at {}", path.display());
        Ok(storage)
    }

    /// Volatile store, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        let storage = KvStorage {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        };
        storage.setup()?;
        Ok(storage)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("storage connection lock poisoned"))
    }

    fn setup(&self) -> Result<()> {
        self.conn()?.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Raw string value for `key`
    pub fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = self
            .conn()?
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Deserialize the document stored under `key`.
    ///
    /// A missing key is `Ok(None)`; a document that no longer parses is an
    /// error so that the caller never silently overwrites it.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(key)? {
            Some(raw) => {
                let value = serde_json::from_str(&raw)
                    .with_context(|| format!("Stored value under '{}' is not valid JSON", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Serialize `value` and upsert it under `key`
    pub fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)
            .with_context(|| format!("Failed to serialize value for '{}'", key))?;

        self.conn()?.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, json, Utc::now().to_rfc3339()],
        )?;

        log::trace!("wrote {} bytes under '{}'", json.len(), key);
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        let removed = self.conn()?.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    /// All keys currently stored, sorted
    pub fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_none() {
        let storage = KvStorage::open_in_memory().unwrap();
        let value: Option<Vec<String>> = storage.get_json("nothing").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_set_overwrites_previous_value() {
        let storage = KvStorage::open_in_memory().unwrap();

        storage.set_json("colors", &vec!["red"]).unwrap();
        storage.set_json("colors", &vec!["green", "blue"]).unwrap();

        let colors: Vec<String> = storage.get_json("colors").unwrap().unwrap();
        assert_eq!(colors, vec!["green", "blue"]);
        assert_eq!(storage.keys().unwrap(), vec!["colors".to_string()]);
    }

    #[test]
    fn test_corrupt_document_is_an_error() {
        let storage = KvStorage::open_in_memory().unwrap();
        storage
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO kv (key, value, updated_at) VALUES ('broken', '{not json', 'x')",
                [],
            )
            .unwrap();

        let result: Result<Option<Vec<String>>> = storage.get_json("broken");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_remove() {
        let storage = KvStorage::open_in_memory().unwrap();
        storage.set_json(KEY_CURRENT_USER, &"someone").unwrap();

        assert!(storage.remove(KEY_CURRENT_USER).unwrap());
        assert!(!storage.remove(KEY_CURRENT_USER).unwrap());
        assert!(storage.get_raw(KEY_CURRENT_USER).unwrap().is_none());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinic.db");

        {
            let storage = KvStorage::open(&path).unwrap();
            storage.set_json("answer", &42).unwrap();
        }

        let storage = KvStorage::open(&path).unwrap();
        let answer: i32 = storage.get_json("answer").unwrap().unwrap();
        assert_eq!(answer, 42);
    }
}
