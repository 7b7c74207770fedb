//! Session id persistence
//!
//! The id returned by `/api/start_chat` survives a restart of the client
//! through a `SessionStore`. It is an injected capability; nothing in the
//! crate reaches for a global.

use crate::{HoldlineError, Result};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SESSION_KEY: &str = "chat_session_id";

pub trait SessionStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, session_id: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Store that forgets everything when dropped
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session_id: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> Option<String> {
        self.session_id.lock().clone()
    }

    fn set(&self, session_id: &str) -> Result<()> {
        *self.session_id.lock() = Some(session_id.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.session_id.lock().take();
        Ok(())
    }
}

/// JSON object on disk, keyed like browser local storage
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `<data dir>/holdline/session.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("holdline").join("session.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Map<String, Value> {
        let Ok(raw) = fs::read_to_string(&self.path) else {
            return Map::new();
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!("Ignoring unreadable session file {}", self.path.display());
                Map::new()
            }
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(map)
            .map_err(|e| HoldlineError::SessionStore(e.to_string()))?;
        fs::write(&self.path, raw)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self) -> Option<String> {
        let _guard = self.lock.lock();
        self.read_map()
            .get(SESSION_KEY)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn set(&self, session_id: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut map = self.read_map();
        map.insert(SESSION_KEY.to_string(), Value::String(session_id.to_string()));
        self.write_map(&map)?;
        debug!("Stored session id in {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock();
        let mut map = self.read_map();
        if map.remove(SESSION_KEY).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store() {
        let store = MemorySessionStore::new();
        assert!(store.get().is_none());
        store.set("abc").unwrap();
        assert_eq!(store.get().as_deref(), Some("abc"));
        store.clear().unwrap();
        assert!(store.get().is_none());
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let store = FileSessionStore::new(&path);
        assert!(store.get().is_none());
        store.set("sess-42").unwrap();

        // A second instance sees the same id
        let reopened = FileSessionStore::new(&path);
        assert_eq!(reopened.get().as_deref(), Some("sess-42"));

        reopened.clear().unwrap();
        assert!(store.get().is_none());
    }

    #[test]
    fn test_file_store_keeps_other_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, r#"{"theme": "dark"}"#).unwrap();

        let store = FileSessionStore::new(&path);
        store.set("x").unwrap();
        store.clear().unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("theme"));
        assert!(!raw.contains(SESSION_KEY));
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();

        let store = FileSessionStore::new(&path);
        assert!(store.get().is_none());
        store.set("y").unwrap();
        assert_eq!(store.get().as_deref(), Some("y"));
    }
}
