// Durable key-value storage for session data
//
// The browser original kept the auth token and serialized user in
// localStorage. Here that surface is a trait so the client and store stay
// testable; the file-backed implementation persists a single JSON object and
// writes through on every mutation so session data survives restarts even if
// the process crashes.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// Storage key for the raw bearer token
pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// Storage key for the JSON-serialized user
pub const USER_KEY: &str = "user";

/// String-only key-value storage surviving process restarts
///
/// Both keys are absent in the logged-out state.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory storage for tests and embedders with their own persistence
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().expect("storage lock poisoned").get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .expect("storage lock poisoned")
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().expect("storage lock poisoned").remove(key);
    }
}

/// File-backed storage: one JSON object, written through on every mutation
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Open (or create) storage at the given path
    ///
    /// A missing file is the empty map; a corrupt file is an error so a bad
    /// session is surfaced at startup instead of silently dropped.
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create storage directory")?;
        }

        let entries = match fs::read_to_string(&path) {
            Ok(contents) => {
                serde_json::from_str(&contents).context("Failed to parse storage file")?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e).context("Failed to read storage file"),
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Default location: ~/.local/share/rfm-client/session.json
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join("rfm-client").join("session.json"))
    }

    /// Write the full map to disk, truncating the previous contents
    fn persist(&self, entries: &HashMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(entries).context("Failed to serialize storage")?;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .context("Failed to open storage file")?;

        writeln!(file, "{}", json).context("Failed to write storage file")?;

        // Flush immediately so the session survives even if the process crashes
        file.flush().context("Failed to flush storage file")?;

        Ok(())
    }

    /// Apply a mutation and write through; keep the in-memory state on I/O failure
    fn mutate(&self, f: impl FnOnce(&mut HashMap<String, String>)) {
        let mut entries = self.entries.lock().expect("storage lock poisoned");
        f(&mut entries);
        if let Err(e) = self.persist(&entries) {
            tracing::error!("Failed to persist session storage: {:?}", e);
        }
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().expect("storage lock poisoned").get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value.to_string());
        });
    }

    fn remove(&self, key: &str) {
        self.mutate(|entries| {
            entries.remove(key);
        });
    }
}
