use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use keyring::Entry;
use tracing::{debug, warn};

/// Key for the short-lived access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Key for the JSON-serialized user profile
pub const USER_KEY: &str = "user";

/// Every key the session writes. Cleared together on logout.
pub const SESSION_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Keyring service name
const SERVICE_NAME: &str = "fitbook";

/// Process-wide string key-value storage for session credentials.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    /// Remove several keys. Backends that can do so apply this as one write.
    fn remove_all(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
}

// ============================================================================
// Memory
// ============================================================================

/// Volatile store, used for tests and `storage = "memory"`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory store lock poisoned"))
    }
}

impl TokenStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn remove_all(&self, keys: &[&str]) -> Result<()> {
        let mut values = self.lock()?;
        for key in keys {
            values.remove(*key);
        }
        Ok(())
    }
}

// ============================================================================
// File
// ============================================================================

/// JSON object on disk, rewritten on every change.
pub struct FileStore {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open the session file in `cache_dir`, creating nothing until the first write.
    pub fn open(cache_dir: &Path) -> Result<Self> {
        let path = cache_dir.join(SESSION_FILE);
        let values = Self::read_file(&path)?;
        debug!(path = %path.display(), keys = values.len(), "Session file opened");
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    fn read_file(path: &Path) -> Result<HashMap<String, String>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let contents = std::fs::read_to_string(path).context("Failed to read session file")?;
        match serde_json::from_str(&contents) {
            Ok(values) => Ok(values),
            Err(e) => {
                // A damaged file means no usable session
                warn!(error = %e, "Session file is corrupt, starting empty");
                Ok(HashMap::new())
            }
        }
    }

    fn write_file(&self, values: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(values)?;
        std::fs::write(&self.path, contents).context("Failed to write session file")?;
        Ok(())
    }

    fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut HashMap<String, String>),
    {
        let mut values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("Session file lock poisoned"))?;
        let mut next = values.clone();
        change(&mut next);
        // Memory follows disk only once the write went through
        self.write_file(&next)?;
        *values = next;
        Ok(())
    }
}

impl TokenStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("Session file lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|values| {
            values.remove(key);
        })
    }

    fn remove_all(&self, keys: &[&str]) -> Result<()> {
        self.update(|values| {
            for key in keys {
                values.remove(*key);
            }
        })
    }
}

// ============================================================================
// Keyring
// ============================================================================

/// OS keychain storage, one entry per key.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).context("Failed to create keyring entry")
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve value from keychain"),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .context("Failed to store value in keychain")
    }

    fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete value from keychain"),
        }
    }

    /// Keychain entries are independent, so every key is attempted
    fn remove_all(&self, keys: &[&str]) -> Result<()> {
        remove_each(keys, |key| self.remove(key))
    }
}

/// Remove every key even if some fail, then report the first failure
fn remove_each<F>(keys: &[&str], mut remove: F) -> Result<()>
where
    F: FnMut(&str) -> Result<()>,
{
    let mut first_error = None;
    for key in keys {
        if let Err(e) = remove(key) {
            warn!(key = *key, error = %e, "Failed to remove session key");
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "fitbook-store-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_memory_store_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);

        store.set(ACCESS_TOKEN_KEY, "abc").unwrap();
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("abc"));

        store.remove(ACCESS_TOKEN_KEY).unwrap();
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn test_memory_store_remove_all() {
        let store = MemoryStore::new();
        store.set(ACCESS_TOKEN_KEY, "a").unwrap();
        store.set(REFRESH_TOKEN_KEY, "r").unwrap();
        store.set(USER_KEY, "{}").unwrap();
        store.set("unrelated", "x").unwrap();

        store.remove_all(&SESSION_KEYS).unwrap();

        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert_eq!(store.get(REFRESH_TOKEN_KEY).unwrap(), None);
        assert_eq!(store.get(USER_KEY).unwrap(), None);
        assert_eq!(store.get("unrelated").unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let dir = temp_dir("persist");
        {
            let store = FileStore::open(&dir).unwrap();
            store.set(ACCESS_TOKEN_KEY, "token-1").unwrap();
            store.set(REFRESH_TOKEN_KEY, "refresh-1").unwrap();
        }

        let reopened = FileStore::open(&dir).unwrap();
        assert_eq!(reopened.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("token-1"));
        assert_eq!(reopened.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("refresh-1"));

        reopened.remove_all(&SESSION_KEYS).unwrap();
        let cleared = FileStore::open(&dir).unwrap();
        assert_eq!(cleared.get(ACCESS_TOKEN_KEY).unwrap(), None);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_file_store_corrupt_file_reads_empty() {
        let dir = temp_dir("corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(SESSION_FILE), "not json {").unwrap();

        let store = FileStore::open(&dir).unwrap();
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_file_store_failed_write_leaves_values_unchanged() {
        let dir = temp_dir("unwritable");
        std::fs::create_dir_all(&dir).unwrap();
        // A regular file where the cache directory should be
        let blocker = dir.join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();

        let store = FileStore::open(&blocker).unwrap();
        assert!(store.set(ACCESS_TOKEN_KEY, "token-1").is_err());
        assert_eq!(store.get(ACCESS_TOKEN_KEY).unwrap(), None);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_remove_each_tries_every_key() {
        let mut attempted = Vec::new();
        let result = remove_each(&SESSION_KEYS, |key| {
            attempted.push(key.to_string());
            if key == ACCESS_TOKEN_KEY {
                Err(anyhow::anyhow!("keychain locked"))
            } else {
                Ok(())
            }
        });

        assert_eq!(result.unwrap_err().to_string(), "keychain locked");
        assert_eq!(attempted, vec![ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY]);
    }
}
