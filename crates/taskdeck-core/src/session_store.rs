use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Fixed keys of the persistent session area. All three are cleared together
/// on logout and on corruption recovery.
pub const USER_KEY: &str = "user";
pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

const SESSION_KEYS: [&str; 3] = [USER_KEY, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY];

/// Durable string-keyed storage for the session, one file per key under the
/// data directory. Writes are atomic so a crash never leaves a half-written
/// entry behind.
#[derive(Debug)]
pub struct SessionStore {
    pub data_dir: PathBuf,
}

/// Snapshot of the stored session values, used by an event loop to detect
/// that another context changed the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFingerprint {
    entries: Vec<Option<String>>,
}

impl SessionStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened session store");
        Ok(Self { data_dir })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.data"))
    }

    #[tracing::instrument(skip(self))]
    pub fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let value = fs::read_to_string(&path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        Ok(Some(value))
    }

    #[tracing::instrument(skip(self, value))]
    pub fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.entry_path(key);
        debug!(file = %path.display(), "writing session entry");

        let mut temp = NamedTempFile::new_in(&self.data_dir)?;
        temp.write_all(value.as_bytes())?;
        temp.flush()?;
        temp.persist(&path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn remove(&self, key: &str) -> anyhow::Result<()> {
        let path = self.entry_path(key);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("failed removing {}", path.display()))?;
        }
        Ok(())
    }

    /// Removes the user entry and both tokens.
    #[tracing::instrument(skip(self))]
    pub fn clear_session(&self) -> anyhow::Result<()> {
        for key in SESSION_KEYS {
            self.remove(key)?;
        }
        info!("cleared stored session");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn fingerprint(&self) -> anyhow::Result<StoreFingerprint> {
        let mut entries = Vec::with_capacity(SESSION_KEYS.len());
        for key in SESSION_KEYS {
            entries.push(self.get(key)?);
        }
        Ok(StoreFingerprint { entries })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{ACCESS_TOKEN_KEY, SessionStore, USER_KEY};

    #[test]
    fn set_get_remove_roundtrip() {
        let temp = tempdir().expect("tempdir");
        let store = SessionStore::open(temp.path()).expect("open store");

        assert_eq!(store.get(USER_KEY).expect("get missing"), None);

        store.set(USER_KEY, "{\"user_id\":1}").expect("set");
        assert_eq!(
            store.get(USER_KEY).expect("get"),
            Some("{\"user_id\":1}".to_string())
        );

        store.remove(USER_KEY).expect("remove");
        assert_eq!(store.get(USER_KEY).expect("get after remove"), None);
        store.remove(USER_KEY).expect("remove is idempotent");
    }

    #[test]
    fn fingerprint_changes_with_content() {
        let temp = tempdir().expect("tempdir");
        let store = SessionStore::open(temp.path()).expect("open store");

        let before = store.fingerprint().expect("fingerprint");
        store.set(ACCESS_TOKEN_KEY, "abc").expect("set token");
        let after = store.fingerprint().expect("fingerprint");

        assert_ne!(before, after);
        assert_eq!(after, store.fingerprint().expect("stable fingerprint"));
    }
}
