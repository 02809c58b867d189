//! Key/value media the recent store persists into.
//!
//! A medium may enforce a byte quota across all of its keys, in which case
//! `set` fails with [`MediumError::QuotaExceeded`] instead of writing.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;

/// Failure reported by a [`StorageMedium`].
#[derive(Debug, Error)]
pub enum MediumError {
    #[error("storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: u64, quota: u64 },

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl MediumError {
    /// Whether the medium refused the write for lack of space.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}

/// String key/value persistence.
pub trait StorageMedium: Send + Sync {
    /// Value stored under `key`, `None` when absent.
    fn get(&self, key: &str) -> Result<Option<String>, MediumError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), MediumError>;

    /// Remove `key`. Removing an absent key succeeds.
    fn remove(&self, key: &str) -> Result<(), MediumError>;
}

fn check_quota(quota: Option<u64>, needed: u64) -> Result<(), MediumError> {
    match quota {
        Some(quota) if needed > quota => Err(MediumError::QuotaExceeded { needed, quota }),
        _ => Ok(()),
    }
}

/* -------------------------------------------------------------------------- */
/* In-memory medium */
/* -------------------------------------------------------------------------- */

/// In-process map. The quota counts key and value bytes.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    entries: Mutex<HashMap<String, String>>,
    quota: Option<u64>,
}

impl MemoryMedium {
    /// Unbounded medium.
    pub fn new() -> Self {
        Self::default()
    }

    /// Medium refusing writes past `quota` bytes.
    pub fn with_quota(quota: u64) -> Self {
        Self { entries: Mutex::new(HashMap::new()), quota: Some(quota) }
    }

    /// Bytes currently used.
    pub fn used_bytes(&self) -> u64 {
        self.entries.lock().iter().map(|(k, v)| (k.len() + v.len()) as u64).sum()
    }
}

impl StorageMedium for MemoryMedium {
    fn get(&self, key: &str) -> Result<Option<String>, MediumError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), MediumError> {
        let mut entries = self.entries.lock();
        let others: u64 = entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum();
        check_quota(self.quota, others + (key.len() + value.len()) as u64)?;

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), MediumError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/* -------------------------------------------------------------------------- */
/* File medium */
/* -------------------------------------------------------------------------- */

/// One file per key inside a directory. The quota counts value bytes.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write leaves the previous value intact.
#[derive(Debug)]
pub struct FileMedium {
    dir: PathBuf,
    quota: Option<u64>,
    write_lock: Mutex<()>,
}

impl FileMedium {
    /// Use `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>, quota: Option<u64>) -> Result<Self, MediumError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, quota, write_lock: Mutex::new(()) })
    }

    /// Directory holding the files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.json"))
    }

    fn bytes_excluding(&self, excluded: &Path) -> Result<u64, MediumError> {
        let mut total = 0;
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path == excluded || path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            total += entry.metadata()?.len();
        }
        Ok(total)
    }
}

impl StorageMedium for FileMedium {
    fn get(&self, key: &str) -> Result<Option<String>, MediumError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), MediumError> {
        let _guard = self.write_lock.lock();
        let path = self.path_for(key);

        if self.quota.is_some() {
            let others = self.bytes_excluding(&path)?;
            check_quota(self.quota, others + value.len() as u64)?;
        }

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), MediumError> {
        let _guard = self.write_lock.lock();
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn memory_medium_enforces_quota_across_keys() {
        let medium = MemoryMedium::with_quota(20);

        medium.set("a", "123456789").unwrap();
        let err = medium.set("b", "1234567890123").unwrap_err();
        assert!(err.is_quota_exceeded());

        // Replacing an existing key only counts the new value.
        medium.set("a", "12345678901234567").unwrap();
        assert_eq!(medium.get("a").unwrap().as_deref(), Some("12345678901234567"));
        assert_eq!(medium.get("b").unwrap(), None);
    }

    #[test]
    fn file_medium_round_trips_and_removes() {
        let dir = TempDir::new().unwrap();
        let medium = FileMedium::open(dir.path().join("recent"), None).unwrap();

        assert_eq!(medium.get("callstats.recent").unwrap(), None);
        medium.set("callstats.recent", "[1,2,3]").unwrap();
        assert_eq!(medium.get("callstats.recent").unwrap().as_deref(), Some("[1,2,3]"));

        medium.remove("callstats.recent").unwrap();
        medium.remove("callstats.recent").unwrap();
        assert_eq!(medium.get("callstats.recent").unwrap(), None);
    }

    #[test]
    fn file_medium_quota_counts_other_keys() {
        let dir = TempDir::new().unwrap();
        let medium = FileMedium::open(dir.path(), Some(10)).unwrap();

        medium.set("a", "123456").unwrap();
        assert!(medium.set("b", "123456").unwrap_err().is_quota_exceeded());
        medium.set("a", "1234567890").unwrap();
    }

    #[test]
    fn file_medium_sanitizes_keys() {
        let dir = TempDir::new().unwrap();
        let medium = FileMedium::open(dir.path(), None).unwrap();

        medium.set("../escape/key", "x").unwrap();
        assert!(dir.path().join(".._escape_key.json").exists());
    }
}
