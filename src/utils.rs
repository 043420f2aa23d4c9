//! Utility functions for file operations and per-key coordination

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// One async lock per key, for single-flight file materialization
///
/// Callers hold the returned guard while checking for and producing a file,
/// so concurrent requests for the same key wait for the first producer and
/// then find the file already present. Entries are dropped once no caller
/// holds them.
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<tokio::sync::Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting if another caller holds it
    pub async fn lock(&self, key: &K) -> KeyGuard<'_, K> {
        let cell = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(key.clone()).or_default().clone()
        };
        let guard = cell.clone().lock_owned().await;

        KeyGuard {
            owner: self,
            key: key.clone(),
            cell,
            guard: Some(guard),
        }
    }

    /// Number of keys currently tracked
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// True when no key is tracked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Held lock for one key; releases and cleans up on drop
pub struct KeyGuard<'a, K: Eq + Hash + Clone> {
    owner: &'a KeyedLocks<K>,
    key: K,
    cell: Arc<tokio::sync::Mutex<()>>,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Clone> Drop for KeyGuard<'_, K> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.owner.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Table entry plus our own handle: nobody else is waiting
        if Arc::strong_count(&self.cell) == 2 {
            locks.remove(&self.key);
        }
    }
}

/// Write `bytes` to `path` through a sibling temp file and rename
///
/// Readers never observe a partially written file.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = temp_sibling(path);
    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Delete a file, treating an already missing file as success
///
/// Returns whether a file was removed.
pub async fn remove_if_present(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Temp path next to `path`, unique per process
pub fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.part", std::process::id()))
}

/// Reject names that could escape the directory they are joined onto
pub fn validate_file_name(name: &str) -> Result<&str> {
    let invalid = |reason: &str| Error::InvalidParameter {
        name: "file".to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if name.contains(['/', '\\', '\0']) || name == "." || name == ".." {
        return Err(invalid("must be a plain file name"));
    }
    if name.starts_with('.') {
        return Err(invalid("hidden files are not served"));
    }
    Ok(name)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn keyed_lock_serializes_same_key() {
        let locks = Arc::new(KeyedLocks::<String>::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let (locks, inside, peak) = (locks.clone(), inside.clone(), peak.clone());
                tokio::spawn(async move {
                    let _guard = locks.lock(&"same".to_string()).await;
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty(), "entries must be cleaned up after release");
    }

    #[tokio::test]
    async fn keyed_lock_allows_distinct_keys_together() {
        let locks = KeyedLocks::<u32>::new();

        let a = locks.lock(&1).await;
        let b = tokio::time::timeout(Duration::from_secs(1), locks.lock(&2))
            .await
            .expect("different key must not block");
        assert_eq!(locks.len(), 2);
        drop(a);
        drop(b);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn write_atomic_creates_parents_and_leaves_no_temp() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("nested/out.bin");

        write_atomic(&target, b"hello").await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"hello");
        let leftovers: Vec<_> = std::fs::read_dir(target.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn file_name_validation() {
        assert!(validate_file_name("abc.pdf").is_ok());
        assert!(validate_file_name("").is_err());
        assert!(validate_file_name("../secret.pdf").is_err());
        assert!(validate_file_name("a/b.pdf").is_err());
        assert!(validate_file_name("a\\b.pdf").is_err());
        assert!(validate_file_name("..").is_err());
        assert!(validate_file_name(".hidden.pdf").is_err());
    }
}
