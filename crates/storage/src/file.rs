// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed lease store
//!
//! Layout under the store root:
//!
//! ```text
//! store.lock                       advisory lock serializing all operations
//! leases/<type>/<sha256>.json      one record per lease key
//! ```
//!
//! Mutations hold an exclusive OS lock on `store.lock` for the whole
//! check-and-write, so conditional insert is atomic across every process
//! that opens the same root. Reads take a shared lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use lease_core::{
    ExpiryPolicy, InsertOutcome, Lease, LeaseKey, LeaseStore, ResourceType, SessionToken,
    StoreError,
};
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LOCK_FILE: &str = "store.lock";
const LEASES_DIR: &str = "leases";
const RECORD_EXT: &str = "json";

#[derive(Clone, Debug)]
pub struct FileLeaseStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    root: PathBuf,
    policy: ExpiryPolicy,
}

/// Held OS lock on `store.lock`; released on drop
struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl FileLeaseStore {
    /// Open or create a store at the given directory
    pub fn open(root: impl Into<PathBuf>, policy: ExpiryPolicy) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(root.join(LEASES_DIR))?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(root.join(LOCK_FILE))?;

        Ok(Self {
            inner: Arc::new(Inner { root, policy }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Number of record files on disk, stale ones included
    pub fn record_count(&self) -> Result<usize, StoreError> {
        let _lock = self.lock(false)?;
        Ok(self.record_files()?.len())
    }

    fn lock(&self, exclusive: bool) -> Result<StoreLock, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.inner.root.join(LOCK_FILE))?;
        if exclusive {
            FileExt::lock_exclusive(&file)?;
        } else {
            FileExt::lock_shared(&file)?;
        }
        Ok(StoreLock { file })
    }

    fn record_path(&self, key: &LeaseKey) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.resource_type.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(key.resource_id.as_bytes());
        let digest = hasher.finalize();

        self.inner
            .root
            .join(LEASES_DIR)
            .join(key.resource_type.as_str())
            .join(format!("{}.{}", hex_encode(&digest), RECORD_EXT))
    }

    fn load(&self, path: &Path, key: Option<&LeaseKey>) -> Result<Option<Lease>, StoreError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let lease: Lease = serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if let Some(key) = key {
            if &lease.key != key {
                return Err(StoreError::Corrupt {
                    path: path.to_path_buf(),
                    reason: format!("record holds {} instead of {}", lease.key, key),
                });
            }
        }
        Ok(Some(lease))
    }

    /// Write via temp file and rename so readers never see a partial record
    fn save(&self, lease: &Lease) -> Result<(), StoreError> {
        let path = self.record_path(&lease.key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension(format!("{}.tmp", RECORD_EXT));

        let json = serde_json::to_vec_pretty(lease)?;
        let written = File::create(&tmp)
            .and_then(|mut file| {
                file.write_all(&json)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&tmp, &path));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    /// Load the record for `key`, treating an unreadable one as absent.
    ///
    /// Lease paths must keep working when a record is damaged; the sweep
    /// deletes such files but is not needed for the key to become usable.
    fn load_key(&self, key: &LeaseKey) -> Result<Option<Lease>, StoreError> {
        let path = self.record_path(key);
        match self.load(&path, Some(key)) {
            Err(StoreError::Corrupt { reason, .. }) => {
                tracing::warn!(resource = %key, path = %path.display(), reason, "ignoring corrupt lease record");
                Ok(None)
            }
            other => other,
        }
    }

    fn remove(path: &Path) -> Result<bool, StoreError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn record_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut files = Vec::new();
        for resource_type in ResourceType::ALL {
            let dir = self.inner.root.join(LEASES_DIR).join(resource_type.as_str());
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            for entry in entries {
                let path = entry?.path();
                if path.extension().is_some_and(|ext| ext == RECORD_EXT) {
                    files.push(path);
                }
            }
        }
        files.sort();
        Ok(files)
    }

    fn try_insert_blocking(
        &self,
        lease: Lease,
        now: DateTime<Utc>,
    ) -> Result<InsertOutcome, StoreError> {
        let _lock = self.lock(true)?;
        if let Some(existing) = self.load_key(&lease.key)? {
            if self.inner.policy.is_active(&existing, now) {
                return Ok(InsertOutcome::Conflict(existing));
            }
            tracing::debug!(resource = %lease.key, "replacing stale lease record");
        }
        self.save(&lease)?;
        Ok(InsertOutcome::Inserted(lease))
    }

    fn read_blocking(&self, key: &LeaseKey, now: DateTime<Utc>) -> Result<Option<Lease>, StoreError> {
        let _lock = self.lock(false)?;
        let lease = self.load_key(key)?;
        Ok(lease.filter(|lease| self.inner.policy.is_active(lease, now)))
    }

    fn touch_blocking(
        &self,
        key: &LeaseKey,
        token: &SessionToken,
        now: DateTime<Utc>,
    ) -> Result<Option<Lease>, StoreError> {
        let _lock = self.lock(true)?;
        match self.load_key(key)? {
            Some(mut lease) if lease.is_held_by(token) && self.inner.policy.is_active(&lease, now) => {
                lease.touch(now);
                self.save(&lease)?;
                Ok(Some(lease))
            }
            _ => Ok(None),
        }
    }

    fn delete_all_blocking(&self, key: &LeaseKey) -> Result<usize, StoreError> {
        let _lock = self.lock(true)?;
        let removed = Self::remove(&self.record_path(key))?;
        Ok(usize::from(removed))
    }

    fn purge_blocking(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let _lock = self.lock(true)?;
        let mut purged = 0;
        for path in self.record_files()? {
            let purge = match self.load(&path, None) {
                Ok(Some(lease)) => self.inner.policy.is_purgeable(&lease, now),
                Ok(None) => false,
                Err(StoreError::Corrupt { reason, .. }) => {
                    tracing::warn!(path = %path.display(), reason, "purging corrupt lease record");
                    true
                }
                Err(e) => return Err(e),
            };
            if purge && Self::remove(&path)? {
                purged += 1;
            }
        }
        Ok(purged)
    }

    fn list_active_blocking(&self, now: DateTime<Utc>) -> Result<Vec<Lease>, StoreError> {
        let _lock = self.lock(false)?;
        let mut active = Vec::new();
        for path in self.record_files()? {
            match self.load(&path, None) {
                Ok(Some(lease)) if self.inner.policy.is_active(&lease, now) => active.push(lease),
                Ok(_) => {}
                Err(StoreError::Corrupt { reason, .. }) => {
                    tracing::warn!(path = %path.display(), reason, "skipping corrupt lease record");
                }
                Err(e) => return Err(e),
            }
        }
        active.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(active)
    }

    /// Run a store operation on the blocking pool
    async fn blocking<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&FileLeaseStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| StoreError::Unavailable(format!("store task failed: {}", e)))?
    }
}

#[async_trait]
impl LeaseStore for FileLeaseStore {
    fn policy(&self) -> ExpiryPolicy {
        self.inner.policy
    }

    async fn try_insert(
        &self,
        lease: Lease,
        now: DateTime<Utc>,
    ) -> Result<InsertOutcome, StoreError> {
        self.blocking(move |store| store.try_insert_blocking(lease, now))
            .await
    }

    async fn read(&self, key: &LeaseKey, now: DateTime<Utc>) -> Result<Option<Lease>, StoreError> {
        let key = key.clone();
        self.blocking(move |store| store.read_blocking(&key, now))
            .await
    }

    async fn touch(
        &self,
        key: &LeaseKey,
        token: &SessionToken,
        now: DateTime<Utc>,
    ) -> Result<Option<Lease>, StoreError> {
        let key = key.clone();
        let token = token.clone();
        self.blocking(move |store| store.touch_blocking(&key, &token, now))
            .await
    }

    async fn delete_all(&self, key: &LeaseKey) -> Result<usize, StoreError> {
        let key = key.clone();
        self.blocking(move |store| store.delete_all_blocking(&key))
            .await
    }

    async fn purge(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.blocking(move |store| store.purge_blocking(now)).await
    }

    async fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<Lease>, StoreError> {
        self.blocking(move |store| store.list_active_blocking(now))
            .await
    }
}

// Hex encoding helper
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
