//! Storage media backing the clip store
//!
//! A medium is a flat key → text map, the same contract a browser key-value
//! store offers. The store keeps its whole collection under one key.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::errors::ClipError;

/// Durable key → text storage
#[async_trait]
pub trait StorageMedium: Send + Sync {
    /// Read the value under `key`, `None` if it was never written
    async fn get_item(&self, key: &str) -> Result<Option<String>, ClipError>;

    /// Replace the value under `key`
    async fn set_item(&self, key: &str, value: &str) -> Result<(), ClipError>;
}

fn check_key(key: &str) -> Result<(), String> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(format!("invalid storage key: {:?}", key))
    }
}

/// One JSON file per key under a root directory
#[derive(Debug, Clone)]
pub struct FileMedium {
    root: PathBuf,
}

impl FileMedium {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }
}

#[async_trait]
impl StorageMedium for FileMedium {
    async fn get_item(&self, key: &str) -> Result<Option<String>, ClipError> {
        check_key(key).map_err(ClipError::StorageRead)?;
        let path = self.path_for(key);

        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ClipError::StorageRead(format!(
                "Failed to read {:?}: {}",
                path, e
            ))),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), ClipError> {
        check_key(key).map_err(ClipError::StorageWrite)?;

        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            ClipError::StorageWrite(format!(
                "Failed to create storage directory {:?}: {}",
                self.root, e
            ))
        })?;

        // Write beside the target and rename so readers never see a torn file
        let path = self.path_for(key);
        let tmp_path = self.root.join(format!("{}.json.tmp", key));
        tokio::fs::write(&tmp_path, value).await.map_err(|e| {
            ClipError::StorageWrite(format!("Failed to write {:?}: {}", tmp_path, e))
        })?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(ClipError::StorageWrite(format!(
                "Failed to replace {:?}: {}",
                path, e
            )));
        }

        log::debug!("Wrote {} bytes to {:?}", value.len(), path);
        Ok(())
    }
}

/// In-memory medium with an optional byte quota.
///
/// Useful for tests and for hosts without a writable filesystem. Writes that
/// would push the total stored size over the quota are rejected, mirroring a
/// browser's quota-exceeded failure.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    items: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
    fail_reads: AtomicBool,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::default()
        }
    }

    /// Make every subsequent read fail until reset
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Raw value under `key`, bypassing failure injection
    pub fn raw(&self, key: &str) -> Option<String> {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    /// Overwrite `key` directly, bypassing the quota
    pub fn insert_raw(&self, key: &str, value: impl Into<String>) {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), value.into());
    }

    /// Total bytes currently stored
    pub fn used_bytes(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .map(String::len)
            .sum()
    }
}

#[async_trait]
impl StorageMedium for MemoryMedium {
    async fn get_item(&self, key: &str) -> Result<Option<String>, ClipError> {
        check_key(key).map_err(ClipError::StorageRead)?;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ClipError::StorageRead("medium unavailable".to_string()));
        }
        Ok(self.raw(key))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), ClipError> {
        check_key(key).map_err(ClipError::StorageWrite)?;
        let mut items = self
            .items
            .lock()
            .map_err(|_| ClipError::StorageWrite("medium lock poisoned".to_string()))?;

        if let Some(quota) = self.quota_bytes {
            let others: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            if others + value.len() > quota {
                return Err(ClipError::StorageWrite(format!(
                    "quota exceeded: {} of {} bytes",
                    others + value.len(),
                    quota
                )));
            }
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
