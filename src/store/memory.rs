use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use super::{Blob, BlobStore, StorageKey, check_quota};
use crate::error::StorageError;

/// In-process store. Clones share the same map, so a copy kept outside the
/// persistence worker sees what the worker wrote.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    entries: Arc<Mutex<HashMap<StorageKey, Blob>>>,
    quota: Option<u64>,
    unavailable: bool,
}

impl MemoryBlobStore {
    pub fn new(quota: Option<u64>) -> Self {
        Self {
            quota,
            ..Self::default()
        }
    }

    /// A store where every operation fails, as when the backing storage is gone.
    #[cfg(test)]
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub fn contains(&self, key: StorageKey) -> bool {
        self.lock().contains_key(&key)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<StorageKey, Blob>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.unavailable {
            return Err(StorageError::Unavailable("memory store disabled".into()));
        }
        Ok(())
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: StorageKey) -> Result<Option<Blob>, StorageError> {
        self.check()?;
        Ok(self.lock().get(&key).cloned())
    }

    fn set(&mut self, key: StorageKey, value: Blob) -> Result<(), StorageError> {
        self.check()?;
        check_quota(key, &value, self.quota)?;
        self.lock().insert(key, value);
        Ok(())
    }

    fn delete(&mut self, key: StorageKey) -> Result<(), StorageError> {
        self.check()?;
        self.lock().remove(&key);
        Ok(())
    }
}
