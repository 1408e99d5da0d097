//! Durable blob storage for the last track, its name and the background picture.
//!
//! Every key may be absent; that is the first-run state, not an error.
mod fs;
mod memory;
mod worker;

use std::sync::Arc;

use crate::error::StorageError;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;
pub use worker::{PersistenceWorker, StoreCompletion, StoreOp, StoreOutcome, Ticket};

/// Opaque binary payload shared between the store, the handle registry and the player.
pub type Blob = Arc<[u8]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    SavedAudioBlob,
    SavedFileName,
    SavedBgBlob,
}

impl StorageKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            StorageKey::SavedAudioBlob => "savedAudioBlob",
            StorageKey::SavedFileName => "savedFileName",
            StorageKey::SavedBgBlob => "savedBgBlob",
        }
    }
}

/// Key-value persistence for blobs. Writes replace the previous value of a key whole.
pub trait BlobStore: Send + 'static {
    fn get(&self, key: StorageKey) -> Result<Option<Blob>, StorageError>;
    fn set(&mut self, key: StorageKey, value: Blob) -> Result<(), StorageError>;
    fn delete(&mut self, key: StorageKey) -> Result<(), StorageError>;
}

/// Refuses a single value larger than `quota` bytes.
fn check_quota(key: StorageKey, value: &Blob, quota: Option<u64>) -> Result<(), StorageError> {
    let size = value.len() as u64;
    match quota {
        Some(limit) if size > limit => Err(StorageError::QuotaExceeded {
            key: key.as_str(),
            size,
            limit,
        }),
        _ => Ok(()),
    }
}
