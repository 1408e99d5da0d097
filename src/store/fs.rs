use std::{fs, io, path::PathBuf};

use log::{debug, warn};

use super::{Blob, BlobStore, StorageKey, check_quota};
use crate::error::StorageError;

/// One file per key inside a directory.
pub struct FsBlobStore {
    dir: PathBuf,
    quota: Option<u64>,
}

impl FsBlobStore {
    pub fn open(dir: impl Into<PathBuf>, quota: Option<u64>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|source| StorageError::Unavailable(format!("{}: {source}", dir.display())))?;
        Ok(Self { dir, quota })
    }

    fn path_of(&self, key: StorageKey) -> PathBuf {
        self.dir.join(key.as_str())
    }
}

impl BlobStore for FsBlobStore {
    fn get(&self, key: StorageKey) -> Result<Option<Blob>, StorageError> {
        match fs::read(self.path_of(key)) {
            Ok(bytes) => Ok(Some(Blob::from(bytes))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                key: key.as_str(),
                source,
            }),
        }
    }

    fn set(&mut self, key: StorageKey, value: Blob) -> Result<(), StorageError> {
        check_quota(key, &value, self.quota)?;
        // write beside the target then rename, so readers see the old or the new value
        let target = self.path_of(key);
        let staging = target.with_extension("partial");
        if let Err(source) = fs::write(&staging, &value).and_then(|()| fs::rename(&staging, &target)) {
            if let Err(err) = fs::remove_file(&staging) {
                if err.kind() != io::ErrorKind::NotFound {
                    warn!("could not remove {}: {err}", staging.display());
                }
            }
            return Err(StorageError::Io {
                key: key.as_str(),
                source,
            });
        }
        debug!("stored {} ({} bytes)", key.as_str(), value.len());
        Ok(())
    }

    fn delete(&mut self, key: StorageKey) -> Result<(), StorageError> {
        match fs::remove_file(self.path_of(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                key: key.as_str(),
                source,
            }),
        }
    }
}
