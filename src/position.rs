//! Small synchronous key-value storage and the playback position kept in it.
use std::{
    collections::BTreeMap,
    fs, io,
    path::PathBuf,
};

use log::{debug, warn};

const POSITION_KEY: &str = "audioCurrentTime";

pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&mut self, key: &str, value: String);
    fn remove_item(&mut self, key: &str);
}

/// A toml table on disk, rewritten on every change.
pub struct KeyValueFile {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl KeyValueFile {
    /// An unreadable or malformed file is treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text).unwrap_or_else(|err| {
                warn!("ignoring malformed {}: {err}", path.display());
                BTreeMap::new()
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                warn!("could not read {}: {err}", path.display());
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    fn flush(&self) {
        let text = match toml::to_string(&self.entries) {
            Ok(text) => text,
            Err(err) => {
                warn!("could not encode {}: {err}", self.path.display());
                return;
            }
        };
        if let Err(err) = fs::write(&self.path, text) {
            warn!("could not write {}: {err}", self.path.display());
        }
    }
}

impl KeyValueStore for KeyValueFile {
    fn get_item(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_owned(), value);
        self.flush();
    }

    fn remove_item(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.flush();
        }
    }
}

#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryKeyValue {
    entries: BTreeMap<String, String>,
}

#[cfg(test)]
impl KeyValueStore for MemoryKeyValue {
    fn get_item(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_owned(), value);
    }

    fn remove_item(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// Last known playback position of the loaded track, in seconds.
pub struct PlaybackPosition<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> PlaybackPosition<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Option<f64> {
        let raw = self.store.get_item(POSITION_KEY)?;
        match raw.trim().parse::<f64>() {
            Ok(seconds) if seconds.is_finite() => Some(seconds),
            _ => {
                debug!("discarding unusable saved position {raw:?}");
                None
            }
        }
    }

    pub fn save(&mut self, seconds: f64) {
        self.store.set_item(POSITION_KEY, seconds.to_string());
    }

    pub fn clear(&mut self) {
        self.store.remove_item(POSITION_KEY);
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }
}
