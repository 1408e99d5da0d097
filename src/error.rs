//! Recoverable error kinds. None of these ever leave the UI loop: they are logged and the
//! affected feature degrades while playback carries on.
use std::{io, path::PathBuf};
use thiserror::Error;

use crate::media::ElementId;

/// A blob store read, write or delete failed.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage i/o failed for `{key}`")]
    Io {
        key: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("`{key}` needs {size} bytes, over the {limit} byte quota")]
    QuotaExceeded {
        key: &'static str,
        size: u64,
        limit: u64,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("persistence worker is gone")]
    WorkerGone,
}

/// The engine refused to start playback. The UI simply stays paused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackRejected {
    #[error("nothing is loaded")]
    NoSource,
    #[error("no audio output device: {0}")]
    NoOutput(String),
    #[error("source could not be decoded: {0}")]
    Decode(String),
    #[error("the player thread has stopped")]
    EngineGone,
}

/// A background image failed to decode. The previous background stays up.
#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("image handle was already revoked")]
    Revoked,
    #[error("could not decode background image")]
    Decode(#[from] image::ImageError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("{0} already feeds an analyser")]
    AlreadyConnected(ElementId),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeekRejected {
    #[error("no track loaded")]
    NoSource,
    #[error("seek target {0} is not a valid time")]
    Invalid(f64),
    #[error("seek target {requested}s is outside the track (duration {duration}s)")]
    OutOfRange { requested: f64, duration: f64 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config at {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("config is not valid toml")]
    Parse(#[from] toml::de::Error),
    #[error("no data directory available on this platform")]
    NoDataDir,
}
