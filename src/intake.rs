//! File intake: turning a picked or dropped path into a [`MediaAsset`].
use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use crate::store::Blob;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Image,
}

impl MediaKind {
    pub const ALL: [MediaKind; 2] = [MediaKind::Audio, MediaKind::Image];

    pub const fn index(self) -> usize {
        match self {
            MediaKind::Audio => 0,
            MediaKind::Image => 1,
        }
    }

    const fn type_prefix(self) -> &'static str {
        match self {
            MediaKind::Audio => "audio/",
            MediaKind::Image => "image/",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Image => write!(f, "image"),
        }
    }
}

/// Declared media type of a file, e.g. `audio/mpeg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType(&'static str);

// extension -> declared type
const MEDIA_TYPES: &[(&str, &str)] = &[
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("flac", "audio/flac"),
    ("ogg", "audio/ogg"),
    ("oga", "audio/ogg"),
    ("opus", "audio/opus"),
    ("m4a", "audio/mp4"),
    ("mp4", "audio/mp4"),
    ("aac", "audio/aac"),
    ("aif", "audio/aiff"),
    ("aiff", "audio/aiff"),
    ("webm", "audio/webm"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
    ("webp", "image/webp"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("ico", "image/x-icon"),
];

impl MediaType {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        MEDIA_TYPES
            .iter()
            .find(|(known, _)| *known == ext)
            .map(|(_, media_type)| MediaType(media_type))
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }

    pub fn is(&self, kind: MediaKind) -> bool {
        self.0.starts_with(kind.type_prefix())
    }
}

/// A file whose bytes now live in memory, ready to be persisted and played.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    pub blob: Blob,
    pub display_name: String,
}

/// One file offered by the user, either from the explorer or dropped onto the terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeFile {
    pub path: PathBuf,
    pub name: String,
    pub media_type: Option<MediaType>,
}

impl IntakeFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        let media_type = MediaType::from_path(&path);
        Self {
            path,
            name,
            media_type,
        }
    }

    /// Terminals deliver a dropped file as pasted text: maybe quoted, maybe with
    /// backslash-escaped spaces, maybe a `file://` uri. Only the first line counts.
    pub fn from_paste(text: &str) -> Option<Self> {
        let line = text.lines().map(str::trim).find(|l| !l.is_empty())?;
        let unquoted = strip_quotes(line);
        let path = match unquoted.strip_prefix("file://") {
            Some(uri) => percent_decode(uri),
            None => unescape(unquoted),
        };
        if path.is_empty() {
            return None;
        }
        Some(Self::from_path(path))
    }

    pub fn accepts(&self, kind: MediaKind) -> bool {
        self.media_type.as_ref().is_some_and(|t| t.is(kind))
    }

    pub fn read(&self) -> io::Result<MediaAsset> {
        let bytes = fs::read(&self.path)?;
        Ok(MediaAsset {
            blob: Blob::from(bytes),
            display_name: self.name.clone(),
        })
    }

    /// Declared type for logs, `unknown` when the extension is not recognised.
    pub fn type_label(&self) -> &'static str {
        self.media_type.as_ref().map_or("unknown", MediaType::as_str)
    }
}

fn strip_quotes(s: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|r| r.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
