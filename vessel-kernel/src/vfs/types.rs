//! Core data types for the VFS (design doc §3, File).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bitfield mode: low 9 bits are POSIX-style permission bits, bit 9 marks a
/// directory. Kept as a newtype rather than a bare `u32` so "is this a
/// directory" can't be confused with a raw permission check anywhere it's
/// read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mode(pub u32);

impl Mode {
    const DIR_BIT: u32 = 1 << 9;

    pub const fn file(perm: u32) -> Self {
        Self(perm & 0o777)
    }

    pub const fn dir(perm: u32) -> Self {
        Self((perm & 0o777) | Self::DIR_BIT)
    }

    pub const fn is_dir(&self) -> bool {
        self.0 & Self::DIR_BIT != 0
    }

    pub const fn permissions(&self) -> u32 {
        self.0 & 0o777
    }

    /// Default mode for a newly created file (`writeFile` on an absent path).
    pub const fn default_file() -> Self {
        Self::file(0o644)
    }

    pub const fn default_dir() -> Self {
        Self::dir(0o755)
    }
}

/// POSIX-flavoured metadata for a single VFS entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileMeta {
    pub path: String,
    pub mode: Mode,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub atime: DateTime<Utc>,
    pub mtime: DateTime<Utc>,
    pub ctime: DateTime<Utc>,
    pub birthtime: DateTime<Utc>,
    pub organisation: Option<String>,
    pub agent: Option<String>,
}

impl FileMeta {
    pub fn new_file(path: impl Into<String>, size: u64, now: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            mode: Mode::default_file(),
            uid: 0,
            gid: 0,
            size,
            atime: now,
            mtime: now,
            ctime: now,
            birthtime: now,
            organisation: None,
            agent: None,
        }
    }

    pub fn new_dir(path: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            mode: Mode::default_dir(),
            uid: 0,
            gid: 0,
            size: 0,
            atime: now,
            mtime: now,
            ctime: now,
            birthtime: now,
            organisation: None,
            agent: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.mode.is_dir()
    }
}

/// An open-file handle returned by `openFile`, carrying a buffered snapshot
/// that `sync` commits atomically as a whole. `u64` rather than a pointer
/// type so handles are cheap to pass across the bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileHandle(pub u64);

/// A single in-flight open-file buffer, owned by the store until `sync`
/// commits or the handle is dropped without committing (in which case the
/// buffered write is discarded, matching "close without flush is a no-op").
#[derive(Debug, Default)]
pub struct OpenBuffer {
    pub content: Vec<u8>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct OpenFlag {
    pub create: bool,
    pub truncate: bool,
    pub append: bool,
}
