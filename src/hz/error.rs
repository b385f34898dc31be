use std::path::PathBuf;
use thiserror::Error;

use super::structures::MAX_PAYLOAD_SIZE;

/// Errors produced by the archive codec.
#[derive(Debug, Error)]
pub enum HzError {
    /// The first 16 bytes of an existing file do not match the signature.
    #[error("not a valid '.hz' file")]
    InvalidFormat,

    /// The archive path names a directory instead of a file.
    #[error("'{0}' exists and is a directory")]
    PathIsDirectory(PathBuf),

    /// Merge attempted on a handle whose one-time write permission is gone,
    /// either because it already merged or because it was opened from an
    /// existing file.
    #[error("archive is read-only; only a freshly created archive can merge, once")]
    ReadOnly,

    /// The merge source is not a directory.
    #[error("'{0}' is not a directory")]
    NotADirectory(PathBuf),

    /// The extraction destination exists but is not a directory.
    #[error("destination '{0}' exists and is not a directory")]
    BadDestination(PathBuf),

    /// A merge candidate exceeds the largest payload the format can record.
    #[error("'{path}' is {size} bytes, over the {} byte limit", MAX_PAYLOAD_SIZE)]
    FileTooLarge { path: PathBuf, size: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
