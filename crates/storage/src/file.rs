//! File metadata returned by storage backends.

use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// File metadata returned by storage backends.
///
/// Produced by walking a backend or by [`stat`](crate::StorageBackend::stat).
/// Content hashes are deliberately absent: the organizer only hashes a file
/// once its target name collides with something else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Relative path from storage root
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: OffsetDateTime,
}
impl FileInfo {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: impl Into<OffsetDateTime>) -> Self {
        Self {
            path: path.into(),
            size,
            modified: modified.into(),
        }
    }

    /// Same file, reported under a different path (used by overlay backends).
    pub(crate) fn relocated(self, path: &Path) -> Self {
        Self { path: path.to_path_buf(), ..self }
    }
}
