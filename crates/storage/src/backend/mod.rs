//! Storage backend trait and implementations.
//!
//! [`StorageBackend`] is a small, asynchronous CRUD interface over a tree of
//! files rooted at the organizer's working directory. [`LocalBackend`] talks
//! to the real filesystem, [`DryRunBackend`] wraps another backend and only
//! pretends to mutate it, and [`MockBackend`] (feature `mock`) keeps
//! everything in memory for tests.

mod dryrun;
mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::dryrun::DryRunBackend;
pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::error::Result;
use crate::file::FileInfo;
use crate::path::is_below_root;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::pin::Pin;

pub type EntryStream<'a> = Pin<Box<dyn Stream<Item = Result<Entry>> + Send + 'a>>;

/// Something found while walking a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    File(FileInfo),
    /// A directory the walk descended into (relative path).
    Directory(PathBuf),
}

/// Describes a tree walk: where to start, whether to descend, and which
/// directory names are never entered.
///
/// ```
/// use datum_storage::Walk;
/// use std::path::Path;
///
/// let walk = Walk::new().root("camera").recursive(true).skip("invalid").skip("duplicates");
/// assert_eq!(walk.start(), Some(Path::new("camera")));
/// assert!(!walk.descends_into("duplicates".as_ref()));
/// assert!(walk.descends_into("2023".as_ref()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Walk {
    root: Option<PathBuf>,
    recursive: bool,
    skip: Vec<OsString>,
}
impl Walk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from `root` instead of the backend root. Empty, `.` and `/`
    /// all mean the backend root.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        self.root = is_below_root(&root).then_some(root);
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Never descend into directories with this name, at any depth.
    pub fn skip(mut self, name: impl Into<OsString>) -> Self {
        self.skip.push(name.into());
        self
    }

    pub fn start(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Whether a directory called `name` gets walked.
    pub fn descends_into(&self, name: &OsStr) -> bool {
        self.recursive && !self.skip.iter().any(|s| s == name)
    }
}

/// Unified interface for storage backends.
///
/// # Path Handling
/// All paths are relative to the storage root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations
/// enforce this validation.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use datum_storage::{StorageBackend, error::Result};
///
/// async fn same_size(backend: &dyn StorageBackend, a: &Path, b: &Path) -> Result<bool> {
///     Ok(backend.stat(a).await?.size == backend.stat(b).await?.size)
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the backend, used for logging only.
    fn name(&self) -> &str;

    /// Walk the tree described by `walk`.
    ///
    /// Files directly inside the start directory are always yielded.
    /// Directories are yielded only when the walk descends into them (so a
    /// non-recursive walk yields files only). The start directory itself is
    /// never yielded. Order is unspecified.
    ///
    /// A missing start directory yields a single
    /// [`NotFound`](crate::error::ErrorKind::NotFound); directories that
    /// vanish mid-walk are skipped.
    fn walk<'a>(&'a self, walk: &'a Walk) -> EntryStream<'a>;

    /// Collect [`walk()`](Self::walk) into a [`Vec`], stopping at the first
    /// error.
    async fn list(&self, walk: &Walk) -> Result<Vec<Entry>> {
        self.walk(walk).try_collect().await
    }

    /// Check if a file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Check if a directory exists.
    async fn is_dir(&self, path: &Path) -> Result<bool>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Delete a file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Rename/move a file within the same backend.
    ///
    /// # Notes
    /// - Missing parent directories of `to` are created; creating a directory
    ///   that already exists is not an error, so concurrent moves into the
    ///   same new directory are safe.
    /// - If the destination already exists, it will be overwritten.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Get file metadata without reading contents.
    async fn stat(&self, path: &Path) -> Result<FileInfo>;

    /// Remove a directory if, and only if, it is empty right now.
    ///
    /// Returns `Ok(false)` when the directory still has entries.
    async fn remove_dir(&self, path: &Path) -> Result<bool>;
}
