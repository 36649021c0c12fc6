//! In-memory storage backend for testing.

use super::{Entry, EntryStream, Walk};
use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::file::FileInfo;
use crate::path::validate as validate_path;
use async_stream::stream;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    files: BTreeMap<PathBuf, (OffsetDateTime, Vec<u8>)>,
    /// Directories behave like the real thing: created implicitly for new
    /// files, but never removed unless asked to.
    dirs: BTreeSet<PathBuf>,
}
impl State {
    fn insert(&mut self, path: PathBuf, modified: OffsetDateTime, data: Vec<u8>) {
        let mut parent = path.parent();
        while let Some(dir) = parent.filter(|p| !p.as_os_str().is_empty()) {
            self.dirs.insert(dir.to_path_buf());
            parent = dir.parent();
        }
        self.files.insert(path, (modified, data));
    }

    fn has_children(&self, dir: &Path) -> bool {
        self.files.keys().any(|f| f.parent() == Some(dir)) || self.dirs.iter().any(|d| d.parent() == Some(dir))
    }
}

/// In-memory storage backend for testing.
///
/// Files are stored in a map behind a [`RwLock`], so all trait methods can
/// operate on `&self`. Directories are tracked separately so that pruning
/// empty directories can be exercised without touching the filesystem.
///
/// # Examples
///
/// ```
/// use datum_storage::{StorageBackend, backend::MockBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([("camera/IMG_0001.jpg", b"jpeg")]);
/// assert!(backend.exists(Path::new("camera/IMG_0001.jpg")).await?);
/// assert!(backend.is_dir(Path::new("camera")).await?);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    state: RwLock<State>,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files, all modified "now".
    ///
    /// Panics if any path fails validation. If test setup is wrong, then
    /// the test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let now = OffsetDateTime::now_utc();
        let mut state = State::default();
        for (path, data) in files {
            state.insert(Self::checked(path.into()), now, data.into());
        }
        Self {
            name: "mock".to_string(),
            state: RwLock::new(state),
        }
    }

    /// Add a file with an explicit modification time.
    pub fn with_file_modified(
        mut self,
        path: impl Into<PathBuf>,
        data: impl Into<Vec<u8>>,
        modified: OffsetDateTime,
    ) -> Self {
        self.state.get_mut().insert(Self::checked(path.into()), modified, data.into());
        self
    }

    /// Add an empty directory.
    pub fn with_dir(mut self, path: impl Into<PathBuf>) -> Self {
        let path = Self::checked(path.into());
        // Inserting a placeholder child and removing it again records every
        // ancestor as well.
        let state = self.state.get_mut();
        let placeholder = path.join(".placeholder");
        state.insert(placeholder.clone(), OffsetDateTime::now_utc(), Vec::new());
        state.files.remove(&placeholder);
        self
    }

    /// Every file path currently stored, sorted.
    pub async fn paths(&self) -> Vec<PathBuf> {
        self.state.read().await.files.keys().cloned().collect()
    }

    fn checked(path: PathBuf) -> PathBuf {
        match validate_path(&path) {
            Ok(validated) => validated,
            // The panic here is DELIBERATE. MockBackend is intended to be
            // used in tests.
            Err(_) => panic!("MockBackend: invalid path {}", path.display()),
        }
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn walk<'a>(&'a self, walk: &'a Walk) -> EntryStream<'a> {
        let start = match walk.start().map(validate_path).transpose() {
            Ok(start) => start,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };

        Box::pin(stream! {
            // Snapshot under the read lock, then drop it before yielding.
            let (exists, entries) = {
                let guard = self.state.read().await;
                let exists = start.as_ref().is_none_or(|s| guard.dirs.contains(s));
                let base = start.clone().unwrap_or_default();
                // Every directory between `base` and `path` must be walkable.
                let reachable = |path: &Path| match path.strip_prefix(&base) {
                    Ok(relative) => {
                        let mut dirs: Vec<_> = relative.components().collect();
                        dirs.pop();
                        dirs.iter().all(|c| walk.descends_into(c.as_os_str()))
                    },
                    Err(_) => false,
                };
                let mut entries: Vec<Entry> = guard
                    .dirs
                    .iter()
                    .filter(|d| Some(*d) != start.as_ref() && reachable(d.as_path()) && d.file_name().is_some_and(|n| walk.descends_into(n)))
                    .map(|d| Entry::Directory(d.clone()))
                    .collect();
                entries.extend(
                    guard
                        .files
                        .iter()
                        .filter(|(path, _)| reachable(path.as_path()))
                        .map(|(path, (modified, data))| Entry::File(FileInfo::new(path.clone(), data.len() as u64, *modified))),
                );
                (exists, entries)
            };
            if !exists {
                yield Err(exn::Exn::from(ErrorKind::NotFound(start.unwrap_or_default())));
                return;
            }
            for entry in entries {
                yield Ok(entry);
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        let guard = self.state.read().await;
        Ok(guard.files.contains_key(&path) || guard.dirs.contains(&path))
    }

    async fn is_dir(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(self.state.read().await.dirs.contains(&path))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        let guard = self.state.read().await;
        let (_modified, data) = guard.files.get(&path).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.clone())))?;
        Ok(data.clone())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        let mut guard = self.state.write().await;
        guard.files.remove(&path).map(|_| ()).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = validate_path(from)?;
        let to = validate_path(to)?;
        let mut guard = self.state.write().await;
        let (modified, data) = guard.files.remove(&from).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(from)))?;
        guard.insert(to, modified, data);
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let path = validate_path(path)?;
        let guard = self.state.read().await;
        let (modified, data) = guard.files.get(&path).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path.clone())))?;
        Ok(FileInfo::new(path.clone(), data.len() as u64, *modified))
    }

    async fn remove_dir(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        let mut guard = self.state.write().await;
        if !guard.dirs.contains(&path) {
            exn::bail!(ErrorKind::NotFound(path));
        }
        if guard.has_children(&path) {
            return Ok(false);
        }
        guard.dirs.remove(&path);
        Ok(true)
    }
}
