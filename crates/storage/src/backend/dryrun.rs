//! Dry-run storage backend.
//!
//! Wraps another backend and records mutations in an in-memory overlay
//! instead of performing them. Reads and probes consult the overlay first,
//! so a simulated run sees the same tree a real run would have produced.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::backend::{Entry, EntryStream, Walk};
use crate::error::{ErrorKind, Result};
use crate::file::FileInfo;
use crate::path::validate as validate_path;
use crate::{BackendHandle, StorageBackend};

#[derive(Debug, Default)]
struct Overlay {
    /// Virtual path -> path of the untouched file in the inner backend.
    moved: HashMap<PathBuf, PathBuf>,
    /// Inner paths that no longer exist from the caller's point of view.
    hidden: HashSet<PathBuf>,
    removed_dirs: HashSet<PathBuf>,
}

enum Location {
    Virtual(PathBuf),
    Hidden,
    Passthrough,
}

impl Overlay {
    fn locate(&self, path: &Path) -> Location {
        if let Some(real) = self.moved.get(path) {
            Location::Virtual(real.clone())
        } else if self.hidden.contains(path) {
            Location::Hidden
        } else {
            Location::Passthrough
        }
    }

    fn has_virtual_below(&self, dir: &Path) -> bool {
        self.moved.keys().any(|p| p != dir && p.starts_with(dir))
    }

    fn is_removed(&self, path: &Path) -> bool {
        self.removed_dirs.iter().any(|d| path.starts_with(d))
    }
}

/// Dry-run storage backend.
///
/// Every mutation is logged as an [`info event`](tracing::Event) and applied
/// to the overlay only; the wrapped backend is never written to.
///
/// Walking is passed straight through to the wrapped backend and does not
/// reflect simulated changes.
pub struct DryRunBackend {
    inner: BackendHandle,
    overlay: RwLock<Overlay>,
}
impl DryRunBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self {
            inner,
            overlay: RwLock::default(),
        }
    }

    async fn ensure_inner_file(&self, path: &Path) -> Result<()> {
        // stat() is the only probe that distinguishes files from directories
        // consistently across backends.
        self.inner.stat(path).await.map(|_| ())
    }
}

#[async_trait]
impl StorageBackend for DryRunBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn walk<'a>(&'a self, walk: &'a Walk) -> EntryStream<'a> {
        self.inner.walk(walk)
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        {
            let overlay = self.overlay.read().await;
            match overlay.locate(&path) {
                Location::Virtual(_) => return Ok(true),
                Location::Hidden => return Ok(overlay.has_virtual_below(&path)),
                Location::Passthrough if overlay.has_virtual_below(&path) => return Ok(true),
                Location::Passthrough if overlay.is_removed(&path) => return Ok(false),
                Location::Passthrough => {},
            }
        }
        self.inner.exists(&path).await
    }

    async fn is_dir(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        {
            let overlay = self.overlay.read().await;
            if overlay.has_virtual_below(&path) {
                return Ok(true);
            }
            if overlay.is_removed(&path) {
                return Ok(false);
            }
        }
        self.inner.is_dir(&path).await
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        let location = self.overlay.read().await.locate(&path);
        match location {
            Location::Virtual(real) => self.inner.read(&real).await,
            Location::Hidden => exn::bail!(ErrorKind::NotFound(path)),
            Location::Passthrough => self.inner.read(&path).await,
        }
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        let mut overlay = self.overlay.write().await;
        match overlay.locate(&path) {
            Location::Virtual(_) => {
                overlay.moved.remove(&path);
            },
            Location::Hidden => exn::bail!(ErrorKind::NotFound(path)),
            Location::Passthrough => {
                self.ensure_inner_file(&path).await?;
                overlay.hidden.insert(path.clone());
            },
        }
        tracing::info!(path = %path.display(), "Simulating delete");
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = validate_path(from)?;
        let to = validate_path(to)?;
        let mut overlay = self.overlay.write().await;
        let real = match overlay.locate(&from) {
            Location::Virtual(real) => {
                overlay.moved.remove(&from);
                real
            },
            Location::Hidden => exn::bail!(ErrorKind::NotFound(from)),
            Location::Passthrough => {
                self.ensure_inner_file(&from).await?;
                overlay.hidden.insert(from.clone());
                from.clone()
            },
        };
        if real == to {
            // Moved back to where it started.
            overlay.hidden.remove(&to);
        } else {
            // Whatever the inner backend has at `to` is overwritten.
            overlay.hidden.insert(to.clone());
            overlay.moved.insert(to.clone(), real);
        }
        overlay.removed_dirs.retain(|d| !to.starts_with(d));
        tracing::info!(from = %from.display(), to = %to.display(), "Simulating rename");
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let path = validate_path(path)?;
        let location = self.overlay.read().await.locate(&path);
        match location {
            Location::Virtual(real) => Ok(self.inner.stat(&real).await?.relocated(&path)),
            Location::Hidden => exn::bail!(ErrorKind::NotFound(path)),
            Location::Passthrough => self.inner.stat(&path).await,
        }
    }

    async fn remove_dir(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        if !self.is_dir(&path).await? {
            exn::bail!(ErrorKind::NotFound(path));
        }
        let mut overlay = self.overlay.write().await;
        if overlay.has_virtual_below(&path) {
            return Ok(false);
        }
        let remaining = self.inner.list(&Walk::new().root(&path).recursive(true)).await?;
        let occupied = remaining.iter().any(|entry| match entry {
            Entry::File(file) => !overlay.hidden.contains(&file.path),
            Entry::Directory(dir) => !overlay.is_removed(dir),
        });
        if occupied {
            return Ok(false);
        }
        overlay.removed_dirs.insert(path.clone());
        tracing::info!(path = %path.display(), "Simulating directory removal");
        Ok(true)
    }
}
