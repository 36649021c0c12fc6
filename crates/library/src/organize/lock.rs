use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-path locks, so that two files never probe and claim the same path at
/// the same time.
///
/// Entries are dropped once nobody holds them.
#[derive(Debug, Default)]
pub(crate) struct PathLocks {
    locks: Mutex<HashMap<PathBuf, Weak<AsyncMutex<()>>>>,
}
impl PathLocks {
    /// Lock every path in `paths`. Paths are locked in sorted order, so any
    /// two callers always agree on the order and cannot deadlock.
    pub(crate) async fn lock_all(&self, paths: &[&Path]) -> Vec<OwnedMutexGuard<()>> {
        let mut paths = paths.to_vec();
        paths.sort();
        paths.dedup();
        let mut guards = Vec::with_capacity(paths.len());
        for path in paths {
            guards.push(self.handle(path).lock_owned().await);
        }
        guards
    }

    fn handle(&self, path: &Path) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.retain(|_, lock| lock.strong_count() > 0);
        if let Some(lock) = locks.get(path).and_then(Weak::upgrade) {
            return lock;
        }
        let lock = Arc::new(AsyncMutex::new(()));
        locks.insert(path.to_path_buf(), Arc::downgrade(&lock));
        lock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_path_is_exclusive() {
        let locks = PathLocks::default();
        let guards = locks.lock_all(&[Path::new("2023/a.jpg"), Path::new("in/a.jpg")]).await;
        let paths = [Path::new("2023/a.jpg")];
        let contended = tokio::time::timeout(Duration::from_millis(20), locks.lock_all(&paths));
        assert!(contended.await.is_err());
        drop(guards);
        let guards = locks.lock_all(&[Path::new("2023/a.jpg")]).await;
        assert_eq!(guards.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_paths_lock_once() {
        let locks = PathLocks::default();
        let guards = locks.lock_all(&[Path::new("a.jpg"), Path::new("a.jpg")]).await;
        assert_eq!(guards.len(), 1);
    }

    #[tokio::test]
    async fn test_released_entries_are_forgotten() {
        let locks = PathLocks::default();
        drop(locks.lock_all(&[Path::new("a.jpg")]).await);
        drop(locks.lock_all(&[Path::new("b.jpg")]).await);
        assert_eq!(locks.locks.lock().unwrap().len(), 1);
    }
}
