use crate::Context;
use crate::error::{ErrorKind as LibraryErrorKind, Result as LibraryResult};
use crate::organize::error::{ErrorKind as OrganizeErrorKind, Result as OrganizeResult};
use crate::organize::file::{Action, organize_file};
use crate::organize::lock::PathLocks;
use crate::organize::stats::{Category, RunStatistics};
use crate::plan::{DUPLICATES_DIR, INVALID_DIR};
use crate::sink::Severity;
use async_stream::stream;
use datum_storage::backend::DryRunBackend;
use datum_storage::error::ErrorKind as StorageErrorKind;
use datum_storage::{BackendHandle, Entry, Walk, validate_path};
use exn::ResultExt;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Progress events emitted by [`organize`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started): exactly once.
/// 2. [`DiscoveryComplete`](Self::DiscoveryComplete): exactly once, with the
///    number of files found.
/// 3. [`Organized`](Self::Organized): once per file, failures included.
/// 4. [`Pruned`](Self::Pruned): once per removed directory, after every
///    file is done.
/// 5. [`Complete`](Self::Complete): exactly once, with the run's statistics.
///
/// A setup error (bad or missing root) terminates the stream early, in which
/// case [`Complete`](Self::Complete) is never emitted.
#[derive(Debug)]
pub enum OrganizeEvent {
    Started,
    DiscoveryComplete(u64),
    Organized(Action),
    Pruned(PathBuf),
    Complete(RunStatistics),
}

/// Streams [`OrganizeEvent`]s for every file below `root`.
///
/// `root` is relative to the backend root (the working directory); empty or
/// `.` means the working directory itself. Files are collected by a single
/// walk that never enters `invalid` or `duplicates`, sorted by path, and
/// organized up to `ctx.options.concurrency` at a time. In simulate mode the
/// backend is wrapped in a [`DryRunBackend`], so every decision and log line
/// matches a real run while nothing is touched.
pub fn organize<'a>(
    backend: &'a BackendHandle,
    root: &'a Path,
    ctx: &'a Context,
) -> impl Stream<Item = LibraryResult<OrganizeEvent>> + 'a {
    stream! {
        for await event in organize_inner(backend, root, ctx) {
            yield event.or_raise(|| LibraryErrorKind::Organize);
        }
    }
}

/// Drive [`organize`] to completion and return the statistics.
pub async fn run(backend: &BackendHandle, root: &Path, ctx: &Context) -> LibraryResult<RunStatistics> {
    let mut events = std::pin::pin!(organize(backend, root, ctx));
    while let Some(event) = events.next().await {
        if let OrganizeEvent::Complete(stats) = event? {
            return Ok(stats);
        }
    }
    exn::bail!(LibraryErrorKind::Organize)
}

fn organize_inner<'a>(
    backend: &'a BackendHandle,
    root: &'a Path,
    ctx: &'a Context,
) -> impl Stream<Item = OrganizeResult<OrganizeEvent>> + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        yield Ok(OrganizeEvent::Started);

        let backend: BackendHandle = match ctx.options.simulate {
            true => Arc::new(DryRunBackend::new(backend.clone())),
            false => backend.clone(),
        };
        let root = match check_root(&backend, root).await {
            Ok(root) => root,
            Err(e) => {
                yield Err(e);
                return;
            },
        };

        let stats = RunStatistics::new(ctx.options.sample_limit);
        let (files, directories) = discover(&backend, root.as_deref(), ctx.options.recursive).await;
        stats.set_discovered(files.len() as u64);
        yield Ok(OrganizeEvent::DiscoveryComplete(files.len() as u64));

        let locks = PathLocks::default();
        let mut futures: Vec<_> =
            files.into_iter().map(|path| organize_file(backend.as_ref(), ctx, &locks, path)).collect();
        let mut processing = FuturesUnordered::new();
        processing.extend(futures.drain(..ctx.options.workers().min(futures.len())));
        while let Some(action) = processing.next().await {
            ctx.sink.emit(action.severity(), &action.to_string());
            stats.record(action.category(), action.source());
            yield Ok(OrganizeEvent::Organized(action));
            // Pop-n-push, but FIFO instead of LIFO.
            if !futures.is_empty() {
                processing.push(futures.remove(0));
            }
        }
        drop(processing);

        if ctx.options.delete_empty_directories {
            for directory in deepest_first(directories) {
                match backend.remove_dir(&directory).await {
                    Ok(true) => {
                        ctx.sink.emit(Severity::Info, &format!("RMDIR {}", directory.display()));
                        stats.record(Category::RemovedDirectory, &directory);
                        yield Ok(OrganizeEvent::Pruned(directory));
                    },
                    Ok(false) => tracing::trace!(directory = %directory.display(), "Directory not empty"),
                    Err(e) if matches!(e.deref(), StorageErrorKind::NotFound(_)) => {},
                    Err(e) => {
                        ctx.sink.emit(Severity::Warn, &format!("ERROR {}: {}", directory.display(), e.deref()));
                    },
                }
            }
        }

        yield Ok(OrganizeEvent::Complete(stats));
    })
}

/// `None` is the working directory itself.
async fn check_root(backend: &BackendHandle, root: &Path) -> OrganizeResult<Option<PathBuf>> {
    if root.as_os_str().is_empty() || root == Path::new(".") {
        return Ok(None);
    }
    if root.is_absolute() {
        exn::bail!(OrganizeErrorKind::InvalidRoot(root.to_path_buf()));
    }
    let root = validate_path(root).or_raise(|| OrganizeErrorKind::InvalidRoot(root.to_path_buf()))?;
    if !backend.is_dir(&root).await.or_raise(|| OrganizeErrorKind::RootNotFound(root.clone()))? {
        exn::bail!(OrganizeErrorKind::RootNotFound(root));
    }
    Ok(Some(root))
}

/// One upfront walk. Files come back sorted by path; directories are only
/// collected by a recursive walk. Entries that cannot be read are logged and
/// left out.
async fn discover(backend: &BackendHandle, root: Option<&Path>, recursive: bool) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut walk = Walk::new().recursive(recursive).skip(INVALID_DIR).skip(DUPLICATES_DIR);
    if let Some(root) = root {
        walk = walk.root(root);
    }
    let mut files = Vec::new();
    let mut directories = Vec::new();
    let mut entries = backend.walk(&walk);
    while let Some(entry) = entries.next().await {
        match entry {
            Ok(Entry::File(info)) => files.push(info.path),
            Ok(Entry::Directory(path)) => directories.push(path),
            Err(e) => {
                let kind = e.deref();
                tracing::warn!(error = %kind, "Skipping unreadable entry");
            },
        }
    }
    files.sort();
    tracing::debug!(files = files.len(), directories = directories.len(), "Discovery complete");
    (files, directories)
}

fn deepest_first(mut directories: Vec<PathBuf>) -> Vec<PathBuf> {
    directories.sort_by(|a, b| b.components().count().cmp(&a.components().count()).then_with(|| b.cmp(a)));
    directories
}
