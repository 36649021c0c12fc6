use crate::Context;
use crate::organize::error::{Error, ErrorKind as OrganizeErrorKind, Result as OrganizeResult};
use crate::organize::lock::PathLocks;
use crate::organize::stats::Category;
use crate::plan::{Placement, SkipReason, invalid_path, plan};
use crate::resolve::Resolution;
use crate::sink::Severity;
use datum_storage::StorageBackend;
use datum_storage::error::ErrorKind as StorageErrorKind;
use exn::Exn;
use std::fmt;
use std::path::{Path, PathBuf};

/// The executed outcome for a single file.
///
/// All paths are relative to the working directory. The [`Display`](fmt::Display)
/// form is the line reported to the [`LogSink`](crate::sink::LogSink).
#[derive(Debug)]
pub enum Action {
    /// Moved to its synthesized location.
    Renamed { from: PathBuf, to: PathBuf },
    /// Target held different content; moved into `duplicates`.
    Duplicate { from: PathBuf, to: PathBuf, hash: String },
    /// The same content already lives at `target` (the primary target or a
    /// duplicate slot); the source was deleted.
    Deleted { path: PathBuf, target: PathBuf },
    /// No usable timestamp. `from == to` when the file already sat in
    /// `invalid`.
    Invalid { from: PathBuf, to: PathBuf, reason: String },
    Skipped { path: PathBuf, reason: SkipReason },
    /// Something went wrong; the file was left where it was.
    Failed(Failure),
}
impl Action {
    pub fn category(&self) -> Category {
        match self {
            Self::Renamed { .. } => Category::Renamed,
            Self::Duplicate { .. } => Category::Duplicate,
            Self::Deleted { .. } => Category::Deleted,
            Self::Invalid { .. } => Category::Invalid,
            Self::Skipped { .. } => Category::Skipped,
            Self::Failed(_) => Category::Errored,
        }
    }

    /// The file this outcome is about, as it was found.
    pub fn source(&self) -> &Path {
        match self {
            Self::Renamed { from, .. } | Self::Duplicate { from, .. } | Self::Invalid { from, .. } => from,
            Self::Deleted { path, .. } | Self::Skipped { path, .. } => path,
            Self::Failed(failure) => &failure.path,
        }
    }

    pub(crate) fn severity(&self) -> Severity {
        match self {
            Self::Failed(_) => Severity::Warn,
            _ => Severity::Info,
        }
    }
}
impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Renamed { from, to } => write!(f, "RENAME {} -> {}", from.display(), to.display()),
            Self::Duplicate { from, to, hash } => {
                write!(f, "DUPLICATE {} -> {} ({hash})", from.display(), to.display())
            },
            Self::Deleted { path, target } => {
                write!(f, "DELETE {} (identical to {})", path.display(), target.display())
            },
            Self::Invalid { from, to, reason } if from == to => write!(f, "INVALID {}: {reason}", from.display()),
            Self::Invalid { from, to, reason } => {
                write!(f, "INVALID {} -> {}: {reason}", from.display(), to.display())
            },
            Self::Skipped { path, reason } => write!(f, "SKIP {}: {reason}", path.display()),
            Self::Failed(failure) => failure.fmt(f),
        }
    }
}

/// A file that could not be organized.
#[derive(Debug)]
pub struct Failure {
    pub path: PathBuf,
    /// Where the file was headed, when that was known.
    pub target: Option<PathBuf>,
    pub error: Error,
}
impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(target) => write!(f, "ERROR {} -> {}: {}", self.path.display(), target.display(), *self.error),
            None => write!(f, "ERROR {}: {}", self.path.display(), *self.error),
        }
    }
}

/// Resolve, plan and execute one file. Never fails: errors become
/// [`Action::Failed`].
pub(crate) async fn organize_file(
    backend: &dyn StorageBackend,
    ctx: &Context,
    locks: &PathLocks,
    path: PathBuf,
) -> Action {
    let mut target = None;
    match organize_file_inner(backend, ctx, locks, &path, &mut target).await {
        Ok(action) => action,
        Err(error) => Action::Failed(Failure { path, target, error }),
    }
}

async fn organize_file_inner(
    backend: &dyn StorageBackend,
    ctx: &Context,
    locks: &PathLocks,
    path: &Path,
    target: &mut Option<PathBuf>,
) -> OrganizeResult<Action> {
    let rule = ctx.rules.select(path);
    let sink = ctx.sink.as_ref();
    let mut resolution = ctx.resolver.resolve(backend, path, rule, sink).await;
    if let Some(error) = resolution.failure.take_if(|e| !e.is_verdict()) {
        return Err(OrganizeErrorKind::resolve(error));
    }
    if !resolution.is_successful() && ctx.options.treat_unresolved_as_file_time {
        tracing::debug!(path = %path.display(), "Falling back to the file modification time");
        resolution = ctx.resolver.resolve_from_file_timestamp(backend, path, rule, sink).await;
        if let Some(error) = resolution.failure.take() {
            return Err(OrganizeErrorKind::resolve(error));
        }
    }

    let Some(primary) = primary_target(path, &resolution, ctx.options.create_subdirectories) else {
        let reason = resolution.failure.as_ref().map(|e| e.to_string()).unwrap_or_default();
        let to = invalid_path(path).map_err(OrganizeErrorKind::plan)?;
        *target = Some(to.clone());
        let _guards = locks.lock_all(&[path, &to]).await;
        return mark_invalid(backend, path, to, reason).await;
    };
    *target = Some(primary.clone());

    let _guards = locks.lock_all(&[path, &primary]).await;
    let placement = plan(backend, path, &primary).await.map_err(OrganizeErrorKind::plan)?;
    execute(backend, path, placement).await
}

/// Where a resolved file belongs: its synthesized directory, or its current
/// directory when subdirectories are off.
fn primary_target(path: &Path, resolution: &Resolution, create_subdirectories: bool) -> Option<PathBuf> {
    let name = resolution.name.as_ref()?;
    let directory = resolution.directory.as_ref()?;
    resolution.timestamp.as_ref()?;
    Some(match create_subdirectories {
        true => directory.join(name),
        false => path.parent().unwrap_or(Path::new("")).join(name),
    })
}

async fn execute(
    backend: &dyn StorageBackend,
    source: &Path,
    placement: Placement,
) -> OrganizeResult<Action> {
    let from = source.to_path_buf();
    Ok(match placement {
        Placement::Place(to) => {
            backend.rename(source, &to).await.map_err(OrganizeErrorKind::storage)?;
            Action::Renamed { from, to }
        },
        Placement::Skip(reason) => Action::Skipped { path: from, reason },
        Placement::RenameAsDuplicate { target, hash } => {
            backend.rename(source, &target).await.map_err(OrganizeErrorKind::storage)?;
            Action::Duplicate { from, to: target, hash }
        },
        Placement::DeleteIdentical { source, existing } => {
            backend.delete(&source).await.map_err(OrganizeErrorKind::storage)?;
            Action::Deleted { path: source, target: existing }
        },
        Placement::MarkInvalid(to) => mark_invalid(backend, source, to, "unresolved".to_string()).await?,
    })
}

/// A file already at its invalid path stays put. An occupied invalid path is
/// never overwritten: the move fails and the file stays where it is.
async fn mark_invalid(
    backend: &dyn StorageBackend,
    source: &Path,
    to: PathBuf,
    reason: String,
) -> OrganizeResult<Action> {
    if to != source {
        if backend.exists(&to).await.map_err(OrganizeErrorKind::storage)? {
            return Err(OrganizeErrorKind::storage(Exn::from(StorageErrorKind::AlreadyExists(to))));
        }
        backend.rename(source, &to).await.map_err(OrganizeErrorKind::storage)?;
    }
    Ok(Action::Invalid { from: source.to_path_buf(), to, reason })
}
