//! Placement planning: what to do with a file once its target is known.
//!
//! Planning only probes; nothing is moved or deleted here. Content is
//! compared byte-for-byte (sizes first) and only hashed once a name
//! collision has been detected.

pub mod error;

use self::error::{ErrorKind, Result};
use datum_storage::StorageBackend;
use datum_storage::error::ErrorKind as StorageErrorKind;
use derive_more::Display;
use exn::{OptionExt, ResultExt};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Directory (relative to the working directory) for files without a usable
/// timestamp.
pub const INVALID_DIR: &str = "invalid";
/// Directory (relative to the working directory) for same-name, different
/// content files.
pub const DUPLICATES_DIR: &str = "duplicates";
/// Hex digits of the BLAKE3 digest kept in duplicate names.
const HASH_LENGTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SkipReason {
    #[display("already in place")]
    AlreadyInPlace,
    #[display("already stored as a duplicate")]
    AlreadyDuplicate,
}

/// The single decision taken for a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Move the file to this (free) path.
    Place(PathBuf),
    Skip(SkipReason),
    /// Move the file to its duplicate slot.
    RenameAsDuplicate { target: PathBuf, hash: String },
    /// The same content already lives at `existing`; delete `source`.
    DeleteIdentical { source: PathBuf, existing: PathBuf },
    /// Move the file under [`INVALID_DIR`]. When the path equals the source,
    /// the file is already there and stays put.
    MarkInvalid(PathBuf),
}

/// Decide what happens to `source` given its synthesized `target`.
///
/// 1. `source == target`: [`Placement::Skip`].
/// 2. Nothing at `target`: [`Placement::Place`].
/// 3. Same bytes at `target`: [`Placement::DeleteIdentical`].
/// 4. Otherwise the file goes to `duplicates/{stem}_{hash}{ext}`, unless
///    that slot is taken too: same bytes there means
///    [`Placement::DeleteIdentical`], different bytes is a
///    [`Conflict`](ErrorKind::Conflict).
#[instrument(skip_all, fields(source = %source.display(), target = %target.display()))]
pub async fn plan(backend: &dyn StorageBackend, source: &Path, target: &Path) -> Result<Placement> {
    if source == target {
        return Ok(Placement::Skip(SkipReason::AlreadyInPlace));
    }
    if !backend.exists(target).await.or_raise(|| ErrorKind::Storage)? {
        return Ok(Placement::Place(target.to_path_buf()));
    }
    if identical(backend, source, target).await? {
        return Ok(Placement::DeleteIdentical { source: source.to_path_buf(), existing: target.to_path_buf() });
    }

    let data = backend.read(source).await.or_raise(|| ErrorKind::Storage)?;
    let hash = content_hash(&data);
    let duplicate = duplicate_path(target, &hash)?;
    tracing::debug!(hash = %hash, duplicate = %duplicate.display(), "Target occupied by different content");
    if duplicate == source {
        return Ok(Placement::Skip(SkipReason::AlreadyDuplicate));
    }
    if backend.exists(&duplicate).await.or_raise(|| ErrorKind::Storage)? {
        if identical(backend, source, &duplicate).await? {
            return Ok(Placement::DeleteIdentical { source: source.to_path_buf(), existing: duplicate });
        }
        exn::bail!(ErrorKind::Conflict(duplicate));
    }
    Ok(Placement::RenameAsDuplicate { target: duplicate, hash })
}

/// Where an unresolved file goes: `invalid/<basename>`. No collision checks.
pub fn plan_unresolved(source: &Path) -> Result<Placement> {
    invalid_path(source).map(Placement::MarkInvalid)
}

pub fn invalid_path(source: &Path) -> Result<PathBuf> {
    let name = source.file_name().ok_or_raise(|| ErrorKind::InvalidTarget(source.to_path_buf()))?;
    Ok(Path::new(INVALID_DIR).join(name))
}

/// First [`HASH_LENGTH`] hex digits of the BLAKE3 digest.
pub fn content_hash(data: &[u8]) -> String {
    let mut hex = blake3::hash(data).to_hex().to_string();
    hex.truncate(HASH_LENGTH);
    hex
}

/// `duplicates/{stem}_{hash}{ext}`, with stem and extension taken from the
/// synthesized target name.
pub fn duplicate_path(target: &Path, hash: &str) -> Result<PathBuf> {
    let stem = target.file_stem().ok_or_raise(|| ErrorKind::InvalidTarget(target.to_path_buf()))?;
    let mut name = stem.to_os_string();
    name.push("_");
    name.push(hash);
    if let Some(extension) = target.extension() {
        name.push(".");
        name.push(extension);
    }
    Ok(Path::new(DUPLICATES_DIR).join(name))
}

/// Byte-identical, checking sizes before reading anything.
async fn identical(backend: &dyn StorageBackend, a: &Path, b: &Path) -> Result<bool> {
    let (left, right) = match (backend.stat(a).await, backend.stat(b).await) {
        (Ok(left), Ok(right)) => (left, right),
        // Something that isn't a file (a directory, say) is never identical.
        (_, Err(e)) if matches!(e.deref(), StorageErrorKind::NotFound(_)) => return Ok(false),
        (Err(e), _) | (_, Err(e)) => return Err(e).or_raise(|| ErrorKind::Storage),
    };
    if left.size != right.size {
        return Ok(false);
    }
    let left = backend.read(a).await.or_raise(|| ErrorKind::Storage)?;
    let right = backend.read(b).await.or_raise(|| ErrorKind::Storage)?;
    Ok(left == right)
}
