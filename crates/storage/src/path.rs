//! Path validation.
//!
//! Storage paths are relative to the working directory. Anything that would
//! climb out of it is rejected before a backend touches the filesystem.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates and normalizes a storage path.
///
/// `.` components and repeated or trailing separators disappear, `..` is
/// resolved lexically and must never leave the root. A leading `/` is
/// treated as the storage root, not the filesystem root.
///
/// > **Note:** This does **not** normalize backslashes or non-UTF8 bytes.
/// >           Null bytes are explicitly rejected.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use datum_storage::validate_path;
/// assert!(validate_path("2023/2023-05-01/20230501_125123.jpg").is_ok());
/// assert!(validate_path("camera/../invalid/IMG_0001.jpg").is_ok());
/// assert!(validate_path("../outside.jpg").is_err());
/// assert!(validate_path("a/../../b").is_err());
/// assert!(validate_path("a\0b").is_err());
/// assert_eq!(
///     validate_path("camera/./../duplicates//x_0123.jpg/").unwrap(),
///     Path::new("duplicates/x_0123.jpg")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let mut components = Vec::new();
    for component in path.as_ref().components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but
                // truncate C-based syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
        false => Ok(components.into_iter().collect()),
    }
}

/// Returns `true` when the path names something below the root, i.e. it
/// isn't empty, `.` or `/`.
pub(crate) fn is_below_root(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::Normal(_)))
}
