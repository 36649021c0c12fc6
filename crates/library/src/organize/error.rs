//! Error types for the [`organize`](super) module.
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.

use crate::plan::error::Error as PlanError;
use crate::resolve::error::Error as ResolveError;
use datum_storage::error::Error as StorageError;
use derive_more::{Display, Error};
use std::path::PathBuf;

/// An organize error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for organize operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of an organize failure.
///
/// ### Setup Errors
/// Fatal for the whole run.
/// - [`ErrorKind::InvalidRoot`]
/// - [`ErrorKind::RootNotFound`]
///
/// ### Per-file Errors
/// Recorded against the file; the run carries on. Each carries the message of
/// the underlying error so that log lines stay self-contained.
/// - [`ErrorKind::Resolve`]
/// - [`ErrorKind::Plan`]
/// - [`ErrorKind::Storage`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The root directory is absolute or climbs out of the working directory.
    #[display("root directory is not inside the working directory: {}", _0.display())]
    InvalidRoot(#[error(not(source))] PathBuf),
    #[display("root directory not found: {}", _0.display())]
    RootNotFound(#[error(not(source))] PathBuf),
    /// A collaborator failed while resolving the timestamp.
    #[display("{_0}")]
    Resolve(#[error(not(source))] String),
    #[display("{_0}")]
    Plan(#[error(not(source))] String),
    /// A move or delete failed.
    #[display("{_0}")]
    Storage(#[error(not(source))] String),
}

impl ErrorKind {
    /// Raise a storage error, keeping its frame as a child in the error tree.
    #[track_caller]
    pub fn storage(err: StorageError) -> Error {
        let message = (*err).to_string();
        err.raise(ErrorKind::Storage(message))
    }

    #[track_caller]
    pub fn resolve(err: ResolveError) -> Error {
        let message = (*err).to_string();
        err.raise(ErrorKind::Resolve(message))
    }

    #[track_caller]
    pub fn plan(err: PlanError) -> Error {
        let message = (*err).to_string();
        err.raise(ErrorKind::Plan(message))
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
