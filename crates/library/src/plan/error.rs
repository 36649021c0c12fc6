//! Error types for the [`plan`](super) module.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A planning error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for planning.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Probing or reading a file failed.
    #[display("storage failed")]
    Storage,
    /// Both the target and its duplicate slot hold different content.
    #[display("duplicate slot occupied by different content: {}", _0.display())]
    Conflict(#[error(not(source))] PathBuf),
    /// The target has no file name to derive a duplicate name from.
    #[display("cannot derive a duplicate name for {}", _0.display())]
    InvalidTarget(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage)
    }
}
