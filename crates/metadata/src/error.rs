//! Metadata Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A metadata error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for metadata operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("exiftool not detected on your system")]
    ToolNotFound,
    /// The external tool exited unsuccessfully without producing output.
    #[display("exiftool failed: {_0}")]
    ToolFailed(#[error(not(source))] String),
    /// Spawning or talking to the external tool failed.
    Io,
    /// Tool output was not the expected JSON shape.
    #[display("could not decode metadata output")]
    Decode,
    /// Paths handed to a service must be relative to its root.
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// The visual date service failed to produce an answer.
    #[display("visual date extraction failed: {_0}")]
    Visual(#[error(not(source))] String),
    /// A document page could not be rendered to an image.
    #[display("page rendering failed: {_0}")]
    Render(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io | Self::ToolFailed(_))
    }
}
