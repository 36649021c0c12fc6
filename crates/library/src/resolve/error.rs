//! Error types for the [`resolve`](super) module.
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.

use derive_more::{Display, Error};

/// A resolution error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for resolution.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a file could not be given a timestamp.
///
/// ### Verdicts on the file
/// The file itself has no usable timestamp; trying again will not help.
/// - [`ErrorKind::AmbiguousMetadata`]
/// - [`ErrorKind::NoTimestampFound`]
/// - [`ErrorKind::UnsupportedFileType`]
/// - [`ErrorKind::VisualExtractionFailed`]
/// - [`ErrorKind::ParseError`]
///
/// ### Dependency Errors
/// - [`ErrorKind::Metadata`]
/// - [`ErrorKind::Storage`]
/// - [`ErrorKind::Template`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The metadata service reported more than one record.
    #[display("ambiguous metadata: {_0} records")]
    AmbiguousMetadata(#[error(not(source))] usize),
    #[display("no timestamp found")]
    NoTimestampFound,
    #[display("unsupported file type: {_0}")]
    UnsupportedFileType(#[error(not(source))] String),
    #[display("visual extraction failed: {_0}")]
    VisualExtractionFailed(#[error(not(source))] String),
    #[display("cannot parse {field} value {value:?}")]
    ParseError { field: String, value: String },
    /// The metadata service itself failed.
    #[display("metadata service failed")]
    Metadata,
    /// Reading the file (or its modification time) failed.
    #[display("storage failed")]
    Storage,
    /// The timestamp was fine, but the rule's patterns could not render it.
    #[display("pattern rendering failed")]
    Template,
}

impl ErrorKind {
    /// Returns `true` when the file is to blame, as opposed to a failing
    /// collaborator or rule.
    pub fn is_verdict(&self) -> bool {
        !matches!(self, Self::Metadata | Self::Storage | Self::Template)
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Metadata | Self::Storage)
    }
}
