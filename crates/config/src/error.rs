use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration loading.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// An explicitly requested configuration file does not exist.
    #[display("configuration file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    #[display("unsupported configuration format: {}", _0.display())]
    UnsupportedFormat(#[error(not(source))] PathBuf),
    /// Merging or deserializing the layered sources failed.
    #[display("invalid configuration: {_0}")]
    Load(#[error(not(source))] String),
    /// A rule's patterns or prefix were rejected. Empty for the default rule.
    #[display("invalid rule for {:?}", _0.display().to_string())]
    Rule(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
