//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Each stage of the pipeline
//! ([`resolve`](crate::resolve), [`plan`](crate::plan),
//! [`organize`](crate::organize)) has its own error module; this one covers
//! configuration-time failures and the top-level wrappers.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("issue with name or directory generation from pattern")]
    Template,
    /// A timestamp string did not match any accepted layout.
    #[display("unparseable timestamp: {_0:?}")]
    Timestamp(#[error(not(source))] String),
    /// A directory rule could not be registered.
    #[display("invalid directory rule")]
    Rules,
    #[display("organizing failed")]
    Organize,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
