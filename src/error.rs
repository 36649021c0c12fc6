use derive_more::{Display, Error};
use std::path::PathBuf;

/// A command-line error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("working directory is not usable: {}", _0.display())]
    WorkingDirectory(#[error(not(source))] PathBuf),
    /// The directory to organize is not inside the working directory.
    #[display("{} is not inside the working directory", _0.display())]
    OutsideWorkingDirectory(#[error(not(source))] PathBuf),
    #[display("exiftool is not available")]
    ExifTool,
    #[display("organizing failed")]
    Organize,
}
