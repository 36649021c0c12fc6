//! Services that tell the organizer when a file was created.
//!
//! [`MetadataService`] reports structured tag metadata (EXIF, QuickTime,
//! filesystem dates) for a file; [`ExifTool`] is the production
//! implementation. The [`visual`] module holds the narrower bytes-in,
//! token-out services used when a file carries no usable metadata.

pub mod error;
mod exiftool;
#[cfg(feature = "mock")]
pub mod mock;
mod record;
pub mod visual;

pub use crate::exiftool::ExifTool;
pub use crate::record::{MetadataRecord, tags};
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Reports metadata records for a file.
///
/// `path` is relative to the root the service was created with. One record
/// per file is the norm; callers decide what to make of zero or several.
#[async_trait]
pub trait MetadataService: Send + Sync {
    async fn metadata(&self, path: &Path) -> Result<Vec<MetadataRecord>>;
}

pub type MetadataHandle = Arc<dyn MetadataService + Send + Sync>;
