//! Timestamp resolution.
//!
//! A [`Resolver`] turns a file plus the [`DirectoryRule`] in effect into a
//! [`Resolution`]: the capture timestamp and the synthesized name/directory.
//! Resolution never fails past its boundary; a file without a usable
//! timestamp yields an unsuccessful [`Resolution`] carrying the reason, and
//! the reason is reported to the caller's [`LogSink`].
//!
//! Strategy dispatch is an exhaustive `match` over [`Strategy`]:
//!
//! | Strategy           | Source                                                        |
//! |--------------------|---------------------------------------------------------------|
//! | `Metadata`         | EXIF (images) or QuickTime (videos) capture dates             |
//! | `VisualContent`    | date read off the image (PDFs rendered to an image first)     |
//! | `FileSystemTime`   | `File:FileModifyDate` from the metadata service               |

pub mod error;

use self::error::{Error, ErrorKind, Result};
use crate::rule::{DirectoryRule, Strategy};
use crate::sink::{LogSink, Severity};
use crate::template::{Naming, extension_of, synthesize};
use crate::timestamp::Timestamp;
use datum_metadata::visual::{NOT_FOUND, RendererHandle, VisualHandle};
use datum_metadata::{MetadataHandle, MetadataRecord, tags};
use datum_storage::StorageBackend;
use exn::{OptionExt, ResultExt};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use time::{Duration, UtcOffset};
use tracing::instrument;

/// Extensions sent to the visual date service as-is.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic", "heif", "webp", "gif", "bmp", "tif", "tiff"];
/// Extensions rendered to an image before being sent to the visual date service.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["pdf"];

const IMAGE_TYPES: &[&str] = &["JPEG", "JPG", "PNG"];
const VIDEO_TYPES: &[&str] = &["MP4", "MOV"];

/// Outcome of resolving one file.
///
/// Successful iff the timestamp, name and directory are all present; an
/// unsuccessful resolution carries the reason in `failure`.
#[derive(Debug)]
pub struct Resolution {
    pub timestamp: Option<Timestamp>,
    pub name: Option<String>,
    /// Relative to the working directory; empty for flat placement.
    pub directory: Option<PathBuf>,
    pub failure: Option<Error>,
}
impl Resolution {
    fn resolved(timestamp: Timestamp, naming: Naming) -> Self {
        Self {
            timestamp: Some(timestamp),
            name: Some(naming.name),
            directory: Some(naming.directory),
            failure: None,
        }
    }

    fn failed(error: Error) -> Self {
        Self {
            timestamp: None,
            name: None,
            directory: None,
            failure: Some(error),
        }
    }

    pub fn is_successful(&self) -> bool {
        self.timestamp.is_some() && self.name.is_some() && self.directory.is_some()
    }

    /// Where the file belongs, when resolution succeeded.
    pub fn target(&self) -> Option<PathBuf> {
        match (&self.name, &self.directory) {
            (Some(name), Some(directory)) if self.timestamp.is_some() => Some(directory.join(name)),
            _ => None,
        }
    }
}

/// Resolves capture timestamps using the configured collaborators.
///
/// The visual date service and page renderer are optional; without them the
/// `VisualContent` strategy fails every file with
/// [`ErrorKind::VisualExtractionFailed`].
#[derive(Clone)]
pub struct Resolver {
    metadata: MetadataHandle,
    visual: Option<VisualHandle>,
    renderer: Option<RendererHandle>,
    apply_dst: bool,
}
impl Resolver {
    pub fn new(metadata: MetadataHandle) -> Self {
        Self {
            metadata,
            visual: None,
            renderer: None,
            apply_dst: false,
        }
    }

    pub fn with_visual(mut self, visual: impl Into<Option<VisualHandle>>) -> Self {
        self.visual = visual.into();
        self
    }

    pub fn with_renderer(mut self, renderer: impl Into<Option<RendererHandle>>) -> Self {
        self.renderer = renderer.into();
        self
    }

    /// Add one hour to bare (offset-less) QuickTime creation dates.
    pub fn with_dst_adjustment(mut self, apply: bool) -> Self {
        self.apply_dst = apply;
        self
    }

    /// Resolve `path` (relative to the working directory) under `rule`.
    #[instrument(skip_all, fields(path = %path.display(), strategy = %rule.strategy()))]
    pub async fn resolve(
        &self,
        backend: &dyn StorageBackend,
        path: &Path,
        rule: &DirectoryRule,
        sink: &dyn LogSink,
    ) -> Resolution {
        let timestamp = match rule.strategy() {
            Strategy::Metadata => self.from_metadata(path).await,
            Strategy::VisualContent => self.from_visual(backend, path).await,
            Strategy::FileSystemTime => self.from_file_modify_date(path).await,
        };
        finish(path, rule, timestamp, sink)
    }

    /// Resolve from the storage backend's modification time (UTC), bypassing
    /// strategy dispatch entirely.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn resolve_from_file_timestamp(
        &self,
        backend: &dyn StorageBackend,
        path: &Path,
        rule: &DirectoryRule,
        sink: &dyn LogSink,
    ) -> Resolution {
        let timestamp = backend
            .stat(path)
            .await
            .map(|info| Timestamp::from(info.modified.to_offset(UtcOffset::UTC)))
            .or_raise(|| ErrorKind::Storage);
        finish(path, rule, timestamp, sink)
    }

    /// Exactly one record, or a verdict.
    async fn record(&self, path: &Path) -> Result<MetadataRecord> {
        let mut records = self.metadata.metadata(path).await.or_raise(|| ErrorKind::Metadata)?;
        match records.len() {
            0 => exn::bail!(ErrorKind::NoTimestampFound),
            1 => records.pop().ok_or_raise(|| ErrorKind::NoTimestampFound),
            n => exn::bail!(ErrorKind::AmbiguousMetadata(n)),
        }
    }

    async fn from_metadata(&self, path: &Path) -> Result<Timestamp> {
        let record = self.record(path).await?;
        let file_type = record.file_type().unwrap_or_default().trim().to_ascii_uppercase();
        if IMAGE_TYPES.contains(&file_type.as_str()) {
            for tag in [tags::SUBSEC_DATE_TIME_ORIGINAL, tags::DATE_TIME_ORIGINAL] {
                if let Some(value) = record.get(tag) {
                    return parse(tag, value);
                }
            }
            exn::bail!(ErrorKind::NoTimestampFound);
        }
        if VIDEO_TYPES.contains(&file_type.as_str()) {
            if let Some(value) = record.get(tags::QUICKTIME_CREATION_DATE) {
                return parse(tags::QUICKTIME_CREATION_DATE, value);
            }
            let Some(value) = record.get(tags::QUICKTIME_CREATE_DATE) else {
                exn::bail!(ErrorKind::NoTimestampFound);
            };
            let timestamp = parse(tags::QUICKTIME_CREATE_DATE, value)?;
            if !self.apply_dst {
                return Ok(timestamp);
            }
            tracing::trace!("Applying fixed one hour adjustment to bare creation date");
            return timestamp.checked_add(Duration::HOUR).ok_or_raise(|| ErrorKind::ParseError {
                field: tags::QUICKTIME_CREATE_DATE.to_string(),
                value: value.to_string(),
            });
        }
        let file_type = if file_type.is_empty() { "unknown".to_string() } else { file_type };
        exn::bail!(ErrorKind::UnsupportedFileType(file_type));
    }

    async fn from_file_modify_date(&self, path: &Path) -> Result<Timestamp> {
        let record = self.record(path).await?;
        let value = record.get(tags::FILE_MODIFY_DATE).ok_or_raise(|| ErrorKind::NoTimestampFound)?;
        parse(tags::FILE_MODIFY_DATE, value)
    }

    async fn from_visual(&self, backend: &dyn StorageBackend, path: &Path) -> Result<Timestamp> {
        let extension = extension_of(path).trim_start_matches('.').to_ascii_lowercase();
        let is_image = IMAGE_EXTENSIONS.contains(&extension.as_str());
        let is_document = DOCUMENT_EXTENSIONS.contains(&extension.as_str());
        if !is_image && !is_document {
            let extension = if extension.is_empty() { "unknown".to_string() } else { extension };
            exn::bail!(ErrorKind::UnsupportedFileType(extension));
        }
        let visual = self
            .visual
            .as_ref()
            .ok_or_raise(|| ErrorKind::VisualExtractionFailed("no visual date service configured".to_string()))?;

        let bytes = backend.read(path).await.or_raise(|| ErrorKind::Storage)?;
        let image = if is_image {
            bytes
        } else {
            let renderer = self
                .renderer
                .as_ref()
                .ok_or_raise(|| ErrorKind::VisualExtractionFailed("no page renderer configured".to_string()))?;
            let rendered = AssertUnwindSafe(renderer.render_first_page(&bytes)).catch_unwind().await;
            match rendered {
                Ok(Ok(image)) => image,
                Ok(Err(e)) => {
                    let reason = format!("page rendering failed: {}", &*e);
                    return Err(e).or_raise(|| ErrorKind::VisualExtractionFailed(reason));
                },
                Err(_) => exn::bail!(ErrorKind::VisualExtractionFailed("page renderer panicked".to_string())),
            }
        };

        // Third-party clients sit behind this call; a panic must not take
        // the whole run down.
        let answer = match AssertUnwindSafe(visual.extract(&image)).catch_unwind().await {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => {
                let reason = (*e).to_string();
                return Err(e).or_raise(|| ErrorKind::VisualExtractionFailed(reason));
            },
            Err(_) => exn::bail!(ErrorKind::VisualExtractionFailed("visual date service panicked".to_string())),
        };
        let answer = answer.trim();
        if answer == NOT_FOUND {
            exn::bail!(ErrorKind::VisualExtractionFailed(NOT_FOUND.to_string()));
        }
        Timestamp::parse_compact(answer).or_raise(|| ErrorKind::ParseError {
            field: "visual".to_string(),
            value: answer.to_string(),
        })
    }
}

fn parse(field: &str, value: &str) -> Result<Timestamp> {
    value.parse::<Timestamp>().or_raise(|| ErrorKind::ParseError {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Synthesize the name for a resolved timestamp, or report why there is none.
fn finish(path: &Path, rule: &DirectoryRule, timestamp: Result<Timestamp>, sink: &dyn LogSink) -> Resolution {
    let resolution = timestamp.and_then(|ts| {
        synthesize(&ts, rule, &extension_of(path)).or_raise(|| ErrorKind::Template).map(|naming| (ts, naming))
    });
    match resolution {
        Ok((ts, naming)) => {
            tracing::debug!(timestamp = %ts, name = %naming.name, directory = %naming.directory.display(), "Resolved");
            Resolution::resolved(ts, naming)
        },
        Err(e) => {
            sink.emit(Severity::Warn, &format!("UNRESOLVED {}: {}", path.display(), &*e));
            Resolution::failed(e)
        },
    }
}
