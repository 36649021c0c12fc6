//! Name and directory synthesis from strftime-style patterns.
//!
//! Patterns use the familiar `strftime` specifiers (`%Y`, `%m`, `%d`, `%H`,
//! `%M`, `%S`, `%z`, ...) plus one addition for file names:
//!
//! - **`%f`**: the fractional second truncated to milliseconds, always three
//!   digits. Only meaningful in file patterns; directory patterns reject it.
//!
//! # Example
//!
//! ```
//! use datum_library::{DirectoryRule, Strategy, Timestamp, synthesize};
//! use std::path::Path;
//!
//! let rule = DirectoryRule::new(Strategy::Metadata, "%Y/%Y-%m-%d", "%Y%m%d_%H%M%S_%f").unwrap();
//! let ts: Timestamp = "2025:07:14 16:20:48.123456".parse().unwrap();
//! let naming = synthesize(&ts, &rule, ".jpg").unwrap();
//! assert_eq!(naming.name, "20250714_162048_123.jpg");
//! assert_eq!(naming.directory, Path::new("2025/2025-07-14"));
//! ```

use crate::error::{Error, ErrorKind, Result};
use crate::rule::DirectoryRule;
use crate::timestamp::Timestamp;
use datum_storage::validate_path;
use exn::ResultExt;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use time::format_description::{OwnedFormatItem, parse_strftime_owned};
use tracing::instrument;

/// A compiled naming pattern.
///
/// Constructed via [`FromStr`], which compiles the pattern eagerly so that
/// syntax errors surface when configuration is loaded rather than for every
/// file. The pattern is stored as the strftime segments between `%f`
/// placeholders.
#[derive(Clone)]
pub struct NamePattern {
    source: String,
    segments: Vec<OwnedFormatItem>,
}
impl FromStr for NamePattern {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let segments = split_subsecond(s)
            .into_iter()
            .map(|segment| parse_strftime_owned(&segment))
            .collect::<std::result::Result<Vec<_>, _>>()
            .or_raise(|| ErrorKind::Template)?;
        Ok(Self {
            source: s.to_string(),
            segments,
        })
    }
}
impl NamePattern {
    /// Assemble a pattern from already-compiled segments (one more than the
    /// number of `%f` placeholders in `source`).
    pub(crate) fn from_parts(source: &str, segments: Vec<OwnedFormatItem>) -> Self {
        Self {
            source: source.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the pattern contains the `%f` placeholder.
    pub fn has_subsecond(&self) -> bool {
        self.segments.len() > 1
    }

    /// Expand the pattern. Timestamps without an offset are formatted as if
    /// they were UTC, so `%z` renders as `+0000`.
    pub fn render(&self, ts: &Timestamp) -> Result<String> {
        let datetime = ts.assume_utc_if_naive();
        let millis = format!("{:03}", ts.millisecond());
        let rendered = self
            .segments
            .iter()
            .map(|segment| datetime.format(segment))
            .collect::<std::result::Result<Vec<_>, _>>()
            .or_raise(|| ErrorKind::Template)?;
        Ok(rendered.join(&millis))
    }
}
impl fmt::Debug for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NamePattern").field(&self.source).finish()
    }
}
impl PartialEq for NamePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}
impl Eq for NamePattern {}

/// Split on `%f`, leaving `%%` escapes intact for the strftime parser.
fn split_subsecond(pattern: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            current.push(c);
            continue;
        }
        match chars.next() {
            Some('f') => segments.push(std::mem::take(&mut current)),
            Some(next) => current.extend(['%', next]),
            None => current.push('%'),
        }
    }
    segments.push(current);
    segments
}

/// Where a file belongs: its canonical name and the directory (relative to
/// the working directory) it goes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    pub name: String,
    /// Empty for flat placement.
    pub directory: PathBuf,
}
impl Naming {
    pub fn target(&self) -> PathBuf {
        self.directory.join(&self.name)
    }
}

/// Synthesize the canonical name and directory for a timestamp.
///
/// The file pattern gets `%f` expanded, then `extension` appended verbatim
/// (it should include its leading dot, or be empty). The directory pattern is
/// expanded on its own and normalized like any storage path.
#[instrument(skip(rule), fields(file_pattern = rule.file_pattern().as_str()))]
pub fn synthesize(ts: &Timestamp, rule: &DirectoryRule, extension: &str) -> Result<Naming> {
    let stem = rule.file_pattern().render(ts)?;
    let name = format!("{}{extension}", stem.trim());
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\0') {
        tracing::debug!(name = %name, "Rendered file name is not a single path component");
        exn::bail!(ErrorKind::Template);
    }
    let directory = normalize_directory(&rule.directory_pattern().render(ts)?)?;
    Ok(Naming { name, directory })
}

/// Trims each path segment and drops empty ones, then validates via
/// [`datum_storage::validate_path`]. Nothing left means flat placement.
fn normalize_directory(rendered: &str) -> Result<PathBuf> {
    let path = rendered.split('/').map(str::trim).filter(|s| !s.is_empty()).collect::<Vec<_>>().join("/");
    if path.is_empty() {
        return Ok(PathBuf::new());
    }
    validate_path(&path).or_raise(|| ErrorKind::Template)
}

/// The extension of `path` including its leading dot, exactly as written, or
/// an empty string.
pub fn extension_of(path: &Path) -> String {
    path.extension().map(|ext| format!(".{}", ext.to_string_lossy())).unwrap_or_default()
}
