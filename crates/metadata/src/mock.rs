//! In-memory services for testing.

use crate::MetadataService;
use crate::error::{ErrorKind, Result};
use crate::record::MetadataRecord;
use crate::visual::{PageRenderer, VisualDateService};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metadata service answering from a fixed table.
///
/// Unknown paths report no records at all; paths registered with
/// [`failing()`](Self::failing) raise [`ErrorKind::ToolFailed`].
#[derive(Debug, Default)]
pub struct MockMetadata {
    records: HashMap<PathBuf, Vec<MetadataRecord>>,
    failing: HashSet<PathBuf>,
    calls: AtomicUsize,
}
impl MockMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record for `path`. Calling this twice for the same path makes
    /// the metadata ambiguous.
    pub fn with(mut self, path: impl Into<PathBuf>, record: MetadataRecord) -> Self {
        self.records.entry(path.into()).or_default().push(record);
        self
    }

    pub fn failing(mut self, path: impl Into<PathBuf>) -> Self {
        self.failing.insert(path.into());
        self
    }

    /// Number of lookups served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MetadataService for MockMetadata {
    async fn metadata(&self, path: &Path) -> Result<Vec<MetadataRecord>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.failing.contains(path) {
            exn::bail!(ErrorKind::ToolFailed(format!("mock failure for {}", path.display())));
        }
        Ok(self.records.get(path).cloned().unwrap_or_default())
    }
}

/// How a [`MockVisual`] answers.
#[derive(Debug, Clone)]
pub enum VisualAnswer {
    Token(String),
    Fail,
    /// Panics inside the future, like a misbehaving client library would.
    Panic,
}

/// Visual date service with a canned answer.
#[derive(Debug)]
pub struct MockVisual {
    answer: VisualAnswer,
    seen: std::sync::Mutex<Vec<Vec<u8>>>,
}
impl MockVisual {
    pub fn new(answer: VisualAnswer) -> Self {
        Self {
            answer,
            seen: std::sync::Mutex::default(),
        }
    }

    pub fn returning(token: impl Into<String>) -> Self {
        Self::new(VisualAnswer::Token(token.into()))
    }

    /// Every image handed to the service, in call order.
    pub fn seen(&self) -> Vec<Vec<u8>> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl VisualDateService for MockVisual {
    async fn extract(&self, image: &[u8]) -> Result<String> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(image.to_vec());
        }
        match &self.answer {
            VisualAnswer::Token(token) => Ok(token.clone()),
            VisualAnswer::Fail => exn::bail!(ErrorKind::Visual("mock failure".to_string())),
            VisualAnswer::Panic => panic!("MockVisual: deliberate panic"),
        }
    }
}

/// Page renderer that prefixes the document bytes with `rendered:`, or
/// always fails.
#[derive(Debug, Default)]
pub struct MockRenderer {
    fail: bool,
}
impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl PageRenderer for MockRenderer {
    async fn render_first_page(&self, document: &[u8]) -> Result<Vec<u8>> {
        if self.fail {
            exn::bail!(ErrorKind::Render("mock failure".to_string()));
        }
        Ok([b"rendered:".as_slice(), document].concat())
    }
}
