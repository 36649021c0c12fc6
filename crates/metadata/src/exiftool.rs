//! [`MetadataService`] backed by the `exiftool` command-line tool.

use crate::error::{ErrorKind, Result};
use crate::record::MetadataRecord;
use crate::MetadataService;
use async_trait::async_trait;
use exn::ResultExt;
use serde_json::{Map, Value};
use std::path::{Component, Path, PathBuf};
use tokio::process::Command;
use tracing::instrument;

/// Runs `exiftool -json -G` once per file.
///
/// Paths passed to [`metadata()`](MetadataService::metadata) are relative to
/// `root`, the same root the storage backend uses.
#[derive(Debug, Clone)]
pub struct ExifTool {
    executable: PathBuf,
    root: PathBuf,
}
impl ExifTool {
    pub fn new(executable: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            root: root.into(),
        }
    }

    /// Locate `exiftool` on `PATH`.
    pub fn discover(root: impl Into<PathBuf>) -> Result<Self> {
        match which::which("exiftool") {
            Ok(executable) => {
                tracing::debug!(exiftool = %executable.display(), "Discovered exiftool");
                Ok(Self::new(executable, root))
            },
            Err(_) => {
                tracing::info!("exiftool executable not found in PATH");
                exn::bail!(ErrorKind::ToolNotFound);
            },
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn absolute(&self, path: &Path) -> Result<PathBuf> {
        if path.components().any(|c| !matches!(c, Component::Normal(_) | Component::CurDir)) {
            exn::bail!(ErrorKind::InvalidPath(path.to_path_buf()));
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl MetadataService for ExifTool {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn metadata(&self, path: &Path) -> Result<Vec<MetadataRecord>> {
        let absolute = self.absolute(path)?;
        let output = Command::new(&self.executable)
            .arg("-json")
            .arg("-G")
            .arg(&absolute)
            .output()
            .await
            .or_raise(|| ErrorKind::Io)?;
        // exiftool exits non-zero for partially unreadable files but still
        // reports what it could read.
        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            if output.status.success() {
                return Ok(Vec::new());
            }
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            exn::bail!(ErrorKind::ToolFailed(stderr));
        }
        let records = decode(&output.stdout)?;
        tracing::trace!(records = records.len(), "exiftool metadata decoded");
        Ok(records)
    }
}

fn decode(stdout: &[u8]) -> Result<Vec<MetadataRecord>> {
    let objects: Vec<Map<String, Value>> = serde_json::from_slice(stdout).or_raise(|| ErrorKind::Decode)?;
    Ok(objects.into_iter().map(MetadataRecord::from).collect())
}
