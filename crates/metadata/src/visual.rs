//! Visual date extraction: reading a capture date off the pixels.
//!
//! Both collaborators are bytes-in/bytes-out so that the organizer never
//! needs to know which model or renderer sits behind them.

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Answer returned by a [`VisualDateService`] when the image carries no
/// legible date.
pub const NOT_FOUND: &str = "No date found";

/// Guesses a capture timestamp from image bytes.
///
/// Implementations return either a compact `YYYYMMDD_HHMMSS` token or
/// [`NOT_FOUND`].
#[async_trait]
pub trait VisualDateService: Send + Sync {
    async fn extract(&self, image: &[u8]) -> Result<String>;
}

/// Rasterizes the first page of a document (PDF) into image bytes suitable
/// for a [`VisualDateService`].
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render_first_page(&self, document: &[u8]) -> Result<Vec<u8>>;
}

pub type VisualHandle = Arc<dyn VisualDateService + Send + Sync>;
pub type RendererHandle = Arc<dyn PageRenderer + Send + Sync>;
