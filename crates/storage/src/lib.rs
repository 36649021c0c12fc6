//! Storage backends for the organizer.
//!
//! Every path handled by this crate is relative to the backend root (the
//! organizer's working directory) and validated with [`validate_path`] before
//! it touches anything. The [`StorageBackend`] trait is both the filesystem
//! probe used while planning a placement and the mutation surface used while
//! executing it.

pub mod backend;
pub mod error;
mod file;
mod path;

pub use crate::backend::{Entry, StorageBackend, Walk};
pub use crate::file::FileInfo;
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
