//! Timestamp-driven media organization.
//!
//! Each file is pushed through four stages:
//!
//! 1. [`resolve`]: find the capture timestamp using the strategy of the
//!    [`DirectoryRule`] that governs the file's location.
//! 2. [`synthesize`]: turn the timestamp into a name and a directory.
//! 3. [`plan`]: decide between placing, skipping, deduplicating, deleting
//!    or marking the file invalid.
//! 4. [`organize`]: execute the decision, report it and count it.

pub mod error;
pub mod organize;
pub mod plan;
pub mod resolve;
mod rule;
pub mod sink;
mod template;
mod timestamp;

pub use crate::organize::{Options, RunStatistics};
pub use crate::resolve::{Resolution, Resolver};
pub use crate::rule::{DEFAULT_DIRECTORY_PATTERN, DEFAULT_FILE_PATTERN, DirectoryRule, RuleSet, Strategy};
pub use crate::template::{NamePattern, Naming, extension_of, synthesize};
pub use crate::timestamp::Timestamp;
use crate::sink::{LogSink, TracingSink};
use std::sync::Arc;

/// Everything a run needs besides the storage backend.
#[derive(Clone)]
pub struct Context {
    pub rules: RuleSet,
    pub options: Options,
    pub resolver: Resolver,
    pub sink: Arc<dyn LogSink>,
}
impl Context {
    /// Log lines go to `tracing` until [`with_sink()`](Self::with_sink) says
    /// otherwise. The resolver picks up the DST switch from `options`.
    pub fn new(rules: RuleSet, options: Options, resolver: Resolver) -> Self {
        let resolver = resolver.with_dst_adjustment(options.apply_dst_adjustment);
        Self {
            rules,
            options,
            resolver,
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }
}
