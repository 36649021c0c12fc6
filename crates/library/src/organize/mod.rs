//! Traversal orchestration.
//!
//! Collects every file below a root in one upfront walk, then pushes each
//! through resolution, naming, planning and execution on a bounded pool.
//! Per-file failures are recorded as [`Action::Failed`] and never stop the
//! run; only a bad or missing root is fatal. Once all files are handled,
//! directories left empty are pruned deepest-first.
//!
//! The primary entry point is [`organize`], which streams [`OrganizeEvent`]s;
//! [`run`] drives it to completion and returns the [`RunStatistics`].

pub mod error;
mod file;
mod lock;
mod options;
mod stats;
mod stream;

pub use self::file::{Action, Failure};
pub use self::options::Options;
pub use self::stats::{Category, Counts, RunStatistics};
pub use self::stream::{OrganizeEvent, organize, run};
