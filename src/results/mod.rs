//! Results persistence module
//!
//! Provides saving, loading and CSV export of benchmark runs.

mod storage;

pub use storage::{RunMetadata, StoredRun};
