//! Source-of-truth stores consumed by the statistics engine.
//!
//! The engine only reads through the [`ExaminationStore`] and [`TargetStore`] traits. The
//! in-memory implementations here back the CLI and runner, which load a dataset from disk,
//! and the tests.

mod examinations;
mod targets;

pub use examinations::{ExaminationStore, MemoryExaminationStore};
pub use targets::{MemoryTargetStore, TargetStore};
