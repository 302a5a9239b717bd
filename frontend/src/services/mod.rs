//! Browser implementations of the pipeline's seams.

mod client;
mod storage;
mod timer;

pub use client::GlooAnalysisClient;
pub use storage::{LocalHistory, LocalToken};
pub use timer::GlooTimer;
