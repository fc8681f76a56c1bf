//! Pipeline module.
//!
//! This module provides the enrichment pipeline and its progress plumbing.

mod builder;
pub mod progress;

pub use builder::{Pipeline, PipelineBuilder};
pub use progress::{
    CancellationToken, ClosureProgressReporter, ItemCount, PipelineStage, ProgressReporter,
    ProgressUpdate,
};
