//! Progress reporting and cancellation support for the enrichment pipeline.
//!
//! Surname resolution is the long-running stage (one HTTP round trip per
//! surname), so it reports per-item progress and checks the cancellation
//! token between lookups.
//!
//! # Example
//!
//! ```rust,ignore
//! use passenger_enrichment::{Pipeline, CancellationToken};
//!
//! let token = CancellationToken::new();
//!
//! let output = Pipeline::builder()
//!     .cancellation_token(token.clone())
//!     .on_progress(|update| {
//!         println!("[{:?}] {}", update.stage, update.message);
//!     })
//!     .build()?
//!     .run(&passengers)?;
//! ```

use crate::error::{EnrichmentError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Stages of the enrichment pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Reading and validating the input file
    Loading,
    /// Repairing missing ages and ports
    Cleaning,
    /// Titles, age/sex categories, port codes and surname keys
    FeatureDerivation,
    /// Querying the nationality service
    Resolution,
    /// Joining countries onto passengers
    Merging,
    /// Pipeline completed successfully
    Complete,
    /// Pipeline was cancelled by user
    Cancelled,
    /// Pipeline failed with an error
    Failed,
}

impl PipelineStage {
    /// Stages that do work, in execution order.
    pub const WORK_STAGES: [PipelineStage; 5] = [
        Self::Loading,
        Self::Cleaning,
        Self::FeatureDerivation,
        Self::Resolution,
        Self::Merging,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Loading => "Loading Dataset",
            Self::Cleaning => "Cleaning Data",
            Self::FeatureDerivation => "Deriving Features",
            Self::Resolution => "Resolving Nationalities",
            Self::Merging => "Merging Countries",
            Self::Complete => "Complete",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }

    /// Share of the overall run spent in this stage (0.0 - 1.0).
    ///
    /// Resolution dominates: it is one network round trip per surname.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Loading => 0.05,
            Self::Resolution => 0.65,
            Self::Cleaning | Self::FeatureDerivation | Self::Merging => 0.10,
            Self::Complete | Self::Cancelled | Self::Failed => 0.0,
        }
    }

    /// Overall progress at the moment this stage starts.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Complete => 1.0,
            Self::Cancelled | Self::Failed => 0.0,
            stage => Self::WORK_STAGES
                .iter()
                .take_while(|s| *s != stage)
                .map(|s| s.weight())
                .sum(),
        }
    }
}

/// Items settled so far in a stage that works through a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCount {
    pub done: usize,
    pub total: usize,
}

impl ItemCount {
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.done as f32 / self.total as f32
        }
    }
}

/// Progress update emitted by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: PipelineStage,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within `stage` (0.0 - 1.0)
    pub stage_progress: f32,

    pub message: String,

    /// Present for per-item stages (surname resolution)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<ItemCount>,
}

impl ProgressUpdate {
    pub fn new(stage: PipelineStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let stage_progress = stage_progress.clamp(0.0, 1.0);
        Self {
            stage,
            progress: (stage.base_progress() + stage.weight() * stage_progress).min(1.0),
            stage_progress,
            message: message.into(),
            items: None,
        }
    }

    /// Update for a per-item stage; stage progress is `done / total`.
    pub fn with_items(
        stage: PipelineStage,
        done: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let items = ItemCount { done, total };
        Self {
            items: Some(items),
            ..Self::new(stage, items.fraction(), message)
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(PipelineStage::Complete, 1.0, message)
    }

    pub fn cancelled() -> Self {
        Self::new(PipelineStage::Cancelled, 0.0, "Run cancelled")
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(PipelineStage::Failed, 0.0, message)
    }
}

/// Receives progress updates. Resolution workers report from their own
/// threads, hence `Send + Sync`.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// [`ProgressReporter`] backed by a closure.
pub struct ClosureProgressReporter<F>(F);

impl<F: Fn(ProgressUpdate) + Send + Sync> ClosureProgressReporter<F> {
    pub fn new(callback: F) -> Self {
        Self(callback)
    }
}

impl<F: Fn(ProgressUpdate) + Send + Sync> ProgressReporter for ClosureProgressReporter<F> {
    fn report(&self, update: ProgressUpdate) {
        (self.0)(update)
    }
}

/// Token for cancelling a running pipeline.
///
/// Clones share state. The pipeline checks the token between stages and
/// resolution workers check it before each lookup; a cancelled run returns
/// [`EnrichmentError::Cancelled`] and leaves the persisted surname table
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from any thread.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation has been requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(EnrichmentError::Cancelled);
        }
        Ok(())
    }

    /// Clear the flag so the token can be reused for another run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_cancellation_token_clone_shares_state() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();
        assert!(!token2.is_cancelled());

        token1.cancel();
        assert!(token2.is_cancelled());

        token2.reset();
        assert!(!token1.is_cancelled());
    }

    #[test]
    fn test_check_reports_cancellation() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());

        token.clone().cancel();
        assert!(token.check().unwrap_err().is_cancelled());
    }

    #[test]
    fn test_progress_update_with_items() {
        let update = ProgressUpdate::with_items(
            PipelineStage::Resolution,
            10,
            40,
            "Resolved 10 of 40 surnames",
        );
        assert_eq!(update.stage, PipelineStage::Resolution);
        assert_eq!(update.stage_progress, 0.25);
        assert_eq!(update.items, Some(ItemCount { done: 10, total: 40 }));
        assert!((update.progress - (0.25 + 0.65 * 0.25)).abs() < 1e-6);
    }

    #[test]
    fn test_progress_update_zero_items() {
        let update = ProgressUpdate::with_items(PipelineStage::Resolution, 0, 0, "Nothing to do");
        assert_eq!(update.stage_progress, 0.0);
        assert_eq!(update.progress, PipelineStage::Resolution.base_progress());
    }

    #[test]
    fn test_progress_update_complete() {
        let update = ProgressUpdate::complete("Done!");
        assert_eq!(update.stage, PipelineStage::Complete);
        assert_eq!(update.progress, 1.0);
    }

    #[test]
    fn test_stage_weights_sum() {
        let stages = PipelineStage::WORK_STAGES;

        let total_weight: f32 = stages.iter().map(|s| s.weight()).sum();
        assert!((total_weight - 1.0).abs() < 0.01, "Weights should sum to ~1.0");
        assert_eq!(PipelineStage::Loading.base_progress(), 0.0);
        assert!((PipelineStage::Merging.base_progress() - 0.90).abs() < 1e-6);

        for pair in stages.windows(2) {
            let expected = pair[0].base_progress() + pair[0].weight();
            assert!((pair[1].base_progress() - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_stage_json_values() {
        let json = serde_json::to_string(&PipelineStage::FeatureDerivation).unwrap();
        assert_eq!(json, "\"feature_derivation\"");
    }

    #[test]
    fn test_closure_progress_reporter_across_threads() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let reporter = Arc::new(ClosureProgressReporter::new(move |_update| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let reporter_clone = reporter.clone();
        std::thread::spawn(move || {
            reporter_clone.report(ProgressUpdate::new(PipelineStage::Resolution, 0.5, "bg"));
        })
        .join()
        .expect("Thread should not panic");
        reporter.report(ProgressUpdate::complete("Done"));

        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }
}
