//! The enrichment pipeline and its builder.

use crate::cleaner::DataCleaner;
use crate::config::PipelineConfig;
use crate::dataset_io::load_passengers;
use crate::enrich::EnrichmentMerger;
use crate::error::Result;
use crate::features::{FeatureDeriver, distinct_surnames};
use crate::nationality::{NationalityProvider, NationalityResolver, SurnameTable};
use crate::pipeline::progress::{
    CancellationToken, ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
use crate::types::{PipelineOutput, RawPassenger, ResolutionReport};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// The enrichment pipeline.
///
/// Runs Cleaner, Feature Deriver, Name Extractor, Nationality Resolver and
/// Enrichment Merger in that order. Use [`Pipeline::builder()`] to create one.
///
/// # Example
///
/// ```rust,ignore
/// use passenger_enrichment::{Pipeline, PipelineConfig};
/// use passenger_enrichment::nationality::NamsorProvider;
/// use std::sync::Arc;
///
/// let provider = Arc::new(NamsorProvider::from_env()?);
///
/// let output = Pipeline::builder()
///     .provider(provider)
///     .config(PipelineConfig::builder().max_surnames(100).build()?)
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .run_file("titanic.csv")?;
///
/// // Without a provider only the persisted surname table is used.
/// let output = Pipeline::builder().build()?.run(&passengers)?;
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    provider: Option<Arc<dyn NationalityProvider>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: CancellationToken,
    cleaner: DataCleaner,
    deriver: FeatureDeriver,
    merger: EnrichmentMerger,
}

// Runs are typically moved onto a worker thread by UI shells.
static_assertions::assert_impl_all!(Pipeline: Send);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline over already loaded passengers.
    ///
    /// # Errors
    ///
    /// Returns `Err(EnrichmentError::Cancelled)` if the run was cancelled via
    /// the cancellation token. Data-quality errors, merge integrity errors and
    /// I/O errors on the surname table abort the run.
    pub fn run(&self, raw: &[RawPassenger]) -> Result<PipelineOutput> {
        self.finish(self.run_internal(raw))
    }

    /// Load the passenger file at `path` and run the pipeline over it.
    pub fn run_file(&self, path: impl AsRef<Path>) -> Result<PipelineOutput> {
        self.finish(self.run_file_internal(path.as_ref()))
    }

    fn run_file_internal(&self, path: &Path) -> Result<PipelineOutput> {
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Loading,
            0.0,
            format!("Loading {}...", path.display()),
        ));
        let raw = load_passengers(path)?;
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Loading,
            1.0,
            format!("Loaded {} passengers", raw.len()),
        ));
        self.run_internal(&raw)
    }

    fn finish(&self, result: Result<PipelineOutput>) -> Result<PipelineOutput> {
        match result {
            Ok(output) => {
                self.report_progress(ProgressUpdate::complete("Pipeline completed successfully"));
                Ok(output)
            }
            Err(e) => {
                if e.is_cancelled() {
                    self.report_progress(ProgressUpdate::cancelled());
                } else {
                    self.report_progress(ProgressUpdate::failed(e.to_string()));
                }
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn run_internal(&self, raw: &[RawPassenger]) -> Result<PipelineOutput> {
        let start_time = Instant::now();
        info!("Starting enrichment pipeline for {} passengers...", raw.len());
        self.cancellation_token.check()?;

        // Step 1: repair missing values
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Cleaning,
            0.0,
            "Repairing missing ages and ports...",
        ));
        let (cleaned, cleaning) = self.cleaner.clean(raw)?;
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Cleaning,
            1.0,
            format!("Filled {} ages, {} ports", cleaning.ages_filled(), cleaning.embarked_filled),
        ));
        self.cancellation_token.check()?;

        // Step 2: titles, categories, port codes, surname keys
        self.report_progress(ProgressUpdate::new(
            PipelineStage::FeatureDerivation,
            0.0,
            "Deriving features...",
        ));
        let (records, parse_errors) = self.deriver.derive(cleaned);
        let surnames = distinct_surnames(&records);
        self.report_progress(ProgressUpdate::new(
            PipelineStage::FeatureDerivation,
            1.0,
            format!("{} distinct surnames", surnames.len()),
        ));
        self.cancellation_token.check()?;

        // Step 3: surname -> country
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Resolution,
            0.0,
            "Resolving surname nationalities...",
        ));
        let (table, resolution) = self.resolve(&surnames)?;
        self.cancellation_token.check()?;

        // Step 4: left join
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Merging,
            0.0,
            "Merging countries onto passengers...",
        ));
        let dataset = self.merger.merge(records, &table)?;
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Merging,
            1.0,
            format!("Enriched {} passengers", dataset.len()),
        ));

        info!(
            "Pipeline finished in {} ms ({} passengers, {} name parse errors)",
            start_time.elapsed().as_millis(),
            dataset.len(),
            parse_errors.len()
        );

        Ok(PipelineOutput {
            dataset,
            cleaning,
            resolution,
            parse_errors,
        })
    }

    /// Load the surname table, fill it through the provider if one is set,
    /// and persist it.
    ///
    /// Without a provider the table is only read. Nothing is written when
    /// resolution is cancelled.
    fn resolve(&self, surnames: &[String]) -> Result<(SurnameTable, ResolutionReport)> {
        let path = &self.config.surname_table_path;
        let mut table = if self.config.refresh_surname_table {
            info!("Refresh requested, ignoring {}", path.display());
            SurnameTable::new()
        } else {
            SurnameTable::load(path)?
        };

        let Some(provider) = &self.provider else {
            let cached = surnames.iter().filter(|s| table.contains(s)).count();
            info!(
                "No nationality provider configured, using {} cached of {} surnames",
                cached,
                surnames.len()
            );
            let report = ResolutionReport {
                distinct_surnames: surnames.len(),
                cached,
                ..Default::default()
            };
            return Ok((table, report));
        };

        let mut resolver = NationalityResolver::new(
            Arc::clone(provider),
            self.config.max_surnames,
            self.config.concurrency,
        )
        .with_cancellation_token(self.cancellation_token.clone());
        if let Some(reporter) = &self.progress_reporter {
            resolver = resolver.with_progress_reporter(Arc::clone(reporter));
        }

        let report = resolver.resolve(surnames, &mut table)?;
        table.save(path)?;
        Ok((table, report))
    }
}

/// Builder for constructing a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    provider: Option<Arc<dyn NationalityProvider>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: Option<CancellationToken>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the nationality provider.
    ///
    /// Use `Arc` so one provider (and its HTTP client) can serve several
    /// pipeline runs. Without a provider the run only reads the persisted
    /// surname table.
    pub fn provider(mut self, provider: Arc<dyn NationalityProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set a progress reporter for receiving updates during the run.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// The closure may be called from resolution worker threads.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Set a cancellation token for stopping the pipeline.
    ///
    /// Clone the token and call [`CancellationToken::cancel()`] from any
    /// thread. The run stops with
    /// [`EnrichmentError::Cancelled`](crate::error::EnrichmentError::Cancelled)
    /// at the next stage boundary or lookup.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Pipeline, crate::config::ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(Pipeline {
            deriver: FeatureDeriver::new(config.child_age_threshold),
            config,
            provider: self.provider,
            progress_reporter: self.progress_reporter,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
            cleaner: DataCleaner,
            merger: EnrichmentMerger::new(),
        })
    }
}
