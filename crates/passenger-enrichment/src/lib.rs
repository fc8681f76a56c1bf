//! Passenger Enrichment Library
//!
//! Cleans a fixed-schema passenger dataset, derives categorical features,
//! attaches an inferred country of origin per surname and exposes grouped
//! views for a visualization layer.
//!
//! # Overview
//!
//! - **Cleaning**: class-mean age imputation, mode imputation of the port,
//!   cabin dropped
//! - **Features**: title, age/sex category, numeric port code, surname key
//! - **Nationality**: cache-first, bounded, concurrent lookups against a
//!   name-classification service, persisted as a surname table
//! - **Merge**: left join that never drops or duplicates a passenger
//! - **Views**: counts by country, class/survival, sex/survival and title,
//!   plus a country filter for the sex/survival view
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use passenger_enrichment::{Pipeline, PipelineConfig, filter_and_aggregate};
//! use passenger_enrichment::aggregate::{count_by_class_survival, count_by_title};
//! use passenger_enrichment::nationality::NamsorProvider;
//! use std::sync::Arc;
//!
//! let provider = Arc::new(NamsorProvider::from_env()?);
//!
//! let output = Pipeline::builder()
//!     .provider(provider)
//!     .config(PipelineConfig::builder().max_surnames(450).build()?)
//!     .build()?
//!     .run_file("titanic.csv")?;
//!
//! let by_class = count_by_class_survival(&output.dataset);
//! let titles = count_by_title(&output.dataset, 5);
//! let us_only = filter_and_aggregate(&output.dataset, Some("US"));
//! ```
//!
//! # Error Handling
//!
//! Fatal problems (missing columns, an imputation group with no data, a merge
//! that changes the row count) are returned as [`EnrichmentError`]. Malformed
//! names and failed lookups are recoverable: they are logged, reported in
//! [`PipelineOutput`] and never stop the run.

pub mod aggregate;
pub mod cleaner;
pub mod config;
pub mod countries;
pub mod dataset_io;
pub mod enrich;
pub mod error;
pub mod features;
pub mod filter;
pub mod nationality;
pub mod pipeline;
pub mod types;

// Re-exports for convenient access
pub use aggregate::{AggregationResult, CountryCount, PassengerRow, TitleCount};
pub use cleaner::DataCleaner;
pub use config::{ConfigValidationError, PipelineConfig, PipelineConfigBuilder};
pub use dataset_io::{load_passengers, write_enriched_csv};
pub use enrich::EnrichmentMerger;
pub use error::{
    EnrichmentError, LookupError, NameParseError, Result as EnrichmentResult, ResultExt,
};
pub use features::FeatureDeriver;
pub use filter::filter_and_aggregate;
pub use nationality::{NationalityProvider, NationalityResolver, SurnameTable};
pub use pipeline::{
    CancellationToken, ClosureProgressReporter, ItemCount, Pipeline, PipelineBuilder,
    PipelineStage, ProgressReporter, ProgressUpdate,
};
pub use types::{
    AgeSexCategory, CleanedPassenger, CleaningReport, EmbarkedCode, EnrichedDataset,
    EnrichedRecord, PassengerRecord, PipelineOutput, RawPassenger, ResolutionReport, Sex,
    SurnameCountryEntry,
};
