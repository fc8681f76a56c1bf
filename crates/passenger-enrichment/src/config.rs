//! Configuration types for the enrichment pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default number of new surname lookups allowed per run.
pub const DEFAULT_MAX_SURNAMES: usize = 450;

/// Default size of the lookup worker pool.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default location of the persisted surname table.
pub const DEFAULT_SURNAME_TABLE: &str = "names_output.csv";

/// Default number of titles reported by the title view.
pub const DEFAULT_TOP_TITLES: usize = 5;

/// Passengers younger than this are children.
pub const DEFAULT_CHILD_AGE_THRESHOLD: f64 = 18.0;

/// Configuration for the enrichment pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use passenger_enrichment::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .max_surnames(100)
///     .concurrency(8)
///     .surname_table_path("cache/names.csv")
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound on new surname lookups issued in one run.
    /// Surnames beyond the bound are left unresolved.
    /// Default: 450
    pub max_surnames: usize,

    /// Number of lookups allowed in flight at once.
    /// Default: 4
    pub concurrency: usize,

    /// CSV file holding the surname -> country table.
    /// Default: "names_output.csv"
    pub surname_table_path: PathBuf,

    /// Ignore the persisted table and resolve every surname again.
    /// Default: false
    pub refresh_surname_table: bool,

    /// Number of titles reported by the title view.
    /// Default: 5
    pub top_titles: usize,

    /// Age below which a passenger counts as a child.
    /// Default: 18.0
    pub child_age_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_surnames: DEFAULT_MAX_SURNAMES,
            concurrency: DEFAULT_CONCURRENCY,
            surname_table_path: PathBuf::from(DEFAULT_SURNAME_TABLE),
            refresh_surname_table: false,
            top_titles: DEFAULT_TOP_TITLES,
            child_age_threshold: DEFAULT_CHILD_AGE_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.concurrency == 0 {
            return Err(ConfigValidationError::InvalidConcurrency(self.concurrency));
        }

        if !(self.child_age_threshold.is_finite() && self.child_age_threshold > 0.0) {
            return Err(ConfigValidationError::InvalidAgeThreshold(
                self.child_age_threshold,
            ));
        }

        if self.surname_table_path.as_os_str().is_empty() {
            return Err(ConfigValidationError::EmptyTablePath);
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid concurrency: {0} (must be at least 1)")]
    InvalidConcurrency(usize),

    #[error("Invalid child age threshold: {0} (must be a positive number)")]
    InvalidAgeThreshold(f64),

    #[error("Surname table path must not be empty")]
    EmptyTablePath,
}

impl From<ConfigValidationError> for crate::error::EnrichmentError {
    fn from(err: ConfigValidationError) -> Self {
        crate::error::EnrichmentError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    max_surnames: Option<usize>,
    concurrency: Option<usize>,
    surname_table_path: Option<PathBuf>,
    refresh_surname_table: Option<bool>,
    top_titles: Option<usize>,
    child_age_threshold: Option<f64>,
}

impl PipelineConfigBuilder {
    /// Set the bound on new surname lookups per run.
    pub fn max_surnames(mut self, max: usize) -> Self {
        self.max_surnames = Some(max);
        self
    }

    /// Set the number of concurrent lookups.
    pub fn concurrency(mut self, workers: usize) -> Self {
        self.concurrency = Some(workers);
        self
    }

    /// Set where the surname table is read from and written to.
    pub fn surname_table_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.surname_table_path = Some(path.into());
        self
    }

    /// Discard the persisted table and resolve all surnames again.
    pub fn refresh_surname_table(mut self, refresh: bool) -> Self {
        self.refresh_surname_table = Some(refresh);
        self
    }

    /// Set the number of titles in the title view.
    pub fn top_titles(mut self, n: usize) -> Self {
        self.top_titles = Some(n);
        self
    }

    /// Set the age below which a passenger counts as a child.
    pub fn child_age_threshold(mut self, age: f64) -> Self {
        self.child_age_threshold = Some(age);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let config = PipelineConfig {
            max_surnames: self.max_surnames.unwrap_or(DEFAULT_MAX_SURNAMES),
            concurrency: self.concurrency.unwrap_or(DEFAULT_CONCURRENCY),
            surname_table_path: self
                .surname_table_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SURNAME_TABLE)),
            refresh_surname_table: self.refresh_surname_table.unwrap_or(false),
            top_titles: self.top_titles.unwrap_or(DEFAULT_TOP_TITLES),
            child_age_threshold: self
                .child_age_threshold
                .unwrap_or(DEFAULT_CHILD_AGE_THRESHOLD),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_surnames, 450);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.top_titles, 5);
        assert_eq!(config.child_age_threshold, 18.0);
        assert!(!config.refresh_surname_table);
        assert_eq!(
            config.surname_table_path,
            PathBuf::from("names_output.csv")
        );
    }

    #[test]
    fn test_builder_custom_values() {
        let config = PipelineConfig::builder()
            .max_surnames(10)
            .concurrency(2)
            .surname_table_path("cache/names.csv")
            .refresh_surname_table(true)
            .top_titles(3)
            .child_age_threshold(16.0)
            .build()
            .unwrap();

        assert_eq!(config.max_surnames, 10);
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.surname_table_path, PathBuf::from("cache/names.csv"));
        assert!(config.refresh_surname_table);
        assert_eq!(config.top_titles, 3);
        assert_eq!(config.child_age_threshold, 16.0);
    }

    #[test]
    fn test_zero_max_surnames_is_allowed() {
        let config = PipelineConfig::builder().max_surnames(0).build().unwrap();
        assert_eq!(config.max_surnames, 0);
    }

    #[test]
    fn test_validation_invalid_concurrency() {
        let result = PipelineConfig::builder().concurrency(0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidConcurrency(0)
        ));
    }

    #[test]
    fn test_validation_invalid_age_threshold() {
        let result = PipelineConfig::builder().child_age_threshold(-1.0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidAgeThreshold(_)
        ));

        let result = PipelineConfig::builder()
            .child_age_threshold(f64::NAN)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_empty_path() {
        let result = PipelineConfig::builder().surname_table_path("").build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::EmptyTablePath
        ));
    }

    #[test]
    fn test_pipeline_config_from_json() {
        let json = r#"{
            "max_surnames": 25,
            "concurrency": 3,
            "surname_table_path": "custom.csv",
            "refresh_surname_table": true,
            "top_titles": 7,
            "child_age_threshold": 21.0
        }"#;

        let config: PipelineConfig =
            serde_json::from_str(json).expect("config JSON should deserialize");

        assert_eq!(config.max_surnames, 25);
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.surname_table_path.to_str().unwrap(), "custom.csv");
        assert!(config.refresh_surname_table);
        assert_eq!(config.top_titles, 7);
        assert_eq!(config.child_age_threshold, 21.0);
        assert!(config.validate().is_ok());
    }
}
