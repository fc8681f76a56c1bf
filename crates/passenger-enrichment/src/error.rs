//! Error types for the enrichment pipeline.
//!
//! Fatal failures are represented by [`EnrichmentError`] and abort the run.
//! Two recoverable failure kinds live next to it and never abort anything:
//!
//! - [`NameParseError`]: a passenger name does not follow
//!   `"Surname, Title. Given names"`; a sentinel is substituted.
//! - [`LookupError`]: a single surname could not be resolved by the
//!   nationality service; the surname is skipped.
//!
//! Errors serialize as `{code, message}` for machine consumers.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the enrichment pipeline.
#[derive(Error, Debug)]
pub enum EnrichmentError {
    /// A required input column is absent.
    #[error("Required column '{0}' not found in dataset")]
    MissingColumn(String),

    /// A group has no non-missing values to impute from.
    #[error("Cannot impute '{column}': group {group} has no non-missing values")]
    EmptyImputationGroup { column: String, group: String },

    /// Two rows share the same passenger identity.
    #[error("Duplicate PassengerId {0}")]
    DuplicatePassengerId(i64),

    /// A cell holds a value outside the column's domain.
    #[error("Invalid value in column '{column}' at row {row}: {value}")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },

    /// The merge changed the number of rows.
    #[error("Merge integrity violated: expected {expected} rows, got {actual}")]
    MergeIntegrity { expected: usize, actual: usize },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Pipeline was cancelled by the caller.
    #[error("Pipeline cancelled")]
    Cancelled,

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client construction error (only with the "namsor" feature).
    #[cfg(feature = "namsor")]
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<EnrichmentError>,
    },
}

impl EnrichmentError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        EnrichmentError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingColumn(_) => "MISSING_COLUMN",
            Self::EmptyImputationGroup { .. } => "EMPTY_IMPUTATION_GROUP",
            Self::DuplicatePassengerId(_) => "DUPLICATE_PASSENGER_ID",
            Self::InvalidValue { .. } => "INVALID_VALUE",
            Self::MergeIntegrity { .. } => "MERGE_INTEGRITY",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Cancelled => "CANCELLED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            #[cfg(feature = "namsor")]
            Self::HttpRequest(_) => "HTTP_REQUEST_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether this error belongs to the data-quality family (bad input data).
    pub fn is_data_quality(&self) -> bool {
        match self {
            Self::MissingColumn(_)
            | Self::EmptyImputationGroup { .. }
            | Self::DuplicatePassengerId(_)
            | Self::InvalidValue { .. } => true,
            Self::WithContext { source, .. } => source.is_data_quality(),
            _ => false,
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

impl Serialize for EnrichmentError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("EnrichmentError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, EnrichmentError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| EnrichmentError::Polars(e).with_context(context))
    }
}

/// A passenger name that does not match `"Surname, Title. Given names"`.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("Passenger {passenger_id}: cannot parse {field} from name '{name}'")]
pub struct NameParseError {
    pub passenger_id: i64,
    pub name: String,
    pub field: &'static str,
}

/// Failure to resolve a single surname. Never aborts the pipeline.
#[derive(Error, Debug)]
pub enum LookupError {
    /// Transport-level failure (connection refused, DNS, TLS...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The body could not be decoded or holds an invalid country code.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The response has no `country` field.
    #[error("response has no 'country' field")]
    MissingCountry,
}

impl LookupError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "LOOKUP_TRANSPORT",
            Self::Timeout => "LOOKUP_TIMEOUT",
            Self::Status { .. } => "LOOKUP_STATUS",
            Self::Malformed(_) => "LOOKUP_MALFORMED",
            Self::MissingCountry => "LOOKUP_MISSING_COUNTRY",
        }
    }
}

#[cfg(feature = "namsor")]
impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LookupError::Timeout
        } else if err.is_decode() {
            LookupError::Malformed(err.to_string())
        } else {
            LookupError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(EnrichmentError::Cancelled.error_code(), "CANCELLED");
        assert_eq!(
            EnrichmentError::MissingColumn("Age".to_string()).error_code(),
            "MISSING_COLUMN"
        );
        assert_eq!(
            EnrichmentError::MergeIntegrity {
                expected: 3,
                actual: 4
            }
            .error_code(),
            "MERGE_INTEGRITY"
        );
    }

    #[test]
    fn test_data_quality_family() {
        assert!(EnrichmentError::MissingColumn("Name".into()).is_data_quality());
        assert!(
            EnrichmentError::EmptyImputationGroup {
                column: "Age".into(),
                group: "Pclass=2".into()
            }
            .is_data_quality()
        );
        assert!(!EnrichmentError::Cancelled.is_data_quality());
        assert!(
            !EnrichmentError::MergeIntegrity {
                expected: 1,
                actual: 2
            }
            .is_data_quality()
        );
    }

    #[test]
    fn test_with_context_preserves_code_and_family() {
        let error = EnrichmentError::DuplicatePassengerId(7).with_context("During loading");
        assert!(error.to_string().contains("During loading"));
        assert_eq!(error.error_code(), "DUPLICATE_PASSENGER_ID");
        assert!(error.is_data_quality());
    }

    #[test]
    fn test_error_serialization() {
        let error = EnrichmentError::MissingColumn("Embarked".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("MISSING_COLUMN"));
        assert!(json.contains("Embarked"));
    }

    #[test]
    fn test_name_parse_error_message() {
        let error = NameParseError {
            passenger_id: 12,
            name: "Nobody".to_string(),
            field: "title",
        };
        assert_eq!(
            error.to_string(),
            "Passenger 12: cannot parse title from name 'Nobody'"
        );
    }

    #[test]
    fn test_lookup_error_codes() {
        assert_eq!(LookupError::Timeout.error_code(), "LOOKUP_TIMEOUT");
        assert_eq!(
            LookupError::MissingCountry.error_code(),
            "LOOKUP_MISSING_COUNTRY"
        );
    }
}
