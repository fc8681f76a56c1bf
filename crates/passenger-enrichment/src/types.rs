use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::error::NameParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }

    /// Parse the raw dataset spelling (`male` / `female`, case-insensitive).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            _ => None,
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combined age/sex category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgeSexCategory {
    Boy,
    Girl,
    Man,
    Woman,
}

impl AgeSexCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boy => "Boy",
            Self::Girl => "Girl",
            Self::Man => "Man",
            Self::Woman => "Woman",
        }
    }
}

impl fmt::Display for AgeSexCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric encoding of the embarkation port.
///
/// Serialized as its numeric value (0 = unknown, 1 = S, 2 = C, 3 = Q).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum EmbarkedCode {
    #[default]
    Unknown = 0,
    Southampton = 1,
    Cherbourg = 2,
    Queenstown = 3,
}

impl EmbarkedCode {
    pub fn value(self) -> u8 {
        self as u8
    }
}

impl Serialize for EmbarkedCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.value())
    }
}

/// A passenger row exactly as loaded, before any repair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawPassenger {
    pub passenger_id: i64,
    pub survived: bool,
    pub pclass: u8,
    pub name: String,
    pub sex: Sex,
    pub age: Option<f64>,
    pub embarked: Option<String>,
    pub cabin: Option<String>,
}

/// A passenger after missing values have been repaired.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanedPassenger {
    pub passenger_id: i64,
    pub survived: bool,
    pub pclass: u8,
    pub name: String,
    pub sex: Sex,
    pub age: f64,
    pub embarked: String,
}

/// A cleaned passenger carrying all derived features.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassengerRecord {
    pub passenger_id: i64,
    pub survived: bool,
    pub pclass: u8,
    pub name: String,
    pub sex: Sex,
    pub age: f64,
    pub embarked: String,
    pub title: String,
    pub age_sex: AgeSexCategory,
    pub embarked_code: EmbarkedCode,
    pub surname_key: String,
}

/// One row of the persisted surname table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurnameCountryEntry {
    pub surname: String,
    pub country: Option<String>,
}

/// A passenger record joined with its inferred country.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub record: PassengerRecord,
    pub country: Option<String>,
}

/// The enriched dataset: one entry per original passenger, in input order.
///
/// Immutable once built; every view over it is recomputed on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichedDataset {
    records: Vec<EnrichedRecord>,
}

// Views are queried from UI threads while the dataset is shared.
static_assertions::assert_impl_all!(EnrichedDataset: Send, Sync);

impl EnrichedDataset {
    pub fn new(records: Vec<EnrichedRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[EnrichedRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EnrichedRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record by its stable identity.
    pub fn get(&self, passenger_id: i64) -> Option<&EnrichedRecord> {
        self.records
            .iter()
            .find(|r| r.record.passenger_id == passenger_id)
    }
}

impl<'a> IntoIterator for &'a EnrichedDataset {
    type Item = &'a EnrichedRecord;
    type IntoIter = std::slice::Iter<'a, EnrichedRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

// ============================================================================
// Run summaries
// ============================================================================

/// Age imputation applied to one passenger class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassAgeFill {
    pub pclass: u8,
    pub mean_age: f64,
    pub filled: usize,
}

/// What the cleaner changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleaningReport {
    pub age_fills: Vec<ClassAgeFill>,
    pub embarked_mode: Option<String>,
    pub embarked_filled: usize,
    pub cabin_dropped: bool,
    pub processing_steps: Vec<String>,
}

impl CleaningReport {
    pub fn ages_filled(&self) -> usize {
        self.age_fills.iter().map(|f| f.filled).sum()
    }
}

/// Outcome of one nationality resolution run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    /// Distinct surnames in the dataset.
    pub distinct_surnames: usize,
    /// Surnames answered from the persisted table without a request.
    pub cached: usize,
    /// Lookups issued in this run.
    pub requested: usize,
    /// Lookups that returned a country.
    pub resolved: usize,
    /// Lookups answered without a country; stored with a null code.
    pub unmatched: usize,
    /// Lookups that failed and were skipped.
    pub failed: usize,
    /// Surnames left out because the per-run bound was reached.
    pub skipped_by_bound: usize,
    pub duration_ms: u64,
}

/// Everything a pipeline run produces.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub dataset: EnrichedDataset,
    pub cleaning: CleaningReport,
    pub resolution: ResolutionReport,
    pub parse_errors: Vec<NameParseError>,
}
