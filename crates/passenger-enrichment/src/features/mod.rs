//! Derived categorical features.
//!
//! Turns cleaned passengers into [`PassengerRecord`]s carrying the title,
//! the age/sex category, the numeric port code and the surname key.

pub mod names;

pub use names::{distinct_surnames, parse_title, surname_key};

use crate::config::DEFAULT_CHILD_AGE_THRESHOLD;
use crate::error::NameParseError;
use crate::types::{AgeSexCategory, CleanedPassenger, EmbarkedCode, PassengerRecord, Sex};
use tracing::{debug, info, warn};

/// Title used when a name cannot be parsed.
pub const UNKNOWN_TITLE: &str = "Unknown";

/// Age/sex category of a passenger.
pub fn age_sex_category(sex: Sex, age: f64, child_age_threshold: f64) -> AgeSexCategory {
    let child = age < child_age_threshold;
    match (sex, child) {
        (Sex::Male, true) => AgeSexCategory::Boy,
        (Sex::Male, false) => AgeSexCategory::Man,
        (Sex::Female, true) => AgeSexCategory::Girl,
        (Sex::Female, false) => AgeSexCategory::Woman,
    }
}

/// Numeric code of an embarkation port. Anything but `S`, `C`, `Q` is 0.
pub fn embarked_code(port: &str) -> EmbarkedCode {
    match port {
        "S" => EmbarkedCode::Southampton,
        "C" => EmbarkedCode::Cherbourg,
        "Q" => EmbarkedCode::Queenstown,
        _ => EmbarkedCode::Unknown,
    }
}

/// Computes derived features for cleaned passengers.
#[derive(Debug, Clone)]
pub struct FeatureDeriver {
    child_age_threshold: f64,
}

impl Default for FeatureDeriver {
    fn default() -> Self {
        Self::new(DEFAULT_CHILD_AGE_THRESHOLD)
    }
}

impl FeatureDeriver {
    pub fn new(child_age_threshold: f64) -> Self {
        Self {
            child_age_threshold,
        }
    }

    /// Derive features for every passenger.
    ///
    /// Malformed names never abort: the title becomes [`UNKNOWN_TITLE`] and a
    /// [`NameParseError`] is returned alongside the records.
    pub fn derive(
        &self,
        cleaned: Vec<CleanedPassenger>,
    ) -> (Vec<PassengerRecord>, Vec<NameParseError>) {
        info!("Deriving features for {} passengers...", cleaned.len());
        let mut parse_errors = Vec::new();

        let records: Vec<PassengerRecord> = cleaned
            .into_iter()
            .map(|p| {
                let title = parse_title(&p.name).unwrap_or_else(|| {
                    let err = NameParseError {
                        passenger_id: p.passenger_id,
                        name: p.name.clone(),
                        field: "title",
                    };
                    warn!("{}", err);
                    parse_errors.push(err);
                    UNKNOWN_TITLE.to_string()
                });

                let surname = surname_key(&p.name);
                if surname.is_empty() {
                    let err = NameParseError {
                        passenger_id: p.passenger_id,
                        name: p.name.clone(),
                        field: "surname",
                    };
                    warn!("{}", err);
                    parse_errors.push(err);
                }

                PassengerRecord {
                    age_sex: age_sex_category(p.sex, p.age, self.child_age_threshold),
                    embarked_code: embarked_code(&p.embarked),
                    title,
                    surname_key: surname,
                    passenger_id: p.passenger_id,
                    survived: p.survived,
                    pclass: p.pclass,
                    name: p.name,
                    sex: p.sex,
                    age: p.age,
                    embarked: p.embarked,
                }
            })
            .collect();

        debug!("{} names failed to parse", parse_errors.len());
        (records, parse_errors)
    }
}
