//! Left join of the surname table onto passenger records.

use crate::error::{EnrichmentError, Result};
use crate::nationality::SurnameTable;
use crate::types::{EnrichedDataset, EnrichedRecord, PassengerRecord};
use tracing::{debug, info};

/// Joins inferred countries onto passengers by surname key.
///
/// Every input record appears exactly once in the output, in input order.
/// A record gets `country = None` when its surname is absent from the table,
/// when the table holds no country for it, or when it has no surname key.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnrichmentMerger;

impl EnrichmentMerger {
    pub fn new() -> Self {
        Self
    }

    /// # Errors
    ///
    /// Returns [`EnrichmentError::MergeIntegrity`] if the output row count
    /// differs from the input row count.
    pub fn merge(&self, records: Vec<PassengerRecord>, table: &SurnameTable) -> Result<EnrichedDataset> {
        let expected = records.len();

        let enriched: Vec<EnrichedRecord> = records
            .into_iter()
            .map(|record| {
                let country = if record.surname_key.is_empty() {
                    None
                } else {
                    table.country_of(&record.surname_key).map(str::to_string)
                };
                EnrichedRecord { record, country }
            })
            .collect();

        check_cardinality(expected, enriched.len())?;

        let matched = enriched.iter().filter(|r| r.country.is_some()).count();
        info!(
            "Merged countries onto {} passengers ({} matched, {} without country)",
            expected,
            matched,
            expected - matched
        );
        debug!("Surname table held {} entries", table.len());

        Ok(EnrichedDataset::new(enriched))
    }
}

fn check_cardinality(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(EnrichmentError::MergeIntegrity { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgeSexCategory, EmbarkedCode, Sex, SurnameCountryEntry};
    use pretty_assertions::assert_eq;

    fn record(id: i64, surname: &str) -> PassengerRecord {
        PassengerRecord {
            passenger_id: id,
            survived: false,
            pclass: 3,
            name: format!("{}, Mr. Test", surname),
            sex: Sex::Male,
            age: 30.0,
            embarked: "S".to_string(),
            title: "Mr".to_string(),
            age_sex: AgeSexCategory::Man,
            embarked_code: EmbarkedCode::Southampton,
            surname_key: surname.to_string(),
        }
    }

    #[test]
    fn test_shared_surname_gets_same_country() {
        let table = SurnameTable::from_entries(vec![SurnameCountryEntry {
            surname: "Smith".to_string(),
            country: Some("US".to_string()),
        }]);
        let records = vec![record(1, "Smith"), record(2, "Smith"), record(3, "Unresolved")];

        let dataset = EnrichmentMerger::new().merge(records, &table).unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.get(1).unwrap().country.as_deref(), Some("US"));
        assert_eq!(dataset.get(2).unwrap().country.as_deref(), Some("US"));
        assert_eq!(dataset.get(3).unwrap().country, None);
    }

    #[test]
    fn test_no_matches_preserves_every_row() {
        let records: Vec<_> = (1..=5).map(|id| record(id, "Nobody")).collect();

        let dataset = EnrichmentMerger::new()
            .merge(records, &SurnameTable::new())
            .unwrap();

        assert_eq!(dataset.len(), 5);
        assert!(dataset.iter().all(|r| r.country.is_none()));
        let ids: Vec<i64> = dataset.iter().map(|r| r.record.passenger_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_null_country_entry_and_empty_key() {
        let table = SurnameTable::from_entries(vec![
            SurnameCountryEntry {
                surname: "Unplaced".to_string(),
                country: None,
            },
            SurnameCountryEntry {
                surname: String::new(),
                country: Some("GB".to_string()),
            },
        ]);
        let records = vec![record(1, "Unplaced"), record(2, "")];

        let dataset = EnrichmentMerger::new().merge(records, &table).unwrap();

        assert_eq!(dataset.len(), 2);
        assert!(dataset.iter().all(|r| r.country.is_none()));
    }

    #[test]
    fn test_empty_input() {
        let dataset = EnrichmentMerger::new()
            .merge(Vec::new(), &SurnameTable::new())
            .unwrap();
        assert!(dataset.is_empty());
    }

    #[test]
    fn test_cardinality_mismatch_is_fatal() {
        let err = check_cardinality(3, 4).unwrap_err();
        assert_eq!(err.error_code(), "MERGE_INTEGRITY");
        assert!(!err.is_data_quality());
    }
}
