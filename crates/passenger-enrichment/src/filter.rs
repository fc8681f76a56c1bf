//! Country selection filter for the sex/survival view.

use crate::aggregate::{AggregationResult, count_by_sex_survival};
use crate::types::{EnrichedDataset, Sex};
use tracing::trace;

/// Recompute the `(Sex, Survived)` counts for an optional country selection.
///
/// `None` aggregates the whole dataset. `Some(code)` keeps only records whose
/// country equals `code` exactly (case-sensitive). The result always holds
/// all four combinations, zero-filled when nothing matches.
///
/// Reads the dataset only, so concurrent calls are safe.
pub fn filter_and_aggregate(
    dataset: &EnrichedDataset,
    selection: Option<&str>,
) -> AggregationResult<(Sex, bool)> {
    trace!("Filtering sex/survival view by {:?}", selection);
    match selection {
        None => count_by_sex_survival(dataset),
        Some(country) => count_by_sex_survival(
            dataset
                .iter()
                .filter(|r| r.country.as_deref() == Some(country)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::test_support::{dataset, enriched};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn sample() -> EnrichedDataset {
        dataset(vec![
            enriched(1, Sex::Male, true, 1, "Mr", Some("US")),
            enriched(2, Sex::Female, true, 1, "Mrs", Some("US")),
            enriched(3, Sex::Female, false, 2, "Miss", Some("US")),
            enriched(4, Sex::Male, false, 3, "Mr", Some("GB")),
            enriched(5, Sex::Female, true, 3, "Miss", None),
        ])
    }

    #[test]
    fn test_selection_counts_only_that_country() {
        let counts = filter_and_aggregate(&sample(), Some("US"));
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.get(&(Sex::Male, true)), 1);
        assert_eq!(counts.get(&(Sex::Male, false)), 0);
        assert_eq!(counts.get(&(Sex::Female, true)), 1);
        assert_eq!(counts.get(&(Sex::Female, false)), 1);
    }

    #[test]
    fn test_no_selection_matches_full_aggregation() {
        let data = sample();
        assert_eq!(
            filter_and_aggregate(&data, None),
            count_by_sex_survival(data.iter())
        );
        assert_eq!(filter_and_aggregate(&data, None).total(), 5);
    }

    #[test]
    fn test_repeated_calls_are_identical() {
        let data = sample();
        let first = filter_and_aggregate(&data, Some("GB"));
        let second = filter_and_aggregate(&data, Some("GB"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_match_is_exact_and_case_sensitive() {
        let counts = filter_and_aggregate(&sample(), Some("us"));
        assert_eq!(counts.len(), 4);
        assert_eq!(counts.total(), 0);
        assert_eq!(filter_and_aggregate(&sample(), Some("U")).total(), 0);
    }

    #[test]
    fn test_concurrent_selections() {
        let data = Arc::new(sample());
        let handles: Vec<_> = ["US", "GB", "FR", "US"]
            .into_iter()
            .map(|country| {
                let data = Arc::clone(&data);
                std::thread::spawn(move || filter_and_aggregate(&data, Some(country)).total())
            })
            .collect();

        let totals: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(totals, vec![3, 1, 0, 3]);
    }
}
