//! Grouped counts over the enriched dataset.
//!
//! Every function here is a pure query: it reads the dataset and returns a
//! freshly built result. Nothing is cached or updated incrementally.

use crate::countries::alpha3_for;
use crate::types::{AgeSexCategory, EnrichedDataset, EnrichedRecord, Sex};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};

/// Mapping from a group key to a passenger count.
///
/// Serializes as a list of `{"key": ..., "count": ...}` entries in key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationResult<K: Ord> {
    counts: BTreeMap<K, usize>,
}

impl<K: Ord> Default for AggregationResult<K> {
    fn default() -> Self {
        Self {
            counts: BTreeMap::new(),
        }
    }
}

impl<K: Ord> AggregationResult<K> {
    /// Start from the given keys, all with a zero count.
    fn seeded(keys: impl IntoIterator<Item = K>) -> Self {
        Self {
            counts: keys.into_iter().map(|k| (k, 0)).collect(),
        }
    }

    fn increment(&mut self, key: K) {
        *self.counts.entry(key).or_insert(0) += 1;
    }

    /// Count for `key`; keys never seen count as zero.
    pub fn get(&self, key: &K) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, usize)> {
        self.counts.iter().map(|(k, v)| (k, *v))
    }

    /// Sum of all counts.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[derive(Serialize)]
struct KeyCount<'a, K> {
    key: &'a K,
    count: usize,
}

impl<K: Ord + Serialize> Serialize for AggregationResult<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(
            self.counts
                .iter()
                .map(|(key, count)| KeyCount { key, count: *count }),
        )
    }
}

/// Passenger count per country, with the null-country bucket keyed by `None`.
pub fn count_by_country(dataset: &EnrichedDataset) -> AggregationResult<Option<String>> {
    let mut result = AggregationResult::default();
    for record in dataset {
        result.increment(record.country.clone());
    }
    result
}

/// One row of the per-country view handed to map renderers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryCount {
    pub country: Option<String>,
    pub alpha3: Option<&'static str>,
    pub count: usize,
}

/// Per-country counts, largest first, with ISO alpha-3 codes attached.
///
/// Equal counts keep country order, with the null bucket first.
pub fn country_rows(dataset: &EnrichedDataset) -> Vec<CountryCount> {
    let mut rows: Vec<CountryCount> = count_by_country(dataset)
        .iter()
        .map(|(country, count)| CountryCount {
            country: country.clone(),
            alpha3: country.as_deref().and_then(alpha3_for),
            count,
        })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count));
    rows
}

/// Count per `(Pclass, Survived)`; all six combinations are present.
pub fn count_by_class_survival(dataset: &EnrichedDataset) -> AggregationResult<(u8, bool)> {
    let mut result = AggregationResult::seeded(
        (1..=3u8).flat_map(|class| [(class, false), (class, true)]),
    );
    for record in dataset {
        result.increment((record.record.pclass, record.record.survived));
    }
    result
}

/// Count per `(Sex, Survived)` over any subset of records; all four
/// combinations are present even for an empty subset.
pub fn count_by_sex_survival<'a, I>(subset: I) -> AggregationResult<(Sex, bool)>
where
    I: IntoIterator<Item = &'a EnrichedRecord>,
{
    let mut result = AggregationResult::seeded([
        (Sex::Male, false),
        (Sex::Male, true),
        (Sex::Female, false),
        (Sex::Female, true),
    ]);
    for record in subset {
        result.increment((record.record.sex, record.record.survived));
    }
    result
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TitleCount {
    pub title: String,
    pub count: usize,
}

/// The `top_n` most frequent titles, descending by count.
///
/// Titles with equal counts keep the order in which they first appear.
pub fn count_by_title(dataset: &EnrichedDataset, top_n: usize) -> Vec<TitleCount> {
    let mut order: Vec<TitleCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in dataset {
        let title = record.record.title.as_str();
        match index.get(title) {
            Some(&i) => order[i].count += 1,
            None => {
                index.insert(title, order.len());
                order.push(TitleCount {
                    title: title.to_string(),
                    count: 1,
                });
            }
        }
    }

    // Stable sort keeps first-seen order among ties.
    order.sort_by(|a, b| b.count.cmp(&a.count));
    order.truncate(top_n);
    order
}

/// One row of the passenger table view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassengerRow {
    #[serde(rename = "PassengerId")]
    pub passenger_id: i64,
    #[serde(rename = "Survived")]
    pub survived: bool,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "AgeSexCategory")]
    pub age_sex: AgeSexCategory,
    #[serde(rename = "Country")]
    pub country: Option<String>,
}

/// Rows for the passenger table, in dataset order.
pub fn passenger_table(dataset: &EnrichedDataset) -> Vec<PassengerRow> {
    dataset
        .iter()
        .map(|r| PassengerRow {
            passenger_id: r.record.passenger_id,
            survived: r.record.survived,
            name: r.record.name.clone(),
            age_sex: r.record.age_sex,
            country: r.country.clone(),
        })
        .collect()
}
