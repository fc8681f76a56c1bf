//! Statistical imputation helpers.
//!
//! Group-aware mean for numeric fields and a deterministic mode for
//! categorical ones.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Mean of the present values per group key.
///
/// Groups whose values are all missing do not appear in the result.
pub fn group_means<K, I>(rows: I) -> BTreeMap<K, f64>
where
    K: Ord,
    I: IntoIterator<Item = (K, Option<f64>)>,
{
    let mut sums: BTreeMap<K, (f64, usize)> = BTreeMap::new();
    for (key, value) in rows {
        if let Some(v) = value {
            let entry = sums.entry(key).or_insert((0.0, 0));
            entry.0 += v;
            entry.1 += 1;
        }
    }

    sums.into_iter()
        .map(|(key, (sum, n))| (key, sum / n as f64))
        .collect()
}

/// Most frequent present value.
///
/// Ties go to the value encountered first, so the result does not depend on
/// hash ordering.
pub fn mode<'a, T, I>(values: I) -> Option<T>
where
    T: Eq + Hash + Clone + 'a,
    I: IntoIterator<Item = Option<&'a T>>,
{
    // value -> (count, first position)
    let mut counts: HashMap<&T, (usize, usize)> = HashMap::new();
    for (pos, value) in values.into_iter().flatten().enumerate() {
        counts.entry(value).or_insert((0, pos)).0 += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (ca, pa)), (_, (cb, pb))| ca.cmp(cb).then(pb.cmp(pa)))
        .map(|(value, _)| value.clone())
}
