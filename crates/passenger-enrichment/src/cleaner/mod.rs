//! Missing-value repair for the raw passenger dataset.
//!
//! This module provides:
//! - Age imputation with the mean age of the passenger's class
//! - Embarkation port imputation with the dataset-wide mode
//! - Dropping the cabin field, which nothing downstream reads

mod imputation;

pub use imputation::{group_means, mode};

use crate::error::{EnrichmentError, Result};
use crate::types::{ClassAgeFill, CleanedPassenger, CleaningReport, RawPassenger};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Cleaner for the raw passenger dataset.
pub struct DataCleaner;

impl DataCleaner {
    /// Repair missing values and return the cleaned rows with a report.
    ///
    /// Statistics are computed over the whole input before any row is
    /// touched. Input order is preserved.
    ///
    /// # Errors
    ///
    /// Returns [`EnrichmentError::EmptyImputationGroup`] when a class has
    /// missing ages but no known age to average, or when ports are missing
    /// and no passenger has a known port.
    pub fn clean(&self, raw: &[RawPassenger]) -> Result<(Vec<CleanedPassenger>, CleaningReport)> {
        info!("Cleaning {} passenger records...", raw.len());
        let mut report = CleaningReport::default();

        let class_means = group_means(raw.iter().map(|p| (p.pclass, p.age)));
        let mut missing_per_class: BTreeMap<u8, usize> = BTreeMap::new();
        for p in raw.iter().filter(|p| p.age.is_none()) {
            *missing_per_class.entry(p.pclass).or_insert(0) += 1;
        }

        for (&pclass, &filled) in &missing_per_class {
            let mean_age = *class_means.get(&pclass).ok_or_else(|| {
                EnrichmentError::EmptyImputationGroup {
                    column: "Age".to_string(),
                    group: format!("Pclass={}", pclass),
                }
            })?;
            report.processing_steps.push(format!(
                "Filled {} missing 'Age' values in class {} with class mean: {:.2}",
                filled, pclass, mean_age
            ));
            debug!("Class {} mean age {:.2} ({} fills)", pclass, mean_age, filled);
            report.age_fills.push(ClassAgeFill {
                pclass,
                mean_age,
                filled,
            });
        }

        let embarked_missing = raw.iter().filter(|p| p.embarked.is_none()).count();
        let embarked_mode = mode(raw.iter().map(|p| p.embarked.as_ref()));
        if embarked_missing > 0 {
            let fill = embarked_mode.as_deref().ok_or_else(|| {
                EnrichmentError::EmptyImputationGroup {
                    column: "Embarked".to_string(),
                    group: "all passengers".to_string(),
                }
            })?;
            report.processing_steps.push(format!(
                "Filled {} missing 'Embarked' values with mode: '{}'",
                embarked_missing, fill
            ));
        }
        report.embarked_filled = embarked_missing;
        report.embarked_mode = embarked_mode.clone();

        let cabins_present = raw.iter().filter(|p| p.cabin.is_some()).count();
        report.cabin_dropped = true;
        report.processing_steps.push(format!(
            "Dropped 'Cabin' ({} non-empty values unused downstream)",
            cabins_present
        ));

        let cleaned: Vec<CleanedPassenger> = raw
            .iter()
            .map(|p| CleanedPassenger {
                passenger_id: p.passenger_id,
                survived: p.survived,
                pclass: p.pclass,
                name: p.name.clone(),
                sex: p.sex,
                // Both lookups were checked above for every class with gaps.
                age: p
                    .age
                    .or_else(|| class_means.get(&p.pclass).copied())
                    .unwrap_or_default(),
                embarked: p
                    .embarked
                    .clone()
                    .or_else(|| embarked_mode.clone())
                    .unwrap_or_default(),
            })
            .collect();

        if report.ages_filled() + report.embarked_filled > 0 {
            info!(
                "Imputed {} ages and {} embarkation ports",
                report.ages_filled(),
                report.embarked_filled
            );
        } else {
            debug!("No missing ages or ports found; nothing imputed");
        }

        Ok((cleaned, report))
    }
}
