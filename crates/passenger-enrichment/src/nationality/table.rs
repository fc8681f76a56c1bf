//! Persisted surname -> country table.
//!
//! Stored as a two-column CSV (`LastName,Country`); an empty country cell
//! means the service could not place the surname. All cells are read back
//! as strings so codes such as `NA` (Namibia) are not mistaken for nulls.

use crate::error::{EnrichmentError, Result, ResultExt};
use crate::types::SurnameCountryEntry;
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub const SURNAME_COLUMN: &str = "LastName";
pub const COUNTRY_COLUMN: &str = "Country";

/// Surname -> country cache, ordered by surname.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurnameTable {
    entries: BTreeMap<String, Option<String>>,
}

impl SurnameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from entries; the first entry for a surname wins.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = SurnameCountryEntry>,
    {
        let mut table = Self::new();
        for entry in entries {
            table.insert_if_absent(entry.surname, entry.country);
        }
        table
    }

    /// Load the table at `path`. A missing file yields an empty table.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No surname table at {}, starting empty", path.display());
            return Ok(Self::new());
        }

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()
            .context(format!("Reading surname table {}", path.display()))?;

        let table = Self::from_dataframe(&df)?;
        info!(
            "Loaded {} cached surnames from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let surnames = string_values(df, SURNAME_COLUMN)?;
        let countries = string_values(df, COUNTRY_COLUMN)?;

        let entries = surnames
            .into_iter()
            .zip(countries)
            .filter_map(|(surname, country)| {
                let surname = surname?.trim().to_string();
                (!surname.is_empty()).then(|| SurnameCountryEntry {
                    surname,
                    country: country
                        .map(|c| c.trim().to_string())
                        .filter(|c| !c.is_empty()),
                })
            });

        Ok(Self::from_entries(entries))
    }

    /// Write the whole table to `path`, replacing any previous file.
    ///
    /// Rows go to a temporary file next to `path` that is renamed over it
    /// once complete, so a failed write keeps the previous table.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut df = self.to_dataframe()?;

        let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(b',')
            .finish(&mut df)?;
        file.persist(path)
            .map_err(|e| EnrichmentError::from(e.error))
            .context(format!("Replacing surname table {}", path.display()))?;

        info!("Saved {} surnames to {}", self.len(), path.display());
        Ok(())
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let surnames: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        let countries: Vec<Option<&str>> = self.entries.values().map(|c| c.as_deref()).collect();

        let df = df![
            SURNAME_COLUMN => surnames,
            COUNTRY_COLUMN => countries,
        ]?;
        Ok(df)
    }

    /// Insert an entry unless the surname is already present.
    ///
    /// Returns `true` when the entry was inserted.
    pub fn insert_if_absent(&mut self, surname: impl Into<String>, country: Option<String>) -> bool {
        let surname = surname.into();
        if self.entries.contains_key(&surname) {
            return false;
        }
        self.entries.insert(surname, country);
        true
    }

    pub fn contains(&self, surname: &str) -> bool {
        self.entries.contains_key(surname)
    }

    /// Country recorded for `surname`, if any.
    pub fn country_of(&self, surname: &str) -> Option<&str> {
        self.entries.get(surname).and_then(|c| c.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = SurnameCountryEntry> + '_ {
        self.entries.iter().map(|(surname, country)| SurnameCountryEntry {
            surname: surname.clone(),
            country: country.clone(),
        })
    }
}

fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| EnrichmentError::MissingColumn(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(surname: &str, country: Option<&str>) -> SurnameCountryEntry {
        SurnameCountryEntry {
            surname: surname.to_string(),
            country: country.map(str::to_string),
        }
    }

    #[test]
    fn test_insert_never_overwrites() {
        let mut table = SurnameTable::new();
        assert!(table.insert_if_absent("Smith", Some("US".to_string())));
        assert!(!table.insert_if_absent("Smith", Some("GB".to_string())));
        assert_eq!(table.country_of("Smith"), Some("US"));
    }

    #[test]
    fn test_unmatched_entry_is_present_without_country() {
        let table = SurnameTable::from_entries(vec![entry("Nobody", None)]);
        assert!(table.contains("Nobody"));
        assert_eq!(table.country_of("Nobody"), None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names_output.csv");

        let table = SurnameTable::from_entries(vec![
            entry("Smith", Some("US")),
            entry("Shikongo", Some("NA")),
            entry("Unplaced", None),
        ]);
        table.save(&path).unwrap();

        let loaded = SurnameTable::load(&path).unwrap();
        assert_eq!(loaded, table);
        assert_eq!(loaded.country_of("Shikongo"), Some("NA"));
        assert!(loaded.contains("Unplaced"));
    }

    #[test]
    fn test_saved_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/names.csv");

        SurnameTable::from_entries(vec![entry("Braund", Some("GB")), entry("Aaa", None)])
            .save(&path)
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["LastName,Country", "Aaa,", "Braund,GB"]);
    }

    #[test]
    fn test_save_replaces_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names_output.csv");

        SurnameTable::from_entries(vec![entry("Smith", Some("US"))])
            .save(&path)
            .unwrap();
        SurnameTable::from_entries(vec![entry("Smith", Some("US")), entry("Moran", Some("IE"))])
            .save(&path)
            .unwrap();

        assert_eq!(SurnameTable::load(&path).unwrap().len(), 2);
        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_failed_save_keeps_directory_clean() {
        let dir = tempfile::tempdir().unwrap();
        // Renaming a file over a non-empty directory fails.
        let path = dir.path().join("names_output.csv");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep.txt"), "x").unwrap();

        let err = SurnameTable::from_entries(vec![entry("Smith", Some("US"))])
            .save(&path)
            .unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
        assert!(path.join("keep.txt").exists());
        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let table = SurnameTable::load(dir.path().join("absent.csv")).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_load_rejects_wrong_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "Surname,Code\nSmith,US\n").unwrap();

        let err = SurnameTable::load(&path).unwrap_err();
        assert!(matches!(err, EnrichmentError::MissingColumn(ref c) if c == "LastName"));
    }
}
