//! Reading the passenger dataset and writing the enriched one.
//!
//! The input is a headered CSV with one row per passenger. Missing required
//! columns are fatal; extra columns (`Ticket`, `Fare`, ...) are ignored.

use crate::error::{EnrichmentError, Result, ResultExt};
use crate::types::{EnrichedDataset, RawPassenger, Sex};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

/// Columns every input file must carry.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "PassengerId",
    "Survived",
    "Pclass",
    "Name",
    "Sex",
    "Age",
    "Embarked",
];

/// Load and validate the passenger CSV at `path`.
pub fn load_passengers(path: impl AsRef<Path>) -> Result<Vec<RawPassenger>> {
    let path = path.as_ref();
    info!("Loading passengers from: {}", path.display());

    let df = read_csv(path).context(format!("Reading {}", path.display()))?;
    debug!("Raw dataset shape: {:?}", df.shape());

    passengers_from_dataframe(&df)
}

/// Read a CSV, retrying on a pre-cleaned copy when the first parse fails.
fn read_csv(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("input file not found: {}", path.display()),
        )
        .into());
    }

    match CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => {
            debug!("Standard loading failed: {}", e);
        }
    }

    let content = std::fs::read_to_string(path)?;
    let cleaned = clean_csv_content(&content);

    CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .into_reader_with_file_handle(Cursor::new(cleaned))
        .finish()
        .map_err(Into::into)
}

/// Drop blank lines. Quoted fields are left alone so escaped quotes survive.
fn clean_csv_content(content: &str) -> String {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Convert a loaded frame into typed passenger rows.
///
/// # Errors
///
/// Any data-quality problem is fatal: a missing required column, a null
/// identity, a duplicate `PassengerId`, or a value outside its domain.
pub fn passengers_from_dataframe(df: &DataFrame) -> Result<Vec<RawPassenger>> {
    let present: HashSet<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    if let Some(missing) = REQUIRED_COLUMNS.iter().find(|c| !present.contains(**c)) {
        return Err(EnrichmentError::MissingColumn((*missing).to_string()));
    }

    let ids = int_column(df, "PassengerId")?;
    let survived = int_column(df, "Survived")?;
    let pclass = int_column(df, "Pclass")?;
    let names = str_column(df, "Name")?;
    let sexes = str_column(df, "Sex")?;
    let ages = float_column(df, "Age")?;
    let embarked = str_column(df, "Embarked")?;
    let cabins = if present.contains("Cabin") {
        str_column(df, "Cabin")?
    } else {
        vec![None; df.height()]
    };

    let mut seen = HashSet::with_capacity(df.height());
    let mut passengers = Vec::with_capacity(df.height());

    for row in 0..df.height() {
        let passenger_id = ids[row].ok_or_else(|| invalid("PassengerId", row, "null"))?;
        if !seen.insert(passenger_id) {
            return Err(EnrichmentError::DuplicatePassengerId(passenger_id));
        }

        let survived = match survived[row] {
            Some(0) => false,
            Some(1) => true,
            other => return Err(invalid("Survived", row, &format!("{:?}", other))),
        };

        let pclass = match pclass[row] {
            Some(c @ 1..=3) => c as u8,
            other => return Err(invalid("Pclass", row, &format!("{:?}", other))),
        };

        let sex_raw = sexes[row].as_deref().unwrap_or_default();
        let sex = Sex::parse(sex_raw).ok_or_else(|| invalid("Sex", row, sex_raw))?;

        let age = match ages[row] {
            Some(a) if a.is_nan() => None,
            Some(a) if a < 0.0 => return Err(invalid("Age", row, &a.to_string())),
            other => other,
        };

        let embarked = embarked[row]
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string);

        passengers.push(RawPassenger {
            passenger_id,
            survived,
            pclass,
            name: names[row].clone().unwrap_or_default(),
            sex,
            age,
            embarked,
            cabin: cabins[row].clone(),
        });
    }

    info!("Loaded {} passengers", passengers.len());
    Ok(passengers)
}

fn invalid(column: &str, row: usize, value: &str) -> EnrichmentError {
    EnrichmentError::InvalidValue {
        column: column.to_string(),
        row,
        value: value.to_string(),
    }
}

/// Integer cells of `name`. A float column is accepted only when every value
/// is whole; a plain cast would truncate `2.7` to `2`.
fn int_column(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let series = df.column(name)?.as_materialized_series();

    if series.dtype().is_float() {
        let floats = series.cast(&DataType::Float64)?;
        return floats
            .f64()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| match value {
                Some(v) if !v.is_finite() || v.fract() != 0.0 => {
                    Err(invalid(name, row, &v.to_string()))
                }
                other => Ok(other.map(|v| v as i64)),
            })
            .collect();
    }

    let series = series.cast(&DataType::Int64)?;
    Ok(series.i64()?.into_iter().collect())
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

fn str_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Build a frame of the enriched dataset for export.
pub fn enriched_to_dataframe(dataset: &EnrichedDataset) -> Result<DataFrame> {
    let records = dataset.records();

    let df = df![
        "PassengerId" => records.iter().map(|r| r.record.passenger_id).collect::<Vec<_>>(),
        "Survived" => records.iter().map(|r| r.record.survived as i32).collect::<Vec<_>>(),
        "Pclass" => records.iter().map(|r| r.record.pclass as i32).collect::<Vec<_>>(),
        "Name" => records.iter().map(|r| r.record.name.as_str()).collect::<Vec<_>>(),
        "Sex" => records.iter().map(|r| r.record.sex.as_str()).collect::<Vec<_>>(),
        "Age" => records.iter().map(|r| r.record.age).collect::<Vec<_>>(),
        "Embarked" => records.iter().map(|r| r.record.embarked.as_str()).collect::<Vec<_>>(),
        "EmbarkedCode" => records.iter().map(|r| r.record.embarked_code.value() as i32).collect::<Vec<_>>(),
        "Title" => records.iter().map(|r| r.record.title.as_str()).collect::<Vec<_>>(),
        "Age-Sex" => records.iter().map(|r| r.record.age_sex.as_str()).collect::<Vec<_>>(),
        "Last Name" => records.iter().map(|r| r.record.surname_key.as_str()).collect::<Vec<_>>(),
        "Country" => records.iter().map(|r| r.country.as_deref()).collect::<Vec<_>>(),
    ]?;

    Ok(df)
}

/// Write the enriched dataset as CSV.
pub fn write_enriched_csv(dataset: &EnrichedDataset, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut df = enriched_to_dataframe(dataset)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(&mut df)?;

    info!("Enriched dataset saved: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_frame() -> DataFrame {
        df![
            "PassengerId" => [1i64, 2, 3],
            "Survived" => [0i64, 1, 1],
            "Pclass" => [3i64, 1, 3],
            "Name" => ["Braund, Mr. Owen Harris", "Cumings, Mrs. John Bradley", "Heikkinen, Miss. Laina"],
            "Sex" => ["male", "female", "female"],
            "Age" => [Some(22.0), None, Some(26.0)],
            "Ticket" => ["A/5 21171", "PC 17599", "STON/O2. 3101282"],
            "Cabin" => [None, Some("C85"), None],
            "Embarked" => [Some("S"), Some("C"), None],
        ]
        .unwrap()
    }

    #[test]
    fn test_passengers_from_dataframe() {
        let passengers = passengers_from_dataframe(&base_frame()).unwrap();

        assert_eq!(passengers.len(), 3);
        assert_eq!(passengers[0].passenger_id, 1);
        assert!(!passengers[0].survived);
        assert_eq!(passengers[0].sex, Sex::Male);
        assert_eq!(passengers[1].age, None);
        assert_eq!(passengers[1].cabin.as_deref(), Some("C85"));
        assert_eq!(passengers[2].embarked, None);
    }

    #[test]
    fn test_missing_required_column_is_fatal() {
        let df = base_frame().drop("Embarked").unwrap();
        let err = passengers_from_dataframe(&df).unwrap_err();

        assert!(matches!(err, EnrichmentError::MissingColumn(ref c) if c == "Embarked"));
        assert!(err.is_data_quality());
    }

    #[test]
    fn test_cabin_is_optional() {
        let df = base_frame().drop("Cabin").unwrap();
        let passengers = passengers_from_dataframe(&df).unwrap();
        assert!(passengers.iter().all(|p| p.cabin.is_none()));
    }

    #[test]
    fn test_duplicate_passenger_id_is_fatal() {
        let mut df = base_frame();
        df.replace("PassengerId", Series::new("PassengerId".into(), [1i64, 2, 1]))
            .unwrap();

        let err = passengers_from_dataframe(&df).unwrap_err();
        assert!(matches!(err, EnrichmentError::DuplicatePassengerId(1)));
    }

    #[test]
    fn test_invalid_class_is_fatal() {
        let mut df = base_frame();
        df.replace("Pclass", Series::new("Pclass".into(), [3i64, 4, 3]))
            .unwrap();

        let err = passengers_from_dataframe(&df).unwrap_err();
        assert!(matches!(
            err,
            EnrichmentError::InvalidValue { ref column, row: 1, .. } if column == "Pclass"
        ));
    }

    #[test]
    fn test_fractional_codes_are_fatal() {
        let mut df = base_frame();
        df.replace("Pclass", Series::new("Pclass".into(), [3.0f64, 2.7, 3.0]))
            .unwrap();
        let err = passengers_from_dataframe(&df).unwrap_err();
        assert!(matches!(
            err,
            EnrichmentError::InvalidValue { ref column, row: 1, ref value }
                if column == "Pclass" && value == "2.7"
        ));

        let mut df = base_frame();
        df.replace("Survived", Series::new("Survived".into(), [0.6f64, 1.0, 1.0]))
            .unwrap();
        let err = passengers_from_dataframe(&df).unwrap_err();
        assert!(matches!(
            err,
            EnrichmentError::InvalidValue { ref column, row: 0, .. } if column == "Survived"
        ));

        let mut df = base_frame();
        df.replace("PassengerId", Series::new("PassengerId".into(), [1.0f64, 1.9, 3.0]))
            .unwrap();
        let err = passengers_from_dataframe(&df).unwrap_err();
        assert!(matches!(
            err,
            EnrichmentError::InvalidValue { ref column, row: 1, .. } if column == "PassengerId"
        ));
    }

    #[test]
    fn test_whole_float_codes_are_accepted() {
        let mut df = base_frame();
        df.replace("Pclass", Series::new("Pclass".into(), [3.0f64, 1.0, 2.0]))
            .unwrap();
        df.replace("Survived", Series::new("Survived".into(), [0.0f64, 1.0, 1.0]))
            .unwrap();

        let passengers = passengers_from_dataframe(&df).unwrap();
        assert_eq!(passengers[2].pclass, 2);
        assert!(passengers[1].survived);
    }

    #[test]
    fn test_invalid_sex_is_fatal() {
        let mut df = base_frame();
        df.replace("Sex", Series::new("Sex".into(), ["male", "x", "female"]))
            .unwrap();

        let err = passengers_from_dataframe(&df).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_VALUE");
    }

    #[test]
    fn test_clean_csv_content_drops_blank_lines() {
        let cleaned = clean_csv_content("a,b\n\n1,2\n   \n3,4");
        assert_eq!(cleaned, "a,b\n1,2\n3,4");
    }

    #[test]
    fn test_clean_csv_content_keeps_escaped_quotes() {
        let line = r#"157,1,3,"Gilnagh, Miss. Katherine ""Katie""",female"#;
        let cleaned = clean_csv_content(&format!("a\n\n{}\n", line));
        assert_eq!(cleaned, format!("a\n{}", line));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_passengers("definitely/not/here.csv").unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
