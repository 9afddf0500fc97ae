use csv::{ReaderBuilder, Trim};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{ImportError, Result};
use crate::import::{extension, ImportFormat};
use crate::models::{Sample, StepTest};

/// CSV importer with flexible column naming
///
/// Expects a header row. Column order does not matter and extra columns
/// (heart rate, RPE, ...) are ignored.
pub struct CsvImporter {
    column_mapping: HashMap<String, String>,
}

impl CsvImporter {
    pub fn new() -> Self {
        let mut column_mapping = HashMap::new();

        Self::add_mapping(
            &mut column_mapping,
            "load",
            &["load", "watts", "power", "speed", "intensity", "workload", "x"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "lactate",
            &["lactate", "la", "bla", "lactate_mmol", "blood_lactate", "y"],
        );

        Self { column_mapping }
    }

    fn add_mapping(mapping: &mut HashMap<String, String>, standard: &str, variations: &[&str]) {
        for variation in variations {
            mapping.insert(variation.to_lowercase(), standard.to_string());
        }
    }

    fn normalize_column_name(&self, name: &str) -> String {
        let normalized = name.trim().to_lowercase().replace([' ', '-'], "_");

        self.column_mapping
            .get(&normalized)
            .cloned()
            .unwrap_or(normalized)
    }

    fn column_index(&self, headers: &csv::StringRecord, standard: &str) -> Result<usize> {
        headers
            .iter()
            .position(|h| self.normalize_column_name(h) == standard)
            .ok_or_else(|| {
                ImportError::MissingColumn {
                    column: standard.to_string(),
                }
                .into()
            })
    }

    fn parse_value(field: &str, column: &str, row: usize) -> Result<f64> {
        field.parse::<f64>().map_err(|_| {
            ImportError::ParseError {
                format: "CSV".to_string(),
                reason: format!("row {}: invalid {} value '{}'", row, column, field),
            }
            .into()
        })
    }

    /// Read a step test from any CSV source
    pub fn import_reader<R: Read>(&self, reader: R) -> Result<StepTest> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| ImportError::ParseError {
                format: "CSV".to_string(),
                reason: e.to_string(),
            })?
            .clone();

        let load_idx = self.column_index(&headers, "load")?;
        let lactate_idx = self.column_index(&headers, "lactate")?;

        let mut samples = Vec::new();
        for (i, record) in csv_reader.records().enumerate() {
            // Header is line 1
            let row = i + 2;
            let record = record.map_err(|e| ImportError::ParseError {
                format: "CSV".to_string(),
                reason: format!("row {}: {}", row, e),
            })?;

            let load = record.get(load_idx).unwrap_or("");
            let lactate = record.get(lactate_idx).unwrap_or("");

            // Blank entry rows are left over from the input table
            if load.is_empty() && lactate.is_empty() {
                continue;
            }

            let sample = Sample::new(
                Self::parse_value(load, "load", row)?,
                Self::parse_value(lactate, "lactate", row)?,
            );
            if let Some(reason) = sample.invalid_reason() {
                return Err(ImportError::ParseError {
                    format: "CSV".to_string(),
                    reason: format!("row {}: {}", row, reason),
                }
                .into());
            }
            samples.push(sample);
        }

        Ok(StepTest::new(samples)?)
    }
}

impl Default for CsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for CsvImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        matches!(extension(file_path).as_deref(), Some("csv") | Some("txt"))
    }

    fn import_file(&self, file_path: &Path) -> Result<StepTest> {
        let file = File::open(file_path)?;
        self.import_reader(file)
    }

    fn format_name(&self) -> &'static str {
        "CSV"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LactRsError;

    #[test]
    fn test_import_with_aliases_and_extra_columns() {
        let data = "Stage,Watts,HR,bLa\n1,100,120,1.2\n2,150,135,1.6\n3,200,150,2.8\n";
        let test = CsvImporter::new().import_reader(data.as_bytes()).unwrap();

        assert_eq!(test.loads(), vec![100.0, 150.0, 200.0]);
        assert_eq!(test.lactates(), vec![1.2, 1.6, 2.8]);
    }

    #[test]
    fn test_import_skips_blank_rows_and_sorts() {
        let data = "load,lactate\n200, 3.0\n,\n100,1.5\n";
        let test = CsvImporter::new().import_reader(data.as_bytes()).unwrap();
        assert_eq!(test.loads(), vec![100.0, 200.0]);
    }

    #[test]
    fn test_missing_column() {
        let data = "load,heart_rate\n100,120\n";
        let err = CsvImporter::new().import_reader(data.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            LactRsError::Import(ImportError::MissingColumn { ref column }) if column == "lactate"
        ));
    }

    #[test]
    fn test_invalid_number_reports_row() {
        let data = "load,lactate\n100,1.5\n150,abc\n";
        let err = CsvImporter::new().import_reader(data.as_bytes()).unwrap_err();
        match err {
            LactRsError::Import(ImportError::ParseError { reason, .. }) => {
                assert!(reason.contains("row 3"));
                assert!(reason.contains("abc"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_negative_values_report_csv_row() {
        // Blank line 3 is skipped, so the bad sample sits on line 4
        let data = "load,lactate\n100,1.0\n,\n150,-1.0\n";
        let err = CsvImporter::new().import_reader(data.as_bytes()).unwrap_err();
        match err {
            LactRsError::Import(ImportError::ParseError { reason, .. }) => {
                assert!(reason.starts_with("row 4:"), "{}", reason);
                assert!(reason.contains("lactate must not be negative"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let err = CsvImporter::new()
            .import_reader("load,lactate\nNaN,1.0\n".as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("row 2: load must be a finite number"));
    }
}
