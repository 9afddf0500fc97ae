use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use thiserror::Error;

use crate::analysis::LactateAnalysis;

pub mod csv;
pub mod json;
pub mod text;

/// Output format for an analysis report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Terminal table
    Table,
    /// Full analysis as pretty JSON
    Json,
    /// Sampled curve as `x,y` rows
    Csv,
}

impl std::str::FromStr for ReportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "text" | "txt" => Ok(ReportFormat::Table),
            "json" => Ok(ReportFormat::Json),
            "csv" => Ok(ReportFormat::Csv),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Analysis of one step test together with where it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Input file name or other label
    pub source: String,
    pub generated_at: DateTime<Utc>,
    pub analysis: LactateAnalysis,
}

impl AnalysisReport {
    pub fn new(source: impl Into<String>, analysis: LactateAnalysis) -> Self {
        Self {
            source: source.into(),
            generated_at: Utc::now(),
            analysis,
        }
    }

    /// Write the report in the requested format
    pub fn write_to<W: Write>(&self, format: ReportFormat, mut writer: W) -> Result<(), ExportError> {
        match format {
            ReportFormat::Table => {
                writeln!(writer, "{}", text::render_table(self))?;
                writer.flush()?;
                Ok(())
            }
            ReportFormat::Json => json::write_json(self, writer),
            ReportFormat::Csv => csv::write_curve_csv(&self.analysis.curve, writer),
        }
    }

    /// Write the report to a file, creating parent directories
    pub fn export<P: AsRef<Path>>(&self, format: ReportFormat, output_path: P) -> Result<(), ExportError> {
        if let Some(parent) = output_path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(output_path)?;
        self.write_to(format, std::io::BufWriter::new(file))
    }
}

/// Errors that can occur during export
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for ExportError {
    fn from(e: serde_json::Error) -> Self {
        ExportError::SerializationError(e.to_string())
    }
}

impl From<::csv::Error> for ExportError {
    fn from(e: ::csv::Error) -> Self {
        ExportError::SerializationError(e.to_string())
    }
}
