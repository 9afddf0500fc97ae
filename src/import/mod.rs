use std::path::Path;
use tracing::debug;

use crate::error::{ImportError, Result};
use crate::models::StepTest;

pub mod csv;
pub mod json;

/// Trait for importing step-test data from different file formats
pub trait ImportFormat: Send + Sync {
    /// Check if this importer can handle the given file
    fn can_import(&self, file_path: &Path) -> bool;

    /// Import a step test from the file
    fn import_file(&self, file_path: &Path) -> Result<StepTest>;

    /// Get the format name for this importer
    fn format_name(&self) -> &'static str;
}

/// Lowercased file extension, if any
pub(crate) fn extension(file_path: &Path) -> Option<String> {
    file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Manager for coordinating different import formats
pub struct ImportManager {
    importers: Vec<Box<dyn ImportFormat>>,
}

impl ImportManager {
    /// Create a new import manager with all available importers
    pub fn new() -> Self {
        let importers: Vec<Box<dyn ImportFormat>> = vec![
            Box::new(csv::CsvImporter::new()),
            Box::new(json::JsonImporter::new()),
        ];

        Self { importers }
    }

    /// Import a single file, selecting the importer by extension
    pub fn import_file(&self, file_path: &Path) -> Result<StepTest> {
        let importer = self
            .importers
            .iter()
            .find(|importer| importer.can_import(file_path))
            .ok_or_else(|| ImportError::UnsupportedFormat {
                path: file_path.to_path_buf(),
            })?;

        debug!(
            file = %file_path.display(),
            format = importer.format_name(),
            "Importing step test"
        );

        let test = importer.import_file(file_path)?;
        if test.is_empty() {
            return Err(ImportError::Empty {
                path: file_path.to_path_buf(),
            }
            .into());
        }
        Ok(test)
    }

    /// Whether any importer handles this file
    pub fn can_import(&self, file_path: &Path) -> bool {
        self.importers.iter().any(|i| i.can_import(file_path))
    }

    /// Names of the supported formats
    pub fn supported_formats(&self) -> Vec<&'static str> {
        self.importers.iter().map(|i| i.format_name()).collect()
    }
}

impl Default for ImportManager {
    fn default() -> Self {
        Self::new()
    }
}
