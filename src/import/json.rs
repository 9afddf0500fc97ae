use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{ImportError, Result};
use crate::import::{extension, ImportFormat};
use crate::models::{Sample, StepTest};

/// One stage as written in a JSON file
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonStage {
    Object(Sample),
    Pair(f64, f64),
}

impl From<JsonStage> for Sample {
    fn from(stage: JsonStage) -> Self {
        match stage {
            JsonStage::Object(sample) => sample,
            JsonStage::Pair(load, lactate) => Sample::new(load, lactate),
        }
    }
}

/// Top level of a JSON step test: a bare array or `{ "samples": [...] }`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonDocument {
    Stages(Vec<JsonStage>),
    Wrapped { samples: Vec<JsonStage> },
}

/// JSON importer
///
/// Accepts `[{"load": 100, "lactate": 1.5}, ...]`, the `x`/`y` spelling of the
/// same objects, or plain `[[100, 1.5], ...]` pairs.
pub struct JsonImporter;

impl JsonImporter {
    pub fn new() -> Self {
        Self
    }

    /// Parse a step test from a JSON string
    pub fn import_str(&self, content: &str) -> Result<StepTest> {
        let document: JsonDocument =
            serde_json::from_str(content).map_err(|e| ImportError::ParseError {
                format: "JSON".to_string(),
                reason: e.to_string(),
            })?;

        let stages = match document {
            JsonDocument::Stages(stages) => stages,
            JsonDocument::Wrapped { samples } => samples,
        };

        Ok(StepTest::new(stages.into_iter().map(Sample::from).collect())?)
    }
}

impl Default for JsonImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for JsonImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        extension(file_path).as_deref() == Some("json")
    }

    fn import_file(&self, file_path: &Path) -> Result<StepTest> {
        let content = fs::read_to_string(file_path)?;
        self.import_str(&content)
    }

    fn format_name(&self) -> &'static str {
        "JSON"
    }
}
