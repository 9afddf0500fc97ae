//! Unified error hierarchy for lactrs
//!
//! Curve fitting, threshold detection and file import each have their own
//! error enum; `LactRsError` wraps them for callers that drive the whole
//! pipeline. An absent threshold is never an error: it is reported as `None`.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all lactrs operations
#[derive(Debug, Error)]
pub enum LactRsError {
    /// Polynomial fitting and curve sampling errors
    #[error("Fit error: {0}")]
    Fit(#[from] FitError),

    /// Threshold detection errors
    #[error("Threshold error: {0}")]
    Threshold(#[from] ThresholdError),

    /// Step-test import errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Curve fitter errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// Fewer samples than the polynomial degree requires
    #[error("Insufficient data: need at least {required} samples, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// Regression system has no unique solution
    #[error("Singular regression matrix for degree {degree} (not enough distinct loads)")]
    SingularMatrix { degree: usize },

    /// All lactate values identical, R² undefined
    #[error("Degenerate variance: all lactate values are identical")]
    DegenerateVariance,

    /// Empty or inverted sampling range
    #[error("Invalid range: [{x_min}, {x_max}]")]
    InvalidRange { x_min: f64, x_max: f64 },

    /// Invalid numeric parameter
    #[error("Invalid parameter: {parameter}={value}")]
    InvalidParameter { parameter: String, value: String },

    /// Sample violates the dataset invariants
    #[error("Invalid sample at index {index}: {reason}")]
    InvalidSample { index: usize, reason: String },
}

/// Threshold analyzer errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThresholdError {
    /// Target concentration is not bracketed by the search interval
    #[error("Target {target} not bracketed: f(low)={f_low}, f(high)={f_high}")]
    NoBracket { target: f64, f_low: f64, f_high: f64 },

    /// Chord endpoints coincide
    #[error("Degenerate chord: start and end points coincide")]
    DegenerateChord,

    /// Empty or inverted search interval
    #[error("Invalid search range: [{x_low}, {x_high}]")]
    InvalidSearchRange { x_low: f64, x_high: f64 },

    /// Invalid numeric parameter
    #[error("Invalid parameter: {parameter}={value}")]
    InvalidParameter { parameter: String, value: String },
}

/// Step-test import errors
#[derive(Debug, Error)]
pub enum ImportError {
    /// No importer handles the file
    #[error("Unsupported format: {path}")]
    UnsupportedFormat { path: PathBuf },

    /// Format-specific parsing error
    #[error("Parse error in {format}: {reason}")]
    ParseError { format: String, reason: String },

    /// Required column not present in the header
    #[error("Missing required column: {column}")]
    MissingColumn { column: String },

    /// File contained no samples
    #[error("No samples found in {path}")]
    Empty { path: PathBuf },
}

/// Result type alias for lactrs operations
pub type Result<T> = std::result::Result<T, LactRsError>;

impl LactRsError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, LactRsError::Io(_))
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            LactRsError::Fit(FitError::InsufficientData { .. }) => ErrorSeverity::Warning,
            LactRsError::Fit(FitError::SingularMatrix { .. }) => ErrorSeverity::Warning,
            LactRsError::Fit(FitError::DegenerateVariance) => ErrorSeverity::Info,
            LactRsError::Threshold(ThresholdError::NoBracket { .. }) => ErrorSeverity::Info,
            LactRsError::Import(_) => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            LactRsError::Fit(FitError::InsufficientData { required, actual }) => {
                format!(
                    "Insufficient data: enter at least {} measurements (currently {}).",
                    required, actual
                )
            }
            LactRsError::Fit(FitError::SingularMatrix { degree }) => {
                format!(
                    "Insufficient data: at least {} different loads are needed to fit the curve.",
                    degree + 1
                )
            }
            LactRsError::Fit(FitError::DegenerateVariance) => {
                "Goodness of fit not applicable: all lactate values are identical.".to_string()
            }
            LactRsError::Fit(FitError::InvalidSample { index, reason }) => {
                format!("Invalid data in sample {}: {}", index + 1, reason)
            }
            LactRsError::Threshold(ThresholdError::NoBracket { target, .. }) => {
                format!(
                    "Lactate does not cross {} mmol/L within the tested loads.",
                    target
                )
            }
            LactRsError::Threshold(ThresholdError::DegenerateChord) => {
                "Invalid data: the fitted curve spans a single point.".to_string()
            }
            LactRsError::Import(ImportError::Empty { path }) => {
                format!("No measurements found in {}", path.display())
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}
