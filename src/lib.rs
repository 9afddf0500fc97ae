//! Lactate threshold estimation from incremental step tests
//!
//! A cubic polynomial is fitted to `(load, lactate)` samples and three
//! threshold estimates are derived from the fitted curve: a fixed
//! concentration crossing, DMAX and DMAX-MOD.

pub mod analysis;
pub mod batch;
pub mod config;
pub mod error;
pub mod export;
pub mod fitting;
pub mod import;
pub mod logging;
pub mod models;
pub mod threshold;

// Re-export commonly used types for convenience
pub use analysis::{AnalysisConfig, LactateAnalysis, LactateAnalyzer};
pub use batch::{BatchAnalyzer, BatchConfig, BatchSummary};
pub use config::AppConfig;
pub use error::{FitError, ImportError, LactRsError, Result, ThresholdError};
pub use export::{AnalysisReport, ReportFormat};
pub use fitting::CurveFitter;
pub use import::ImportManager;
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use models::*;
pub use threshold::{ThresholdAnalyzer, ThresholdConfig};
