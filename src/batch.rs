//! Multi-file analysis using rayon
//!
//! Each step-test file is imported and analyzed independently, so a bad file
//! never stops the rest of the batch unless `continue_on_error` is off.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::analysis::{LactateAnalysis, LactateAnalyzer};
use crate::import::ImportManager;

/// Configuration for batch analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Worker threads (None uses one per CPU)
    pub num_threads: Option<usize>,

    /// Show a progress bar on stderr
    pub show_progress: bool,

    /// Keep going after a file fails
    pub continue_on_error: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            show_progress: true,
            continue_on_error: true,
        }
    }
}

/// Outcome for one input file
#[derive(Debug, Clone)]
pub struct FileAnalysisResult {
    pub file_path: PathBuf,
    pub analysis: Option<LactateAnalysis>,
    pub duration_ms: u128,
    pub error: Option<String>,
}

impl FileAnalysisResult {
    pub fn is_success(&self) -> bool {
        self.analysis.is_some()
    }
}

/// Summary of a batch run
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub total_files: usize,
    pub successful_files: usize,
    pub failed_files: usize,
    pub total_duration_ms: u128,
    /// Per-file results in input order
    pub results: Vec<FileAnalysisResult>,
}

impl BatchSummary {
    /// Files analyzed per second
    pub fn throughput_files_per_sec(&self) -> f64 {
        if self.total_duration_ms == 0 {
            return 0.0;
        }
        (self.successful_files as f64 / self.total_duration_ms as f64) * 1000.0
    }

    pub fn is_fully_successful(&self) -> bool {
        self.failed_files == 0
    }

    pub fn errors(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.results
            .iter()
            .filter_map(|r| r.error.as_deref().map(|e| (r.file_path.as_path(), e)))
    }

    pub fn to_string_pretty(&self) -> String {
        format!(
            "Batch Analysis Summary\n  \
             Total Files: {}\n  \
             Successful: {}\n  \
             Failed: {}\n  \
             Total Time: {:.2}s\n  \
             Throughput: {:.2} files/sec",
            self.total_files,
            self.successful_files,
            self.failed_files,
            self.total_duration_ms as f64 / 1000.0,
            self.throughput_files_per_sec(),
        )
    }
}

/// Runs the analysis pipeline over many files in parallel
pub struct BatchAnalyzer {
    config: BatchConfig,
    analyzer: LactateAnalyzer,
    importer: ImportManager,
}

impl BatchAnalyzer {
    pub fn new(analyzer: LactateAnalyzer) -> Self {
        Self::with_config(analyzer, BatchConfig::default())
    }

    pub fn with_config(analyzer: LactateAnalyzer, config: BatchConfig) -> Self {
        Self {
            config,
            analyzer,
            importer: ImportManager::new(),
        }
    }

    /// Import and analyze every file
    ///
    /// With `continue_on_error` off, the first failure (in input order) is
    /// returned as an error after all files have been attempted.
    pub fn analyze_files(&self, file_paths: &[PathBuf]) -> Result<BatchSummary> {
        let start_time = Instant::now();
        info!(files = file_paths.len(), "Starting batch analysis");

        let progress = self.progress_bar(file_paths.len())?;

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(num_threads) = self.config.num_threads {
            builder = builder.num_threads(num_threads);
        }
        let pool = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {}", e))?;

        let results: Vec<FileAnalysisResult> = pool.install(|| {
            file_paths
                .par_iter()
                .map(|path| {
                    let result = self.analyze_file(path);
                    if let Some(pb) = &progress {
                        pb.inc(1);
                    }
                    result
                })
                .collect()
        });

        if let Some(pb) = progress {
            pb.finish_with_message("Complete");
        }

        let successful_files = results.iter().filter(|r| r.is_success()).count();
        let summary = BatchSummary {
            total_files: file_paths.len(),
            successful_files,
            failed_files: results.len() - successful_files,
            total_duration_ms: start_time.elapsed().as_millis(),
            results,
        };

        info!("{}", summary.to_string_pretty());

        if !self.config.continue_on_error {
            if let Some((path, error)) = summary.errors().next() {
                anyhow::bail!("Analysis of {} failed: {}", path.display(), error);
            }
        }

        Ok(summary)
    }

    /// Analyze every supported file directly inside a directory
    pub fn analyze_directory(&self, dir_path: &Path) -> Result<BatchSummary> {
        if !dir_path.is_dir() {
            anyhow::bail!("Path is not a directory: {}", dir_path.display());
        }

        let files = self.collect_inputs(&[dir_path.to_path_buf()])?;
        if files.is_empty() {
            warn!(dir = %dir_path.display(), "No step-test files found");
        }

        self.analyze_files(&files)
    }

    /// Expand directories into the supported files they contain
    ///
    /// Plain file paths are kept as given. The result is sorted.
    pub fn collect_inputs(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for path in paths {
            if path.is_dir() {
                debug!(dir = %path.display(), "Scanning directory for step tests");
                for entry in std::fs::read_dir(path)? {
                    let entry_path = entry?.path();
                    if entry_path.is_file() && self.importer.can_import(&entry_path) {
                        files.push(entry_path);
                    }
                }
            } else {
                files.push(path.clone());
            }
        }

        files.sort();
        Ok(files)
    }

    fn analyze_file(&self, path: &Path) -> FileAnalysisResult {
        let start = Instant::now();

        let outcome = self
            .importer
            .import_file(path)
            .and_then(|test| self.analyzer.analyze(&test));

        let duration_ms = start.elapsed().as_millis();
        match outcome {
            Ok(analysis) => FileAnalysisResult {
                file_path: path.to_path_buf(),
                analysis: Some(analysis),
                duration_ms,
                error: None,
            },
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Step test analysis failed");
                FileAnalysisResult {
                    file_path: path.to_path_buf(),
                    analysis: None,
                    duration_ms,
                    error: Some(e.user_message()),
                }
            }
        }
    }

    fn progress_bar(&self, len: usize) -> Result<Option<ProgressBar>> {
        if !self.config.show_progress {
            return Ok(None);
        }

        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({msg})")?
                .progress_chars("#>-"),
        );
        Ok(Some(pb))
    }
}
