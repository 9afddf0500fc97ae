use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use lactrs::logging::init_logging;
use lactrs::{
    AnalysisReport, AppConfig, BatchAnalyzer, ImportManager, LactateAnalyzer, LogLevel,
    ReportFormat,
};

/// lactrs - Lactate Threshold Analysis CLI
///
/// Fits a cubic curve to step-test lactate measurements and estimates the
/// fixed-concentration, DMAX and DMAX-MOD thresholds.
#[derive(Parser)]
#[command(name = "lactrs")]
#[command(version)]
#[command(about = "Lactate Threshold Analysis CLI", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a single step test
    Analyze {
        /// Input file path (CSV or JSON)
        #[arg(short, long)]
        file: PathBuf,

        /// Output format (table, json, csv)
        #[arg(short = 'F', long, default_value = "table")]
        format: String,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Polynomial degree
        #[arg(long)]
        degree: Option<usize>,

        /// Number of curve intervals
        #[arg(long)]
        resolution: Option<usize>,

        /// DMAX-MOD lactate rise (mmol/L)
        #[arg(long)]
        rise_threshold: Option<f64>,

        /// Fixed-concentration target (mmol/L)
        #[arg(long)]
        target: Option<f64>,
    },

    /// Analyze many step tests in parallel
    Batch {
        /// Files or directories to analyze
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Worker threads
        #[arg(short, long)]
        threads: Option<usize>,

        /// Write one JSON report per input file into this directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Show or initialize the configuration file
    Config {
        /// Print the active configuration
        #[arg(short, long)]
        show: bool,

        /// Write a default configuration file
        #[arg(short, long)]
        init: bool,
    },
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load_or_default(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if cli.verbose > 0 {
        config.logging.level = LogLevel::from_verbosity(cli.verbose);
    }
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Analyze {
            file,
            format,
            output,
            degree,
            resolution,
            rise_threshold,
            target,
        } => {
            let mut analysis_config = config.analysis.clone();
            if let Some(degree) = degree {
                analysis_config.degree = degree;
            }
            if let Some(resolution) = resolution {
                analysis_config.resolution = resolution;
            }
            if let Some(rise) = rise_threshold {
                analysis_config.rise_threshold = rise;
            }
            if let Some(target) = target {
                analysis_config.target_concentration = target;
            }

            let format: ReportFormat = format.parse()?;
            let analyzer = LactateAnalyzer::with_config(analysis_config)?;

            let test = ImportManager::new().import_file(&file)?;
            let analysis = match analyzer.analyze(&test) {
                Ok(analysis) => analysis,
                Err(e) => {
                    eprintln!("{} {}", "✗".red().bold(), e.user_message().red());
                    return Err(e.into());
                }
            };

            let source = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());
            let report = AnalysisReport::new(source, analysis);

            match output {
                Some(path) => {
                    report.export(format, &path)?;
                    eprintln!(
                        "{}",
                        format!("✓ Report written to {}", path.display()).green()
                    );
                }
                None => report.write_to(format, io::stdout().lock())?,
            }
        }

        Commands::Batch {
            paths,
            threads,
            output_dir,
        } => {
            let mut batch_config = config.batch.clone();
            if threads.is_some() {
                batch_config.num_threads = threads;
            }

            let analyzer = LactateAnalyzer::with_config(config.analysis.clone())?;
            let batch = BatchAnalyzer::with_config(analyzer, batch_config);

            let files = batch.collect_inputs(&paths)?;
            debug!(files = files.len(), "Collected batch inputs");

            let summary = batch.analyze_files(&files)?;

            for result in &summary.results {
                let name = result.file_path.display();
                match (&result.analysis, &result.error) {
                    (Some(analysis), _) => {
                        let thresholds = &analysis.thresholds;
                        let fmt = |v: Option<f64>| {
                            v.map_or_else(|| "-".to_string(), |v| format!("{:.1}", v))
                        };
                        println!(
                            "{} {}  LT: {}  DMAX: {}  DMAX-MOD: {}",
                            "✓".green(),
                            name,
                            fmt(thresholds.fixed_concentration_load),
                            fmt(thresholds.dmax_load()),
                            fmt(thresholds.dmax_mod_load()),
                        );

                        if let Some(dir) = &output_dir {
                            let stem = result
                                .file_path
                                .file_stem()
                                .map(|s| s.to_string_lossy().into_owned())
                                .unwrap_or_else(|| "report".to_string());
                            let report = AnalysisReport::new(
                                result.file_path.display().to_string(),
                                analysis.clone(),
                            );
                            report.export(ReportFormat::Json, dir.join(format!("{}.json", stem)))?;
                        }
                    }
                    (None, error) => {
                        println!(
                            "{} {}  {}",
                            "✗".red(),
                            name,
                            error.as_deref().unwrap_or("unknown error").red()
                        );
                    }
                }
            }

            eprintln!("{}", summary.to_string_pretty().dimmed());
        }

        Commands::Config { show, init } => {
            if init {
                let mut fresh = AppConfig::default();
                let path = match &cli.config {
                    Some(path) => {
                        fresh.save_to_file(path)?;
                        path.clone()
                    }
                    None => fresh.save_default()?,
                };
                println!(
                    "{}",
                    format!("✓ Configuration written to {}", path.display()).green()
                );
            }

            if show || !init {
                let content = toml::to_string_pretty(&config)
                    .context("Failed to serialize configuration")?;
                println!("{}", content);
            }
        }
    }

    Ok(())
}
