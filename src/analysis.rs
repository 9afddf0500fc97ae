//! End-to-end step-test analysis
//!
//! Fits the lactate curve, scores it, samples it over the tested load range and
//! runs the threshold algorithms. Every call recomputes from scratch.

use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};

use crate::error::{FitError, LactRsError, Result};
use crate::fitting::{CurveFitter, DEFAULT_DEGREE, DEFAULT_RESOLUTION, MAX_DEGREE, MIN_RESOLUTION};
use crate::models::{Curve, PolynomialModel, StepTest, ThresholdResult};
use crate::threshold::{
    ThresholdAnalyzer, ThresholdConfig, DEFAULT_RISE_THRESHOLD, DEFAULT_TARGET_CONCENTRATION,
    DEFAULT_TOLERANCE,
};

/// Tunable parameters of the analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Polynomial degree (default: 3)
    pub degree: usize,

    /// Curve subdivisions (default: 1000, giving 1001 points)
    pub resolution: usize,

    /// Lactate jump that marks the DMAX-MOD breakpoint, mmol/L (default: 0.4)
    pub rise_threshold: f64,

    /// Fixed-concentration target, mmol/L (default: 4.0)
    pub target_concentration: f64,

    /// Bisection tolerance on the load axis (default: 0.001)
    pub tolerance: f64,

    /// Fixed-concentration search interval; the tested load range when unset
    pub search_range: Option<(f64, f64)>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            degree: DEFAULT_DEGREE,
            resolution: DEFAULT_RESOLUTION,
            rise_threshold: DEFAULT_RISE_THRESHOLD,
            target_concentration: DEFAULT_TARGET_CONCENTRATION,
            tolerance: DEFAULT_TOLERANCE,
            search_range: None,
        }
    }
}

impl AnalysisConfig {
    /// Check parameter sanity
    pub fn validate(&self) -> Result<()> {
        if self.degree == 0 || self.degree > MAX_DEGREE {
            return Err(LactRsError::Configuration(format!(
                "degree must be between 1 and {}, got {}",
                MAX_DEGREE, self.degree
            )));
        }
        if self.resolution < MIN_RESOLUTION {
            return Err(LactRsError::Configuration(format!(
                "resolution must be at least {}, got {}",
                MIN_RESOLUTION, self.resolution
            )));
        }
        if !self.rise_threshold.is_finite() || self.rise_threshold < 0.0 {
            return Err(LactRsError::Configuration(format!(
                "rise_threshold must be a non-negative number, got {}",
                self.rise_threshold
            )));
        }
        if !self.target_concentration.is_finite() {
            return Err(LactRsError::Configuration(format!(
                "target_concentration must be finite, got {}",
                self.target_concentration
            )));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(LactRsError::Configuration(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if let Some((low, high)) = self.search_range {
            if !low.is_finite() || !high.is_finite() || low > high {
                return Err(LactRsError::Configuration(format!(
                    "search_range [{}, {}] is empty or inverted",
                    low, high
                )));
            }
        }
        Ok(())
    }

    pub fn threshold_config(&self) -> ThresholdConfig {
        ThresholdConfig {
            rise_threshold: self.rise_threshold,
            target_concentration: self.target_concentration,
            tolerance: self.tolerance,
            search_range: self.search_range,
        }
    }
}

/// Everything derived from one step test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LactateAnalysis {
    /// Measured samples, sorted by load
    pub dataset: StepTest,

    /// Fitted polynomial
    pub model: PolynomialModel,

    /// Goodness of fit; `None` when all lactate values are identical
    pub r_squared: Option<f64>,

    /// Sampled fitted curve over the tested load range
    pub curve: Curve,

    /// Threshold estimates
    pub thresholds: ThresholdResult,
}

impl LactateAnalysis {
    pub fn sample_count(&self) -> usize {
        self.dataset.len()
    }
}

/// Runs the complete fit-and-threshold pipeline
pub struct LactateAnalyzer {
    config: AnalysisConfig,
}

impl LactateAnalyzer {
    pub fn new() -> Self {
        Self {
            config: AnalysisConfig::default(),
        }
    }

    pub fn with_config(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze a single step test
    pub fn analyze(&self, dataset: &StepTest) -> Result<LactateAnalysis> {
        let span = info_span!("analyze", samples = dataset.len(), degree = self.config.degree);
        let _guard = span.enter();

        let model = CurveFitter::fit_with_degree(dataset, self.config.degree)?;

        let r_squared = match CurveFitter::r_squared(dataset, &model) {
            Ok(r2) => Some(r2),
            Err(FitError::DegenerateVariance) => {
                warn!("All lactate values identical, goodness of fit not applicable");
                None
            }
            Err(e) => return Err(e.into()),
        };

        // A successful fit guarantees a non-empty dataset
        let (x_min, x_max) = dataset.load_range().ok_or(FitError::InsufficientData {
            required: self.config.degree + 1,
            actual: 0,
        })?;
        let curve = CurveFitter::sample_curve(&model, x_min, x_max, self.config.resolution)?;

        let thresholds = ThresholdAnalyzer::analyze(
            dataset,
            &model,
            &curve,
            &self.config.threshold_config(),
        )?;

        if thresholds.fixed_concentration_load.is_none() {
            info!(
                target = self.config.target_concentration,
                "Fixed-concentration threshold not determined"
            );
        }
        if thresholds.dmax_mod.is_none() {
            info!(
                rise = self.config.rise_threshold,
                "DMAX-MOD not determined: no sufficient lactate rise"
            );
        }

        info!(
            r_squared = ?r_squared,
            lt_fixed = ?thresholds.fixed_concentration_load,
            dmax = ?thresholds.dmax_load(),
            dmax_mod = ?thresholds.dmax_mod_load(),
            "Step test analyzed"
        );

        Ok(LactateAnalysis {
            dataset: dataset.clone(),
            model,
            r_squared,
            curve,
            thresholds,
        })
    }
}

impl Default for LactateAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_test_shape() -> StepTest {
        StepTest::from_pairs(&[
            (0.0, 1.0),
            (50.0, 1.2),
            (100.0, 1.5),
            (150.0, 2.0),
            (200.0, 3.0),
            (250.0, 5.0),
            (300.0, 8.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.degree, 3);
        assert_eq!(config.resolution, 1000);
        assert_eq!(config.rise_threshold, 0.4);
        assert_eq!(config.target_concentration, 4.0);
        assert_eq!(config.tolerance, 1e-3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let bad = [
            AnalysisConfig { degree: 0, ..Default::default() },
            AnalysisConfig { degree: 11, ..Default::default() },
            AnalysisConfig { degree: usize::MAX, ..Default::default() },
            AnalysisConfig { resolution: 0, ..Default::default() },
            AnalysisConfig { resolution: 2, ..Default::default() },
            AnalysisConfig { resolution: 99, ..Default::default() },
            AnalysisConfig { tolerance: 0.0, ..Default::default() },
            AnalysisConfig { rise_threshold: -1.0, ..Default::default() },
            AnalysisConfig { search_range: Some((300.0, 100.0)), ..Default::default() },
        ];
        for config in bad {
            assert!(matches!(
                LactateAnalyzer::with_config(config),
                Err(LactRsError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_minimum_resolution_accepted() {
        let config = AnalysisConfig {
            resolution: MIN_RESOLUTION,
            ..Default::default()
        };
        let analysis = LactateAnalyzer::with_config(config)
            .unwrap()
            .analyze(&step_test_shape())
            .unwrap();

        assert_eq!(analysis.curve.len(), 101);
        let dmax = analysis.thresholds.dmax.unwrap();
        assert!((dmax.load - 182.7).abs() < 3.0, "dmax at {}", dmax.load);
        assert!(dmax.distance > 1.0);
    }

    #[test]
    fn test_analyze_step_test() {
        let analysis = LactateAnalyzer::new().analyze(&step_test_shape()).unwrap();

        assert_eq!(analysis.sample_count(), 7);
        assert_eq!(analysis.model.degree(), 3);
        assert_eq!(analysis.curve.len(), 1001);
        assert!(analysis.r_squared.unwrap() > 0.95);

        let t = &analysis.thresholds;
        assert!(t.dmax_load().unwrap() > 150.0 && t.dmax_load().unwrap() < 300.0);
        assert!(t.dmax_mod_load().unwrap() <= 300.0);
        let lt4 = t.fixed_concentration_load.unwrap();
        assert!(lt4 > 200.0 && lt4 < 300.0);
    }

    #[test]
    fn test_analyze_flat_lactate() {
        let dataset =
            StepTest::from_pairs(&[(0.0, 2.0), (50.0, 2.0), (100.0, 2.0), (150.0, 2.0)]).unwrap();
        let analysis = LactateAnalyzer::new().analyze(&dataset).unwrap();

        assert_eq!(analysis.r_squared, None);
        assert_eq!(analysis.thresholds.fixed_concentration_load, None);
        assert_eq!(analysis.thresholds.dmax_mod, None);
    }

    #[test]
    fn test_analyze_insufficient_data() {
        let dataset = StepTest::from_pairs(&[(0.0, 1.0), (100.0, 3.0)]).unwrap();
        let err = LactateAnalyzer::new().analyze(&dataset).unwrap_err();
        assert!(matches!(
            err,
            LactRsError::Fit(FitError::InsufficientData { required: 4, actual: 2 })
        ));
    }

    #[test]
    fn test_analysis_serializes() {
        let analysis = LactateAnalyzer::new().analyze(&step_test_shape()).unwrap();
        let json = serde_json::to_string(&analysis).unwrap();
        assert!(json.contains("\"thresholds\""));
        assert!(json.contains("\"fixed_concentration_load\""));

        let back: LactateAnalysis = serde_json::from_str(&json).unwrap();
        assert_eq!(back.dataset.len(), 7);
    }
}
