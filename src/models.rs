use serde::{Deserialize, Serialize};

use crate::error::FitError;

/// Single stage of an incremental exercise test
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Workload at this stage (watts, km/h, ...)
    #[serde(alias = "x")]
    pub load: f64,

    /// Blood lactate concentration in mmol/L
    #[serde(alias = "y")]
    pub lactate: f64,
}

impl Sample {
    pub fn new(load: f64, lactate: f64) -> Self {
        Self { load, lactate }
    }

    /// Why this sample cannot be analyzed, if it cannot
    pub(crate) fn invalid_reason(&self) -> Option<&'static str> {
        if !self.load.is_finite() {
            Some("load must be a finite number")
        } else if !self.lactate.is_finite() {
            Some("lactate must be a finite number")
        } else if self.load < 0.0 {
            Some("load must not be negative")
        } else if self.lactate < 0.0 {
            Some("lactate must not be negative")
        } else {
            None
        }
    }

    fn validate(&self, index: usize) -> Result<(), FitError> {
        match self.invalid_reason() {
            Some(reason) => Err(FitError::InvalidSample {
                index,
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl From<(f64, f64)> for Sample {
    fn from((load, lactate): (f64, f64)) -> Self {
        Self { load, lactate }
    }
}

/// Validated step-test dataset, sorted by load ascending
///
/// Sorting is stable: samples with equal load keep their input order.
/// Duplicate `(load, lactate)` pairs are allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Sample>", into = "Vec<Sample>")]
pub struct StepTest {
    samples: Vec<Sample>,
}

impl StepTest {
    /// Validate and sort the samples
    pub fn new(mut samples: Vec<Sample>) -> Result<Self, FitError> {
        for (index, sample) in samples.iter().enumerate() {
            sample.validate(index)?;
        }

        samples.sort_by(|a, b| a.load.total_cmp(&b.load));

        Ok(Self { samples })
    }

    /// Build from `(load, lactate)` pairs
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self, FitError> {
        Self::new(pairs.iter().copied().map(Sample::from).collect())
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn loads(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.load).collect()
    }

    pub fn lactates(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.lactate).collect()
    }

    /// `(min(load), max(load))`, or `None` for an empty dataset
    pub fn load_range(&self) -> Option<(f64, f64)> {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => Some((first.load, last.load)),
            _ => None,
        }
    }

    /// Number of distinct load values
    pub fn distinct_loads(&self) -> usize {
        let mut count = 0;
        let mut previous: Option<f64> = None;
        for sample in &self.samples {
            if previous != Some(sample.load) {
                count += 1;
                previous = Some(sample.load);
            }
        }
        count
    }
}

impl TryFrom<Vec<Sample>> for StepTest {
    type Error = FitError;

    fn try_from(samples: Vec<Sample>) -> Result<Self, Self::Error> {
        Self::new(samples)
    }
}

impl From<StepTest> for Vec<Sample> {
    fn from(test: StepTest) -> Self {
        test.samples
    }
}

/// Polynomial with coefficients stored highest power first
///
/// `f(x) = c[0]·x^n + c[1]·x^(n-1) + ... + c[n]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialModel {
    coefficients: Vec<f64>,
}

impl PolynomialModel {
    pub fn new(coefficients: Vec<f64>) -> Result<Self, FitError> {
        if coefficients.is_empty() {
            return Err(FitError::InvalidParameter {
                parameter: "coefficients".to_string(),
                value: "[]".to_string(),
            });
        }
        if let Some(bad) = coefficients.iter().find(|c| !c.is_finite()) {
            return Err(FitError::InvalidParameter {
                parameter: "coefficients".to_string(),
                value: bad.to_string(),
            });
        }
        Ok(Self { coefficients })
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Horner evaluation
    pub fn evaluate(&self, x: f64) -> f64 {
        self.coefficients.iter().fold(0.0, |acc, &c| acc * x + c)
    }
}

impl std::fmt::Display for PolynomialModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let degree = self.degree();
        let terms: Vec<String> = self
            .coefficients
            .iter()
            .enumerate()
            .map(|(i, c)| match degree - i {
                0 => format!("{:.6e}", c),
                1 => format!("{:.6e}·x", c),
                power => format!("{:.6e}·x^{}", c, power),
            })
            .collect();
        write!(f, "f(x) = {}", terms.join(" + "))
    }
}

/// Point on a sampled curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveSample {
    pub x: f64,
    pub y: f64,
}

impl CurveSample {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Ordered samples of a fitted polynomial, ascending in x
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    samples: Vec<CurveSample>,
}

impl Curve {
    pub fn new(samples: Vec<CurveSample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[CurveSample] {
        &self.samples
    }

    pub fn first(&self) -> Option<&CurveSample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&CurveSample> {
        self.samples.last()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Curve point selected by a DMAX variant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DmaxPoint {
    /// Load at the point of maximum distance
    pub load: f64,

    /// Fitted lactate at that load
    pub lactate: f64,

    /// Perpendicular distance from the chord
    pub distance: f64,
}

/// Threshold estimates for one step test; each value may be absent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdResult {
    /// Load where the fitted lactate reaches the target concentration
    pub fixed_concentration_load: Option<f64>,

    /// DMAX point over the whole curve
    pub dmax: Option<DmaxPoint>,

    /// DMAX point over the segment after the first sharp rise
    pub dmax_mod: Option<DmaxPoint>,
}

impl ThresholdResult {
    pub fn dmax_load(&self) -> Option<f64> {
        self.dmax.map(|p| p.load)
    }

    pub fn dmax_mod_load(&self) -> Option<f64> {
        self.dmax_mod.map(|p| p.load)
    }
}
