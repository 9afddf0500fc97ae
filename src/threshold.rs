//! Lactate threshold detection
//!
//! Three estimates are derived from a fitted lactate curve:
//!
//! - **Fixed concentration**: the load at which fitted lactate reaches a target
//!   concentration (4 mmol/L by default), found by bisection.
//! - **DMAX**: the curve point with the largest perpendicular distance from the
//!   chord joining the first and last curve points.
//! - **DMAX-MOD**: DMAX restricted to the segment starting at the stage that
//!   precedes the first lactate rise larger than a threshold (0.4 mmol/L).
//!
//! A threshold that cannot be determined is reported as `None`. Errors are
//! reserved for invalid inputs and degenerate geometry.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::ThresholdError;
use crate::models::{Curve, CurveSample, DmaxPoint, PolynomialModel, StepTest, ThresholdResult};

/// Lactate jump (mmol/L) between consecutive stages that marks the DMAX-MOD breakpoint
pub const DEFAULT_RISE_THRESHOLD: f64 = 0.4;

/// Target concentration (mmol/L) for the fixed-concentration threshold
pub const DEFAULT_TARGET_CONCENTRATION: f64 = 4.0;

/// Bisection convergence width on the load axis
pub const DEFAULT_TOLERANCE: f64 = 1e-3;

/// Parameters for the threshold algorithms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// DMAX-MOD breakpoint rise (mmol/L)
    pub rise_threshold: f64,

    /// Fixed-concentration target (mmol/L)
    pub target_concentration: f64,

    /// Bisection tolerance on the load axis
    pub tolerance: f64,

    /// Search interval for the fixed-concentration threshold; defaults to the tested load range
    pub search_range: Option<(f64, f64)>,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            rise_threshold: DEFAULT_RISE_THRESHOLD,
            target_concentration: DEFAULT_TARGET_CONCENTRATION,
            tolerance: DEFAULT_TOLERANCE,
            search_range: None,
        }
    }
}

/// Straight line through two curve points, with a precomputed norm
struct Chord {
    start: CurveSample,
    end: CurveSample,
    norm: f64,
}

impl Chord {
    fn new(start: CurveSample, end: CurveSample) -> Result<Self, ThresholdError> {
        let norm = (end.y - start.y).hypot(end.x - start.x);
        if norm == 0.0 || !norm.is_finite() {
            return Err(ThresholdError::DegenerateChord);
        }
        Ok(Self { start, end, norm })
    }

    fn distance(&self, point: &CurveSample) -> f64 {
        let (x1, y1) = (self.start.x, self.start.y);
        let (x2, y2) = (self.end.x, self.end.y);
        ((y2 - y1) * point.x - (x2 - x1) * point.y + x2 * y1 - y2 * x1).abs() / self.norm
    }

    /// First point with the strictly largest distance
    fn farthest<'a, I>(&self, points: I) -> Option<DmaxPoint>
    where
        I: IntoIterator<Item = &'a CurveSample>,
    {
        let mut best: Option<DmaxPoint> = None;
        for point in points {
            let distance = self.distance(point);
            if best.map_or(true, |b| distance > b.distance) {
                best = Some(DmaxPoint {
                    load: point.x,
                    lactate: point.y,
                    distance,
                });
            }
        }
        best
    }
}

/// Threshold detection over fitted lactate curves
pub struct ThresholdAnalyzer;

impl ThresholdAnalyzer {
    /// Run all three threshold algorithms
    ///
    /// A fixed-concentration target outside the fitted range yields `None`
    /// rather than an error.
    pub fn analyze(
        dataset: &StepTest,
        model: &PolynomialModel,
        curve: &Curve,
        config: &ThresholdConfig,
    ) -> Result<ThresholdResult, ThresholdError> {
        let fixed_concentration_load = match config.search_range.or_else(|| dataset.load_range()) {
            Some((x_low, x_high)) => match Self::compute_fixed_concentration_threshold(
                model,
                config.target_concentration,
                x_low,
                x_high,
                config.tolerance,
            ) {
                Ok(load) => Some(load),
                Err(ThresholdError::NoBracket { f_low, f_high, .. }) => {
                    debug!(
                        target = config.target_concentration,
                        f_low, f_high, "Target concentration not reached within search range"
                    );
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        let dmax = Self::compute_dmax(curve)?;
        let dmax_mod = Self::compute_dmax_mod(dataset, curve, config.rise_threshold)?;

        Ok(ThresholdResult {
            fixed_concentration_load,
            dmax,
            dmax_mod,
        })
    }

    /// Distance from `point` to the infinite line through `line_start` and `line_end`
    ///
    /// Fails with `DegenerateChord` when both line points coincide.
    pub fn perpendicular_distance(
        point: &CurveSample,
        line_start: &CurveSample,
        line_end: &CurveSample,
    ) -> Result<f64, ThresholdError> {
        Chord::new(*line_start, *line_end).map(|chord| chord.distance(point))
    }

    /// DMAX over the whole curve
    ///
    /// Returns `None` for curves with fewer than two samples. Ties resolve to the
    /// lowest load.
    pub fn compute_dmax(curve: &Curve) -> Result<Option<DmaxPoint>, ThresholdError> {
        let (first, last) = match (curve.first(), curve.last()) {
            (Some(first), Some(last)) if curve.len() >= 2 => (*first, *last),
            _ => return Ok(None),
        };

        let chord = Chord::new(first, last)?;
        let point = chord.farthest(curve.samples());

        trace!(?point, "DMAX");
        Ok(point)
    }

    /// DMAX over the curve segment after the first sharp lactate rise
    ///
    /// The breakpoint is the first stage `i` whose lactate exceeds the previous
    /// stage by more than `rise_threshold`. The chord starts at the first curve
    /// point at or beyond the load of stage `i - 1` and ends at the last curve
    /// point. Returns `None` when the dataset has fewer than three stages, when no
    /// rise exceeds the threshold, or when no curve point lies past the chord start.
    pub fn compute_dmax_mod(
        dataset: &StepTest,
        curve: &Curve,
        rise_threshold: f64,
    ) -> Result<Option<DmaxPoint>, ThresholdError> {
        if !rise_threshold.is_finite() || rise_threshold < 0.0 {
            return Err(ThresholdError::InvalidParameter {
                parameter: "rise_threshold".to_string(),
                value: rise_threshold.to_string(),
            });
        }

        if dataset.len() < 3 || curve.len() < 2 {
            return Ok(None);
        }

        let samples = dataset.samples();
        let breakpoint = match (1..samples.len())
            .find(|&i| samples[i].lactate - samples[i - 1].lactate > rise_threshold)
        {
            Some(i) => i,
            None => {
                debug!(rise_threshold, "No sufficient lactate rise detected");
                return Ok(None);
            }
        };

        let breakpoint_load = samples[breakpoint - 1].load;
        let start = match curve.samples().iter().position(|s| s.x >= breakpoint_load) {
            Some(index) => index,
            None => return Ok(None),
        };

        let chord_start = curve.samples()[start];
        let candidates: Vec<&CurveSample> = curve.samples()[start + 1..]
            .iter()
            .filter(|s| s.x > chord_start.x)
            .collect();
        if candidates.is_empty() {
            return Ok(None);
        }

        let chord_end = curve.samples()[curve.len() - 1];
        let chord = Chord::new(chord_start, chord_end)?;
        let point = chord.farthest(candidates);

        debug!(breakpoint, breakpoint_load, ?point, "DMAX-MOD");
        Ok(point)
    }

    /// Load at which the model reaches `target_y`, by bisection over `[x_low, x_high]`
    ///
    /// The target must be bracketed: `f(x_low) < target_y <= f(x_high)` for a
    /// rising curve or `f(x_low) >= target_y > f(x_high)` for a falling one.
    /// A cubic that crosses the target more than once inside a bracketing
    /// interval converges to one of the crossings.
    pub fn compute_fixed_concentration_threshold(
        model: &PolynomialModel,
        target_y: f64,
        x_low: f64,
        x_high: f64,
        tolerance: f64,
    ) -> Result<f64, ThresholdError> {
        if !x_low.is_finite() || !x_high.is_finite() || x_low > x_high {
            return Err(ThresholdError::InvalidSearchRange { x_low, x_high });
        }
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(ThresholdError::InvalidParameter {
                parameter: "tolerance".to_string(),
                value: tolerance.to_string(),
            });
        }

        let f_low = model.evaluate(x_low);
        let f_high = model.evaluate(x_high);

        let rising = f_low < target_y && target_y <= f_high;
        let falling = f_low >= target_y && target_y > f_high;
        if !rising && !falling {
            return Err(ThresholdError::NoBracket {
                target: target_y,
                f_low,
                f_high,
            });
        }

        let (mut low, mut high) = (x_low, x_high);
        let mut iterations = 0u32;
        while high - low > tolerance {
            let mid = low + (high - low) / 2.0;
            // Interval can no longer be split in f64
            if mid <= low || mid >= high {
                break;
            }

            let below = model.evaluate(mid) < target_y;
            if below == rising {
                low = mid;
            } else {
                high = mid;
            }
            iterations += 1;
        }

        let load = low + (high - low) / 2.0;
        trace!(iterations, load, "Fixed-concentration bisection converged");
        Ok(load)
    }
}
