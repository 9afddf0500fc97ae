//! Least-squares polynomial fitting for lactate curves
//!
//! Fits `lactate = f(load)` with an ordinary least-squares polynomial (cubic by
//! default), samples the fitted curve for plotting and threshold detection, and
//! scores the fit with the coefficient of determination.

use nalgebra::{DMatrix, DVector};
use statrs::statistics::Statistics;
use tracing::{debug, trace};

use crate::error::FitError;
use crate::models::{Curve, CurveSample, PolynomialModel, StepTest};

/// Polynomial degree used for lactate curves
pub const DEFAULT_DEGREE: usize = 3;

/// Number of subdivisions when sampling a fitted curve
pub const DEFAULT_RESOLUTION: usize = 1000;

/// Fewest subdivisions that still locate the DMAX point reliably
pub const MIN_RESOLUTION: usize = 100;

/// Highest polynomial degree accepted from configuration
pub const MAX_DEGREE: usize = 10;

/// Smallest accepted ratio between the smallest and largest LU pivot
const MIN_PIVOT_RATIO: f64 = 1e-12;

/// Curve fitting utilities
pub struct CurveFitter;

impl CurveFitter {
    /// Fit a cubic polynomial to the step test
    pub fn fit(dataset: &StepTest) -> Result<PolynomialModel, FitError> {
        Self::fit_with_degree(dataset, DEFAULT_DEGREE)
    }

    /// Fit a polynomial of the given degree via the normal equations
    ///
    /// Loads are divided by a power of two before the system is built, so the
    /// scaling itself introduces no rounding. The coefficients are rescaled back
    /// to the original load axis afterwards.
    pub fn fit_with_degree(dataset: &StepTest, degree: usize) -> Result<PolynomialModel, FitError> {
        let required = degree.checked_add(1).ok_or_else(|| FitError::InvalidParameter {
            parameter: "degree".to_string(),
            value: degree.to_string(),
        })?;
        if dataset.len() < required {
            return Err(FitError::InsufficientData {
                required,
                actual: dataset.len(),
            });
        }

        if dataset.distinct_loads() < required {
            debug!(
                distinct = dataset.distinct_loads(),
                required, "Not enough distinct loads for polynomial fit"
            );
            return Err(FitError::SingularMatrix { degree });
        }

        let scale = Self::load_scale(dataset);
        let xs: Vec<f64> = dataset.samples().iter().map(|s| s.load / scale).collect();
        let ys = DVector::from_iterator(dataset.len(), dataset.samples().iter().map(|s| s.lactate));

        // Design matrix rows: [x^degree, x^(degree-1), ..., 1]
        let design = DMatrix::from_fn(dataset.len(), required, |i, j| {
            xs[i].powi((degree - j) as i32)
        });
        let xtx = design.transpose() * &design;
        let xty = design.transpose() * ys;

        let lu = xtx.lu();
        if !Self::is_well_conditioned(&lu.u()) {
            return Err(FitError::SingularMatrix { degree });
        }

        let scaled = lu.solve(&xty).ok_or(FitError::SingularMatrix { degree })?;

        let coefficients: Vec<f64> = scaled
            .iter()
            .enumerate()
            .map(|(j, c)| c / scale.powi((degree - j) as i32))
            .collect();

        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(FitError::SingularMatrix { degree });
        }

        debug!(
            samples = dataset.len(),
            degree,
            ?coefficients,
            "Fitted lactate curve"
        );

        PolynomialModel::new(coefficients)
    }

    /// Evaluate the model at `x`
    pub fn evaluate(model: &PolynomialModel, x: f64) -> f64 {
        model.evaluate(x)
    }

    /// Sample the model at `resolution + 1` evenly spaced points over `[x_min, x_max]`
    pub fn sample_curve(
        model: &PolynomialModel,
        x_min: f64,
        x_max: f64,
        resolution: usize,
    ) -> Result<Curve, FitError> {
        if !x_min.is_finite() || !x_max.is_finite() || x_min > x_max {
            return Err(FitError::InvalidRange { x_min, x_max });
        }
        if resolution == 0 {
            return Err(FitError::InvalidParameter {
                parameter: "resolution".to_string(),
                value: resolution.to_string(),
            });
        }

        let step = (x_max - x_min) / resolution as f64;
        let samples = (0..=resolution)
            .map(|i| {
                let x = if i == resolution {
                    x_max
                } else {
                    x_min + step * i as f64
                };
                CurveSample::new(x, model.evaluate(x))
            })
            .collect::<Vec<_>>();

        trace!(points = samples.len(), x_min, x_max, "Sampled curve");

        Ok(Curve::new(samples))
    }

    /// Coefficient of determination of the model over the dataset
    pub fn r_squared(dataset: &StepTest, model: &PolynomialModel) -> Result<f64, FitError> {
        if dataset.is_empty() {
            return Err(FitError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }

        let mean_y = dataset.lactates().mean();

        let mut ss_total = 0.0;
        let mut ss_residual = 0.0;
        for sample in dataset.samples() {
            ss_total += (sample.lactate - mean_y).powi(2);
            ss_residual += (sample.lactate - model.evaluate(sample.load)).powi(2);
        }

        if ss_total == 0.0 {
            return Err(FitError::DegenerateVariance);
        }

        Ok(1.0 - ss_residual / ss_total)
    }

    /// Power of two at or above the largest load
    fn load_scale(dataset: &StepTest) -> f64 {
        let max_load = dataset
            .samples()
            .iter()
            .map(|s| s.load.abs())
            .fold(0.0, f64::max);

        if max_load > 0.0 {
            2f64.powi(max_load.log2().ceil() as i32)
        } else {
            1.0
        }
    }

    fn is_well_conditioned(u: &DMatrix<f64>) -> bool {
        let pivots: Vec<f64> = u.diagonal().iter().map(|p| p.abs()).collect();
        let max_pivot = pivots.iter().cloned().fold(0.0, f64::max);
        let min_pivot = pivots.iter().cloned().fold(f64::INFINITY, f64::min);

        max_pivot > 0.0 && min_pivot.is_finite() && min_pivot / max_pivot >= MIN_PIVOT_RATIO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sample;

    fn cubic(a: f64, b: f64, c: f64, d: f64) -> impl Fn(f64) -> f64 {
        move |x| a * x.powi(3) + b * x.powi(2) + c * x + d
    }

    fn assert_close(actual: f64, expected: f64) {
        let tolerance = 1e-9 * expected.abs().max(1.0);
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {}, got {}",
            expected,
            actual
        );
    }

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
    fn test_fit_recovers_exact_cubic() {
        let f = cubic(0.5, -2.0, 3.0, 1.5);
        let pairs: Vec<(f64, f64)> = (0..8).map(|i| (i as f64, f(i as f64))).collect();
        let dataset = StepTest::from_pairs(&pairs).unwrap();

        let model = CurveFitter::fit(&dataset).unwrap();
        let c = model.coefficients();
        assert_eq!(c.len(), 4);
        assert_close(c[0], 0.5);
        assert_close(c[1], -2.0);
        assert_close(c[2], 3.0);
        assert_close(c[3], 1.5);

        let r2 = CurveFitter::r_squared(&dataset, &model).unwrap();
        assert!((r2 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_recovers_cubic_on_wattage_scale() {
        let f = cubic(2e-7, 1e-5, 0.002, 0.9);
        let pairs: Vec<(f64, f64)> = (0..7).map(|i| {
            let x = 60.0 + 40.0 * i as f64;
            (x, f(x))
        }).collect();
        let dataset = StepTest::from_pairs(&pairs).unwrap();

        let model = CurveFitter::fit(&dataset).unwrap();
        for &(x, y) in &pairs {
            assert!((model.evaluate(x) - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_fit_insufficient_data() {
        let dataset = StepTest::from_pairs(&[(0.0, 1.0), (100.0, 2.0)]).unwrap();
        let err = CurveFitter::fit(&dataset).unwrap_err();
        assert_eq!(
            err,
            FitError::InsufficientData {
                required: 4,
                actual: 2
            }
        );
    }

    #[test]
    fn test_fit_identical_loads_is_singular() {
        let dataset =
            StepTest::from_pairs(&[(100.0, 1.0), (100.0, 2.0), (100.0, 3.0), (100.0, 4.0)])
                .unwrap();
        let err = CurveFitter::fit(&dataset).unwrap_err();
        assert_eq!(err, FitError::SingularMatrix { degree: 3 });
    }

    #[test]
    fn test_fit_too_few_distinct_loads_is_singular() {
        let dataset = StepTest::from_pairs(&[
            (0.0, 1.0),
            (0.0, 1.1),
            (100.0, 2.0),
            (100.0, 2.1),
            (200.0, 4.0),
        ])
        .unwrap();
        assert_eq!(
            CurveFitter::fit(&dataset).unwrap_err(),
            FitError::SingularMatrix { degree: 3 }
        );
    }

    #[test]
    fn test_fit_is_deterministic_regardless_of_order() {
        let ordered = step_test_shape();
        let mut reversed: Vec<Sample> = ordered.samples().to_vec();
        reversed.reverse();
        let reversed = StepTest::new(reversed).unwrap();

        let a = CurveFitter::fit(&ordered).unwrap();
        let b = CurveFitter::fit(&reversed).unwrap();
        assert_eq!(a.coefficients(), b.coefficients());
    }

    #[test]
    fn test_fit_rejects_overflowing_degree() {
        let err = CurveFitter::fit_with_degree(&step_test_shape(), usize::MAX).unwrap_err();
        assert!(matches!(
            err,
            FitError::InvalidParameter { ref parameter, .. } if parameter == "degree"
        ));
    }

    #[test]
    fn test_fit_lower_degree() {
        let dataset = StepTest::from_pairs(&[(0.0, 1.0), (1.0, 3.0), (2.0, 5.0)]).unwrap();
        let model = CurveFitter::fit_with_degree(&dataset, 1).unwrap();
        assert_eq!(model.degree(), 1);
        assert_close(model.coefficients()[0], 2.0);
        assert_close(model.coefficients()[1], 1.0);
    }

    #[test]
    fn test_step_test_fit_quality() {
        let dataset = step_test_shape();
        let model = CurveFitter::fit(&dataset).unwrap();
        let r2 = CurveFitter::r_squared(&dataset, &model).unwrap();
        assert!(r2 > 0.95, "r² = {}", r2);
        assert!(r2 <= 1.0);
    }

    #[test]
    fn test_r_squared_degenerate_variance() {
        let dataset =
            StepTest::from_pairs(&[(0.0, 2.0), (50.0, 2.0), (100.0, 2.0), (150.0, 2.0)]).unwrap();
        let model = CurveFitter::fit(&dataset).unwrap();
        assert_eq!(
            CurveFitter::r_squared(&dataset, &model).unwrap_err(),
            FitError::DegenerateVariance
        );
    }

    #[test]
    fn test_sample_curve_endpoints() {
        let model = PolynomialModel::new(vec![1.0, 0.0, 0.0]).unwrap();
        let curve = CurveFitter::sample_curve(&model, 0.0, 300.0, 1000).unwrap();

        assert_eq!(curve.len(), 1001);
        assert_eq!(curve.first().unwrap().x, 0.0);
        assert_eq!(curve.last().unwrap().x, 300.0);
        assert_eq!(curve.last().unwrap().y, 90000.0);
        assert!(curve.samples().windows(2).all(|w| w[0].x < w[1].x));
    }

    #[test]
    fn test_sample_curve_single_point_range() {
        let model = PolynomialModel::new(vec![2.0, 1.0]).unwrap();
        let curve = CurveFitter::sample_curve(&model, 5.0, 5.0, 10).unwrap();
        assert_eq!(curve.len(), 11);
        assert!(curve.samples().iter().all(|s| s.x == 5.0 && s.y == 11.0));
    }

    #[test]
    fn test_sample_curve_invalid_range() {
        let model = PolynomialModel::new(vec![1.0]).unwrap();
        assert_eq!(
            CurveFitter::sample_curve(&model, 10.0, 0.0, 100).unwrap_err(),
            FitError::InvalidRange {
                x_min: 10.0,
                x_max: 0.0
            }
        );
        assert!(CurveFitter::sample_curve(&model, 0.0, 10.0, 0).is_err());
        assert!(CurveFitter::sample_curve(&model, f64::NAN, 10.0, 100).is_err());
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_r_squared_never_exceeds_one(
            lactates in prop::collection::vec(0.5f64..12.0, 5..12)
        ) {
            let pairs: Vec<(f64, f64)> = lactates
                .iter()
                .enumerate()
                .map(|(i, &y)| (i as f64 * 25.0, y))
                .collect();
            let dataset = StepTest::from_pairs(&pairs).unwrap();
            let model = CurveFitter::fit(&dataset).unwrap();

            match CurveFitter::r_squared(&dataset, &model) {
                Ok(r2) => prop_assert!(r2 <= 1.0 + 1e-12),
                Err(e) => prop_assert_eq!(e, FitError::DegenerateVariance),
            }
        }

        #[test]
        fn test_exact_cubics_are_recovered(
            a in 0.1f64..2.0,
            b in -3.0f64..3.0,
            c in -5.0f64..5.0,
            d in 100.0f64..110.0,
        ) {
            let f = cubic(a, b, c, d);
            let pairs: Vec<(f64, f64)> = (0..6).map(|i| (i as f64, f(i as f64))).collect();
            let dataset = StepTest::from_pairs(&pairs).unwrap();
            let model = CurveFitter::fit(&dataset).unwrap();

            for (actual, expected) in model.coefficients().iter().zip([a, b, c, d]) {
                prop_assert!((actual - expected).abs() <= 1e-9 * expected.abs().max(1.0));
            }
        }
    }
}
