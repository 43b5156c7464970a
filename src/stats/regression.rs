//! Regression Fitter Module
//! Ordinary least squares on transformed variables, with prediction curves for overlays.
//!
//! Supported forms:
//! - `linear`:            y ~ x
//! - `reciprocal`:        y ~ 1/x
//! - `sqrt`:              y ~ sqrt(x)
//! - `log`:               log10(y) ~ log10(x - min(x) + 0.01)
//! - `reciprocal_offset`: y ~ 1/(x - min(x) + 0.01)
//! - `interval_sqrt`:     y ~ sqrt(x) + interval (treatment coding, reference Night
//!                        or the first interval present)

use crate::data::loader::PICKUP_HOUR;
use crate::data::processor::{f64_values, i64_values};
use crate::stats::interval::Interval;
use nalgebra::{DMatrix, DVector};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Shift keeping log/reciprocal arguments positive when `x` reaches its minimum.
pub const MIN_OFFSET: f64 = 0.01;
/// Number of points in each prediction curve.
pub const CURVE_POINTS: usize = 20;

#[derive(Error, Debug)]
pub enum FitError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Column `{0}` is not present")]
    MissingColumn(String),
    #[error("x and y lengths differ ({x} vs {y})")]
    LengthMismatch { x: usize, y: usize },
    #[error("Need at least as many observations as parameters [n: {n}, k: {k}]")]
    InsufficientData { n: usize, k: usize },
    #[error("Design matrix is rank deficient [rank: {rank}, columns: {columns}]")]
    RankDeficient { rank: usize, columns: usize },
    #[error("Interval model needs at least two intervals in the data")]
    SingleCategory,
    #[error("Interval model needs a pickup hour for every observation")]
    MissingIntervals,
    #[error("Failed to solve least squares: {0}")]
    Solve(&'static str),
}

/// Functional form relating the independent variable to the response.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum FunctionalForm {
    #[value(name = "linear")]
    Linear,
    #[value(name = "reciprocal")]
    Reciprocal,
    #[value(name = "sqrt")]
    Sqrt,
    #[value(name = "log")]
    Log,
    #[value(name = "reciprocal_offset")]
    ReciprocalOffset,
    #[value(name = "interval_sqrt")]
    IntervalSqrt,
}

impl FunctionalForm {
    pub fn name(self) -> &'static str {
        match self {
            FunctionalForm::Linear => "linear",
            FunctionalForm::Reciprocal => "reciprocal",
            FunctionalForm::Sqrt => "sqrt",
            FunctionalForm::Log => "log",
            FunctionalForm::ReciprocalOffset => "reciprocal_offset",
            FunctionalForm::IntervalSqrt => "interval_sqrt",
        }
    }

    /// Name of the transformed regressor in the coefficient table.
    fn regressor_name(self) -> &'static str {
        match self {
            FunctionalForm::Linear => "x",
            FunctionalForm::Reciprocal => "1/x",
            FunctionalForm::Sqrt | FunctionalForm::IntervalSqrt => "sqrt(x)",
            FunctionalForm::Log => "log10(x - min + 0.01)",
            FunctionalForm::ReciprocalOffset => "1/(x - min + 0.01)",
        }
    }

    /// Transform applied to `x`; `anchor` is the shift for the offset forms.
    pub fn transform_x(self, x: f64, anchor: f64) -> f64 {
        match self {
            FunctionalForm::Linear => x,
            FunctionalForm::Reciprocal => 1.0 / x,
            FunctionalForm::Sqrt | FunctionalForm::IntervalSqrt => x.sqrt(),
            FunctionalForm::Log => (x - anchor + MIN_OFFSET).log10(),
            FunctionalForm::ReciprocalOffset => 1.0 / (x - anchor + MIN_OFFSET),
        }
    }

    pub fn transform_y(self, y: f64) -> f64 {
        match self {
            FunctionalForm::Log => y.log10(),
            _ => y,
        }
    }

    /// Map a linear predictor back to the response scale.
    pub fn inverse_y(self, value: f64) -> f64 {
        match self {
            FunctionalForm::Log => 10f64.powf(value),
            _ => value,
        }
    }

    /// Shift used when predicting over the plot range.
    ///
    /// The log form anchors at `floor(min x)`, the start of the range, so the first
    /// prediction point stays finite; `reciprocal_offset` keeps the data minimum.
    fn prediction_anchor(self, x_min: f64) -> f64 {
        match self {
            FunctionalForm::Log => x_min.floor(),
            _ => x_min,
        }
    }
}

impl fmt::Display for FunctionalForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Observations handed to the fitter.
#[derive(Debug, Clone, Default)]
pub struct FitInput {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// Interval of each observation, needed by `interval_sqrt`.
    pub intervals: Option<Vec<Interval>>,
}

impl FitInput {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Self {
        Self {
            x,
            y,
            intervals: None,
        }
    }

    pub fn with_intervals(mut self, intervals: Vec<Interval>) -> Self {
        self.intervals = Some(intervals);
        self
    }

    /// Extract `x_col` and `y_col` as floats (nulls become NaN) and, when the frame
    /// has `pickup_hour`, the interval of every row.
    pub fn from_frame(df: &DataFrame, x_col: &str, y_col: &str) -> Result<Self, FitError> {
        let x = float_values(df, x_col)?;
        let y = float_values(df, y_col)?;

        let intervals = if df.column(PICKUP_HOUR).is_ok() {
            i64_values(df, PICKUP_HOUR)?
                .into_iter()
                .map(|hour| hour.map(Interval::from_hour))
                .collect::<Option<Vec<_>>>()
        } else {
            None
        };

        Ok(Self { x, y, intervals })
    }
}

fn float_values(df: &DataFrame, name: &str) -> Result<Vec<f64>, FitError> {
    if df.column(name).is_err() {
        return Err(FitError::MissingColumn(name.to_string()));
    }
    Ok(f64_values(df, name)?)
}

/// Role of a coefficient in the fitted model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Term {
    Intercept,
    Slope,
    IntervalOffset(Interval),
}

#[derive(Debug, Clone)]
pub struct Coefficient {
    pub term: Term,
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    pub t_value: f64,
    pub p_value: f64,
}

/// Prediction points for overlay plotting, one curve per interval for `interval_sqrt`.
#[derive(Debug, Clone)]
pub struct FittedCurve {
    pub interval: Option<Interval>,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone)]
pub struct FitResult {
    pub form: FunctionalForm,
    pub coefficients: Vec<Coefficient>,
    /// Residual mean squared error, `SSR / (n - k)`; NaN when `n == k`.
    pub mse_resid: f64,
    pub r_squared: f64,
    pub n_obs: usize,
    /// Observations dropped because a transformed value was not finite.
    pub dropped: usize,
    pub curves: Vec<FittedCurve>,
}

impl FitResult {
    fn estimate(&self, term: Term) -> Option<f64> {
        self.coefficients
            .iter()
            .find(|c| c.term == term)
            .map(|c| c.estimate)
    }

    pub fn intercept(&self) -> f64 {
        self.estimate(Term::Intercept).unwrap_or(f64::NAN)
    }

    pub fn slope(&self) -> f64 {
        self.estimate(Term::Slope).unwrap_or(f64::NAN)
    }

    /// Intercept shift of `interval` relative to the reference level (0 for the
    /// reference or absent intervals).
    pub fn interval_offset(&self, interval: Interval) -> f64 {
        self.estimate(Term::IntervalOffset(interval)).unwrap_or(0.0)
    }

    /// Predict on the response scale for the plain forms.
    ///
    /// `anchor` is the data minimum used by the offset forms.
    pub fn predict(&self, x: f64, anchor: f64) -> f64 {
        let tx = self.form.transform_x(x, anchor);
        self.form.inverse_y(self.slope() * tx + self.intercept())
    }

    /// Plain-text coefficient table.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "form: {}  n: {}  dropped: {}  mse_resid: {:.6}  r2: {:.4}\n",
            self.form, self.n_obs, self.dropped, self.mse_resid, self.r_squared
        );
        out.push_str(&format!(
            "{:<28}{:>14}{:>14}{:>10}{:>10}\n",
            "term", "coef", "std err", "t", "P>|t|"
        ));
        for c in &self.coefficients {
            out.push_str(&format!(
                "{:<28}{:>14.6}{:>14.6}{:>10.3}{:>10.4}\n",
                c.name, c.estimate, c.std_error, c.t_value, c.p_value
            ));
        }
        out
    }
}

/// `num` evenly spaced points from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (num - 1) as f64;
            (0..num).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Prediction grid from `floor(min x)` to `ceil(max x)` over finite values.
pub fn prediction_range(x: &[f64]) -> Vec<f64> {
    let (min, max) = finite_bounds(x);
    if !min.is_finite() {
        return Vec::new();
    }
    linspace(min.floor(), max.ceil(), CURVE_POINTS)
}

fn finite_bounds(x: &[f64]) -> (f64, f64) {
    x.iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

struct OlsSolution {
    beta: DVector<f64>,
    std_errors: Vec<f64>,
    mse_resid: f64,
    r_squared: f64,
    df_resid: f64,
}

fn solve_ols(design: &DMatrix<f64>, y: &DVector<f64>) -> Result<OlsSolution, FitError> {
    let (n, k) = design.shape();
    if n < k {
        return Err(FitError::InsufficientData { n, k });
    }

    let svd = design.clone().svd(true, true);
    let max_sv = svd.singular_values.max();
    let tol = max_sv * n.max(k) as f64 * f64::EPSILON;
    let rank = svd.rank(tol);
    if rank < k {
        return Err(FitError::RankDeficient { rank, columns: k });
    }
    let beta = svd.solve(y, tol).map_err(FitError::Solve)?;

    let residuals = y - design * &beta;
    let ssr = residuals.norm_squared();
    let df_resid = (n - k) as f64;
    // An exactly identified fit has no residual degrees of freedom.
    let mse_resid = if n > k { ssr / df_resid } else { f64::NAN };

    let y_mean = y.mean();
    let sst: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    let r_squared = if sst > 0.0 { 1.0 - ssr / sst } else { f64::NAN };

    let std_errors = match (design.transpose() * design).try_inverse() {
        Some(inv) => (0..k).map(|i| (mse_resid * inv[(i, i)]).sqrt()).collect(),
        None => vec![f64::NAN; k],
    };

    Ok(OlsSolution {
        beta,
        std_errors,
        mse_resid,
        r_squared,
        df_resid,
    })
}

fn two_sided_p(t: f64, df: f64) -> f64 {
    if !t.is_finite() {
        return f64::NAN;
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => 2.0 * (1.0 - dist.cdf(t.abs())),
        Err(_) => f64::NAN,
    }
}

/// Fit `form` to `input`.
///
/// Rows whose transformed x or y is not finite are dropped first. Rank-deficient
/// designs (e.g. a single distinct x) and single-interval data for
/// `interval_sqrt` are errors. A full-rank design with exactly as many rows as
/// parameters still fits, with NaN residual error and standard errors.
pub fn fit(form: FunctionalForm, input: &FitInput) -> Result<FitResult, FitError> {
    if input.x.len() != input.y.len() {
        return Err(FitError::LengthMismatch {
            x: input.x.len(),
            y: input.y.len(),
        });
    }
    let intervals = match (form, &input.intervals) {
        (FunctionalForm::IntervalSqrt, Some(intervals)) if intervals.len() == input.x.len() => {
            Some(intervals.as_slice())
        }
        (FunctionalForm::IntervalSqrt, _) => return Err(FitError::MissingIntervals),
        _ => None,
    };

    let (x_min, _) = finite_bounds(&input.x);

    let mut rows: Vec<(f64, f64, usize)> = Vec::with_capacity(input.x.len());
    for (i, (&x, &y)) in input.x.iter().zip(input.y.iter()).enumerate() {
        let tx = form.transform_x(x, x_min);
        let ty = form.transform_y(y);
        if tx.is_finite() && ty.is_finite() {
            rows.push((tx, ty, i));
        }
    }
    let dropped = input.x.len() - rows.len();
    if dropped > 0 {
        debug!(component = "regression", form = %form, dropped, "dropped non-finite rows");
    }

    // Column layout: intercept, interval dummies (if any), transformed x last.
    let mut terms = vec![(Term::Intercept, "Intercept".to_string())];
    if let Some(intervals) = intervals {
        let mut present: Vec<Interval> = rows.iter().map(|&(_, _, i)| intervals[i]).collect();
        present.sort();
        present.dedup();
        if present.len() < 2 {
            return Err(FitError::SingleCategory);
        }
        // Night sorts first, so it is the reference level whenever it is present.
        let reference = present[0];
        for level in present.into_iter().filter(|l| *l != reference) {
            terms.push((
                Term::IntervalOffset(level),
                format!("interval[T.{}]", level.label()),
            ));
        }
    }
    terms.push((Term::Slope, form.regressor_name().to_string()));

    let n = rows.len();
    let k = terms.len();
    let design = DMatrix::from_fn(n, k, |r, c| {
        let (tx, _, i) = rows[r];
        match terms[c].0 {
            Term::Intercept => 1.0,
            Term::Slope => tx,
            Term::IntervalOffset(level) => match intervals {
                Some(intervals) if intervals[i] == level => 1.0,
                _ => 0.0,
            },
        }
    });
    let y = DVector::from_iterator(n, rows.iter().map(|&(_, ty, _)| ty));

    let solution = solve_ols(&design, &y)?;

    let coefficients: Vec<Coefficient> = terms
        .into_iter()
        .enumerate()
        .map(|(j, (term, name))| {
            let estimate = solution.beta[j];
            let std_error = solution.std_errors[j];
            let t_value = estimate / std_error;
            Coefficient {
                term,
                name,
                estimate,
                std_error,
                t_value,
                p_value: two_sided_p(t_value, solution.df_resid),
            }
        })
        .collect();

    let mut result = FitResult {
        form,
        coefficients,
        mse_resid: solution.mse_resid,
        r_squared: solution.r_squared,
        n_obs: n,
        dropped,
        curves: Vec::new(),
    };
    result.curves = match intervals {
        Some(intervals) => interval_curves(&result, &input.x, intervals),
        None => {
            let anchor = form.prediction_anchor(x_min);
            let points = prediction_range(&input.x)
                .into_iter()
                .map(|x| (x, result.predict(x, anchor)))
                .collect();
            vec![FittedCurve {
                interval: None,
                points,
            }]
        }
    };

    info!(
        component = "regression",
        event = "fit.completed",
        form = %form,
        n_obs = result.n_obs,
        dropped = result.dropped,
        mse_resid = result.mse_resid,
        r_squared = result.r_squared
    );
    Ok(result)
}

/// One line per interval present, each over that interval's own x range with its
/// own intercept and the shared slope.
fn interval_curves(result: &FitResult, x: &[f64], intervals: &[Interval]) -> Vec<FittedCurve> {
    let slope = result.slope();
    Interval::ALL
        .into_iter()
        .filter_map(|interval| {
            let xs: Vec<f64> = x
                .iter()
                .zip(intervals.iter())
                .filter(|(_, i)| **i == interval)
                .map(|(v, _)| *v)
                .collect();
            if xs.is_empty() {
                return None;
            }
            let intercept = result.intercept() + result.interval_offset(interval);
            let points = prediction_range(&xs)
                .into_iter()
                .map(|v| (v, slope * v.sqrt() + intercept))
                .collect();
            Some(FittedCurve {
                interval: Some(interval),
                points,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn linear_recovers_slope_and_intercept() {
        let x: Vec<f64> = (0..40).map(|i| i as f64 * 0.5).collect();
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, v)| 3.0 * v + 2.0 + if i % 2 == 0 { 0.1 } else { -0.1 })
            .collect();

        let result = fit(FunctionalForm::Linear, &FitInput::new(x, y)).unwrap();
        assert!(close(result.slope(), 3.0, 0.05));
        assert!(close(result.intercept(), 2.0, 0.1));
        assert!(result.mse_resid > 0.0 && result.mse_resid < 0.02);
        assert!(result.r_squared > 0.99);
        assert!(result.coefficients[1].p_value < 1e-6);
    }

    #[test]
    fn log_form_recovers_power() {
        let x: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 5.0 * (v - 1.0 + MIN_OFFSET).powi(2)).collect();

        let result = fit(FunctionalForm::Log, &FitInput::new(x, y)).unwrap();
        assert!(close(result.slope(), 2.0, 1e-9));
        assert!(close(result.intercept(), 5f64.log10(), 1e-9));
    }

    #[test]
    fn curve_spans_floor_min_to_ceil_max() {
        let x = vec![1.4, 2.0, 3.3, 4.8, 6.2];
        let y = vec![2.0, 2.5, 3.1, 3.9, 4.4];
        let result = fit(FunctionalForm::Sqrt, &FitInput::new(x, y)).unwrap();

        assert_eq!(result.curves.len(), 1);
        let points = &result.curves[0].points;
        assert_eq!(points.len(), CURVE_POINTS);
        assert_eq!(points[0].0, 1.0);
        assert!(close(points[CURVE_POINTS - 1].0, 7.0, 1e-12));
        let expected = result.slope() * 7f64.sqrt() + result.intercept();
        assert!(close(points[CURVE_POINTS - 1].1, expected, 1e-12));
    }

    #[test]
    fn reciprocal_offset_predicts_with_data_minimum() {
        let x = vec![2.0, 3.0, 5.0, 8.0, 13.0];
        let y: Vec<f64> = x.iter().map(|v| 4.0 / (v - 2.0 + MIN_OFFSET) + 1.0).collect();
        let result = fit(FunctionalForm::ReciprocalOffset, &FitInput::new(x, y)).unwrap();
        assert!(close(result.slope(), 4.0, 1e-6));
        assert!(close(result.intercept(), 1.0, 1e-6));
        let first = result.curves[0].points[0];
        assert_eq!(first.0, 2.0);
        assert!(close(first.1, 4.0 / MIN_OFFSET + 1.0, 1e-3));
    }

    #[test]
    fn constant_x_is_rank_deficient() {
        let x = vec![3.0; 6];
        let y = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let err = fit(FunctionalForm::Linear, &FitInput::new(x, y)).unwrap_err();
        assert!(matches!(err, FitError::RankDeficient { rank: 1, columns: 2 }));
    }

    #[test]
    fn exactly_identified_fit_has_nan_residual_error() {
        let result =
            fit(FunctionalForm::Linear, &FitInput::new(vec![1.0, 3.0], vec![5.0, 9.0])).unwrap();
        assert!(close(result.slope(), 2.0, 1e-9));
        assert!(close(result.intercept(), 3.0, 1e-9));
        assert!(result.mse_resid.is_nan());
        assert!(result.coefficients[1].std_error.is_nan());
        assert!(result.coefficients[1].p_value.is_nan());
        assert_eq!(result.curves[0].points.len(), CURVE_POINTS);
    }

    #[test]
    fn fewer_rows_than_parameters_is_an_error() {
        let err = fit(FunctionalForm::Linear, &FitInput::new(vec![1.0], vec![1.0])).unwrap_err();
        assert!(matches!(err, FitError::InsufficientData { n: 1, k: 2 }));
    }

    #[test]
    fn non_finite_rows_are_dropped() {
        let x = vec![0.0, 1.0, 2.0, 4.0, 5.0];
        let y = vec![9.0, 5.0, 3.0, f64::NAN, 1.8];
        let result = fit(FunctionalForm::Reciprocal, &FitInput::new(x, y)).unwrap();
        // x = 0 gives an infinite reciprocal and y = NaN is missing
        assert_eq!(result.dropped, 2);
        assert_eq!(result.n_obs, 3);
    }

    #[test]
    fn interval_model_gives_one_line_per_interval() {
        let offsets = [
            (Interval::Night, 0.0),
            (Interval::AmPeak, 1.0),
            (Interval::MidDay, 2.0),
            (Interval::PmPeak, 3.0),
        ];
        let mut input = FitInput::default();
        let mut intervals = Vec::new();
        for (interval, offset) in offsets {
            for step in 1..=5 {
                let x = (step * step) as f64 + offset;
                input.x.push(x);
                input.y.push(1.0 + offset + 2.0 * x.sqrt());
                intervals.push(interval);
            }
        }
        let input = input.with_intervals(intervals);

        let result = fit(FunctionalForm::IntervalSqrt, &input).unwrap();
        assert!(close(result.slope(), 2.0, 1e-9));
        assert!(close(result.intercept(), 1.0, 1e-9));
        assert!(close(result.interval_offset(Interval::PmPeak), 3.0, 1e-9));
        assert_eq!(result.interval_offset(Interval::Night), 0.0);
        // intercept, three dummies, slope last
        assert_eq!(result.coefficients.len(), 5);
        assert_eq!(result.coefficients[4].term, Term::Slope);

        assert_eq!(result.curves.len(), 4);
        let am = result
            .curves
            .iter()
            .find(|c| c.interval == Some(Interval::AmPeak))
            .unwrap();
        assert_eq!(am.points[0].0, 2.0);
        assert!(close(am.points[0].1, 2.0 + 2.0 * 2f64.sqrt(), 1e-9));
    }

    #[test]
    fn interval_model_rejects_single_category() {
        let input = FitInput::new(vec![1.0, 4.0, 9.0, 16.0], vec![1.0, 2.0, 3.0, 4.0])
            .with_intervals(vec![Interval::Night; 4]);
        let err = fit(FunctionalForm::IntervalSqrt, &input).unwrap_err();
        assert!(matches!(err, FitError::SingleCategory));

        let missing = FitInput::new(vec![1.0, 4.0, 9.0], vec![1.0, 2.0, 3.0]);
        let err = fit(FunctionalForm::IntervalSqrt, &missing).unwrap_err();
        assert!(matches!(err, FitError::MissingIntervals));
    }

    #[test]
    fn interval_model_without_night_uses_first_present_level() {
        let mut input = FitInput::default();
        let mut intervals = Vec::new();
        for (interval, offset) in [(Interval::AmPeak, 0.0), (Interval::PmPeak, 4.0)] {
            for step in 1..=4 {
                let x = (step * step) as f64 + offset;
                input.x.push(x);
                input.y.push(3.0 + offset + x.sqrt());
                intervals.push(interval);
            }
        }
        let result = fit(FunctionalForm::IntervalSqrt, &input.with_intervals(intervals)).unwrap();
        assert_eq!(result.coefficients.len(), 3);
        assert!(close(result.intercept(), 3.0, 1e-9));
        assert_eq!(result.interval_offset(Interval::AmPeak), 0.0);
        assert!(close(result.interval_offset(Interval::PmPeak), 4.0, 1e-9));
    }

    #[test]
    fn from_frame_reads_columns_and_intervals() {
        let df = df!(
            "pickup_hour" => [2i64, 8],
            "count_mean_total" => [10i64, 20],
            "cost_ratio_mile" => [Some(0.5), None]
        )
        .unwrap();
        let input = FitInput::from_frame(&df, "count_mean_total", "cost_ratio_mile").unwrap();
        assert_eq!(input.x, vec![10.0, 20.0]);
        assert_eq!(input.y[0], 0.5);
        assert!(input.y[1].is_nan());
        assert_eq!(
            input.intervals,
            Some(vec![Interval::Night, Interval::MidDay])
        );
        assert!(matches!(
            FitInput::from_frame(&df, "missing", "cost_ratio_mile"),
            Err(FitError::MissingColumn(_))
        ));
    }

    #[test]
    fn linspace_endpoints() {
        let pts = linspace(0.0, 19.0, 20);
        assert_eq!(pts.len(), 20);
        assert_eq!(pts[0], 0.0);
        assert_eq!(pts[19], 19.0);
        assert!(prediction_range(&[f64::NAN]).is_empty());
    }
}
