//! Chart Plotter Module
//! Turns aggregated tables and fit results into backend-independent chart specs.

use crate::data::loader::{PICKUP_HOUR, WEEKDAY_INDEX};
use crate::data::processor::{f64_values, i64_values, weekday_name};
use crate::stats::interval::{display_hour, Interval, Marker};
use crate::stats::regression::{fit, FitError, FitInput, FitResult, FunctionalForm};
use plotters::style::RGBColor;
use polars::prelude::*;
use thiserror::Error;
use tracing::info;

/// Default scatter colour (matplotlib `C0`).
pub const SCATTER_COLOR: RGBColor = RGBColor(31, 119, 180);
/// Colour of fitted curves on aggregate charts.
pub const FIT_COLOR: RGBColor = RGBColor(0, 0, 0);
/// Colour of the line connecting a weekday's points in hour order.
pub const CONNECT_COLOR: RGBColor = RGBColor(204, 204, 204);

/// Default marker area (pt^2) of scatter points.
pub const DEFAULT_POINT_SIZE: f64 = 36.0;
const SCATTER_ALPHA: f64 = 0.2;

#[derive(Error, Debug)]
pub enum PlotError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Column `{0}` is not present")]
    MissingColumn(String),
    #[error(transparent)]
    Fit(#[from] FitError),
}

/// Display colour of an interval.
pub fn interval_color(interval: Interval) -> RGBColor {
    match interval.color() {
        "blue" => RGBColor(0, 0, 255),
        "orange" => RGBColor(255, 165, 0),
        "green" => RGBColor(0, 128, 0),
        "red" => RGBColor(255, 0, 0),
        _ => SCATTER_COLOR,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointSpec {
    pub x: f64,
    pub y: f64,
    /// Marker area in pt^2.
    pub size: f64,
    pub annotation: Option<String>,
}

/// Points sharing colour, marker and legend label.
#[derive(Debug, Clone)]
pub struct SeriesSpec {
    pub label: Option<String>,
    pub color: RGBColor,
    pub alpha: f64,
    pub marker: Marker,
    /// Draw a black edge around each marker.
    pub outlined: bool,
    pub points: Vec<PointSpec>,
}

#[derive(Debug, Clone)]
pub struct CurveSpec {
    pub color: RGBColor,
    /// Line width in points; `None` uses the style's default width.
    pub width: Option<f64>,
    pub dashed: bool,
    pub points: Vec<(f64, f64)>,
}

/// One plotting area.
#[derive(Debug, Clone, Default)]
pub struct PanelSpec {
    pub title: Option<String>,
    pub series: Vec<SeriesSpec>,
    pub curves: Vec<CurveSpec>,
    /// Draw the series legend inside this panel.
    pub show_legend: bool,
}

#[derive(Debug, Clone)]
pub struct LegendEntry {
    pub label: String,
    pub color: RGBColor,
    pub marker: Marker,
}

/// Everything the renderer needs to draw a figure.
#[derive(Debug, Clone)]
pub struct ChartSpec {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Panel grid as (rows, columns), filled row by row.
    pub grid: (usize, usize),
    pub panels: Vec<PanelSpec>,
    /// Legend drawn in the first unused grid cell.
    pub grid_legend: Vec<LegendEntry>,
    /// Figure size override in inches.
    pub figure_size: Option<(f64, f64)>,
}

impl ChartSpec {
    fn single(title: &str, x_label: &str, y_label: &str, panel: PanelSpec) -> Self {
        Self {
            title: title.to_string(),
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            grid: (1, 1),
            panels: vec![panel],
            grid_legend: Vec::new(),
            figure_size: None,
        }
    }

    /// Finite (x, y) bounds over every point and curve.
    pub fn bounds(&self) -> Option<((f64, f64), (f64, f64))> {
        let mut xs = (f64::INFINITY, f64::NEG_INFINITY);
        let mut ys = (f64::INFINITY, f64::NEG_INFINITY);
        let points = self.panels.iter().flat_map(|panel| {
            panel
                .series
                .iter()
                .flat_map(|s| s.points.iter().map(|p| (p.x, p.y)))
                .chain(panel.curves.iter().flat_map(|c| c.points.iter().copied()))
        });
        for (x, y) in points {
            if x.is_finite() && y.is_finite() {
                xs = (xs.0.min(x), xs.1.max(x));
                ys = (ys.0.min(y), ys.1.max(y));
            }
        }
        xs.0.is_finite().then_some((xs, ys))
    }
}

/// Whether and how a chart overlays a regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitMode {
    /// Scatter only.
    #[default]
    None,
    /// One fitted curve of the given form.
    Form(FunctionalForm),
    /// Interval-interacted sqrt model, one curve per interval.
    Disaggregate,
}

/// Named chart presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Preset {
    /// Willingness-to-share against average trip volume, one panel per weekday.
    WillingnessToShare,
    /// Matched percentage against authorized shared trips.
    MatchRate,
    /// Shared/single fare-per-mile ratio against total trips.
    UnitFareRatio,
}

impl Preset {
    pub fn x_column(self) -> &'static str {
        match self {
            Preset::WillingnessToShare => "count_total_mean",
            Preset::MatchRate => "count_shared_requested_mean",
            Preset::UnitFareRatio => "count_mean_total",
        }
    }

    pub fn y_column(self) -> &'static str {
        match self {
            Preset::WillingnessToShare => "requested_per",
            Preset::MatchRate => "matched_percent",
            Preset::UnitFareRatio => "cost_ratio_mile",
        }
    }

    pub fn x_label(self) -> &'static str {
        match self {
            Preset::WillingnessToShare => "Average number of trips n_a(h,d)",
            Preset::MatchRate => "Number of authorized shared trips n_sa(h,d,m)",
            Preset::UnitFareRatio => "Total number of trips n(h,d,m)",
        }
    }

    pub fn y_label(self) -> &'static str {
        match self {
            Preset::WillingnessToShare => "Willingness-to-share theta_sa(h,d)",
            Preset::MatchRate => "Matched percentage theta_sm(h,d,m)",
            Preset::UnitFareRatio => "Unit fare ratio e_d(h,d,m)",
        }
    }

    /// The weekday preset reads the weekday view; the others read the hour/day/month view.
    pub fn uses_weekday_view(self) -> bool {
        matches!(self, Preset::WillingnessToShare)
    }
}

fn require(df: &DataFrame, name: &str) -> Result<(), PlotError> {
    df.column(name)
        .map(|_| ())
        .map_err(|_| PlotError::MissingColumn(name.to_string()))
}

/// Builds chart specs from aggregated tables.
pub struct ChartPlotter;

impl ChartPlotter {
    /// Build a preset chart. `mode` is ignored by the weekday preset.
    pub fn build_preset(
        preset: Preset,
        df: &DataFrame,
        title: &str,
        mode: FitMode,
    ) -> Result<(ChartSpec, Option<FitResult>), PlotError> {
        let (x, y) = (preset.x_column(), preset.y_column());
        let (x_label, y_label) = (preset.x_label(), preset.y_label());
        info!(component = "plotter", event = "preset.build", preset = ?preset, mode = ?mode);

        if preset.uses_weekday_view() {
            return Ok((Self::weekday_grid(df, x, y, x_label, y_label, title)?, None));
        }

        match mode {
            FitMode::None => Ok((
                Self::period_chart(df, x, y, x_label, y_label, title, None)?,
                None,
            )),
            FitMode::Form(FunctionalForm::IntervalSqrt) | FitMode::Disaggregate => {
                require(df, x)?;
                require(df, y)?;
                let result = fit(FunctionalForm::IntervalSqrt, &FitInput::from_frame(df, x, y)?)?;
                let chart = Self::interval_chart(df, x, y, x_label, y_label, title, &result)?;
                Ok((chart, Some(result)))
            }
            FitMode::Form(form) => {
                require(df, x)?;
                require(df, y)?;
                let result = fit(form, &FitInput::from_frame(df, x, y)?)?;
                let chart =
                    Self::period_chart(df, x, y, x_label, y_label, title, Some(&result))?;
                Ok((chart, Some(result)))
            }
        }
    }

    /// Faint scatter of `y` against `x` with an optional dashed black fit.
    pub fn period_chart(
        df: &DataFrame,
        x: &str,
        y: &str,
        x_label: &str,
        y_label: &str,
        title: &str,
        fitted: Option<&FitResult>,
    ) -> Result<ChartSpec, PlotError> {
        require(df, x)?;
        require(df, y)?;
        let points = f64_values(df, x)?
            .into_iter()
            .zip(f64_values(df, y)?)
            .map(|(x, y)| PointSpec {
                x,
                y,
                size: DEFAULT_POINT_SIZE,
                annotation: None,
            })
            .collect();

        let curves = fitted
            .map(|result| {
                result
                    .curves
                    .iter()
                    .map(|curve| CurveSpec {
                        color: FIT_COLOR,
                        width: Some(3.0),
                        dashed: true,
                        points: curve.points.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let panel = PanelSpec {
            title: None,
            series: vec![SeriesSpec {
                label: None,
                color: SCATTER_COLOR,
                alpha: SCATTER_ALPHA,
                marker: Marker::Circle,
                outlined: false,
                points,
            }],
            curves,
            show_legend: false,
        };
        Ok(ChartSpec::single(title, x_label, y_label, panel))
    }

    /// Scatter per interval in its colour and marker, each with its own fitted line.
    pub fn interval_chart(
        df: &DataFrame,
        x: &str,
        y: &str,
        x_label: &str,
        y_label: &str,
        title: &str,
        fitted: &FitResult,
    ) -> Result<ChartSpec, PlotError> {
        require(df, x)?;
        require(df, y)?;
        require(df, PICKUP_HOUR)?;
        let xs = f64_values(df, x)?;
        let ys = f64_values(df, y)?;
        let hours = i64_values(df, PICKUP_HOUR)?;

        let series = Interval::ALL
            .into_iter()
            .filter_map(|interval| {
                let points: Vec<PointSpec> = xs
                    .iter()
                    .zip(ys.iter())
                    .zip(hours.iter())
                    .filter(|(_, hour)| hour.map(Interval::from_hour) == Some(interval))
                    .map(|((&x, &y), _)| PointSpec {
                        x,
                        y,
                        size: DEFAULT_POINT_SIZE,
                        annotation: None,
                    })
                    .collect();
                (!points.is_empty()).then(|| SeriesSpec {
                    label: Some(interval.label().to_string()),
                    color: interval_color(interval),
                    alpha: SCATTER_ALPHA,
                    marker: interval.marker(),
                    outlined: false,
                    points,
                })
            })
            .collect();

        let curves = fitted
            .curves
            .iter()
            .map(|curve| CurveSpec {
                color: curve.interval.map(interval_color).unwrap_or(FIT_COLOR),
                width: Some(5.0),
                dashed: true,
                points: curve.points.clone(),
            })
            .collect();

        let panel = PanelSpec {
            title: None,
            series,
            curves,
            show_legend: true,
        };
        Ok(ChartSpec::single(title, x_label, y_label, panel))
    }

    /// 4x2 grid with one panel per weekday; point size from `d_or_n`, hour annotations
    /// and a grey line joining the points in row order. The eighth cell holds the legend.
    pub fn weekday_grid(
        df: &DataFrame,
        x: &str,
        y: &str,
        x_label: &str,
        y_label: &str,
        title: &str,
    ) -> Result<ChartSpec, PlotError> {
        for column in [x, y, PICKUP_HOUR, WEEKDAY_INDEX, "d_or_n"] {
            require(df, column)?;
        }
        let xs = f64_values(df, x)?;
        let ys = f64_values(df, y)?;
        let sizes = f64_values(df, "d_or_n")?;
        let hours = i64_values(df, PICKUP_HOUR)?;
        let days = i64_values(df, WEEKDAY_INDEX)?;

        let mut panels = Vec::with_capacity(7);
        for day in 0..7i64 {
            let rows: Vec<usize> = (0..df.height())
                .filter(|&i| days[i] == Some(day))
                .collect();

            let mut series = Vec::new();
            for interval in Interval::ALL {
                let points: Vec<PointSpec> = rows
                    .iter()
                    .filter_map(|&i| {
                        let hour = hours[i]?;
                        (Interval::from_hour(hour) == interval).then(|| PointSpec {
                            x: xs[i],
                            y: ys[i],
                            size: sizes[i],
                            annotation: Some(display_hour(hour).to_string()),
                        })
                    })
                    .collect();
                if !points.is_empty() {
                    series.push(SeriesSpec {
                        label: Some(interval.label().to_string()),
                        color: interval_color(interval),
                        alpha: 1.0,
                        marker: Marker::Circle,
                        outlined: true,
                        points,
                    });
                }
            }

            let connect = CurveSpec {
                color: CONNECT_COLOR,
                width: None,
                dashed: false,
                points: rows.iter().map(|&i| (xs[i], ys[i])).collect(),
            };

            panels.push(PanelSpec {
                title: weekday_name(day).map(str::to_string),
                series,
                curves: vec![connect],
                show_legend: false,
            });
        }

        let grid_legend = Interval::ALL
            .into_iter()
            .map(|interval| LegendEntry {
                label: interval.label().to_string(),
                color: interval_color(interval),
                marker: Marker::Circle,
            })
            .collect();

        Ok(ChartSpec {
            title: title.to_string(),
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            grid: (4, 2),
            panels,
            grid_legend,
            figure_size: Some((10.0, 8.0)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hdm() -> DataFrame {
        df!(
            "pickup_hour" => [2i64, 3, 8, 9, 14, 15, 5, 6],
            "count_shared_requested_mean" => [1.0, 4.0, 9.0, 16.0, 25.0, 36.0, 2.0, 8.0],
            "matched_percent" => [10.0, 14.0, 30.0, 34.0, 45.0, 48.0, 12.0, 20.0]
        )
        .unwrap()
    }

    #[test]
    fn period_chart_with_fit_has_one_dashed_curve() {
        let (chart, result) = ChartPlotter::build_preset(
            Preset::MatchRate,
            &hdm(),
            "Match rate",
            FitMode::Form(FunctionalForm::Sqrt),
        )
        .unwrap();
        assert!(result.is_some());
        assert_eq!(chart.grid, (1, 1));
        let panel = &chart.panels[0];
        assert_eq!(panel.series[0].points.len(), 8);
        assert_eq!(panel.curves.len(), 1);
        assert!(panel.curves[0].dashed);
        assert_eq!(panel.curves[0].color, FIT_COLOR);
    }

    #[test]
    fn scatter_only_without_fit() {
        let (chart, result) =
            ChartPlotter::build_preset(Preset::MatchRate, &hdm(), "t", FitMode::None).unwrap();
        assert!(result.is_none());
        assert!(chart.panels[0].curves.is_empty());
        assert!(chart.bounds().is_some());
    }

    #[test]
    fn disaggregated_chart_groups_by_interval() {
        let (chart, _) =
            ChartPlotter::build_preset(Preset::MatchRate, &hdm(), "t", FitMode::Disaggregate)
                .unwrap();
        let panel = &chart.panels[0];
        let labels: Vec<_> = panel
            .series
            .iter()
            .map(|s| s.label.clone().unwrap())
            .collect();
        assert_eq!(labels, vec!["Night", "AM Peak", "Mid-day", "PM Peak"]);
        assert_eq!(panel.series[1].marker, Marker::Triangle);
        assert_eq!(panel.curves.len(), 4);
        assert_eq!(panel.curves[0].color, RGBColor(0, 0, 255));
    }

    #[test]
    fn missing_column_is_reported() {
        let err = ChartPlotter::build_preset(Preset::UnitFareRatio, &hdm(), "t", FitMode::None)
            .unwrap_err();
        assert!(matches!(err, PlotError::MissingColumn(c) if c == "count_mean_total"));
    }

    #[test]
    fn weekday_grid_has_a_panel_per_day() {
        let df = df!(
            "pickup_hour" => [2i64, 10, 10],
            "weekday_index" => [0i64, 0, 6],
            "count_total_mean" => [5.0, 20.0, 15.0],
            "requested_per" => [12.0, 8.0, 9.0],
            "d_or_n" => [30i64, 70, 70]
        )
        .unwrap();
        let (chart, _) = ChartPlotter::build_preset(
            Preset::WillingnessToShare,
            &df,
            "Willingness",
            FitMode::Disaggregate,
        )
        .unwrap();
        assert_eq!(chart.grid, (4, 2));
        assert_eq!(chart.panels.len(), 7);
        assert_eq!(chart.panels[0].title.as_deref(), Some("Monday"));
        assert_eq!(chart.panels[0].series.len(), 2);
        let night = &chart.panels[0].series[0];
        assert_eq!(night.points[0].size, 30.0);
        assert_eq!(night.points[0].annotation.as_deref(), Some("5"));
        assert!(chart.panels[1].series.is_empty());
        assert_eq!(chart.grid_legend.len(), 4);
    }
}
