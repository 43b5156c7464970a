//! Static Chart Renderer
//! Draws a `ChartSpec` to a PNG file with the plotters bitmap backend.
//!
//! Layout:
//! 1. Figure title centered at the top
//! 2. Panels filled row by row in the chart's grid, sharing axis ranges
//! 3. Per-panel series legend, or a legend in the first free grid cell

use crate::charts::plotter::{ChartSpec, CurveSpec, LegendEntry, PanelSpec, SeriesSpec};
use crate::stats::interval::Marker;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Dash and gap lengths of dashed curves, in points.
const DASH_PT: f64 = 6.0;
const GAP_PT: f64 = 4.0;
const MARGIN_PT: f64 = 6.0;
/// Fraction of the data span added on each side of an axis.
const AXIS_PAD: f64 = 0.05;

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;
type Chart<'a, 'b> =
    ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Chart `{0}` has no finite points to draw")]
    EmptyChart(String),
    #[error("Invalid plot style: {0}")]
    InvalidStyle(String),
    #[error("Drawing failed: {0}")]
    Draw(String),
}

fn draw_err<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Draw(e.to_string())
}

/// Fonts, sizes and resolution used for every figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotStyle {
    pub font_family: String,
    /// Point sizes.
    pub title_size: f64,
    pub label_size: f64,
    pub tick_size: f64,
    /// Width and height in inches.
    pub figure_size: (f64, f64),
    pub dpi: u32,
    /// Default line width in points.
    pub line_width: f64,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            font_family: "serif".to_string(),
            title_size: 14.0,
            label_size: 14.0,
            tick_size: 10.0,
            figure_size: (8.0, 6.0),
            dpi: 200,
            line_width: 1.5,
        }
    }
}

impl PlotStyle {
    pub fn validate(&self) -> Result<(), RenderError> {
        let (w, h) = self.figure_size;
        if !(w > 0.0 && h > 0.0) {
            return Err(RenderError::InvalidStyle(format!(
                "figure size must be positive, got {w}x{h}"
            )));
        }
        if self.dpi == 0 {
            return Err(RenderError::InvalidStyle("dpi must be positive".to_string()));
        }
        Ok(())
    }

    /// Convert a length in points to pixels at this style's dpi.
    pub fn pt_to_px(&self, pt: f64) -> f64 {
        pt * self.dpi as f64 / 72.0
    }

    fn px(&self, pt: f64) -> u32 {
        self.pt_to_px(pt).round().max(1.0) as u32
    }

    /// Bitmap size of a figure measured in inches.
    pub fn pixel_size(&self, inches: (f64, f64)) -> (u32, u32) {
        let dpi = self.dpi as f64;
        ((inches.0 * dpi).round() as u32, (inches.1 * dpi).round() as u32)
    }

    /// Radius in pixels of a marker with area `size` in pt^2.
    pub fn marker_radius(&self, size: f64) -> u32 {
        self.px(size.max(0.0).sqrt() / 2.0)
    }

    fn font(&self, pt: f64) -> FontDesc<'_> {
        FontDesc::new(
            FontFamily::from(self.font_family.as_str()),
            self.pt_to_px(pt),
            FontStyle::Normal,
        )
    }
}

/// Pad `[lo, hi]` on both sides; degenerate spans widen to one unit each way.
fn padded(lo: f64, hi: f64) -> Range<f64> {
    let span = hi - lo;
    if span <= f64::EPSILON * hi.abs().max(1.0) {
        return (lo - 1.0)..(hi + 1.0);
    }
    (lo - span * AXIS_PAD)..(hi + span * AXIS_PAD)
}

pub struct StaticChartRenderer {
    style: PlotStyle,
}

impl StaticChartRenderer {
    pub fn new(style: PlotStyle) -> Self {
        Self { style }
    }

    /// Render `figure` to a PNG at `path`.
    pub fn render_png(&self, figure: &ChartSpec, path: &Path) -> Result<(), RenderError> {
        self.style.validate()?;
        let ((x0, x1), (y0, y1)) = figure
            .bounds()
            .ok_or_else(|| RenderError::EmptyChart(figure.title.clone()))?;
        let (x_range, y_range) = (padded(x0, x1), padded(y0, y1));

        let size = self
            .style
            .pixel_size(figure.figure_size.unwrap_or(self.style.figure_size));
        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;
        let body = root
            .titled(&figure.title, self.style.font(self.style.title_size))
            .map_err(draw_err)?;

        let (rows, cols) = figure.grid;
        let cells = body.split_evenly((rows.max(1), cols.max(1)));
        for (i, cell) in cells.iter().enumerate() {
            let (row, col) = (i / cols.max(1), i % cols.max(1));
            if let Some(panel) = figure.panels.get(i) {
                let labels = (row + 1 == rows || i + cols >= figure.panels.len(), col == 0);
                self.draw_panel(cell, figure, panel, &x_range, &y_range, labels)?;
            } else if i == figure.panels.len() && !figure.grid_legend.is_empty() {
                self.draw_grid_legend(cell, &figure.grid_legend)?;
            }
        }

        root.present().map_err(draw_err)?;
        info!(
            component = "renderer",
            event = "render.done",
            path = %path.display(),
            width = size.0,
            height = size.1,
            panels = figure.panels.len()
        );
        Ok(())
    }

    /// `labels` selects the (x, y) axis descriptions drawn on this panel.
    fn draw_panel(
        &self,
        area: &Area<'_>,
        figure: &ChartSpec,
        panel: &PanelSpec,
        x_range: &Range<f64>,
        y_range: &Range<f64>,
        labels: (bool, bool),
    ) -> Result<(), RenderError> {
        let style = &self.style;
        let mut builder = ChartBuilder::on(area);
        builder
            .margin(style.px(MARGIN_PT))
            .x_label_area_size(style.px(style.tick_size + style.label_size + 8.0))
            .y_label_area_size(style.px(style.tick_size * 3.0 + style.label_size + 8.0));
        if let Some(title) = &panel.title {
            builder.caption(title, style.font(style.label_size));
        }
        let mut chart = builder
            .build_cartesian_2d(x_range.clone(), y_range.clone())
            .map_err(draw_err)?;

        let mut mesh = chart.configure_mesh();
        mesh.disable_mesh()
            .label_style(style.font(style.tick_size))
            .axis_desc_style(style.font(style.label_size));
        if labels.0 {
            mesh.x_desc(figure.x_label.as_str());
        }
        if labels.1 {
            mesh.y_desc(figure.y_label.as_str());
        }
        mesh.draw().map_err(draw_err)?;

        // Connecting lines sit under the points, fitted curves above them.
        for curve in panel.curves.iter().filter(|c| !c.dashed) {
            self.draw_curve(&mut chart, curve)?;
        }
        for series in &panel.series {
            self.draw_series(&mut chart, series)?;
        }
        for curve in panel.curves.iter().filter(|c| c.dashed) {
            self.draw_curve(&mut chart, curve)?;
        }

        if panel.show_legend && panel.series.iter().any(|s| s.label.is_some()) {
            chart
                .configure_series_labels()
                .label_font(style.font(style.tick_size))
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .position(SeriesLabelPosition::UpperLeft)
                .draw()
                .map_err(draw_err)?;
        }
        Ok(())
    }

    fn draw_curve(&self, chart: &mut Chart<'_, '_>, curve: &CurveSpec) -> Result<(), RenderError> {
        let width = curve.width.unwrap_or(self.style.line_width);
        let line = ShapeStyle::from(&curve.color).stroke_width(self.style.px(width));
        let points: Vec<(f64, f64)> = curve
            .points
            .iter()
            .copied()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect();
        if curve.dashed {
            chart
                .draw_series(DashedLineSeries::new(
                    points,
                    self.style.px(DASH_PT),
                    self.style.px(GAP_PT),
                    line,
                ))
                .map_err(draw_err)?;
        } else {
            chart
                .draw_series(LineSeries::new(points, line))
                .map_err(draw_err)?;
        }
        Ok(())
    }

    fn draw_series(&self, chart: &mut Chart<'_, '_>, series: &SeriesSpec) -> Result<(), RenderError> {
        let style = &self.style;
        let fill = series.color.mix(series.alpha).filled();
        let legend_fill = series.color.filled();
        let legend_radius = style.px(3.0) as i32;
        let points: Vec<_> = series
            .points
            .iter()
            .filter(|p| p.x.is_finite() && p.y.is_finite())
            .collect();

        let anno = match series.marker {
            Marker::Circle => chart.draw_series(
                points
                    .iter()
                    .map(|p| Circle::new((p.x, p.y), style.marker_radius(p.size), fill)),
            ),
            Marker::Triangle => chart.draw_series(
                points
                    .iter()
                    .map(|p| TriangleMarker::new((p.x, p.y), style.marker_radius(p.size), fill)),
            ),
            Marker::Square => chart.draw_series(points.iter().map(|p| {
                let r = style.marker_radius(p.size) as i32;
                EmptyElement::at((p.x, p.y)) + Rectangle::new([(-r, -r), (r, r)], fill)
            })),
            Marker::Diamond => chart.draw_series(points.iter().map(|p| {
                let r = style.marker_radius(p.size) as i32;
                EmptyElement::at((p.x, p.y))
                    + Polygon::new(vec![(0, -r), (r, 0), (0, r), (-r, 0)], fill)
            })),
        }
        .map_err(draw_err)?;
        if let Some(label) = &series.label {
            anno.label(label.as_str()).legend(move |(x, y)| {
                Circle::new((x + legend_radius, y), legend_radius, legend_fill)
            });
        }

        if series.outlined {
            chart
                .draw_series(points.iter().map(|p| {
                    Circle::new(
                        (p.x, p.y),
                        style.marker_radius(p.size),
                        BLACK.stroke_width(1),
                    )
                }))
                .map_err(draw_err)?;
        }

        let font = style.font(style.tick_size);
        chart
            .draw_series(points.iter().filter_map(|p| {
                let text = p.annotation.as_deref()?;
                let offset = style.marker_radius(p.size) as i32;
                Some(
                    EmptyElement::at((p.x, p.y))
                        + Text::new(text.to_string(), (offset, -offset * 2), font.clone()),
                )
            }))
            .map_err(draw_err)?;
        Ok(())
    }

    fn draw_grid_legend(&self, area: &Area<'_>, entries: &[LegendEntry]) -> Result<(), RenderError> {
        let style = &self.style;
        let radius = style.px(4.0) as i32;
        let line_height = style.px(style.label_size * 1.6) as i32;
        let (width, height) = area.dim_in_pixel();
        let top = (height as i32 - line_height * entries.len() as i32) / 2;
        let left = width as i32 / 4;

        for (i, entry) in entries.iter().enumerate() {
            let y = top + line_height * i as i32;
            area.draw(
                &(EmptyElement::at((left, y))
                    + Circle::new((0, 0), radius, entry.color.filled())
                    + Circle::new((0, 0), radius, BLACK.stroke_width(1))
                    + Text::new(
                        entry.label.clone(),
                        (radius * 3, -radius),
                        style.font(style.label_size),
                    )),
            )
            .map_err(draw_err)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::plotter::ChartPlotter;
    use polars::prelude::*;

    #[test]
    fn default_style_sizes() {
        let style = PlotStyle::default();
        assert_eq!(style.pixel_size(style.figure_size), (1600, 1200));
        assert_eq!(style.font_family, "serif");
        assert!((style.pt_to_px(72.0) - 200.0).abs() < 1e-9);
        // 36 pt^2 gives a 3 pt radius.
        assert_eq!(style.marker_radius(36.0), 8);
    }

    #[test]
    fn invalid_styles_are_rejected() {
        let style = PlotStyle {
            dpi: 0,
            ..PlotStyle::default()
        };
        assert!(matches!(style.validate(), Err(RenderError::InvalidStyle(_))));
        let style = PlotStyle {
            figure_size: (0.0, 6.0),
            ..PlotStyle::default()
        };
        assert!(style.validate().is_err());
    }

    #[test]
    fn padding_handles_flat_ranges() {
        assert_eq!(padded(2.0, 2.0), 1.0..3.0);
        let r = padded(0.0, 10.0);
        assert!((r.start + 0.5).abs() < 1e-12);
        assert!((r.end - 10.5).abs() < 1e-12);
    }

    #[test]
    fn chart_without_finite_points_is_an_error() {
        let df = df!("x" => [f64::NAN], "y" => [1.0]).unwrap();
        let figure = ChartPlotter::period_chart(&df, "x", "y", "x", "y", "empty", None).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.png");
        let err = StaticChartRenderer::new(PlotStyle::default())
            .render_png(&figure, &path)
            .unwrap_err();
        assert!(matches!(err, RenderError::EmptyChart(t) if t == "empty"));
        assert!(!path.exists());
    }

    #[test]
    fn style_deserializes_with_defaults() {
        let style: PlotStyle = serde_json::from_str(r#"{"dpi": 100}"#).unwrap();
        assert_eq!(style.dpi, 100);
        assert_eq!(style.figure_size, (8.0, 6.0));
    }
}
