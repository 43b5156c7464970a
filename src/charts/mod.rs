//! Charts module - chart specs and PNG rendering

pub mod plotter;
pub mod renderer;

pub use plotter::{ChartPlotter, ChartSpec, FitMode, PlotError, Preset};
pub use renderer::{PlotStyle, RenderError, StaticChartRenderer};
