//! Ridepool Analytics - shared vs. single ride-hailing trip analysis
//!
//! Loads aggregated trip tables, merges them per time bucket, derives sharing
//! and fare metrics, fits simple regressions and renders charts to PNG.

pub mod charts;
pub mod config;
pub mod data;
pub mod observability;
pub mod stats;

pub use charts::{
    ChartPlotter, ChartSpec, FitMode, PlotError, PlotStyle, Preset, RenderError,
    StaticChartRenderer,
};
pub use config::{AnalysisConfig, ConfigError};
pub use data::{
    DataLoader, DataProcessor, DisplayWeights, Granularity, LoaderError, MonthWindow,
    ProcessorError, TripKind, TripTables,
};
pub use observability::{
    init_logging, logging_config_from_env, LogFormat, LoggingConfig, LoggingInitError,
};
pub use stats::{
    fit, AggregateError, FitError, FitInput, FitResult, FunctionalForm, Interval, TripAggregator,
    WeekdayOptions,
};
