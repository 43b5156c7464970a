//! Statistics module - aggregation, time-of-day intervals and regression

pub mod aggregator;
pub mod interval;
pub mod regression;

pub use aggregator::{AggregateError, TripAggregator, WeekdayOptions};
pub use interval::{display_hour, Interval, Marker};
pub use regression::{fit, FitError, FitInput, FitResult, FunctionalForm};
