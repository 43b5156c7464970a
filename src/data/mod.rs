//! Data module - CSV loading and merging

pub mod loader;
pub mod processor;

pub use loader::{DataLoader, Granularity, LoaderError, TripKind, TripTables};
pub use processor::{DataProcessor, DisplayWeights, MonthWindow, ProcessorError};
