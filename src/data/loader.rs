//! Trip Table Loader Module
//! Resolves aggregated trip CSV paths and loads them with Polars.
//!
//! Every table leaves this module in the same normalized shape:
//! - `pickup_day` becomes `weekday_index`, `pickup_date` becomes `calendar_day`
//! - time keys are `Int64` (`calendar_day` is `String`), tract ids are `Int64`
//! - every other column is `Float64` and carries the trip-kind suffix

use polars::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const PICKUP_HOUR: &str = "pickup_hour";
pub const PICKUP_MONTH: &str = "pickup_month";
/// Weekday index 0 (Monday) ..= 6 (Sunday). Source column: `pickup_day`.
pub const WEEKDAY_INDEX: &str = "weekday_index";
/// Calendar day of the bucket. Source column: `pickup_date`.
pub const CALENDAR_DAY: &str = "calendar_day";
pub const PICKUP_TRACT: &str = "Pickup Census Tract";
pub const DROPOFF_TRACT: &str = "Dropoff Census Tract";

/// Join keys shared by all three trip tables.
pub const TIME_KEYS: [&str; 4] = [PICKUP_HOUR, CALENDAR_DAY, WEEKDAY_INDEX, PICKUP_MONTH];

const SOURCE_WEEKDAY: &str = "pickup_day";
const SOURCE_CALENDAR_DAY: &str = "pickup_date";

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Trip table not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to load CSV {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },
    #[error("{} is missing required column `{column}`", .path.display())]
    MissingColumn { path: PathBuf, column: String },
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// The three trip populations the pipeline joins together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TripKind {
    SingleRealized,
    SharedRealized,
    SharedRequested,
}

impl TripKind {
    /// File-name mode component.
    pub fn mode(self) -> &'static str {
        match self {
            TripKind::SingleRealized => "single",
            TripKind::SharedRealized | TripKind::SharedRequested => "shared",
        }
    }

    /// File-name data-type component.
    pub fn type_of_data(self) -> &'static str {
        match self {
            TripKind::SingleRealized | TripKind::SharedRealized => "realized",
            TripKind::SharedRequested => "requested",
        }
    }

    /// Column suffix, e.g. `count_shared_realized`.
    pub fn suffix(self) -> &'static str {
        match self {
            TripKind::SingleRealized => "single_realized",
            TripKind::SharedRealized => "shared_realized",
            TripKind::SharedRequested => "shared_requested",
        }
    }

    pub fn is_realized(self) -> bool {
        !matches!(self, TripKind::SharedRequested)
    }

    /// Columns that must be present after suffixing.
    pub fn required_columns(self) -> Vec<String> {
        let mut cols = vec![format!("count_{}", self.suffix())];
        if self.is_realized() {
            for metric in ["fare_total", "trip_miles", "trip_seconds"] {
                cols.push(format!("{}_{}", metric, self.suffix()));
            }
        }
        cols
    }
}

impl fmt::Display for TripKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Spatial granularity of a pre-aggregated file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Granularity {
    /// `{mode}_trips_df_{type}_agg.csv`
    #[default]
    Aggregate,
    /// `{mode}_trips_df_{type}_agg_tract.csv`, keyed additionally by census tract pair.
    Tract,
}

impl Granularity {
    fn file_suffix(self) -> &'static str {
        match self {
            Granularity::Aggregate => "_agg.csv",
            Granularity::Tract => "_agg_tract.csv",
        }
    }
}

/// Single-realized, shared-realized and shared-requested tables for one folder/region.
#[derive(Debug, Clone)]
pub struct TripTables {
    pub single_realized: DataFrame,
    pub shared_realized: DataFrame,
    pub shared_requested: DataFrame,
}

impl TripTables {
    pub fn get(&self, kind: TripKind) -> &DataFrame {
        match kind {
            TripKind::SingleRealized => &self.single_realized,
            TripKind::SharedRealized => &self.shared_realized,
            TripKind::SharedRequested => &self.shared_requested,
        }
    }
}

/// Resolves and loads trip tables under a data folder.
#[derive(Debug, Clone)]
pub struct DataLoader {
    folder: PathBuf,
    region: Option<String>,
}

impl DataLoader {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            region: None,
        }
    }

    /// Restrict loading to `folder/region`.
    pub fn with_region(mut self, region: Option<impl Into<String>>) -> Self {
        self.region = region.map(Into::into);
        self
    }

    /// Build `folder[/region]/{mode}_trips_df_{type}{_agg|_agg_tract}.csv`.
    pub fn resolve_path(&self, kind: TripKind, granularity: Granularity) -> PathBuf {
        let mut path = self.folder.clone();
        if let Some(region) = &self.region {
            path.push(region);
        }
        path.push(format!(
            "{}_trips_df_{}{}",
            kind.mode(),
            kind.type_of_data(),
            granularity.file_suffix()
        ));
        path
    }

    /// Load and normalize one trip table.
    pub fn load(&self, kind: TripKind, granularity: Granularity) -> Result<DataFrame, LoaderError> {
        let path = self.resolve_path(kind, granularity);
        load_csv(&path, kind, granularity)
    }

    /// Load all three aggregate tables.
    pub fn load_trip_tables(&self) -> Result<TripTables, LoaderError> {
        Ok(TripTables {
            single_realized: self.load(TripKind::SingleRealized, Granularity::Aggregate)?,
            shared_realized: self.load(TripKind::SharedRealized, Granularity::Aggregate)?,
            shared_requested: self.load(TripKind::SharedRequested, Granularity::Aggregate)?,
        })
    }
}

/// Load a CSV file using Polars and normalize it for `kind`.
pub fn load_csv(path: &Path, kind: TripKind, granularity: Granularity) -> Result<DataFrame, LoaderError> {
    if !path.is_file() {
        return Err(LoaderError::NotFound(path.to_path_buf()));
    }

    let csv_error = |source| LoaderError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let df = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(10000))
        .finish()
        .map_err(csv_error)?
        .collect()
        .map_err(csv_error)?;

    let df = normalize(df, kind, granularity, path)?;
    info!(
        component = "loader",
        event = "table.loaded",
        kind = %kind,
        path = %path.display(),
        rows = df.height(),
        columns = df.width()
    );
    Ok(df)
}

fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn require(names: &[String], column: &str, path: &Path) -> Result<(), LoaderError> {
    if names.iter().any(|n| n == column) {
        Ok(())
    } else {
        Err(LoaderError::MissingColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
        })
    }
}

fn is_tract_column(name: &str) -> bool {
    name == PICKUP_TRACT || name == DROPOFF_TRACT
}

/// Target name of a source column after normalization.
fn normalized_name(name: &str, suffix: &str) -> String {
    match name {
        SOURCE_WEEKDAY => WEEKDAY_INDEX.to_string(),
        SOURCE_CALENDAR_DAY => CALENDAR_DAY.to_string(),
        // Bare metric columns get the kind suffix so the three kinds never collide on join.
        n if TIME_KEYS.contains(&n) || is_tract_column(n) || n.ends_with(suffix) => n.to_string(),
        n => format!("{}_{}", n, suffix),
    }
}

fn normalized_dtype(name: &str) -> DataType {
    match name {
        CALENDAR_DAY => DataType::String,
        n if TIME_KEYS.contains(&n) || is_tract_column(n) => DataType::Int64,
        _ => DataType::Float64,
    }
}

fn normalize(
    df: DataFrame,
    kind: TripKind,
    granularity: Granularity,
    path: &Path,
) -> Result<DataFrame, LoaderError> {
    let names = column_names(&df);
    for column in [PICKUP_HOUR, SOURCE_CALENDAR_DAY, SOURCE_WEEKDAY, PICKUP_MONTH] {
        require(&names, column, path)?;
    }
    if granularity == Granularity::Tract {
        require(&names, PICKUP_TRACT, path)?;
        require(&names, DROPOFF_TRACT, path)?;
    }

    let suffix = kind.suffix();
    let targets: Vec<String> = names.iter().map(|n| normalized_name(n, suffix)).collect();
    for column in kind.required_columns() {
        require(&targets, &column, path)?;
    }

    // Renames and casts run as one projection so the output schema is built from the plan.
    let projection: Vec<Expr> = names
        .iter()
        .zip(targets.iter())
        .map(|(source, target)| {
            if source != target {
                debug!(component = "loader", from = %source, to = %target, "renaming column");
            }
            col(source.as_str())
                .cast(normalized_dtype(target))
                .alias(target.as_str())
        })
        .collect();

    Ok(df.lazy().select(projection).collect()?)
}
