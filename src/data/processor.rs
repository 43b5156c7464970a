//! Merge & Derive Module
//! Joins the three trip tables on their time-bucket keys and derives per-row quantities.
//!
//! Every operation takes a frame by reference and returns a new one; inputs are never
//! mutated.

use crate::data::loader::{
    TripTables, DROPOFF_TRACT, PICKUP_HOUR, PICKUP_MONTH, PICKUP_TRACT, TIME_KEYS, WEEKDAY_INDEX,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// First `pickup_month` value treated as a sentinel rather than a real month.
pub const SENTINEL_MONTH: i64 = 13;

pub const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Month window must end within 1..=12, got {0}")]
    InvalidMonthWindow(i64),
}

/// Point-size weights used to tell day hours (4..=18) from night hours on charts.
///
/// The merged-row view and the weekday view use different pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayWeights {
    pub day: i64,
    pub night: i64,
}

impl DisplayWeights {
    /// Weights attached to merged rows.
    pub const MERGED: DisplayWeights = DisplayWeights { day: 50, night: 10 };
    /// Weights attached to weekday aggregates.
    pub const WEEKDAY: DisplayWeights = DisplayWeights { day: 70, night: 30 };

    pub fn for_hour(&self, hour: i64) -> i64 {
        if (4..=18).contains(&hour) {
            self.day
        } else {
            self.night
        }
    }
}

/// Upper bound on `pickup_month`, applied to each source table before joining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    pub through: i64,
}

impl MonthWindow {
    /// January through September.
    pub const JAN_SEP: MonthWindow = MonthWindow { through: 9 };

    pub fn new(through: i64) -> Result<Self, ProcessorError> {
        if !(1..=12).contains(&through) {
            return Err(ProcessorError::InvalidMonthWindow(through));
        }
        Ok(Self { through })
    }

    pub fn apply(&self, tables: &TripTables) -> Result<TripTables, ProcessorError> {
        let restrict = |df: &DataFrame| -> Result<DataFrame, ProcessorError> {
            Ok(df
                .clone()
                .lazy()
                .filter(col(PICKUP_MONTH).lt_eq(lit(self.through)))
                .collect()?)
        };
        Ok(TripTables {
            single_realized: restrict(&tables.single_realized)?,
            shared_realized: restrict(&tables.shared_realized)?,
            shared_requested: restrict(&tables.shared_requested)?,
        })
    }
}

/// Weekday name for an index 0 (Monday) ..= 6 (Sunday).
pub fn weekday_name(index: i64) -> Option<&'static str> {
    usize::try_from(index)
        .ok()
        .and_then(|i| WEEKDAY_NAMES.get(i))
        .copied()
}

/// Indices 0..=4 are weekdays; anything else is weekend.
pub fn is_weekday_index(index: i64) -> bool {
    (0..=4).contains(&index)
}

/// `numerator / denominator`, NaN when the denominator is zero.
pub fn ratio(numerator: Expr, denominator: Expr) -> Expr {
    when(denominator.clone().eq(lit(0.0)))
        .then(lit(f64::NAN))
        .otherwise(numerator / denominator)
}

pub(crate) fn i64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>, PolarsError> {
    Ok(df.column(name)?.i64()?.into_iter().collect())
}

/// Column values as `f64`, nulls as NaN.
pub(crate) fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<f64>, PolarsError> {
    let floats = df.column(name)?.cast(&DataType::Float64)?;
    Ok(floats
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

fn count(kind: &str) -> Expr {
    col(format!("count_{kind}").as_str())
}

/// Handles merging of trip tables and per-row derivations.
pub struct DataProcessor;

impl DataProcessor {
    /// Inner-join single-realized, shared-realized and shared-requested tables on
    /// (`pickup_hour`, `calendar_day`, `weekday_index`, `pickup_month`).
    ///
    /// Buckets missing from any table are dropped; an empty result is not an error.
    pub fn merge_trip_tables(tables: &TripTables) -> Result<DataFrame, ProcessorError> {
        let keys: Vec<Expr> = TIME_KEYS.iter().map(|k| col(*k)).collect();
        let merged = tables
            .single_realized
            .clone()
            .lazy()
            .join(
                tables.shared_realized.clone().lazy(),
                keys.clone(),
                keys.clone(),
                JoinArgs::new(JoinType::Inner),
            )
            .join(
                tables.shared_requested.clone().lazy(),
                keys.clone(),
                keys,
                JoinArgs::new(JoinType::Inner),
            )
            .collect()?;

        info!(
            component = "processor",
            event = "tables.merged",
            single_realized = tables.single_realized.height(),
            shared_realized = tables.shared_realized.height(),
            shared_requested = tables.shared_requested.height(),
            merged = merged.height()
        );
        Ok(merged)
    }

    /// `trip_minutes_<kind> = trip_seconds_<kind> / 60` for both realized kinds.
    pub fn with_trip_minutes(df: &DataFrame) -> Result<DataFrame, ProcessorError> {
        let exprs: Vec<Expr> = ["single_realized", "shared_realized"]
            .iter()
            .map(|kind| {
                (col(format!("trip_seconds_{kind}").as_str()) / lit(60.0))
                    .alias(format!("trip_minutes_{kind}"))
            })
            .collect();
        Ok(df.clone().lazy().with_columns(exprs).collect()?)
    }

    /// Adds `count_total`, `requested_per`, `realized_per` and `realized_per2`.
    pub fn with_share_rates(df: &DataFrame) -> Result<DataFrame, ProcessorError> {
        let total = count("single_realized") + count("shared_realized");
        let rates = df
            .clone()
            .lazy()
            .with_column(total.alias("count_total"))
            .with_columns([
                (ratio(count("shared_requested"), col("count_total")) * lit(100.0))
                    .alias("requested_per"),
                (ratio(count("shared_realized"), col("count_total")) * lit(100.0))
                    .alias("realized_per"),
                (ratio(count("shared_realized"), count("shared_requested")) * lit(100.0))
                    .alias("realized_per2"),
            ])
            .collect()?;
        Ok(rates)
    }

    /// Adds `weekday` (Monday..Sunday) and `weekday_weekend` from `weekday_index`.
    pub fn with_weekday_labels(df: &DataFrame) -> Result<DataFrame, ProcessorError> {
        let days = i64_values(df, WEEKDAY_INDEX)?;
        let weekday: Vec<Option<&str>> = days.iter().map(|d| d.and_then(weekday_name)).collect();
        let weekday_weekend: Vec<&str> = days
            .iter()
            .map(|d| match d {
                Some(index) if is_weekday_index(*index) => "Weekday",
                _ => "Weekend",
            })
            .collect();

        let mut out = df.clone();
        out.with_column(Column::new("weekday".into(), weekday))?;
        out.with_column(Column::new("weekday_weekend".into(), weekday_weekend))?;
        Ok(out)
    }

    /// Adds the `d_or_n` display weight column.
    pub fn with_day_night_weight(
        df: &DataFrame,
        weights: DisplayWeights,
    ) -> Result<DataFrame, ProcessorError> {
        let weight: Vec<Option<i64>> = i64_values(df, PICKUP_HOUR)?
            .into_iter()
            .map(|hour| Some(weights.for_hour(hour.unwrap_or(-1))))
            .collect();
        let mut out = df.clone();
        out.with_column(Column::new("d_or_n".into(), weight))?;
        Ok(out)
    }

    /// Drops rows whose `pickup_month` is the sentinel value (13 or above).
    pub fn exclude_sentinel_months(df: &DataFrame) -> Result<DataFrame, ProcessorError> {
        let kept = df
            .clone()
            .lazy()
            .filter(col(PICKUP_MONTH).lt(lit(SENTINEL_MONTH)))
            .collect()?;
        if kept.height() != df.height() {
            debug!(
                component = "processor",
                dropped = df.height() - kept.height(),
                "excluded sentinel months"
            );
        }
        Ok(kept)
    }

    /// Joins shared-realized and single-realized tract tables.
    ///
    /// Shared rows are restricted to Monday..Thursday plus Friday up to 14:00.
    /// Adds `count_total` and the `OD` tract-pair identifier.
    pub fn merge_tract_trips(
        shared_realized: &DataFrame,
        single_realized: &DataFrame,
    ) -> Result<DataFrame, ProcessorError> {
        let shared = shared_realized
            .clone()
            .lazy()
            .filter(
                col(WEEKDAY_INDEX).lt(lit(4)).or(col(WEEKDAY_INDEX)
                    .eq(lit(4))
                    .and(col(PICKUP_HOUR).lt_eq(lit(14)))),
            );

        let keys: Vec<Expr> = [PICKUP_TRACT, DROPOFF_TRACT]
            .iter()
            .chain(TIME_KEYS.iter())
            .map(|k| col(*k))
            .collect();

        let mut merged = single_realized
            .clone()
            .lazy()
            .join(shared, keys.clone(), keys, JoinArgs::new(JoinType::Inner))
            .with_column(
                (count("shared_realized") + count("single_realized")).alias("count_total"),
            )
            .collect()?;

        let pickups = i64_values(&merged, PICKUP_TRACT)?;
        let dropoffs = i64_values(&merged, DROPOFF_TRACT)?;
        let od: Vec<Option<String>> = pickups
            .iter()
            .zip(dropoffs.iter())
            .map(|(p, d)| match (p, d) {
                (Some(p), Some(d)) => Some(format!("{p}{d}")),
                _ => None,
            })
            .collect();
        merged.with_column(Column::new("OD".into(), od))?;

        info!(
            component = "processor",
            event = "tracts.merged",
            rows = merged.height()
        );
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekday_names_cover_the_week() {
        assert_eq!(weekday_name(0), Some("Monday"));
        assert_eq!(weekday_name(6), Some("Sunday"));
        assert_eq!(weekday_name(7), None);
        assert_eq!(weekday_name(-1), None);
    }

    #[test]
    fn weekday_weekend_split() {
        assert!((0..=4).all(is_weekday_index));
        assert!(!is_weekday_index(5));
        assert!(!is_weekday_index(6));
    }

    #[test]
    fn day_night_weights_differ_per_view() {
        assert_eq!(DisplayWeights::MERGED.for_hour(3), 10);
        assert_eq!(DisplayWeights::MERGED.for_hour(4), 50);
        assert_eq!(DisplayWeights::MERGED.for_hour(18), 50);
        assert_eq!(DisplayWeights::MERGED.for_hour(19), 10);
        assert_eq!(DisplayWeights::WEEKDAY.for_hour(12), 70);
        assert_eq!(DisplayWeights::WEEKDAY.for_hour(23), 30);
    }

    #[test]
    fn month_window_rejects_out_of_range() {
        assert!(MonthWindow::new(0).is_err());
        assert!(MonthWindow::new(13).is_err());
        assert_eq!(MonthWindow::new(9).unwrap(), MonthWindow::JAN_SEP);
    }

    #[test]
    fn share_rates_are_nan_on_zero_denominator() {
        let df = df!(
            "count_single_realized" => [10.0, 0.0],
            "count_shared_realized" => [5.0, 0.0],
            "count_shared_requested" => [8.0, 0.0]
        )
        .unwrap();
        let out = DataProcessor::with_share_rates(&df).unwrap();

        let total = out.column("count_total").unwrap().f64().unwrap();
        assert_eq!(total.get(0), Some(15.0));

        let requested = out.column("requested_per").unwrap().f64().unwrap();
        assert!((requested.get(0).unwrap() - 800.0 / 15.0).abs() < 1e-9);
        assert!(requested.get(1).unwrap().is_nan());

        let realized2 = out.column("realized_per2").unwrap().f64().unwrap();
        assert!((realized2.get(0).unwrap() - 62.5).abs() < 1e-9);
        assert!(realized2.get(1).unwrap().is_nan());
    }

    #[test]
    fn labels_and_weights_are_added() {
        let df = df!(
            "pickup_hour" => [3i64, 12],
            "weekday_index" => [0i64, 6]
        )
        .unwrap();
        let labelled = DataProcessor::with_weekday_labels(&df).unwrap();
        let weighted =
            DataProcessor::with_day_night_weight(&labelled, DisplayWeights::MERGED).unwrap();

        let weekday = weighted.column("weekday").unwrap().str().unwrap();
        assert_eq!(weekday.get(0), Some("Monday"));
        assert_eq!(weekday.get(1), Some("Sunday"));

        let kind = weighted.column("weekday_weekend").unwrap().str().unwrap();
        assert_eq!(kind.get(0), Some("Weekday"));
        assert_eq!(kind.get(1), Some("Weekend"));

        let weight = weighted.column("d_or_n").unwrap().i64().unwrap();
        assert_eq!(weight.get(0), Some(10));
        assert_eq!(weight.get(1), Some(50));
        // input untouched
        assert_eq!(df.width(), 2);
    }

    #[test]
    fn sentinel_months_are_excluded() {
        let df = df!("pickup_month" => [1i64, 12, 13, 14]).unwrap();
        let kept = DataProcessor::exclude_sentinel_months(&df).unwrap();
        assert_eq!(kept.height(), 2);
    }
}
