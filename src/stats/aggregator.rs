//! Trip Aggregator Module
//! Groups merged trip rows by time bucket and derives rate and ratio metrics.
//!
//! Two views are produced:
//! - hour / weekday / month buckets with fares, unit rates, match and request shares
//! - hour / weekday buckets with trip volume and willingness-to-share

use crate::data::loader::{TripTables, PICKUP_HOUR, PICKUP_MONTH, WEEKDAY_INDEX};
use crate::data::processor::{
    i64_values, ratio, DataProcessor, DisplayWeights, MonthWindow, ProcessorError,
};
use crate::stats::interval::Interval;
use polars::prelude::*;
use thiserror::Error;
use tracing::info;

/// Grouping keys of the hour / weekday / month view.
pub const HDM_KEYS: [&str; 3] = [PICKUP_HOUR, WEEKDAY_INDEX, PICKUP_MONTH];
/// Grouping keys of the weekday view.
pub const WEEKDAY_KEYS: [&str; 3] = [PICKUP_HOUR, "weekday", WEEKDAY_INDEX];

/// First month tagged `post-Oct`.
const POST_OCT_FROM: i64 = 10;

const REALIZED_KINDS: [&str; 2] = ["shared_realized", "single_realized"];
const WEIGHTED_METRICS: [&str; 3] = ["fare_total", "trip_miles", "trip_seconds"];

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error(transparent)]
    Processor(#[from] ProcessorError),
    #[error("Grouping column `{0}` is not present")]
    MissingKey(String),
}

/// Options for the weekday view.
#[derive(Debug, Clone, Copy)]
pub struct WeekdayOptions {
    /// Restrict each source table to months up to this bound before joining.
    pub window: Option<MonthWindow>,
    /// Point sizes attached to merged rows.
    pub merged_weights: DisplayWeights,
    /// Point sizes attached to weekday aggregates.
    pub weekday_weights: DisplayWeights,
}

impl Default for WeekdayOptions {
    fn default() -> Self {
        Self {
            window: None,
            merged_weights: DisplayWeights::MERGED,
            weekday_weights: DisplayWeights::WEEKDAY,
        }
    }
}

fn count(kind: &str) -> Expr {
    col(format!("count_{kind}").as_str())
}

fn total(metric: &str, kind: &str) -> Expr {
    col(format!("{metric}_{kind}_total").as_str())
}

fn sort_exprs(keys: &[&str]) -> Vec<Expr> {
    keys.iter().map(|k| col(*k)).collect()
}

fn check_keys(df: &DataFrame, keys: &[&str]) -> Result<(), AggregateError> {
    for key in keys {
        if df.column(key).is_err() {
            return Err(AggregateError::MissingKey(key.to_string()));
        }
    }
    Ok(())
}

/// Handles grouping and metric derivation.
pub struct TripAggregator;

impl TripAggregator {
    /// Aggregate merged rows by `keys`.
    ///
    /// `*_total` columns are count-weighted sums; `count_*_mean` columns are plain
    /// means of the per-row counts, so `count_mean_total` only equals
    /// `count_total_total / n` when counts are uniform within the group.
    /// Rows are sorted by `keys`. When `pickup_hour` is a key the interval columns
    /// are attached.
    pub fn aggregate_trips(merged: &DataFrame, keys: &[&str]) -> Result<DataFrame, AggregateError> {
        check_keys(merged, keys)?;

        let weighted: Vec<Expr> = WEIGHTED_METRICS
            .iter()
            .flat_map(|metric| {
                REALIZED_KINDS.iter().map(move |kind| {
                    (col(format!("{metric}_{kind}").as_str()) * count(kind))
                        .alias(format!("{metric}_{kind}_total"))
                })
            })
            .collect();

        let mut aggs = Vec::new();
        for kind in ["shared_realized", "shared_requested", "single_realized"] {
            aggs.push(count(kind).sum().alias(format!("count_{kind}_total")));
            aggs.push(count(kind).mean().alias(format!("count_{kind}_mean")));
        }
        for metric in WEIGHTED_METRICS {
            for kind in REALIZED_KINDS {
                aggs.push(total(metric, kind).sum().alias(format!("{metric}_{kind}_total")));
            }
        }

        let mut rates = Vec::new();
        for kind in ["single_realized", "shared_realized"] {
            rates.push(
                (ratio(total("fare_total", kind), total("trip_seconds", kind)) * lit(60.0))
                    .alias(format!("fare_minute_{kind}_mean")),
            );
            rates.push(
                ratio(total("fare_total", kind), total("trip_miles", kind))
                    .alias(format!("fare_mile_{kind}_mean")),
            );
        }

        let out = merged
            .clone()
            .lazy()
            .with_columns(weighted)
            .group_by(sort_exprs(keys))
            .agg(aggs)
            .sort_by_exprs(sort_exprs(keys), SortMultipleOptions::default())
            .with_columns(rates)
            .with_columns([
                (col("count_shared_realized_total") + col("count_single_realized_total"))
                    .alias("count_total_total"),
                (col("count_shared_realized_mean") + col("count_single_realized_mean"))
                    .alias("count_mean_total"),
            ])
            .with_columns([
                (ratio(col("count_shared_requested_total"), col("count_total_total"))
                    * lit(100.0))
                .alias("requested_percent"),
                (ratio(
                    col("count_shared_realized_total"),
                    col("count_shared_requested_total"),
                ) * lit(100.0))
                .alias("matched_percent"),
                ratio(
                    col("fare_minute_shared_realized_mean"),
                    col("fare_minute_single_realized_mean"),
                )
                .alias("cost_ratio_minute"),
                ratio(
                    col("fare_mile_shared_realized_mean"),
                    col("fare_mile_single_realized_mean"),
                )
                .alias("cost_ratio_mile"),
            ])
            .collect()?;

        let out = if keys.contains(&PICKUP_HOUR) {
            Self::with_intervals(&out)?
        } else {
            out
        };

        info!(
            component = "aggregator",
            event = "trips.aggregated",
            keys = ?keys,
            input_rows = merged.height(),
            groups = out.height()
        );
        Ok(out)
    }

    /// Attach `interval`, `colors` and `markers` derived from `pickup_hour`.
    pub fn with_intervals(df: &DataFrame) -> Result<DataFrame, AggregateError> {
        let intervals: Vec<Option<Interval>> = i64_values(df, PICKUP_HOUR)?
            .into_iter()
            .map(|hour| hour.map(Interval::from_hour))
            .collect();

        let labels: Vec<Option<&str>> = intervals.iter().map(|i| i.map(Interval::label)).collect();
        let colors: Vec<Option<&str>> = intervals.iter().map(|i| i.map(Interval::color)).collect();
        let markers: Vec<Option<&str>> = intervals
            .iter()
            .map(|i| i.map(|i| i.marker().code()))
            .collect();

        let mut out = df.clone();
        out.with_column(Column::new("interval".into(), labels))?;
        out.with_column(Column::new("colors".into(), colors))?;
        out.with_column(Column::new("markers".into(), markers))?;
        Ok(out)
    }

    /// Tag each row `post-Oct` when `pickup_month >= 10`, otherwise `pre-Sep`.
    ///
    /// September itself is tagged `pre-Sep`.
    pub fn with_month_class(df: &DataFrame) -> Result<DataFrame, AggregateError> {
        let classes: Vec<&str> = i64_values(df, PICKUP_MONTH)?
            .into_iter()
            .map(|month| match month {
                Some(m) if m >= POST_OCT_FROM => "post-Oct",
                _ => "pre-Sep",
            })
            .collect();
        let mut out = df.clone();
        out.with_column(Column::new("month_class".into(), classes))?;
        Ok(out)
    }

    /// Weekday view: one row per (`pickup_hour`, `weekday`, `weekday_index`).
    ///
    /// Expects merged rows carrying `count_total`, `weekday` and `count_shared_requested`.
    pub fn aggregate_weekday(
        merged: &DataFrame,
        weights: DisplayWeights,
    ) -> Result<DataFrame, AggregateError> {
        check_keys(merged, &WEEKDAY_KEYS)?;

        let out = merged
            .clone()
            .lazy()
            .group_by(sort_exprs(&WEEKDAY_KEYS))
            .agg([
                col("count_total").mean().alias("count_total_mean"),
                col("count_total").sum().alias("count_total_sum"),
                count("shared_requested").sum().alias("count_shared_requested_sum"),
            ])
            .sort_by_exprs(sort_exprs(&WEEKDAY_KEYS), SortMultipleOptions::default())
            .with_column(
                (ratio(col("count_shared_requested_sum"), col("count_total_sum")) * lit(100.0))
                    .alias("requested_per"),
            )
            .collect()?;

        Ok(DataProcessor::with_day_night_weight(&out, weights)?)
    }

    /// Full hour / weekday / month pipeline: merge, trip minutes, aggregate, month class.
    pub fn aggregate_hour_day_month(tables: &TripTables) -> Result<DataFrame, AggregateError> {
        let merged = DataProcessor::merge_trip_tables(tables)?;
        let merged = DataProcessor::with_trip_minutes(&merged)?;
        let hdm = Self::aggregate_trips(&merged, &HDM_KEYS)?;
        Self::with_month_class(&hdm)
    }

    /// Merged rows with share rates, weekday labels and merged-view weights.
    pub fn weekday_rows(
        tables: &TripTables,
        options: &WeekdayOptions,
    ) -> Result<DataFrame, AggregateError> {
        let restricted;
        let tables = match options.window {
            Some(window) => {
                restricted = window.apply(tables)?;
                &restricted
            }
            None => tables,
        };

        let merged = DataProcessor::merge_trip_tables(tables)?;
        let merged = DataProcessor::with_share_rates(&merged)?;
        let merged = DataProcessor::with_weekday_labels(&merged)?;
        Ok(DataProcessor::with_day_night_weight(
            &merged,
            options.merged_weights,
        )?)
    }

    /// Full weekday pipeline: merged rows, sentinel-month filter, weekday aggregation.
    pub fn weekday_profile(
        tables: &TripTables,
        options: &WeekdayOptions,
    ) -> Result<DataFrame, AggregateError> {
        let rows = Self::weekday_rows(tables, options)?;
        let rows = DataProcessor::exclude_sentinel_months(&rows)?;
        Self::aggregate_weekday(&rows, options.weekday_weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merged_group() -> DataFrame {
        df!(
            "pickup_hour" => [8i64, 8, 8, 22],
            "weekday_index" => [1i64, 1, 1, 5],
            "pickup_month" => [3i64, 3, 3, 11],
            "count_single_realized" => [10.0, 20.0, 30.0, 4.0],
            "count_shared_realized" => [2.0, 4.0, 6.0, 1.0],
            "count_shared_requested" => [4.0, 8.0, 12.0, 0.0],
            "fare_total_single_realized" => [10.0, 10.0, 10.0, 20.0],
            "fare_total_shared_realized" => [6.0, 6.0, 6.0, 12.0],
            "trip_miles_single_realized" => [2.0, 2.0, 2.0, 5.0],
            "trip_miles_shared_realized" => [3.0, 3.0, 3.0, 5.0],
            "trip_seconds_single_realized" => [600.0, 600.0, 600.0, 900.0],
            "trip_seconds_shared_realized" => [900.0, 900.0, 900.0, 1200.0]
        )
        .unwrap()
    }

    fn f64_at(df: &DataFrame, name: &str, row: usize) -> f64 {
        df.column(name).unwrap().f64().unwrap().get(row).unwrap()
    }

    #[test]
    fn totals_and_means_of_a_three_row_group() {
        let agg = TripAggregator::aggregate_trips(&merged_group(), &HDM_KEYS).unwrap();
        assert_eq!(agg.height(), 2);

        // hour 8 sorts first
        assert_eq!(f64_at(&agg, "count_single_realized_total", 0), 60.0);
        assert_eq!(f64_at(&agg, "count_single_realized_mean", 0), 20.0);
        assert_eq!(f64_at(&agg, "count_total_total", 0), 72.0);
        // mean of row means: 20 + 4
        assert_eq!(f64_at(&agg, "count_mean_total", 0), 24.0);
        assert_eq!(f64_at(&agg, "fare_total_single_realized_total", 0), 600.0);
        assert_eq!(f64_at(&agg, "trip_seconds_shared_realized_total", 0), 10800.0);
    }

    #[test]
    fn unit_rates_and_ratios() {
        let agg = TripAggregator::aggregate_trips(&merged_group(), &HDM_KEYS).unwrap();

        // 600 fare over 36000 s -> 1.0 per minute; 600 fare over 120 miles -> 5 per mile
        assert!((f64_at(&agg, "fare_minute_single_realized_mean", 0) - 1.0).abs() < 1e-12);
        assert!((f64_at(&agg, "fare_mile_single_realized_mean", 0) - 5.0).abs() < 1e-12);
        // shared: 72 fare over 10800 s -> 0.4 / min; 72 over 36 miles -> 2 / mile
        assert!((f64_at(&agg, "cost_ratio_minute", 0) - 0.4).abs() < 1e-12);
        assert!((f64_at(&agg, "cost_ratio_mile", 0) - 0.4).abs() < 1e-12);
        assert!((f64_at(&agg, "requested_percent", 0) - 24.0 / 72.0 * 100.0).abs() < 1e-9);
        assert!((f64_at(&agg, "matched_percent", 0) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn zero_requests_yield_nan_match_rate() {
        let agg = TripAggregator::aggregate_trips(&merged_group(), &HDM_KEYS).unwrap();
        assert!(f64_at(&agg, "matched_percent", 1).is_nan());
        assert_eq!(f64_at(&agg, "requested_percent", 1), 0.0);
    }

    #[test]
    fn intervals_colors_and_month_class() {
        let agg = TripAggregator::aggregate_trips(&merged_group(), &HDM_KEYS).unwrap();
        let agg = TripAggregator::with_month_class(&agg).unwrap();

        let interval = agg.column("interval").unwrap().str().unwrap();
        assert_eq!(interval.get(0), Some("Mid-day"));
        assert_eq!(interval.get(1), Some("Night"));
        let colors = agg.column("colors").unwrap().str().unwrap();
        assert_eq!(colors.get(1), Some("blue"));
        let markers = agg.column("markers").unwrap().str().unwrap();
        assert_eq!(markers.get(0), Some("s"));
        let class = agg.column("month_class").unwrap().str().unwrap();
        assert_eq!(class.get(0), Some("pre-Sep"));
        assert_eq!(class.get(1), Some("post-Oct"));
    }

    #[test]
    fn no_interval_columns_without_hour_key() {
        let agg = TripAggregator::aggregate_trips(&merged_group(), &[PICKUP_MONTH]).unwrap();
        assert_eq!(agg.height(), 2);
        assert!(agg.column("interval").is_err());
    }

    #[test]
    fn missing_key_is_reported() {
        let err = TripAggregator::aggregate_trips(&merged_group(), &["pickup_minute"]).unwrap_err();
        assert!(matches!(err, AggregateError::MissingKey(k) if k == "pickup_minute"));
    }

    #[test]
    fn empty_input_gives_empty_output() {
        let empty = merged_group().head(Some(0));
        let agg = TripAggregator::aggregate_trips(&empty, &HDM_KEYS).unwrap();
        assert_eq!(agg.height(), 0);
    }

    #[test]
    fn weekday_view_sums_means_and_weights() {
        let rows = df!(
            "pickup_hour" => [8i64, 8, 2],
            "weekday" => ["Monday", "Monday", "Monday"],
            "weekday_index" => [0i64, 0, 0],
            "count_total" => [10.0, 30.0, 5.0],
            "count_shared_requested" => [4.0, 6.0, 0.0]
        )
        .unwrap();
        let out = TripAggregator::aggregate_weekday(&rows, DisplayWeights::WEEKDAY).unwrap();
        assert_eq!(out.height(), 2);

        // hour 2 sorts first
        assert_eq!(f64_at(&out, "count_total_mean", 1), 20.0);
        assert_eq!(f64_at(&out, "count_total_sum", 1), 40.0);
        assert_eq!(f64_at(&out, "requested_per", 1), 25.0);
        assert_eq!(f64_at(&out, "requested_per", 0), 0.0);

        let weight = out.column("d_or_n").unwrap().i64().unwrap();
        assert_eq!(weight.get(0), Some(30));
        assert_eq!(weight.get(1), Some(70));
    }
}
