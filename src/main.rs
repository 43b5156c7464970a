//! Ridepool Analytics - command-line driver
//!
//! Builds the hour/day/month and weekday tables, the tract merge, regression
//! summaries and chart PNGs from a folder of aggregated trip CSV files.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use polars::prelude::*;
use ridepool_analytics::charts::{ChartPlotter, FitMode, Preset, StaticChartRenderer};
use ridepool_analytics::data::{DataProcessor, Granularity, MonthWindow, TripKind};
use ridepool_analytics::observability::{
    init_logging, log_output_written, log_run_start, logging_config_from_env,
};
use ridepool_analytics::stats::{fit, FitInput, FunctionalForm, TripAggregator};
use ridepool_analytics::AnalysisConfig;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "ridepool_analytics", version, about = "Shared vs. single ride-hailing trip analysis")]
struct Cli {
    /// JSON configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Folder holding the aggregated trip CSV files (overrides the config).
    #[arg(long, global = true)]
    folder: Option<PathBuf>,
    /// Region sub-folder (overrides the config).
    #[arg(long, global = true)]
    region: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Aggregate by hour, weekday and month and write the table as CSV.
    Hdm {
        /// Output file; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Aggregate by hour and weekday and write the table as CSV.
    Weekday {
        /// Keep only months up to this one (1-12) before merging.
        #[arg(long)]
        through_month: Option<i64>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Merge shared and single tract-level tables and write the result as CSV.
    Tract {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Fit a functional form to two columns of the hour/weekday/month table.
    Fit {
        #[arg(long, value_enum)]
        form: FunctionalForm,
        /// Independent variable column.
        #[arg(long)]
        x: String,
        /// Response column.
        #[arg(long)]
        y: String,
    },
    /// Render a preset chart to PNG.
    Plot {
        #[arg(value_enum)]
        preset: Preset,
        /// Overlay a fitted curve of this form.
        #[arg(long, value_enum, conflicts_with = "disaggregate")]
        form: Option<FunctionalForm>,
        /// Overlay one sqrt fit per time-of-day interval.
        #[arg(long)]
        disaggregate: bool,
        /// Restrict the weekday view to months up to this one.
        #[arg(long)]
        through_month: Option<i64>,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        output: PathBuf,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Hdm { .. } => "hdm",
            Command::Weekday { .. } => "weekday",
            Command::Tract { .. } => "tract",
            Command::Fit { .. } => "fit",
            Command::Plot { .. } => "plot",
        }
    }
}

fn month_window(through: Option<i64>) -> Result<Option<MonthWindow>> {
    through
        .map(MonthWindow::new)
        .transpose()
        .context("invalid --through-month")
}

fn write_csv(df: &mut DataFrame, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            CsvWriter::new(file).include_header(true).finish(df)?;
            log_output_written(path, df.height());
        }
        None => {
            CsvWriter::new(io::stdout().lock())
                .include_header(true)
                .finish(df)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging = logging_config_from_env();
    init_logging(&logging)?;

    let config = match &cli.config {
        Some(path) => AnalysisConfig::from_json_file(path)?,
        None => AnalysisConfig::default(),
    }
    .with_overrides(cli.folder.clone(), cli.region.clone());
    log_run_start(
        &logging,
        cli.command.name(),
        &config.folder,
        config.region.as_deref(),
    );

    let loader = config.loader();
    match cli.command {
        Command::Hdm { output } => {
            let tables = loader.load_trip_tables()?;
            let mut hdm = TripAggregator::aggregate_hour_day_month(&tables)?;
            write_csv(&mut hdm, output.as_deref())?;
        }
        Command::Weekday {
            through_month,
            output,
        } => {
            let tables = loader.load_trip_tables()?;
            let options = config.weekday_options(month_window(through_month)?);
            let mut profile = TripAggregator::weekday_profile(&tables, &options)?;
            write_csv(&mut profile, output.as_deref())?;
        }
        Command::Tract { output } => {
            let shared = loader.load(TripKind::SharedRealized, Granularity::Tract)?;
            let single = loader.load(TripKind::SingleRealized, Granularity::Tract)?;
            let mut merged = DataProcessor::merge_tract_trips(&shared, &single)?;
            write_csv(&mut merged, output.as_deref())?;
        }
        Command::Fit { form, x, y } => {
            let tables = loader.load_trip_tables()?;
            let hdm = TripAggregator::aggregate_hour_day_month(&tables)?;
            let input = FitInput::from_frame(&hdm, &x, &y)?;
            let result = fit(form, &input).with_context(|| format!("fitting {y} ~ {x}"))?;
            print!("{}", result.summary());
        }
        Command::Plot {
            preset,
            form,
            disaggregate,
            through_month,
            title,
            output,
        } => {
            let tables = loader.load_trip_tables()?;
            let df = if preset.uses_weekday_view() {
                let options = config.weekday_options(month_window(through_month)?);
                TripAggregator::weekday_profile(&tables, &options)?
            } else {
                TripAggregator::aggregate_hour_day_month(&tables)?
            };

            let mode = match (form, disaggregate) {
                (_, true) => FitMode::Disaggregate,
                (Some(form), false) => FitMode::Form(form),
                (None, false) => FitMode::None,
            };
            let title = title.unwrap_or_else(|| preset.y_label().to_string());
            let (chart, fitted) = ChartPlotter::build_preset(preset, &df, &title, mode)?;
            if let Some(result) = fitted {
                print!("{}", result.summary());
            }

            StaticChartRenderer::new(config.plot_style.clone())
                .render_png(&chart, &output)
                .with_context(|| format!("failed to render {}", output.display()))?;
        }
    }

    Ok(())
}
