//! Logging setup for the CLI.
//!
//! Settings come from `RIDEPOOL_LOG_*` variables. Logs always go to stderr
//! because tables may be streamed to stdout.

use std::env;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub const LOG_LEVEL_VAR: &str = "RIDEPOOL_LOG_LEVEL";
pub const LOG_FORMAT_VAR: &str = "RIDEPOOL_LOG_FORMAT";
pub const LOG_TARGET_VAR: &str = "RIDEPOOL_LOG_TARGET";

const DEFAULT_DIRECTIVE: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.trim().eq_ignore_ascii_case("json") {
            Ok(LogFormat::Json)
        } else if raw.trim().eq_ignore_ascii_case("pretty") {
            Ok(LogFormat::Pretty)
        } else {
            Err(())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `ridepool_analytics::stats=debug`.
    pub directive: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directive: DEFAULT_DIRECTIVE.to_string(),
            format: LogFormat::default(),
            include_target: true,
        }
    }
}

impl LoggingConfig {
    /// Build from a variable lookup. Blank or unrecognised values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let directive = lookup(LOG_LEVEL_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.directive);
        let format = lookup(LOG_FORMAT_VAR)
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.format);
        let include_target = lookup(LOG_TARGET_VAR)
            .and_then(|v| switch(&v))
            .unwrap_or(defaults.include_target);
        Self {
            directive,
            format,
            include_target,
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
    }
}

fn switch(raw: &str) -> Option<bool> {
    let raw = raw.trim();
    let is = |word: &str| raw.eq_ignore_ascii_case(word);
    if is("1") || is("true") || is("on") || is("yes") {
        Some(true)
    } else if is("0") || is("false") || is("off") || is("no") {
        Some(false)
    } else {
        None
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

pub fn logging_config_from_env() -> LoggingConfig {
    LoggingConfig::from_lookup(|key| env::var(key).ok())
}

/// Install the global subscriber writing to stderr.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.filter())
        .with_target(config.include_target)
        .with_writer(std::io::stderr);

    match config.format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(builder.with_ansi(false).json().finish())?
        }
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
    }
    Ok(())
}

pub fn log_run_start(config: &LoggingConfig, command: &str, folder: &Path, region: Option<&str>) {
    info!(
        component = "cli",
        event = "run.start",
        command,
        folder = %folder.display(),
        region = region.unwrap_or("-"),
        log_directive = %config.directive,
        log_format = ?config.format
    );
}

pub fn log_output_written(path: &Path, rows: usize) {
    info!(
        component = "cli",
        event = "output.written",
        path = %path.display(),
        rows
    );
}
