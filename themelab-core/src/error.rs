//! Fatal error kinds raised by the core stages.
//!
//! Both enums are displayable in CLI context and carry enough diagnostics
//! (path, existence, row count, column set) to debug a bad input without
//! re-running under a debugger.

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Missing, empty, too-short or malformed market data.
#[derive(Debug, Error)]
pub enum DataIntegrityError {
    #[error("insufficient history for {ticker}: {available} bars on or before {evaluation_date}, {required} required")]
    InsufficientHistory {
        ticker: String,
        evaluation_date: NaiveDate,
        required: usize,
        available: usize,
    },

    #[error("non-finite {field} for {ticker}")]
    NonFinite { ticker: String, field: String },

    #[error("non-positive close {close} for {ticker} on {date}")]
    NonPositiveClose {
        ticker: String,
        date: NaiveDate,
        close: f64,
    },

    #[error("negative volume {volume} for {ticker} on {date}")]
    NegativeVolume {
        ticker: String,
        date: NaiveDate,
        volume: f64,
    },

    #[error("bars for {ticker} are not strictly ascending by date (at {date})")]
    UnorderedBars { ticker: String, date: NaiveDate },

    #[error("missing data file {} (exists={exists})", path.display())]
    MissingFile { path: PathBuf, exists: bool },

    #[error("unreadable data file {} (exists={exists}): {reason}", path.display())]
    Unreadable {
        path: PathBuf,
        exists: bool,
        reason: String,
    },

    #[error("schema mismatch in {} (rows={row_count}, columns={columns:?}): {reason}", path.display())]
    Schema {
        path: PathBuf,
        row_count: usize,
        columns: Vec<String>,
        reason: String,
    },

    #[error("empty universe: {0}")]
    EmptyUniverse(String),
}

/// Malformed signal config, theme map or screen config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("duplicate signal id '{0}'")]
    DuplicateSignal(String),

    #[error("signal '{id}': {reason}")]
    InvalidSignal { id: String, reason: String },

    #[error("theme map row {row}: {reason}")]
    InvalidThemeMapRow { row: usize, reason: String },

    #[error("theme map has no usable rows")]
    EmptyThemeMap,

    #[error("invalid setting: {0}")]
    Invalid(String),
}
