//! The Top-N report and its JSON/CSV artifacts.
//!
//! All persisted reports include a `schema_version` field. A report carries no
//! wall-clock time, so replaying it from the cache reproduces the same bytes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use themelab_core::fingerprint::Fingerprint;
use themelab_core::indicators::Indicators;
use themelab_core::scoring::ScoreBreakdown;
use themelab_core::theme::ThemeHit;

use crate::atomic::atomic_write;
use crate::explain::{render_legacy, Reason};

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

/// One selected security.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub rank: usize,
    pub ticker: String,
    pub name: String,
    pub industry: String,
    pub data_date: NaiveDate,
    pub indicators: Indicators,
    pub theme_hits: Vec<ThemeHit>,
    pub score_breakdown: ScoreBreakdown,
    pub reason: Reason,
}

/// A recorded problem. Only fatal problems are issues, and a fatal problem
/// stops the run, so a persisted report always has none;
/// [`check_invariants`](crate::runner::check_invariants) rejects a report
/// that claims otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub code: String,
    pub message: String,
}

/// Run diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub universe_count: usize,
    pub scored_count: usize,
    pub excluded_insufficient_history: usize,
    pub future_rows_dropped: usize,
    /// Theme hits across the whole universe.
    pub theme_hit_count: usize,
    pub securities_with_hits: usize,
    pub theme_map_entries: usize,
    pub indexed_terms: usize,
    /// Theme-map keys that matched no signal, sorted.
    pub unresolved_theme_keys: Vec<String>,
    /// Signal keywords too short to index, sorted.
    pub skipped_keywords: Vec<String>,
    /// Distinct themes across the rows' `themes_used`, sorted.
    pub distinct_themes: Vec<String>,
    pub convergence_min: usize,
    pub convergence_max: usize,
    pub convergence_ok: bool,
    pub technical_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub schema_version: u32,
    pub requested_date: NaiveDate,
    pub evaluation_date: NaiveDate,
    pub top_n: usize,
    pub provider: String,
    pub snapshot: Option<String>,
    pub fingerprint: Fingerprint,
    pub issues: usize,
    pub issue_list: Vec<Issue>,
    pub results: Vec<ReportRow>,
    pub meta: ReportMeta,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to build report CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported report schema version {found} (max supported: {SCHEMA_VERSION})")]
    UnsupportedSchema { found: u32 },
}

/// Serialize a report to pretty JSON with a trailing newline.
pub fn to_json(report: &Report) -> Result<String, ReportError> {
    let mut json = serde_json::to_string_pretty(report)?;
    json.push('\n');
    Ok(json)
}

/// Deserialize a report, rejecting unknown schema versions.
pub fn from_json(json: &str) -> Result<Report, ReportError> {
    let report: Report = serde_json::from_str(json)?;
    if report.schema_version > SCHEMA_VERSION {
        return Err(ReportError::UnsupportedSchema {
            found: report.schema_version,
        });
    }
    Ok(report)
}

/// Flatten the rows into CSV, one line per row.
///
/// Columns: rank, ticker, name, industry, data_date, final_score,
/// theme_score, momentum_20, momentum_60, volatility_penalty, volume,
/// themes_used, risk_flags, reason
pub fn to_csv(report: &Report) -> Result<String, ReportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "rank",
        "ticker",
        "name",
        "industry",
        "data_date",
        "final_score",
        "theme_score",
        "momentum_20",
        "momentum_60",
        "volatility_penalty",
        "volume",
        "themes_used",
        "risk_flags",
        "reason",
    ])?;

    for row in &report.results {
        let b = &row.score_breakdown;
        wtr.write_record([
            &row.rank.to_string(),
            &row.ticker,
            &row.name,
            &row.industry,
            &row.data_date.to_string(),
            &format!("{:.6}", b.final_score),
            &format!("{:.6}", b.theme_score),
            &format!("{:.6}", b.momentum_20),
            &format!("{:.6}", b.momentum_60),
            &format!("{:.6}", b.volatility_penalty),
            &format!("{:.6}", b.volume),
            &row.reason.themes_used.join("|"),
            &row.reason.risk_flags.join("|"),
            &render_legacy(&row.reason),
        ])?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| ReportError::Csv(e.into_error().into()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Paths of the written report artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub json: PathBuf,
    pub csv: PathBuf,
}

/// `report_<evaluation date>_top<N>`.
pub fn report_stem(report: &Report) -> String {
    format!("report_{}_top{}", report.evaluation_date, report.top_n)
}

/// Write the JSON and CSV artifacts atomically into `output_dir`.
///
/// Both files are rendered in memory first, so a serialization failure
/// writes nothing.
pub fn write_report(report: &Report, output_dir: &Path) -> Result<ReportPaths, ReportError> {
    let json = to_json(report)?;
    let csv = to_csv(report)?;

    let stem = report_stem(report);
    let paths = ReportPaths {
        json: output_dir.join(format!("{stem}.json")),
        csv: output_dir.join(format!("{stem}.csv")),
    };
    for (path, contents) in [(&paths.json, &json), (&paths.csv, &csv)] {
        atomic_write(path, contents.as_bytes()).map_err(|source| ReportError::Io {
            path: path.clone(),
            source,
        })?;
    }
    Ok(paths)
}
