//! Data providers: where the security universe and its price history come from.
//!
//! The `DataProvider` trait abstracts over data sources (snapshot files, the
//! deterministic mock, in-memory fixtures) so the pipeline never knows which
//! one it is talking to. Every provider drops bars dated after the evaluation
//! date before returning and reports how many it dropped.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use themelab_core::domain::{normalize_ticker, trailing_weekdays, PriceBar, SecurityMetadata};
use themelab_core::error::DataIntegrityError;

/// Securities and their date-ascending bars as of one evaluation date.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    /// Sorted by ticker, tickers unique.
    pub securities: Vec<SecurityMetadata>,
    pub bars: BTreeMap<String, Vec<PriceBar>>,
    /// Bars the provider dropped because they were dated after the
    /// evaluation date.
    pub future_rows_dropped: usize,
}

impl Universe {
    pub fn bars_for(&self, ticker: &str) -> &[PriceBar] {
        self.bars.get(ticker).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Trait for data providers.
pub trait DataProvider: Send + Sync {
    /// Provider identifier, recorded in the report and the fingerprint.
    fn name(&self) -> &str;

    /// Reference to the frozen data set a run at `evaluation_date` reads, if
    /// the provider has one.
    fn snapshot_ref(&self, evaluation_date: NaiveDate) -> Option<String>;

    /// Provider settings, other than the name and snapshot reference, that
    /// change what `load` returns. Recorded in the run fingerprint.
    fn fingerprint_params(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Load the universe as of `evaluation_date`.
    ///
    /// `labels` are the industry and concept values of the theme map; only
    /// providers that synthesize a universe use them.
    fn load(&self, evaluation_date: NaiveDate, labels: &[String])
        -> Result<Universe, DataIntegrityError>;
}

// ─── Snapshot files ─────────────────────────────────────────────────

pub const MEMBERSHIP_FILE: &str = "concept_membership.csv";
pub const PRICES_FILE: &str = "prices.csv";

/// Reads `<base_dir>/<YYYY-MM-DD>/{concept_membership,prices}.csv`.
#[derive(Debug, Clone)]
pub struct SnapshotProvider {
    base_dir: PathBuf,
    snapshot_as_of: Option<NaiveDate>,
}

impl SnapshotProvider {
    /// `snapshot_as_of` pins the snapshot directory; without it the
    /// evaluation date picks the directory.
    pub fn new(base_dir: impl Into<PathBuf>, snapshot_as_of: Option<NaiveDate>) -> Self {
        Self {
            base_dir: base_dir.into(),
            snapshot_as_of,
        }
    }

    fn snapshot_date(&self, evaluation_date: NaiveDate) -> NaiveDate {
        self.snapshot_as_of.unwrap_or(evaluation_date)
    }

    pub fn snapshot_dir(&self, evaluation_date: NaiveDate) -> PathBuf {
        self.base_dir
            .join(self.snapshot_date(evaluation_date).format("%Y-%m-%d").to_string())
    }
}

impl DataProvider for SnapshotProvider {
    fn name(&self) -> &str {
        "snapshot"
    }

    fn snapshot_ref(&self, evaluation_date: NaiveDate) -> Option<String> {
        Some(self.snapshot_date(evaluation_date).format("%Y-%m-%d").to_string())
    }

    /// The base directory, canonicalized when it exists, so two snapshot
    /// trees holding the same date never share a fingerprint.
    fn fingerprint_params(&self) -> serde_json::Value {
        let base_dir =
            std::fs::canonicalize(&self.base_dir).unwrap_or_else(|_| self.base_dir.clone());
        json!({ "base_dir": base_dir.to_string_lossy() })
    }

    fn load(
        &self,
        evaluation_date: NaiveDate,
        _labels: &[String],
    ) -> Result<Universe, DataIntegrityError> {
        let dir = self.snapshot_dir(evaluation_date);
        let securities = read_membership(&dir.join(MEMBERSHIP_FILE))?;
        let (bars, future_rows_dropped) = read_prices(&dir.join(PRICES_FILE), evaluation_date)?;
        Ok(Universe {
            securities,
            bars,
            future_rows_dropped,
        })
    }
}

/// A CSV file read fully into memory, with its header row.
struct CsvTable {
    path: PathBuf,
    columns: Vec<String>,
    rows: Vec<csv::StringRecord>,
}

impl CsvTable {
    fn read(path: &Path) -> Result<Self, DataIntegrityError> {
        let exists = path.exists();
        if !exists {
            return Err(DataIntegrityError::MissingFile {
                path: path.to_path_buf(),
                exists,
            });
        }
        let unreadable = |reason: String| DataIntegrityError::Unreadable {
            path: path.to_path_buf(),
            exists,
            reason,
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| unreadable(e.to_string()))?;
        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| unreadable(e.to_string()))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_lowercase())
            .collect();
        let rows = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| unreadable(e.to_string()))?;

        let table = Self {
            path: path.to_path_buf(),
            columns,
            rows,
        };
        if table.rows.is_empty() {
            return Err(table.schema_error("file has 0 rows".into()));
        }
        Ok(table)
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn require(&self, name: &str) -> Result<usize, DataIntegrityError> {
        self.column(name)
            .ok_or_else(|| self.schema_error(format!("missing required column '{name}'")))
    }

    fn schema_error(&self, reason: String) -> DataIntegrityError {
        DataIntegrityError::Schema {
            path: self.path.clone(),
            row_count: self.rows.len(),
            columns: self.columns.clone(),
            reason,
        }
    }
}

fn cell(record: &csv::StringRecord, col: Option<usize>) -> &str {
    col.and_then(|i| record.get(i)).unwrap_or("")
}

/// Read the membership table. Rows sharing a ticker merge their concepts.
fn read_membership(path: &Path) -> Result<Vec<SecurityMetadata>, DataIntegrityError> {
    let table = CsvTable::read(path)?;
    let ticker_col = table.require("ticker")?;
    let name_col = table.column("name");
    let industry_col = table.column("industry");
    let concept_col = table.column("concept");
    let description_col = table.column("description");

    let mut merged: BTreeMap<String, SecurityMetadata> = BTreeMap::new();
    for (i, record) in table.rows.iter().enumerate() {
        let ticker = normalize_ticker(cell(record, Some(ticker_col)));
        if ticker.is_empty() {
            return Err(table.schema_error(format!("row {}: empty ticker", i + 1)));
        }
        let concept = cell(record, concept_col);
        let industry = match cell(record, industry_col) {
            "" => concept,
            industry => industry,
        };
        let name = match cell(record, name_col) {
            "" => ticker.as_str(),
            name => name,
        };

        match merged.get_mut(&ticker) {
            Some(existing) => merge_membership(existing, industry, concept),
            None => {
                let security = SecurityMetadata::new(&ticker, name, industry, concept)
                    .with_description(cell(record, description_col));
                merged.insert(ticker, security);
            }
        }
    }
    Ok(merged.into_values().collect())
}

fn merge_membership(existing: &mut SecurityMetadata, industry: &str, concept: &str) {
    if existing.industry.is_empty() {
        existing.industry = industry.trim().to_string();
    }
    let concept = concept.trim();
    if concept.is_empty() || existing.concepts().iter().any(|c| c == concept) {
        return;
    }
    if existing.concept.is_empty() {
        existing.concept = concept.to_string();
    } else {
        existing.concept = format!("{}、{}", existing.concept, concept);
    }
}

type BarsByTicker = BTreeMap<String, Vec<PriceBar>>;

/// Read the price table, keeping bars on or before `evaluation_date`.
fn read_prices(
    path: &Path,
    evaluation_date: NaiveDate,
) -> Result<(BarsByTicker, usize), DataIntegrityError> {
    let table = CsvTable::read(path)?;
    let ticker_col = table.require("ticker")?;
    let date_col = table.require("date")?;
    let close_col = table.require("close")?;
    let volume_col = table.require("volume")?;

    let mut bars: BarsByTicker = BTreeMap::new();
    let mut dropped = 0;
    for (i, record) in table.rows.iter().enumerate() {
        let row = i + 1;
        let raw_date = cell(record, Some(date_col));
        let date = parse_date(raw_date)
            .ok_or_else(|| table.schema_error(format!("row {row}: bad date '{raw_date}'")))?;
        if date > evaluation_date {
            dropped += 1;
            continue;
        }
        let number = |col: usize, field: &str| -> Result<f64, DataIntegrityError> {
            let raw = cell(record, Some(col));
            raw.parse::<f64>()
                .map_err(|_| table.schema_error(format!("row {row}: bad {field} '{raw}'")))
        };
        let ticker = normalize_ticker(cell(record, Some(ticker_col)));
        bars.entry(ticker.clone()).or_default().push(PriceBar {
            ticker,
            date,
            close: number(close_col, "close")?,
            volume: number(volume_col, "volume")?,
        });
    }
    for series in bars.values_mut() {
        series.sort_by_key(|b| b.date);
    }
    Ok((bars, dropped))
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time part.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

// ─── Deterministic mock ─────────────────────────────────────────────

/// Smallest mock universe, whatever the number of labels.
pub const MOCK_MIN_UNIVERSE: usize = 60;
/// Mock securities generated per theme-map label.
pub const MOCK_PER_LABEL: usize = 5;

/// Synthesizes a universe from the theme map's labels and random-walk prices.
///
/// Prices come from a `StdRng` seeded with BLAKE3(evaluation date, ticker), so
/// the same date always yields the same data and each security's series is
/// independent of universe order.
#[derive(Debug, Clone)]
pub struct MockProvider {
    lookback_days: usize,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self { lookback_days: 130 }
    }
}

impl MockProvider {
    pub fn new(lookback_days: usize) -> Self {
        Self { lookback_days }
    }

    fn rng_for(evaluation_date: NaiveDate, ticker: &str) -> StdRng {
        let mut hasher = blake3::Hasher::new();
        hasher.update(evaluation_date.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(ticker.as_bytes());
        StdRng::from_seed(*hasher.finalize().as_bytes())
    }

    fn generate_bars(&self, ticker: &str, evaluation_date: NaiveDate) -> Vec<PriceBar> {
        let mut rng = Self::rng_for(evaluation_date, ticker);
        let mut price = 10.0 + rng.gen::<f64>() * 50.0;

        trailing_weekdays(evaluation_date, self.lookback_days)
            .into_iter()
            .map(|date| {
                // Box-Muller: daily return ~ N(0.0005, 0.02)
                let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
                let u2: f64 = rng.gen();
                let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
                price *= 1.0 + 0.0005 + 0.02 * z;
                let volume = rng.gen_range(1_000_000u64..50_000_000) as f64;
                PriceBar {
                    ticker: ticker.to_string(),
                    date,
                    close: (price * 10_000.0).round() / 10_000.0,
                    volume,
                }
            })
            .collect()
    }
}

impl DataProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn snapshot_ref(&self, _evaluation_date: NaiveDate) -> Option<String> {
        None
    }

    fn fingerprint_params(&self) -> serde_json::Value {
        json!({
            "lookback_days": self.lookback_days,
            "min_universe": MOCK_MIN_UNIVERSE,
            "per_label": MOCK_PER_LABEL,
        })
    }

    fn load(
        &self,
        evaluation_date: NaiveDate,
        labels: &[String],
    ) -> Result<Universe, DataIntegrityError> {
        if labels.is_empty() {
            return Err(DataIntegrityError::EmptyUniverse(
                "mock provider needs at least one industry or concept label".into(),
            ));
        }
        let total = MOCK_MIN_UNIVERSE.max(labels.len() * MOCK_PER_LABEL);

        let mut universe = Universe::default();
        for i in 0..total {
            let ticker = format!("A{i:04}");
            let label = &labels[i % labels.len()];
            universe.bars.insert(ticker.clone(), self.generate_bars(&ticker, evaluation_date));
            universe.securities.push(SecurityMetadata::new(
                &ticker,
                &format!("STOCK_{i:04}"),
                label,
                label,
            ));
        }
        Ok(universe)
    }
}

// ─── In-memory ──────────────────────────────────────────────────────

/// Serves a fixed universe; used by tests and embedding callers.
///
/// Like a snapshot directory, the data is treated as frozen: its name and
/// snapshot label identify it, not a digest of its contents.
#[derive(Debug, Clone)]
pub struct InMemoryProvider {
    name: String,
    snapshot: Option<String>,
    securities: Vec<SecurityMetadata>,
    bars: BTreeMap<String, Vec<PriceBar>>,
}

impl InMemoryProvider {
    pub fn new(name: &str, securities: Vec<SecurityMetadata>, bars: Vec<PriceBar>) -> Self {
        let mut by_ticker: BTreeMap<String, Vec<PriceBar>> = BTreeMap::new();
        for bar in bars {
            by_ticker.entry(bar.ticker.clone()).or_default().push(bar);
        }
        let mut securities = securities;
        securities.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        Self {
            name: name.to_string(),
            snapshot: None,
            securities,
            bars: by_ticker,
        }
    }

    pub fn with_snapshot(mut self, snapshot: &str) -> Self {
        self.snapshot = Some(snapshot.to_string());
        self
    }
}

impl DataProvider for InMemoryProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn snapshot_ref(&self, _evaluation_date: NaiveDate) -> Option<String> {
        self.snapshot.clone()
    }

    fn load(
        &self,
        evaluation_date: NaiveDate,
        _labels: &[String],
    ) -> Result<Universe, DataIntegrityError> {
        let mut dropped = 0;
        let bars = self
            .bars
            .iter()
            .map(|(ticker, series)| {
                let visible: Vec<PriceBar> = series
                    .iter()
                    .filter(|b| b.date <= evaluation_date)
                    .cloned()
                    .collect();
                dropped += series.len() - visible.len();
                (ticker.clone(), visible)
            })
            .collect();
        Ok(Universe {
            securities: self.securities.clone(),
            bars,
            future_rows_dropped: dropped,
        })
    }
}
