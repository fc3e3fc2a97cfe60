//! Screen runner: wires together providers, matching, indicators, scoring,
//! ranking and explanations.
//!
//! Two entry points:
//! - `run_screen()`: computes a report from a request and a provider. No
//!   filesystem writes.
//! - `run_screen_cached()`: the same behind an optional [`ReportCache`], keyed
//!   by the run fingerprint. Used by the CLI.

use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, info, warn};

use themelab_core::domain::{previous_trading_date, visible_bars, PriceBar, SecurityMetadata};
use themelab_core::error::{ConfigError, DataIntegrityError};
use themelab_core::fingerprint::{digest, Fingerprint, RunKey, FINGERPRINT_VERSION};
use themelab_core::indicators;
use themelab_core::scoring::{score, ScoreWeights};
use themelab_core::signal::Signal;
use themelab_core::theme::{
    aggregate_theme_score, build_term_index, flatten_labels, match_security, TermIndex,
    ThemeMapEntry,
};

use crate::cache::{CacheError, ReportCache};
use crate::config::{ScreenConfig, ShortHistoryPolicy};
use crate::explain::explain;
use crate::provider::DataProvider;
use crate::ranking::{select_top, RankingError, ScoredSecurity};
use crate::report::{Report, ReportMeta, ReportRow, SCHEMA_VERSION};

/// Errors from the runner. Every variant is fatal.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data integrity error: {0}")]
    Data(#[from] DataIntegrityError),
    #[error("ranking error: {0}")]
    Ranking(#[from] RankingError),
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("invariant violation: {0}")]
    Invariant(String),
    #[error("failed to fingerprint run inputs: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

impl RunError {
    /// Issue code for the failure.
    pub fn issue_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Data(_) => "data_integrity",
            Self::Ranking(e) => e.code(),
            Self::Cache(_) => "cache_error",
            Self::Invariant(_) => "invariant_violation",
            Self::Fingerprint(_) => "fingerprint_error",
        }
    }
}

/// Everything a screen run needs besides the provider.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub requested_date: NaiveDate,
    pub top_n: usize,
    pub signals: Vec<Signal>,
    pub theme_map: Vec<ThemeMapEntry>,
    pub config: ScreenConfig,
    /// Replaces `scoring.theme` for this run; `Some(0.0)` is technical-only.
    pub theme_weight_override: Option<f64>,
}

impl RunRequest {
    pub fn evaluation_date(&self) -> NaiveDate {
        previous_trading_date(self.requested_date)
    }

    /// Scoring weights after the theme override.
    pub fn effective_weights(&self) -> ScoreWeights {
        self.config
            .scoring
            .with_theme_override(self.theme_weight_override)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_n == 0 {
            return Err(ConfigError::Invalid("top_n must be > 0".into()));
        }
        self.config.validate()?;
        self.effective_weights().validate()
    }
}

/// Fingerprint of the report `request` would produce from `provider`.
pub fn fingerprint_for(
    request: &RunRequest,
    provider: &dyn DataProvider,
) -> Result<Fingerprint, RunError> {
    let evaluation_date = request.evaluation_date();
    let key = RunKey {
        version: FINGERPRINT_VERSION.to_string(),
        requested_date: request.requested_date,
        evaluation_date,
        top_n: request.top_n,
        signals_digest: digest(&request.signals)?,
        theme_map_digest: digest(&request.theme_map)?,
        provider: provider.name().to_string(),
        snapshot: provider.snapshot_ref(evaluation_date),
        provider_params_digest: digest(&provider.fingerprint_params())?,
        theme_weight_override: request.theme_weight_override,
        settings_digest: digest(&request.config.fingerprinted())?,
    };
    Ok(key.fingerprint()?)
}

/// Outcome of evaluating one security.
#[derive(Debug)]
enum Verdict {
    Scored(Box<ScoredSecurity>),
    /// Too little history under the `exclude` policy.
    Excluded,
}

#[derive(Debug)]
struct Evaluation {
    verdict: Verdict,
    hit_count: usize,
    future_rows: usize,
}

/// Read-only state shared by every per-security evaluation.
struct EvalContext<'a> {
    evaluation_date: NaiveDate,
    index: &'a TermIndex,
    config: &'a ScreenConfig,
    weights: ScoreWeights,
}

fn evaluate(
    security: &SecurityMetadata,
    bars: &[PriceBar],
    ctx: &EvalContext<'_>,
) -> Result<Evaluation, DataIntegrityError> {
    let future_rows = bars.iter().filter(|b| b.date > ctx.evaluation_date).count();

    let theme_hits = match_security(security, ctx.index);
    let hit_count = theme_hits.len();
    let theme_total = aggregate_theme_score(&theme_hits, &ctx.config.theme);

    let computed = indicators::compute(
        &security.ticker,
        bars,
        ctx.evaluation_date,
        ctx.config.pipeline.min_history,
    );
    let indicators = match computed {
        Ok(ind) => ind,
        Err(DataIntegrityError::InsufficientHistory { .. })
            if ctx.config.pipeline.short_history == ShortHistoryPolicy::Exclude =>
        {
            return Ok(Evaluation {
                verdict: Verdict::Excluded,
                hit_count,
                future_rows,
            });
        }
        Err(e) => return Err(e),
    };

    // compute() succeeded, so at least one bar is visible.
    let data_date = visible_bars(bars, ctx.evaluation_date)
        .last()
        .map(|b| b.date)
        .unwrap_or(ctx.evaluation_date);
    let breakdown = score(&security.ticker, theme_total, &indicators, &ctx.weights)?;

    Ok(Evaluation {
        verdict: Verdict::Scored(Box::new(ScoredSecurity {
            security: security.clone(),
            data_date,
            indicators,
            theme_hits,
            theme_total,
            breakdown,
        })),
        hit_count,
        future_rows,
    })
}

/// Run a screen. Pure apart from what the provider reads.
pub fn run_screen(request: &RunRequest, provider: &dyn DataProvider) -> Result<Report, RunError> {
    request.validate()?;
    let evaluation_date = request.evaluation_date();
    let fingerprint = fingerprint_for(request, provider)?;
    let weights = request.effective_weights();

    info!(
        requested_date = %request.requested_date,
        evaluation_date = %evaluation_date,
        top_n = request.top_n,
        provider = provider.name(),
        fingerprint = %fingerprint,
        "screen started"
    );

    let index = build_term_index(&request.signals, &request.theme_map);
    let mut unresolved_theme_keys = index.unresolved_keys().to_vec();
    unresolved_theme_keys.sort();
    unresolved_theme_keys.dedup();
    if !unresolved_theme_keys.is_empty() {
        warn!(keys = ?unresolved_theme_keys, "theme map keys match no signal");
    }
    let mut skipped_keywords = index.skipped_keywords().to_vec();
    skipped_keywords.sort();
    skipped_keywords.dedup();
    if !skipped_keywords.is_empty() {
        warn!(keywords = ?skipped_keywords, "signal keywords too short to match");
    }
    debug!(
        entries = index.entry_count(),
        terms = index.term_count(),
        "term index built"
    );

    let labels = flatten_labels(&request.theme_map);
    let universe = provider.load(evaluation_date, &labels)?;
    if universe.securities.is_empty() {
        return Err(DataIntegrityError::EmptyUniverse(format!(
            "provider '{}' returned no securities for {evaluation_date}",
            provider.name()
        ))
        .into());
    }
    debug!(securities = universe.securities.len(), "universe loaded");

    let ctx = EvalContext {
        evaluation_date,
        index: &index,
        config: &request.config,
        weights,
    };
    let eval = |security: &SecurityMetadata| {
        evaluate(security, universe.bars_for(&security.ticker), &ctx)
    };
    let evaluations: Vec<Result<Evaluation, DataIntegrityError>> =
        if request.config.pipeline.parallel {
            universe.securities.par_iter().map(eval).collect()
        } else {
            universe.securities.iter().map(eval).collect()
        };

    let mut candidates = Vec::with_capacity(evaluations.len());
    let mut excluded = 0;
    let mut theme_hit_count = 0;
    let mut securities_with_hits = 0;
    let mut future_rows_dropped = universe.future_rows_dropped;
    // In universe order, so the first error reported is deterministic.
    for evaluation in evaluations {
        let evaluation = evaluation?;
        theme_hit_count += evaluation.hit_count;
        if evaluation.hit_count > 0 {
            securities_with_hits += 1;
        }
        future_rows_dropped += evaluation.future_rows;
        match evaluation.verdict {
            Verdict::Scored(row) => candidates.push(*row),
            Verdict::Excluded => excluded += 1,
        }
    }

    if theme_hit_count == 0 {
        warn!("no security matched any theme; ranking is technical only");
    }
    if future_rows_dropped > 0 {
        warn!(rows = future_rows_dropped, "dropped bars dated after the evaluation date");
    }
    if excluded > 0 {
        warn!(excluded, "excluded securities with insufficient history");
    }
    let scored_count = candidates.len();
    debug!(scored = scored_count, hits = theme_hit_count, "securities evaluated");

    let selected = select_top(candidates, request.top_n)?;

    let results: Vec<ReportRow> = selected
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let rank = i + 1;
            ReportRow {
                rank,
                ticker: row.security.ticker.clone(),
                name: row.security.name.clone(),
                industry: row.security.industry.clone(),
                data_date: row.data_date,
                indicators: row.indicators,
                theme_hits: row.theme_hits.clone(),
                score_breakdown: row.breakdown,
                reason: explain(row, rank, &request.config.theme),
            }
        })
        .collect();

    let distinct_themes: BTreeSet<String> = results
        .iter()
        .flat_map(|r| r.reason.themes_used.iter().cloned())
        .collect();
    let pipeline = &request.config.pipeline;
    let convergence_ok =
        (pipeline.convergence_min..=pipeline.convergence_max).contains(&distinct_themes.len());

    let report = Report {
        schema_version: SCHEMA_VERSION,
        requested_date: request.requested_date,
        evaluation_date,
        top_n: request.top_n,
        provider: provider.name().to_string(),
        snapshot: provider.snapshot_ref(evaluation_date),
        fingerprint,
        issues: 0,
        issue_list: Vec::new(),
        results,
        meta: ReportMeta {
            universe_count: universe.securities.len(),
            scored_count,
            excluded_insufficient_history: excluded,
            future_rows_dropped,
            theme_hit_count,
            securities_with_hits,
            theme_map_entries: index.entry_count(),
            indexed_terms: index.term_count(),
            unresolved_theme_keys,
            skipped_keywords,
            distinct_themes: distinct_themes.into_iter().collect(),
            convergence_min: pipeline.convergence_min,
            convergence_max: pipeline.convergence_max,
            convergence_ok,
            technical_only: weights.theme == 0.0,
        },
    };

    check_invariants(&report)?;

    info!(
        rows = report.results.len(),
        distinct_themes = report.meta.distinct_themes.len(),
        convergence_ok,
        "screen finished"
    );
    Ok(report)
}

/// Run a screen, replaying a stored report when the cache has one.
pub fn run_screen_cached(
    request: &RunRequest,
    provider: &dyn DataProvider,
    cache: Option<&ReportCache>,
) -> Result<Report, RunError> {
    let Some(cache) = cache else {
        return run_screen(request, provider);
    };
    request.validate()?;
    let fingerprint = fingerprint_for(request, provider)?;
    let (report, hit) = cache.get_or_compute(&fingerprint, || run_screen(request, provider))?;
    if hit {
        check_replay(request, &report).map_err(|reason| CacheError::Corrupt {
            path: cache.entry_path(&fingerprint),
            reason,
        })?;
        info!(fingerprint = %fingerprint, "cache hit");
    } else {
        info!(fingerprint = %fingerprint, "cache miss; report stored");
    }
    Ok(report)
}

/// A replayed report must answer this request and hold every report
/// invariant; the cache only proved that it parses.
fn check_replay(request: &RunRequest, report: &Report) -> Result<(), String> {
    if report.top_n != request.top_n || report.evaluation_date != request.evaluation_date() {
        return Err(format!(
            "stored report is top {} for {}, request is top {} for {}",
            report.top_n,
            report.evaluation_date,
            request.top_n,
            request.evaluation_date()
        ));
    }
    check_invariants(report).map_err(|e| e.to_string())
}

/// Post-conditions every report must satisfy before it leaves the runner.
pub fn check_invariants(report: &Report) -> Result<(), RunError> {
    if report.issues != 0 || !report.issue_list.is_empty() {
        return Err(RunError::Invariant(format!(
            "report records {} issue(s); issues are fatal",
            report.issues.max(report.issue_list.len())
        )));
    }
    if report.results.len() != report.top_n {
        return Err(RunError::Invariant(format!(
            "report has {} rows, top {} requested",
            report.results.len(),
            report.top_n
        )));
    }
    for (i, row) in report.results.iter().enumerate() {
        if row.rank != i + 1 {
            return Err(RunError::Invariant(format!(
                "{}: rank {} at position {}",
                row.ticker,
                row.rank,
                i + 1
            )));
        }
        if row.data_date > report.evaluation_date {
            return Err(RunError::Invariant(format!(
                "{}: data date {} is after evaluation date {}",
                row.ticker, row.data_date, report.evaluation_date
            )));
        }
        let mut seen = BTreeSet::new();
        if let Some(dup) = row.theme_hits.iter().find(|h| !seen.insert(h.theme.as_str())) {
            return Err(RunError::Invariant(format!(
                "{}: theme '{}' hit twice",
                row.ticker, dup.theme
            )));
        }
        let mut seen = BTreeSet::new();
        if let Some(dup) = row.reason.themes_used.iter().find(|t| !seen.insert(t.as_str())) {
            return Err(RunError::Invariant(format!(
                "{}: theme '{dup}' repeated in themes_used",
                row.ticker
            )));
        }
        if !row.indicators.is_finite() || !row.score_breakdown.is_finite() {
            return Err(RunError::Invariant(format!(
                "{}: non-finite indicator or score",
                row.ticker
            )));
        }
    }
    Ok(())
}
