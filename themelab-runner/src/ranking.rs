//! Deterministic ranking and Top-N selection.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

use themelab_core::domain::SecurityMetadata;
use themelab_core::indicators::Indicators;
use themelab_core::scoring::ScoreBreakdown;
use themelab_core::theme::ThemeHit;

/// A security that made it through matching, indicators and scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSecurity {
    pub security: SecurityMetadata,
    /// Date of the last bar the indicators were computed from.
    pub data_date: NaiveDate,
    pub indicators: Indicators,
    pub theme_hits: Vec<ThemeHit>,
    pub theme_total: f64,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Error)]
pub enum RankingError {
    #[error("insufficient candidates: {eligible} eligible securities, top {requested} requested")]
    InsufficientCandidates { requested: usize, eligible: usize },
}

impl RankingError {
    /// Issue code recorded for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientCandidates { .. } => "insufficient_candidates",
        }
    }
}

/// Final score descending, ticker ascending. A total order: equal scores
/// never leave the order up to the input.
pub fn compare_scored(a: &ScoredSecurity, b: &ScoredSecurity) -> Ordering {
    b.breakdown
        .final_score
        .total_cmp(&a.breakdown.final_score)
        .then_with(|| a.security.ticker.cmp(&b.security.ticker))
}

/// Sort candidates and keep exactly `top_n` of them.
pub fn select_top(
    mut candidates: Vec<ScoredSecurity>,
    top_n: usize,
) -> Result<Vec<ScoredSecurity>, RankingError> {
    if candidates.len() < top_n {
        return Err(RankingError::InsufficientCandidates {
            requested: top_n,
            eligible: candidates.len(),
        });
    }
    candidates.sort_by(compare_scored);
    candidates.truncate(top_n);
    Ok(candidates)
}
