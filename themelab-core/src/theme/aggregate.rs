//! Bounded aggregation of theme hits into a single theme score.
//!
//! Weights are pruned, sorted descending and combined with geometric
//! dampening, then saturated:
//!
//! ```text
//! raw   = Σ w_i · d^i          (i = 0, 1, ...)
//! total = 1 − exp(−raw)        ∈ [0, 1)
//! ```
//!
//! With `d < 1` a security carrying many concept hits can at most multiply
//! its raw sum by `1 / (1 − d)`, so dense concept memberships cannot inflate
//! the score without bound, and the total is non-decreasing in every weight.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::theme::hit::ThemeHit;

/// Theme aggregation settings (`[theme]` in the screen config).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeScoring {
    /// Hits with a weight below this are ignored.
    pub min_hit_weight: f64,
    /// Geometric dampening factor applied to the i-th strongest hit.
    pub concept_decay: f64,
    /// Totals below this are zeroed.
    pub min_theme_score: f64,
}

impl Default for ThemeScoring {
    fn default() -> Self {
        Self {
            min_hit_weight: 0.0,
            concept_decay: 0.5,
            min_theme_score: 0.0,
        }
    }
}

impl ThemeScoring {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.min_hit_weight.is_finite() || self.min_hit_weight < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "theme.min_hit_weight must be finite and >= 0, got {}",
                self.min_hit_weight
            )));
        }
        if !(0.0..1.0).contains(&self.concept_decay) {
            return Err(ConfigError::Invalid(format!(
                "theme.concept_decay must be in [0, 1), got {}",
                self.concept_decay
            )));
        }
        if !(0.0..1.0).contains(&self.min_theme_score) {
            return Err(ConfigError::Invalid(format!(
                "theme.min_theme_score must be in [0, 1), got {}",
                self.min_theme_score
            )));
        }
        Ok(())
    }

    /// Whether a hit survives pruning.
    pub fn contributes(&self, hit: &ThemeHit) -> bool {
        hit.weight > 0.0 && hit.weight >= self.min_hit_weight
    }
}

/// Aggregate hits into a theme total in `[0, 1)`.
pub fn aggregate_theme_score(hits: &[ThemeHit], settings: &ThemeScoring) -> f64 {
    let mut weights: Vec<f64> = hits
        .iter()
        .filter(|h| settings.contributes(h))
        .map(|h| h.weight)
        .collect();
    if weights.is_empty() {
        return 0.0;
    }
    weights.sort_by(|a, b| b.total_cmp(a));

    let mut raw = 0.0;
    let mut factor = 1.0;
    for w in weights {
        raw += w * factor;
        factor *= settings.concept_decay;
    }

    let total = 1.0 - (-raw).exp();
    if total < settings.min_theme_score {
        0.0
    } else {
        total
    }
}
