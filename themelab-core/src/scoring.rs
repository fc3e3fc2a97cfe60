//! Score fusion: theme total + technical indicators → final score.
//!
//! Every technical input is squashed into a bounded range before weighting,
//! so no single indicator can dominate through scale alone:
//!
//! ```text
//! theme              =  w_theme  · theme_total
//! momentum_20        =  w_m20    · tanh(momentum_20 / m20_scale)
//! momentum_60        =  w_m60    · tanh(momentum_60 / m60_scale)
//! volatility_penalty = −w_vol    · tanh(volatility_20 / vol_scale)
//! volume             =  w_volume · (1 − exp(−avg_volume_20 / volume_scale))
//! final              =  sum of the above
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, DataIntegrityError};
use crate::indicators::Indicators;

/// Component weights and squashing scales (`[scoring]` in the screen config).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub theme: f64,
    pub momentum_20: f64,
    pub momentum_60: f64,
    pub volatility: f64,
    pub volume: f64,
    pub m20_scale: f64,
    pub m60_scale: f64,
    pub vol_scale: f64,
    pub volume_scale: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            theme: 1.0,
            momentum_20: 0.5,
            momentum_60: 0.3,
            volatility: 0.2,
            volume: 0.2,
            m20_scale: 0.10,
            m60_scale: 0.20,
            vol_scale: 0.03,
            volume_scale: 1e7,
        }
    }
}

impl ScoreWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = [
            ("theme", self.theme),
            ("momentum_20", self.momentum_20),
            ("momentum_60", self.momentum_60),
            ("volatility", self.volatility),
            ("volume", self.volume),
        ];
        for (name, w) in weights {
            if !w.is_finite() || w < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "scoring.{name} must be finite and >= 0, got {w}"
                )));
            }
        }
        let scales = [
            ("m20_scale", self.m20_scale),
            ("m60_scale", self.m60_scale),
            ("vol_scale", self.vol_scale),
            ("volume_scale", self.volume_scale),
        ];
        for (name, s) in scales {
            if !s.is_finite() || s <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "scoring.{name} must be finite and > 0, got {s}"
                )));
            }
        }
        Ok(())
    }

    /// Replace the theme weight when an override is given.
    ///
    /// `Some(0.0)` is the technical-only ablation: the theme component is
    /// still computed through the same path, it just weighs nothing.
    pub fn with_theme_override(mut self, theme_weight: Option<f64>) -> Self {
        if let Some(w) = theme_weight {
            self.theme = w;
        }
        self
    }
}

/// One additive component of the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreComponent {
    Theme,
    Momentum20,
    Momentum60,
    VolatilityPenalty,
    Volume,
}

impl ScoreComponent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Theme => "theme",
            Self::Momentum20 => "momentum_20",
            Self::Momentum60 => "momentum_60",
            Self::VolatilityPenalty => "volatility_penalty",
            Self::Volume => "volume",
        }
    }
}

/// Itemized score for one security.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub theme_score: f64,
    pub momentum_20: f64,
    pub momentum_60: f64,
    pub volatility_penalty: f64,
    pub volume: f64,
    pub final_score: f64,
}

impl ScoreBreakdown {
    /// The additive components, in a fixed order.
    pub fn components(&self) -> [(ScoreComponent, f64); 5] {
        [
            (ScoreComponent::Theme, self.theme_score),
            (ScoreComponent::Momentum20, self.momentum_20),
            (ScoreComponent::Momentum60, self.momentum_60),
            (ScoreComponent::VolatilityPenalty, self.volatility_penalty),
            (ScoreComponent::Volume, self.volume),
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.final_score.is_finite() && self.components().iter().all(|(_, v)| v.is_finite())
    }
}

/// Fuse a theme total and an indicator set into a score breakdown.
pub fn score(
    ticker: &str,
    theme_total: f64,
    indicators: &Indicators,
    weights: &ScoreWeights,
) -> Result<ScoreBreakdown, DataIntegrityError> {
    let theme_score = weights.theme * theme_total;
    let momentum_20 = weights.momentum_20 * (indicators.momentum_20 / weights.m20_scale).tanh();
    let momentum_60 = weights.momentum_60 * (indicators.momentum_60 / weights.m60_scale).tanh();
    let volatility_penalty =
        -weights.volatility * (indicators.volatility_20 / weights.vol_scale).tanh();
    let volume = weights.volume * (1.0 - (-indicators.avg_volume_20 / weights.volume_scale).exp());

    let breakdown = ScoreBreakdown {
        theme_score,
        momentum_20,
        momentum_60,
        volatility_penalty,
        volume,
        final_score: theme_score + momentum_20 + momentum_60 + volatility_penalty + volume,
    };

    if let Some((component, _)) = breakdown
        .components()
        .into_iter()
        .find(|(_, v)| !v.is_finite())
    {
        return Err(DataIntegrityError::NonFinite {
            ticker: ticker.to_string(),
            field: component.as_str().to_string(),
        });
    }
    if !breakdown.final_score.is_finite() {
        return Err(DataIntegrityError::NonFinite {
            ticker: ticker.to_string(),
            field: "final_score".to_string(),
        });
    }
    Ok(breakdown)
}
