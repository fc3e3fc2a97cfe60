//! Narrative signals and their weight resolution.
//!
//! A signal names a theme, the keywords that evidence it, and how much a hit
//! on it is worth. The weight is either explicit or derived from the priority
//! (`high` = 1.0, `medium` = 0.6, `low` = 0.3). A signal flagged `risk_only`
//! is forced to weight 0: it still produces hits, which surface as risk
//! annotations, but never adds to the theme score.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::ConfigError;

/// Phase assigned to signals that do not declare one.
pub const DEFAULT_PHASE: &str = "live";

/// Signal priority, used when no explicit weight is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Parse a priority label. Unknown labels fall back to `Low`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "medium" => Self::Medium,
            _ => Self::Low,
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            Self::High => 1.0,
            Self::Medium => 0.6,
            Self::Low => 0.3,
        }
    }
}

/// A signal as written in the signal config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignalSpec {
    pub id: String,
    pub theme: String,
    #[serde(default)]
    pub core_theme: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub risk_only: bool,
    #[serde(default)]
    pub description: String,
}

fn default_enabled() -> bool {
    true
}

/// A resolved, immutable signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub theme: String,
    /// Theme name hits are grouped under. Defaults to `theme`.
    pub core_theme: String,
    pub keywords: Vec<String>,
    pub priority: Priority,
    pub weight: f64,
    pub phase: String,
    pub enabled: bool,
    pub risk_only: bool,
    pub description: String,
}

impl Signal {
    /// Resolve a configured signal: default the core theme and phase, derive
    /// the weight from the priority when absent, force risk-only signals to 0.
    pub fn from_spec(spec: SignalSpec) -> Result<Self, ConfigError> {
        let id = spec.id.trim().to_string();
        if id.is_empty() {
            return Err(ConfigError::InvalidSignal {
                id: spec.id,
                reason: "empty id".into(),
            });
        }
        let theme = spec.theme.trim().to_string();
        if theme.is_empty() {
            return Err(ConfigError::InvalidSignal {
                id,
                reason: "empty theme".into(),
            });
        }
        let core_theme = spec
            .core_theme
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| theme.clone());

        let priority = spec
            .priority
            .as_deref()
            .map(Priority::parse)
            .unwrap_or(Priority::Low);

        let weight = match spec.weight {
            Some(w) if !w.is_finite() || w < 0.0 => {
                return Err(ConfigError::InvalidSignal {
                    id,
                    reason: format!("weight must be finite and >= 0, got {w}"),
                });
            }
            _ if spec.risk_only => 0.0,
            Some(w) => w,
            None => priority.weight(),
        };

        let keywords = spec
            .keywords
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        Ok(Self {
            id,
            theme,
            core_theme,
            keywords,
            priority,
            weight,
            phase: spec
                .phase
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_PHASE.to_string()),
            enabled: spec.enabled,
            risk_only: spec.risk_only,
            description: spec.description,
        })
    }

    /// Whether hits on this signal can add to a theme score.
    pub fn contributes(&self) -> bool {
        self.enabled && !self.risk_only && self.weight > 0.0
    }
}

/// Resolve every configured signal, rejecting duplicate ids. Order is kept.
pub fn resolve_signals(specs: Vec<SignalSpec>) -> Result<Vec<Signal>, ConfigError> {
    let mut seen = BTreeSet::new();
    let mut signals = Vec::with_capacity(specs.len());
    for spec in specs {
        let signal = Signal::from_spec(spec)?;
        if !seen.insert(signal.id.clone()) {
            return Err(ConfigError::DuplicateSignal(signal.id));
        }
        signals.push(signal);
    }
    Ok(signals)
}
