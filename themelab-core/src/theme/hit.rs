//! Theme hits: evidence that a security matches a theme.

use serde::{Deserialize, Serialize};

use crate::domain::LabelKind;

/// How a hit was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    /// A signal keyword found in a security label or description.
    Signals,
    /// A theme-map value equal to a security label or ticker.
    Map,
}

impl MatchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signals => "signals",
            Self::Map => "map",
        }
    }
}

/// One matched term on one security: what matched, how, and where.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HitEvidence {
    /// The security label (map hits) or signal keyword (keyword hits).
    pub term: String,
    pub source: MatchSource,
    pub path: LabelKind,
}

/// One theme matched on one security.
///
/// At most one hit exists per theme per security: when several signals or
/// terms evidence the same theme they are merged, keeping the maximum weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeHit {
    pub theme: String,
    /// The signal carrying the maximum weight (lowest id on ties).
    pub signal_id: String,
    /// Every signal that evidenced this theme, sorted.
    pub signal_ids: Vec<String>,
    pub weight: f64,
    /// Matched labels (map hits) or keywords (signal hits), sorted.
    pub matched_terms: Vec<String>,
    pub matched_source: Vec<MatchSource>,
    pub match_path: Vec<LabelKind>,
    /// At least one evidencing signal is risk-only.
    pub risk: bool,
    /// Every (term, source, path) behind this hit, sorted.
    pub evidence: Vec<HitEvidence>,
}

impl ThemeHit {
    pub fn has_source(&self, source: MatchSource) -> bool {
        self.matched_source.contains(&source)
    }
}
