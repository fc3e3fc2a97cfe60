//! Per-row explanations.
//!
//! A [`Reason`] says which themes counted, which labels or keywords matched
//! them, which score components put the row where it is, and which risk-only
//! themes it touches. [`render_legacy`] flattens it into one line for
//! consumers that still expect a string.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use themelab_core::domain::LabelKind;
use themelab_core::scoring::ScoreComponent;
use themelab_core::theme::{MatchSource, ThemeScoring};

use crate::ranking::ScoredSecurity;

/// How many score components `why_in_top5` names.
pub const DOMINANT_CONTRIBUTORS: usize = 3;

/// One matched label or keyword and the theme it evidenced.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConceptHit {
    pub label: String,
    pub source: MatchSource,
    pub path: LabelKind,
    pub theme: String,
}

/// One score component and its signed value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub component: ScoreComponent,
    pub value: f64,
}

/// Why the row is in the Top-N.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhyInTop {
    pub rank: usize,
    pub final_score: f64,
    /// Largest components by absolute value; never empty.
    pub contributors: Vec<Contribution>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reason {
    /// Themes that added to the score, strongest first, no repeats.
    pub themes_used: Vec<String>,
    pub concept_hits: Vec<ConceptHit>,
    pub why_in_top5: WhyInTop,
    /// Themes of risk-only hits, sorted.
    pub risk_flags: Vec<String>,
}

/// Build the explanation for a selected row at `rank` (1-based).
pub fn explain(row: &ScoredSecurity, rank: usize, theme_scoring: &ThemeScoring) -> Reason {
    let mut themes_used = Vec::new();
    if row.breakdown.theme_score > 0.0 {
        for hit in row.theme_hits.iter().filter(|h| theme_scoring.contributes(h)) {
            if !themes_used.contains(&hit.theme) {
                themes_used.push(hit.theme.clone());
            }
        }
    }

    let concept_hits: BTreeSet<ConceptHit> = row
        .theme_hits
        .iter()
        .flat_map(|hit| {
            hit.evidence.iter().map(|e| ConceptHit {
                label: e.term.clone(),
                source: e.source,
                path: e.path,
                theme: hit.theme.clone(),
            })
        })
        .collect();

    let risk_flags: BTreeSet<String> = row
        .theme_hits
        .iter()
        .filter(|h| h.risk)
        .map(|h| h.theme.clone())
        .collect();

    Reason {
        themes_used,
        concept_hits: concept_hits.into_iter().collect(),
        why_in_top5: why_in_top(row, rank),
        risk_flags: risk_flags.into_iter().collect(),
    }
}

fn why_in_top(row: &ScoredSecurity, rank: usize) -> WhyInTop {
    let mut contributions: Vec<Contribution> = row
        .breakdown
        .components()
        .into_iter()
        .map(|(component, value)| Contribution { component, value })
        .collect();
    // Stable sort keeps the fixed component order among equal magnitudes.
    contributions.sort_by(|a, b| b.value.abs().total_cmp(&a.value.abs()));

    let mut contributors: Vec<Contribution> = contributions
        .iter()
        .copied()
        .filter(|c| c.value != 0.0)
        .take(DOMINANT_CONTRIBUTORS)
        .collect();
    if contributors.is_empty() {
        contributors.extend(contributions.first().copied());
    }

    let parts: Vec<String> = contributors
        .iter()
        .map(|c| format!("{} {:+.4}", c.component.as_str(), c.value))
        .collect();
    let summary = format!(
        "rank {rank}, final {:.4}: {}",
        row.breakdown.final_score,
        parts.join(", ")
    );

    WhyInTop {
        rank,
        final_score: row.breakdown.final_score,
        contributors,
        summary,
    }
}

/// Flatten a reason into a single line.
pub fn render_legacy(reason: &Reason) -> String {
    let themes = if reason.themes_used.is_empty() {
        "none".to_string()
    } else {
        reason.themes_used.join("、")
    };
    let mut out = format!("themes: {themes}");

    if !reason.concept_hits.is_empty() {
        let hits: Vec<String> = reason
            .concept_hits
            .iter()
            .map(|h| {
                format!(
                    "{}→{} ({}/{})",
                    h.label,
                    h.theme,
                    h.source.as_str(),
                    h.path.as_str()
                )
            })
            .collect();
        out.push_str(&format!("; hits: {}", hits.join(", ")));
    }

    out.push_str(&format!("; why: {}", reason.why_in_top5.summary));

    if !reason.risk_flags.is_empty() {
        out.push_str(&format!("; risk: {}", reason.risk_flags.join("、")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use themelab_core::domain::SecurityMetadata;
    use themelab_core::indicators::Indicators;
    use themelab_core::scoring::ScoreBreakdown;
    use themelab_core::theme::{HitEvidence, ThemeHit};

    fn hit(theme: &str, weight: f64, risk: bool, term: &str) -> ThemeHit {
        ThemeHit {
            theme: theme.into(),
            signal_id: format!("sig_{theme}"),
            signal_ids: vec![format!("sig_{theme}")],
            weight,
            matched_terms: vec![term.into()],
            matched_source: vec![MatchSource::Map],
            match_path: vec![LabelKind::Concept],
            risk,
            evidence: vec![HitEvidence {
                term: term.into(),
                source: MatchSource::Map,
                path: LabelKind::Concept,
            }],
        }
    }

    fn row(hits: Vec<ThemeHit>, theme_score: f64, momentum_20: f64) -> ScoredSecurity {
        ScoredSecurity {
            security: SecurityMetadata::new("000001", "Acme", "Software", "cloud-computing"),
            data_date: NaiveDate::from_ymd_opt(2026, 1, 9).unwrap(),
            indicators: Indicators {
                momentum_20: 0.0,
                momentum_60: 0.0,
                volatility_20: 0.0,
                avg_volume_20: 0.0,
            },
            theme_hits: hits,
            theme_total: theme_score,
            breakdown: ScoreBreakdown {
                theme_score,
                momentum_20,
                momentum_60: 0.0,
                volatility_penalty: -0.01,
                volume: 0.0,
                final_score: theme_score + momentum_20 - 0.01,
            },
        }
    }

    #[test]
    fn themes_used_skip_zero_weight_and_risk_hits() {
        let r = row(
            vec![
                hit("Cloud", 1.0, false, "cloud-computing"),
                hit("Speculation", 0.0, true, "meme"),
            ],
            0.63,
            0.1,
        );
        let reason = explain(&r, 1, &ThemeScoring::default());
        assert_eq!(reason.themes_used, vec!["Cloud"]);
        assert_eq!(reason.risk_flags, vec!["Speculation"]);
        assert_eq!(reason.concept_hits.len(), 2);
    }

    #[test]
    fn technical_only_rows_use_no_themes() {
        let r = row(vec![hit("Cloud", 1.0, false, "cloud-computing")], 0.0, 0.1);
        let reason = explain(&r, 2, &ThemeScoring::default());
        assert!(reason.themes_used.is_empty());
        assert_eq!(reason.concept_hits.len(), 1);
    }

    #[test]
    fn why_names_dominant_contributors_by_magnitude() {
        let r = row(vec![], 0.6, 0.2);
        let why = explain(&r, 1, &ThemeScoring::default()).why_in_top5;
        assert_eq!(why.rank, 1);
        let components: Vec<_> = why.contributors.iter().map(|c| c.component).collect();
        assert_eq!(
            components,
            vec![
                ScoreComponent::Theme,
                ScoreComponent::Momentum20,
                ScoreComponent::VolatilityPenalty
            ]
        );
        assert!(why.summary.contains("theme +0.6000"));
    }

    #[test]
    fn why_is_never_empty() {
        let mut r = row(vec![], 0.0, 0.0);
        r.breakdown.volatility_penalty = 0.0;
        r.breakdown.final_score = 0.0;
        let why = explain(&r, 5, &ThemeScoring::default()).why_in_top5;
        assert_eq!(why.contributors.len(), 1);
        assert!(!why.summary.is_empty());
    }

    #[test]
    fn legacy_rendering_mentions_every_theme() {
        let r = row(
            vec![
                hit("Cloud", 1.0, false, "cloud-computing"),
                hit("AI", 0.6, false, "AI"),
            ],
            0.7,
            0.0,
        );
        let reason = explain(&r, 1, &ThemeScoring::default());
        let line = render_legacy(&reason);
        for theme in &reason.themes_used {
            assert!(line.contains(theme.as_str()), "{line}");
        }
        assert!(line.contains("why: rank 1"));
    }
}
