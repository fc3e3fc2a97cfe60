//! Term index: canonical term → the (theme, signal, weight) references it evidences.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::{normalize_ticker, LabelKind};
use crate::signal::Signal;
use crate::text::canonicalize_term;
use crate::theme::hit::MatchSource;
use crate::theme::map::{MapType, ThemeMapEntry};

/// Whether a canonical keyword is indexed for substring matching.
///
/// A single ASCII character is contained in nearly every description and is
/// skipped. A single ideograph such as `"锂"` is a word on its own and is kept.
pub fn is_indexable_keyword(key: &str) -> bool {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (None, _) => false,
        (Some(c), None) => !c.is_ascii(),
        (Some(_), Some(_)) => true,
    }
}

/// One indexed reference from a term to a signal's theme.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermRef {
    /// Display name of the theme (the signal's core theme).
    pub theme: String,
    /// Canonical theme name; hits are merged on this.
    pub theme_key: String,
    pub signal_id: String,
    pub weight: f64,
    pub risk: bool,
    pub source: MatchSource,
    /// Security label kinds the term may match.
    pub kinds: Vec<LabelKind>,
    /// The term as written in the config.
    pub term: String,
}

/// Lookup structure built once per run from signals and the theme map.
#[derive(Debug, Clone, Default)]
pub struct TermIndex {
    labels: BTreeMap<String, Vec<TermRef>>,
    tickers: BTreeMap<String, Vec<TermRef>>,
    keywords: Vec<(String, TermRef)>,
    unresolved_keys: Vec<String>,
    skipped_keywords: Vec<String>,
    entry_count: usize,
}

impl TermIndex {
    /// References for a canonical industry/concept label.
    pub fn label_refs(&self, canonical_label: &str) -> &[TermRef] {
        self.labels
            .get(canonical_label)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// References enumerating a normalized ticker.
    pub fn ticker_refs(&self, ticker: &str) -> &[TermRef] {
        self.tickers.get(ticker).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Canonical signal keywords with their references, sorted by keyword.
    pub fn keywords(&self) -> &[(String, TermRef)] {
        &self.keywords
    }

    /// Theme-map keys that resolved to no signal id, theme or core theme.
    pub fn unresolved_keys(&self) -> &[String] {
        &self.unresolved_keys
    }

    /// Signal keywords left out of the index, as written in the config.
    pub fn skipped_keywords(&self) -> &[String] {
        &self.skipped_keywords
    }

    /// Number of theme-map entries the index was built from.
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Number of distinct indexed terms (labels, tickers and keywords).
    pub fn term_count(&self) -> usize {
        let mut distinct_keywords = 0;
        let mut last: Option<&str> = None;
        for (kw, _) in &self.keywords {
            if last != Some(kw.as_str()) {
                distinct_keywords += 1;
                last = Some(kw.as_str());
            }
        }
        self.labels.len() + self.tickers.len() + distinct_keywords
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.tickers.is_empty() && self.keywords.is_empty()
    }
}

/// Build the term index.
///
/// Theme-map keys are resolved to signals by comparing the canonical key with
/// the canonical signal id, theme and core theme, so both sides go through
/// [`canonicalize_term`]. Disabled signals contribute nothing. Keys that match
/// no signal at all are kept in [`TermIndex::unresolved_keys`].
pub fn build_term_index(signals: &[Signal], theme_map: &[ThemeMapEntry]) -> TermIndex {
    let mut by_key: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, signal) in signals.iter().enumerate() {
        for key in [&signal.id, &signal.theme, &signal.core_theme] {
            let slot = by_key.entry(canonicalize_term(key)).or_default();
            if !slot.contains(&i) {
                slot.push(i);
            }
        }
    }

    let mut index = TermIndex {
        entry_count: theme_map.len(),
        ..TermIndex::default()
    };

    for entry in theme_map {
        let Some(signal_idxs) = by_key.get(&canonicalize_term(&entry.theme)) else {
            if !index.unresolved_keys.contains(&entry.theme) {
                index.unresolved_keys.push(entry.theme.clone());
            }
            continue;
        };

        for &i in signal_idxs {
            let signal = &signals[i];
            if !signal.enabled {
                continue;
            }
            for term in &entry.terms {
                let reference = term_ref(signal, MatchSource::Map, entry.label_kinds(), term);
                if entry.map_type == MapType::Ticker {
                    let ticker = normalize_ticker(term);
                    if !ticker.is_empty() {
                        index.tickers.entry(ticker).or_default().push(reference);
                    }
                } else {
                    let key = canonicalize_term(term);
                    if !key.is_empty() {
                        index.labels.entry(key).or_default().push(reference);
                    }
                }
            }
        }
    }

    const KEYWORD_KINDS: &[LabelKind] = &[
        LabelKind::Industry,
        LabelKind::Concept,
        LabelKind::Description,
    ];
    for signal in signals.iter().filter(|s| s.enabled) {
        for keyword in &signal.keywords {
            let key = canonicalize_term(keyword);
            if !is_indexable_keyword(&key) {
                if !index.skipped_keywords.contains(keyword) {
                    index.skipped_keywords.push(keyword.clone());
                }
                continue;
            }
            index.keywords.push((
                key,
                term_ref(signal, MatchSource::Signals, KEYWORD_KINDS, keyword),
            ));
        }
    }
    index
        .keywords
        .sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.signal_id.cmp(&b.1.signal_id)));

    index
}

fn term_ref(signal: &Signal, source: MatchSource, kinds: &[LabelKind], term: &str) -> TermRef {
    TermRef {
        theme: signal.core_theme.clone(),
        theme_key: canonicalize_term(&signal.core_theme),
        signal_id: signal.id.clone(),
        weight: signal.weight,
        risk: signal.risk_only,
        source,
        kinds: kinds.to_vec(),
        term: term.to_string(),
    }
}
