//! Per-security theme matching.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{LabelKind, SecurityMetadata};
use crate::text::canonicalize_term;
use crate::theme::hit::{HitEvidence, MatchSource, ThemeHit};
use crate::theme::index::{TermIndex, TermRef};

/// Find every theme the security is evidenced for.
///
/// - Industry/concept labels equal to an indexed map term give `map` hits,
///   provided the map entry enumerates that label kind.
/// - Ticker-typed map entries give `map` hits with path `ticker`.
/// - Signal keywords contained in a label, or else in the description, give
///   `signals` hits.
///
/// Hits on the same theme collapse into one, keeping the maximum weight.
/// The result is sorted by weight descending, then theme ascending.
pub fn match_security(security: &SecurityMetadata, index: &TermIndex) -> Vec<ThemeHit> {
    let labels: Vec<(LabelKind, &str, String)> = security
        .labels()
        .into_iter()
        .map(|l| (l.kind, l.text, canonicalize_term(l.text)))
        .collect();

    let mut merged: BTreeMap<String, Accumulator> = BTreeMap::new();

    for (kind, text, canonical) in &labels {
        for reference in index.label_refs(canonical) {
            if reference.kinds.contains(kind) {
                record(&mut merged, reference, text, *kind);
            }
        }
    }

    for reference in index.ticker_refs(&security.ticker) {
        record(&mut merged, reference, &security.ticker, LabelKind::Ticker);
    }

    let description = canonicalize_term(&security.description);
    for (keyword, reference) in index.keywords() {
        let in_label = labels
            .iter()
            .find(|(kind, _, canonical)| {
                reference.kinds.contains(kind) && canonical.contains(keyword.as_str())
            })
            .map(|(kind, _, _)| *kind);
        let path = match in_label {
            Some(kind) => kind,
            None if description.contains(keyword.as_str()) => LabelKind::Description,
            None => continue,
        };
        record(&mut merged, reference, &reference.term, path);
    }

    let mut hits: Vec<ThemeHit> = merged.into_values().map(Accumulator::finish).collect();
    hits.sort_by(compare_hits);
    hits
}

/// Weight descending, then theme ascending.
pub fn compare_hits(a: &ThemeHit, b: &ThemeHit) -> Ordering {
    b.weight
        .total_cmp(&a.weight)
        .then_with(|| a.theme.cmp(&b.theme))
}

fn record(
    merged: &mut BTreeMap<String, Accumulator>,
    reference: &TermRef,
    matched: &str,
    path: LabelKind,
) {
    merged
        .entry(reference.theme_key.clone())
        .or_insert_with(|| Accumulator::new(reference))
        .add(reference, matched, path);
}

struct Accumulator {
    theme: String,
    signal_id: String,
    weight: f64,
    signal_ids: BTreeSet<String>,
    terms: BTreeSet<String>,
    sources: BTreeSet<MatchSource>,
    paths: BTreeSet<LabelKind>,
    evidence: BTreeSet<HitEvidence>,
    risk: bool,
}

impl Accumulator {
    fn new(reference: &TermRef) -> Self {
        Self {
            theme: reference.theme.clone(),
            signal_id: reference.signal_id.clone(),
            weight: reference.weight,
            signal_ids: BTreeSet::new(),
            terms: BTreeSet::new(),
            sources: BTreeSet::new(),
            paths: BTreeSet::new(),
            evidence: BTreeSet::new(),
            risk: false,
        }
    }

    fn add(&mut self, reference: &TermRef, matched: &str, path: LabelKind) {
        let dominates = match reference.weight.total_cmp(&self.weight) {
            Ordering::Greater => true,
            Ordering::Equal => reference.signal_id < self.signal_id,
            Ordering::Less => false,
        };
        if dominates {
            self.weight = reference.weight;
            self.signal_id = reference.signal_id.clone();
            self.theme = reference.theme.clone();
        }
        self.signal_ids.insert(reference.signal_id.clone());
        self.terms.insert(matched.to_string());
        self.sources.insert(reference.source);
        self.paths.insert(path);
        self.evidence.insert(HitEvidence {
            term: matched.to_string(),
            source: reference.source,
            path,
        });
        self.risk |= reference.risk;
    }

    fn finish(self) -> ThemeHit {
        ThemeHit {
            theme: self.theme,
            signal_id: self.signal_id,
            signal_ids: self.signal_ids.into_iter().collect(),
            weight: self.weight,
            matched_terms: self.terms.into_iter().collect(),
            matched_source: self.sources.into_iter().collect(),
            match_path: self.paths.into_iter().collect(),
            risk: self.risk,
            evidence: self.evidence.into_iter().collect(),
        }
    }
}
