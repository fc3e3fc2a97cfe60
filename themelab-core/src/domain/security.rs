//! Security metadata and the labels theme matching reads from it.

use serde::{Deserialize, Serialize};

use crate::text::split_terms;

/// Width of a normalized numeric ticker.
pub const TICKER_WIDTH: usize = 6;

/// Normalize a ticker id: all-digit ids are zero-padded to [`TICKER_WIDTH`],
/// anything else is trimmed and kept as is.
///
/// CSV round-trips through spreadsheet tools routinely turn `"000001"` into
/// `1`; padding restores the fixed-width form so joins across files agree.
pub fn normalize_ticker(raw: &str) -> String {
    let s = raw.trim();
    let s = s.strip_suffix(".0").unwrap_or(s);
    if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        format!("{s:0>width$}", width = TICKER_WIDTH)
    } else {
        s.to_string()
    }
}

/// Where on a security a matched label came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    Industry,
    Concept,
    Ticker,
    Description,
}

impl LabelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Industry => "industry",
            Self::Concept => "concept",
            Self::Ticker => "ticker",
            Self::Description => "description",
        }
    }
}

/// A single label carried by a security.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label<'a> {
    pub kind: LabelKind,
    pub text: &'a str,
}

/// Descriptive metadata for one security as of the data date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityMetadata {
    pub ticker: String,
    pub name: String,
    pub industry: String,
    /// One concept or a delimited list of concepts.
    pub concept: String,
    pub description: String,
}

impl SecurityMetadata {
    pub fn new(ticker: &str, name: &str, industry: &str, concept: &str) -> Self {
        Self {
            ticker: normalize_ticker(ticker),
            name: name.trim().to_string(),
            industry: industry.trim().to_string(),
            concept: concept.trim().to_string(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.trim().to_string();
        self
    }

    /// Industry and concept labels, split on the usual delimiters.
    ///
    /// The description is not a label; keyword matching reads it separately.
    pub fn labels(&self) -> Vec<Label<'_>> {
        let mut labels = Vec::new();
        for part in split_terms_ref(&self.industry) {
            labels.push(Label {
                kind: LabelKind::Industry,
                text: part,
            });
        }
        for part in split_terms_ref(&self.concept) {
            labels.push(Label {
                kind: LabelKind::Concept,
                text: part,
            });
        }
        labels
    }

    /// Concept labels as owned strings.
    pub fn concepts(&self) -> Vec<String> {
        split_terms(&self.concept)
    }
}

/// Borrowing variant of [`split_terms`] used for labels.
fn split_terms_ref(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(|c: char| crate::text::TERM_SEPARATORS.contains(&c))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
