//! Theme map normalization.
//!
//! Two file schemas exist in the wild:
//! - legacy: a theme id plus one delimited column mixing industries and
//!   concepts;
//! - typed: a theme id, a `map_type` of `industry`, `concept` or `ticker`, and
//!   an explicit value list.
//!
//! Both are parsed into [`RawThemeMapRow`] and normalized once, at load time,
//! into [`ThemeMapEntry`]. Matching never sees the raw shapes.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::{normalize_ticker, LabelKind};
use crate::error::ConfigError;
use crate::text::split_terms;

/// What a typed theme-map row enumerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapType {
    Industry,
    Concept,
    Ticker,
}

impl FromStr for MapType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "industry" => Ok(Self::Industry),
            "concept" => Ok(Self::Concept),
            "ticker" => Ok(Self::Ticker),
            other => Err(format!("unknown map_type '{other}'")),
        }
    }
}

/// Which file schema an entry was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapOrigin {
    Legacy,
    Typed,
}

/// One theme-map row as read from disk, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawThemeMapRow {
    Legacy {
        theme: String,
        concepts: String,
        keywords: Option<String>,
    },
    Typed {
        theme: String,
        map_type: String,
        map_values: String,
        keywords: Option<String>,
    },
}

/// Canonical theme-map entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThemeMapEntry {
    /// Theme identifier: a signal id, signal theme or core theme.
    pub theme: String,
    pub map_type: MapType,
    pub origin: MapOrigin,
    /// Enumerated industries, concepts or (normalized) tickers.
    pub values: Vec<String>,
    /// Terms matched against security labels. Explicit keywords when the row
    /// has them, otherwise the values.
    pub terms: Vec<String>,
}

impl ThemeMapEntry {
    /// Security label kinds this entry's terms may match.
    ///
    /// Legacy rows mix industries and concepts in one column, so they match
    /// either kind.
    pub fn label_kinds(&self) -> &'static [LabelKind] {
        match (self.origin, self.map_type) {
            (_, MapType::Ticker) => &[LabelKind::Ticker],
            (MapOrigin::Legacy, _) => &[LabelKind::Industry, LabelKind::Concept],
            (MapOrigin::Typed, MapType::Industry) => &[LabelKind::Industry],
            (MapOrigin::Typed, MapType::Concept) => &[LabelKind::Concept],
        }
    }
}

/// Normalize raw rows of either schema into canonical entries.
///
/// Rows whose value column is empty after splitting are skipped. A blank
/// theme id or an unknown `map_type` is an error, reported with the 1-based
/// data row number.
pub fn normalize_theme_map(rows: Vec<RawThemeMapRow>) -> Result<Vec<ThemeMapEntry>, ConfigError> {
    let mut entries = Vec::with_capacity(rows.len());

    for (i, row) in rows.into_iter().enumerate() {
        let row_no = i + 1;
        let (theme, map_type, origin, raw_values, keywords) = match row {
            RawThemeMapRow::Legacy {
                theme,
                concepts,
                keywords,
            } => (theme, MapType::Concept, MapOrigin::Legacy, concepts, keywords),
            RawThemeMapRow::Typed {
                theme,
                map_type,
                map_values,
                keywords,
            } => {
                let map_type = map_type
                    .parse::<MapType>()
                    .map_err(|reason| ConfigError::InvalidThemeMapRow { row: row_no, reason })?;
                (theme, map_type, MapOrigin::Typed, map_values, keywords)
            }
        };

        let theme = theme.trim().to_string();
        if theme.is_empty() {
            return Err(ConfigError::InvalidThemeMapRow {
                row: row_no,
                reason: "empty theme id".into(),
            });
        }

        let mut values = split_terms(&raw_values);
        if map_type == MapType::Ticker {
            values = values.iter().map(|v| normalize_ticker(v)).collect();
        }
        if values.is_empty() {
            continue;
        }

        let keywords = keywords.as_deref().map(split_terms).unwrap_or_default();
        let terms = if keywords.is_empty() || map_type == MapType::Ticker {
            values.clone()
        } else {
            keywords
        };

        entries.push(ThemeMapEntry {
            theme,
            map_type,
            origin,
            values,
            terms,
        });
    }

    Ok(entries)
}

/// Distinct industry and concept values across the map, first-seen order.
///
/// Used by providers that build a universe from the map.
pub fn flatten_labels(entries: &[ThemeMapEntry]) -> Vec<String> {
    let mut seen = Vec::new();
    for entry in entries {
        if entry.map_type == MapType::Ticker {
            continue;
        }
        for value in &entry.values {
            if !seen.contains(value) {
                seen.push(value.clone());
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_concept_row_normalizes() {
        let entries = normalize_theme_map(vec![RawThemeMapRow::Typed {
            theme: "signal_001".into(),
            map_type: "Concept".into(),
            map_values: "cloud-computing".into(),
            keywords: None,
        }])
        .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].map_type, MapType::Concept);
        assert_eq!(entries[0].terms, vec!["cloud-computing"]);
        assert_eq!(entries[0].label_kinds(), &[LabelKind::Concept]);
    }

    #[test]
    fn legacy_row_with_empty_keywords_falls_back_to_values() {
        let entries = normalize_theme_map(vec![RawThemeMapRow::Legacy {
            theme: "signal_002".into(),
            concepts: "半导体、芯片".into(),
            keywords: Some("  ".into()),
        }])
        .unwrap();
        assert_eq!(entries[0].origin, MapOrigin::Legacy);
        assert_eq!(entries[0].terms, vec!["半导体", "芯片"]);
        assert_eq!(
            entries[0].label_kinds(),
            &[LabelKind::Industry, LabelKind::Concept]
        );
    }

    #[test]
    fn explicit_keywords_become_terms() {
        let entries = normalize_theme_map(vec![RawThemeMapRow::Legacy {
            theme: "t".into(),
            concepts: "储能".into(),
            keywords: Some("battery、储能电池".into()),
        }])
        .unwrap();
        assert_eq!(entries[0].values, vec!["储能"]);
        assert_eq!(entries[0].terms, vec!["battery", "储能电池"]);
    }

    #[test]
    fn ticker_values_are_normalized() {
        let entries = normalize_theme_map(vec![RawThemeMapRow::Typed {
            theme: "t".into(),
            map_type: "ticker".into(),
            map_values: "1、600519".into(),
            keywords: Some("ignored".into()),
        }])
        .unwrap();
        assert_eq!(entries[0].values, vec!["000001", "600519"]);
        assert_eq!(entries[0].terms, entries[0].values);
    }

    #[test]
    fn empty_value_rows_are_skipped() {
        let entries = normalize_theme_map(vec![RawThemeMapRow::Legacy {
            theme: "t".into(),
            concepts: "".into(),
            keywords: None,
        }])
        .unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn unknown_map_type_is_rejected() {
        let err = normalize_theme_map(vec![RawThemeMapRow::Typed {
            theme: "t".into(),
            map_type: "sector".into(),
            map_values: "x".into(),
            keywords: None,
        }])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidThemeMapRow { row: 1, .. }));
    }

    #[test]
    fn blank_theme_is_rejected() {
        let err = normalize_theme_map(vec![RawThemeMapRow::Legacy {
            theme: " ".into(),
            concepts: "x".into(),
            keywords: None,
        }])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidThemeMapRow { .. }));
    }

    #[test]
    fn flatten_skips_tickers_and_dedupes() {
        let entries = normalize_theme_map(vec![
            RawThemeMapRow::Legacy {
                theme: "a".into(),
                concepts: "x、y".into(),
                keywords: None,
            },
            RawThemeMapRow::Typed {
                theme: "b".into(),
                map_type: "industry".into(),
                map_values: "y、z".into(),
                keywords: None,
            },
            RawThemeMapRow::Typed {
                theme: "c".into(),
                map_type: "ticker".into(),
                map_values: "600000".into(),
                keywords: None,
            },
        ])
        .unwrap();
        assert_eq!(flatten_labels(&entries), vec!["x", "y", "z"]);
    }
}
