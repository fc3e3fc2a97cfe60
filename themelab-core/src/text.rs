//! Term canonicalization shared by every side of theme matching.
//!
//! Signal themes, signal keywords, theme-map keys, theme-map values and
//! security labels all pass through [`canonicalize_term`] before they are
//! compared. Using one function for all of them is what keeps a theme named
//! `"Cloud Computing"` in the signal config and `"ｃｌｏｕｄ　computing"` in the
//! theme map from silently producing zero hits.

/// Separators accepted inside a delimited label or value column.
///
/// ASCII comma/semicolon/pipe, their full-width forms and the CJK enumeration
/// comma.
pub const TERM_SEPARATORS: &[char] = &[',', '，', ';', '；', '、', '|'];

/// Canonical form of a term: full-width ASCII folded to half-width, the
/// ideographic space folded to a plain space, lowercased, whitespace runs
/// collapsed to a single space, trimmed.
///
/// Non-Latin scripts pass through unchanged apart from the folding above, so
/// `"云计算"` stays `"云计算"`.
pub fn canonicalize_term(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;

    for ch in raw.chars().map(fold_width) {
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.extend(ch.to_lowercase());
    }

    out
}

/// Split a delimited column into trimmed, non-empty terms, original spelling
/// kept. Inner spaces survive so multi-word labels such as `"cloud computing"`
/// stay whole.
pub fn split_terms(raw: &str) -> Vec<String> {
    raw.split(|c: char| TERM_SEPARATORS.contains(&c))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn fold_width(ch: char) -> char {
    match ch {
        '\u{3000}' => ' ',
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(ch as u32 - 0xFEE0).unwrap_or(ch),
        _ => ch,
    }
}
