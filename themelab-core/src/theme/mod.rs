//! Theme matching: theme map normalization, term indexing, per-security
//! matching and bounded score aggregation.

pub mod aggregate;
pub mod hit;
pub mod index;
pub mod map;
pub mod matcher;

pub use aggregate::{aggregate_theme_score, ThemeScoring};
pub use hit::{HitEvidence, MatchSource, ThemeHit};
pub use index::{build_term_index, is_indexable_keyword, TermIndex, TermRef};
pub use map::{flatten_labels, normalize_theme_map, MapOrigin, MapType, RawThemeMapRow, ThemeMapEntry};
pub use matcher::{compare_hits, match_security};
