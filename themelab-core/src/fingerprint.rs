//! Run fingerprinting: deterministic identification of a screen run.
//!
//! - `digest`: BLAKE3 of the canonical JSON of any serializable input.
//! - `RunKey`: everything that can change a report, reduced to digests.
//! - `Fingerprint`: the hex key a report is cached under.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bump when the report format or any scoring semantics change, so entries
/// cached by an older build are never replayed.
pub const FINGERPRINT_VERSION: &str = "THEMEFP_V2";

/// Content-addressed identity of a run (64 hex chars).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the string has the shape of a fingerprint. Used to tell cache
    /// entry directories apart from anything else under the cache root.
    pub fn is_well_formed(raw: &str) -> bool {
        raw.len() == 64 && raw.chars().all(|c| c.is_ascii_hexdigit())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// BLAKE3 hex digest of a value's JSON serialization.
///
/// Struct fields serialize in declaration order and maps should be
/// `BTreeMap`, so equal values always produce equal digests.
pub fn digest<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    Ok(blake3::hash(&json).to_hex().to_string())
}

/// Inputs that determine a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunKey {
    pub version: String,
    pub requested_date: NaiveDate,
    pub evaluation_date: NaiveDate,
    pub top_n: usize,
    pub signals_digest: String,
    pub theme_map_digest: String,
    pub provider: String,
    pub snapshot: Option<String>,
    /// Digest of provider settings that change the loaded data.
    pub provider_params_digest: String,
    pub theme_weight_override: Option<f64>,
    /// Digest of the scoring, theme and pipeline settings that affect output.
    pub settings_digest: String,
}

impl RunKey {
    pub fn fingerprint(&self) -> Result<Fingerprint, serde_json::Error> {
        digest(self).map(Fingerprint)
    }
}
