//! Screen configuration and input file loading.
//!
//! Three inputs are read from disk, each once per run:
//! - the signal config (TOML, `[[signals]]` tables);
//! - the theme map (CSV, legacy or typed schema);
//! - the screen config (TOML, `[scoring]`, `[theme]`, `[pipeline]`), optional.

use serde::{Deserialize, Serialize};
use std::path::Path;

use themelab_core::error::ConfigError;
use themelab_core::scoring::ScoreWeights;
use themelab_core::signal::{resolve_signals, Signal, SignalSpec};
use themelab_core::theme::{normalize_theme_map, RawThemeMapRow, ThemeMapEntry, ThemeScoring};

/// What to do with a security that has too little price history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortHistoryPolicy {
    /// Abort the run with a data integrity error.
    #[default]
    Fail,
    /// Drop the security and count it in the report diagnostics.
    Exclude,
}

/// `[pipeline]` settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub min_history: usize,
    pub short_history: ShortHistoryPolicy,
    /// Band for the number of distinct themes across the report rows.
    pub convergence_min: usize,
    pub convergence_max: usize,
    /// Evaluate securities on the rayon pool. Does not change the output.
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_history: themelab_core::indicators::FULL_HISTORY,
            short_history: ShortHistoryPolicy::Fail,
            convergence_min: 3,
            convergence_max: 5,
            parallel: true,
        }
    }
}

/// Complete screen configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub scoring: ScoreWeights,
    pub theme: ThemeScoring,
    pub pipeline: PipelineConfig,
}

/// The part of [`ScreenConfig`] that can change a report; fingerprinted.
#[derive(Debug, Serialize)]
pub struct FingerprintedSettings<'a> {
    pub scoring: &'a ScoreWeights,
    pub theme: &'a ThemeScoring,
    pub min_history: usize,
    pub short_history: ShortHistoryPolicy,
    pub convergence_min: usize,
    pub convergence_max: usize,
}

impl ScreenConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scoring.validate()?;
        self.theme.validate()?;
        if self.pipeline.convergence_min > self.pipeline.convergence_max {
            return Err(ConfigError::Invalid(format!(
                "pipeline.convergence_min ({}) exceeds convergence_max ({})",
                self.pipeline.convergence_min, self.pipeline.convergence_max
            )));
        }
        if self.pipeline.min_history == 0 {
            return Err(ConfigError::Invalid("pipeline.min_history must be > 0".into()));
        }
        Ok(())
    }

    pub fn fingerprinted(&self) -> FingerprintedSettings<'_> {
        FingerprintedSettings {
            scoring: &self.scoring,
            theme: &self.theme,
            min_history: self.pipeline.min_history,
            short_history: self.pipeline.short_history,
            convergence_min: self.pipeline.convergence_min,
            convergence_max: self.pipeline.convergence_max,
        }
    }
}

/// Parse a screen config from TOML text. Missing sections and fields take
/// their defaults.
pub fn parse_screen_config(text: &str, path: &Path) -> Result<ScreenConfig, ConfigError> {
    let config: ScreenConfig = toml::from_str(text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}

/// Load the screen config, or the defaults when no path is given.
pub fn load_screen_config(path: Option<&Path>) -> Result<ScreenConfig, ConfigError> {
    match path {
        Some(path) => parse_screen_config(&read_text(path)?, path),
        None => Ok(ScreenConfig::default()),
    }
}

#[derive(Debug, Deserialize)]
struct SignalFile {
    #[serde(default)]
    signals: Vec<SignalSpec>,
}

/// Parse and resolve a signal config from TOML text.
pub fn parse_signals(text: &str, path: &Path) -> Result<Vec<Signal>, ConfigError> {
    let file: SignalFile = toml::from_str(text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if file.signals.is_empty() {
        return Err(ConfigError::Parse {
            path: path.to_path_buf(),
            reason: "no [[signals]] defined".into(),
        });
    }
    resolve_signals(file.signals)
}

pub fn load_signals(path: &Path) -> Result<Vec<Signal>, ConfigError> {
    parse_signals(&read_text(path)?, path)
}

const THEME_COLUMNS: &[&str] = &["theme_id", "theme", "主题id"];
const LEGACY_VALUE_COLUMNS: &[&str] = &["concepts", "对应行业/概念"];
const KEYWORD_COLUMNS: &[&str] = &["keywords", "关键词"];
const MAP_TYPE_COLUMNS: &[&str] = &["map_type"];
const MAP_VALUES_COLUMNS: &[&str] = &["map_values"];

/// Column layout of a theme-map file.
#[derive(Debug, Clone, Copy)]
enum MapColumns {
    Typed { map_type: usize, map_values: usize },
    Legacy { concepts: usize },
}

/// Read theme-map rows from CSV text without normalizing them.
///
/// The schema is typed when both `map_type` and `map_values` columns exist,
/// legacy otherwise.
pub fn read_theme_map_rows(text: &str, path: &Path) -> Result<Vec<RawThemeMapRow>, ConfigError> {
    let parse_err = |reason: String| ConfigError::Parse {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| parse_err(e.to_string()))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase())
        .collect();

    let find = |aliases: &[&str]| headers.iter().position(|h| aliases.contains(&h.as_str()));
    let theme_col = find(THEME_COLUMNS).ok_or_else(|| {
        parse_err(format!(
            "missing theme column (one of {THEME_COLUMNS:?}); columns={headers:?}"
        ))
    })?;
    let keyword_col = find(KEYWORD_COLUMNS);
    let columns = match (find(MAP_TYPE_COLUMNS), find(MAP_VALUES_COLUMNS), find(LEGACY_VALUE_COLUMNS)) {
        (Some(map_type), Some(map_values), _) => MapColumns::Typed {
            map_type,
            map_values,
        },
        (_, _, Some(concepts)) => MapColumns::Legacy { concepts },
        _ => {
            return Err(parse_err(format!(
                "missing value columns: need map_type+map_values or one of \
                 {LEGACY_VALUE_COLUMNS:?}; columns={headers:?}"
            )))
        }
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| parse_err(e.to_string()))?;
        let field = |i: usize| record.get(i).unwrap_or("").to_string();
        let theme = field(theme_col);
        let keywords = keyword_col.map(&field);
        rows.push(match columns {
            MapColumns::Typed {
                map_type,
                map_values,
            } => RawThemeMapRow::Typed {
                theme,
                map_type: field(map_type),
                map_values: field(map_values),
                keywords,
            },
            MapColumns::Legacy { concepts } => RawThemeMapRow::Legacy {
                theme,
                concepts: field(concepts),
                keywords,
            },
        });
    }
    Ok(rows)
}

/// Parse and normalize a theme map from CSV text.
pub fn parse_theme_map(text: &str, path: &Path) -> Result<Vec<ThemeMapEntry>, ConfigError> {
    let entries = normalize_theme_map(read_theme_map_rows(text, path)?)?;
    if entries.is_empty() {
        return Err(ConfigError::EmptyThemeMap);
    }
    Ok(entries)
}

pub fn load_theme_map(path: &Path) -> Result<Vec<ThemeMapEntry>, ConfigError> {
    parse_theme_map(&read_text(path)?, path)
}

fn read_text(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use themelab_core::theme::{MapOrigin, MapType};

    fn p() -> &'static Path {
        Path::new("test.toml")
    }

    #[test]
    fn default_screen_config_is_valid() {
        let c = ScreenConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.pipeline.min_history, 61);
        assert_eq!(c.pipeline.short_history, ShortHistoryPolicy::Fail);
        assert_eq!((c.pipeline.convergence_min, c.pipeline.convergence_max), (3, 5));
    }

    #[test]
    fn partial_screen_config_keeps_defaults() {
        let c = parse_screen_config(
            "[scoring]\ntheme = 2.0\n\n[pipeline]\nshort_history = \"exclude\"\n",
            p(),
        )
        .unwrap();
        assert_eq!(c.scoring.theme, 2.0);
        assert_eq!(c.scoring.momentum_20, 0.5);
        assert_eq!(c.pipeline.short_history, ShortHistoryPolicy::Exclude);
        assert_eq!(c.theme.concept_decay, 0.5);
    }

    #[test]
    fn inverted_convergence_band_is_rejected() {
        let err = parse_screen_config("[pipeline]\nconvergence_min = 6\nconvergence_max = 2\n", p())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn parallel_is_not_fingerprinted() {
        let mut a = ScreenConfig::default();
        let mut b = ScreenConfig::default();
        a.pipeline.parallel = true;
        b.pipeline.parallel = false;
        let da = themelab_core::fingerprint::digest(&a.fingerprinted()).unwrap();
        let db = themelab_core::fingerprint::digest(&b.fingerprinted()).unwrap();
        assert_eq!(da, db);
    }

    #[test]
    fn signals_parse_from_toml() {
        let text = r#"
[[signals]]
id = "signal_001"
theme = "Cloud"
keywords = ["cloud", "SaaS"]
priority = "high"

[[signals]]
id = "signal_009"
theme = "Speculation"
risk_only = true
"#;
        let signals = parse_signals(text, p()).unwrap();
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].weight, 1.0);
        assert_eq!(signals[1].weight, 0.0);
        assert!(signals[1].risk_only);
    }

    #[test]
    fn empty_signal_file_is_rejected() {
        assert!(matches!(
            parse_signals("", p()).unwrap_err(),
            ConfigError::Parse { .. }
        ));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            parse_signals("[[signals]\nid=", p()).unwrap_err(),
            ConfigError::Parse { .. }
        ));
    }

    #[test]
    fn typed_theme_map_csv() {
        let text = "theme_id,map_type,map_values,keywords\nsignal_001,concept,cloud-computing,\n";
        let entries = parse_theme_map(text, Path::new("map.csv")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].map_type, MapType::Concept);
        assert_eq!(entries[0].origin, MapOrigin::Typed);
        assert_eq!(entries[0].terms, vec!["cloud-computing"]);
    }

    #[test]
    fn legacy_theme_map_csv_with_chinese_headers() {
        let text = "\u{feff}主题ID,对应行业/概念,关键词\nsignal_002,\"半导体、芯片\",\n";
        let entries = parse_theme_map(text, Path::new("map.csv")).unwrap();
        assert_eq!(entries[0].origin, MapOrigin::Legacy);
        assert_eq!(entries[0].values, vec!["半导体", "芯片"]);
    }

    #[test]
    fn theme_map_without_value_columns_is_rejected() {
        let err = parse_theme_map("theme_id,notes\nx,y\n", Path::new("map.csv")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn theme_map_with_only_empty_rows_is_empty() {
        let err = parse_theme_map("theme_id,concepts\nx,\n", Path::new("map.csv")).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyThemeMap));
    }

    #[test]
    fn missing_theme_map_file_is_an_io_error() {
        let err = load_theme_map(Path::new("/nonexistent/theme_map.csv")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
