//! Shared fixtures: a small signal config, a typed theme map and an
//! eight-security in-memory universe with deterministic prices.

#![allow(dead_code)]

use chrono::NaiveDate;
use std::path::Path;

use themelab_core::domain::{trailing_weekdays, PriceBar, SecurityMetadata};
use themelab_core::signal::Signal;
use themelab_core::theme::ThemeMapEntry;
use themelab_runner::config::{parse_signals, parse_theme_map};
use themelab_runner::{InMemoryProvider, RunRequest, ScreenConfig};

pub const SIGNALS_TOML: &str = r#"
[[signals]]
id = "signal_001"
theme = "Cloud"
keywords = ["SaaS"]
priority = "high"

[[signals]]
id = "signal_002"
theme = "AI"
keywords = ["machine learning"]
priority = "medium"

[[signals]]
id = "signal_003"
theme = "Chips"
priority = "high"

[[signals]]
id = "signal_004"
theme = "Robotics"
priority = "low"

[[signals]]
id = "signal_005"
theme = "Quantum"
keywords = ["quantum"]
priority = "high"
enabled = false

[[signals]]
id = "signal_009"
theme = "Speculation"
keywords = ["meme"]
risk_only = true
"#;

pub const THEME_MAP_CSV: &str = "\
theme_id,map_type,map_values,keywords
signal_001,concept,cloud-computing,
signal_002,concept,AI,
signal_003,industry,semiconductors,
signal_004,concept,robotics,
signal_005,concept,quantum-computing,
signal_404,concept,nothing-maps-here,
";

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Friday 2026-01-09.
pub fn eval_date() -> NaiveDate {
    d(2026, 1, 9)
}

pub fn signals() -> Vec<Signal> {
    parse_signals(SIGNALS_TOML, Path::new("signals.toml")).unwrap()
}

pub fn theme_map() -> Vec<ThemeMapEntry> {
    parse_theme_map(THEME_MAP_CSV, Path::new("theme_map.csv")).unwrap()
}

pub fn request(top_n: usize) -> RunRequest {
    RunRequest {
        requested_date: eval_date(),
        top_n,
        signals: signals(),
        theme_map: theme_map(),
        config: ScreenConfig::default(),
        theme_weight_override: None,
    }
}

/// (ticker, name, industry, concept, description, daily drift)
pub const SECURITIES: &[(&str, &str, &str, &str, &str, f64)] = &[
    ("000001", "CloudCo", "Software", "cloud-computing、AI", "", 0.004),
    ("000002", "ChipCo", "semiconductors", "AI", "", 0.003),
    ("000003", "BotCo", "Machinery", "robotics", "", 0.002),
    ("000004", "QuantCo", "Software", "quantum-computing", "", 0.001),
    ("000005", "MemeCo", "Retail", "meme stocks", "", 0.0),
    (
        "000006",
        "GridCo",
        "Utilities",
        "power",
        "Utility applying machine learning to grid operations",
        -0.001,
    ),
    ("000007", "SubsCo", "Software", "SaaS", "", 0.0025),
    ("000008", "BankCo", "Banking", "banks", "", -0.002),
];

pub fn securities() -> Vec<SecurityMetadata> {
    SECURITIES
        .iter()
        .map(|(ticker, name, industry, concept, description, _)| {
            SecurityMetadata::new(ticker, name, industry, concept).with_description(description)
        })
        .collect()
}

/// `count` weekday bars ending at `end`: compounded drift plus a small
/// deterministic wiggle so volatility is never zero.
pub fn series(ticker: &str, end: NaiveDate, count: usize, drift: f64) -> Vec<PriceBar> {
    trailing_weekdays(end, count)
        .into_iter()
        .enumerate()
        .map(|(i, date)| {
            let wiggle = 1.0 + 0.01 * (i as f64 * 0.7).sin();
            PriceBar {
                ticker: ticker.to_string(),
                date,
                close: 10.0 * (1.0 + drift).powi(i as i32) * wiggle,
                volume: 1_000_000.0 * (1 + i % 5) as f64,
            }
        })
        .collect()
}

/// 70 bars per security ending at the evaluation date.
pub fn bars() -> Vec<PriceBar> {
    SECURITIES
        .iter()
        .flat_map(|(ticker, _, _, _, _, drift)| series(ticker, eval_date(), 70, *drift))
        .collect()
}

pub fn provider() -> InMemoryProvider {
    InMemoryProvider::new("fixture", securities(), bars())
}

/// Write a snapshot directory for `date` under `base`.
pub fn write_snapshot(base: &Path, date: NaiveDate, membership: &str, prices: &str) {
    let dir = base.join(date.format("%Y-%m-%d").to_string());
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("concept_membership.csv"), membership).unwrap();
    std::fs::write(dir.join("prices.csv"), prices).unwrap();
}

/// The fixture universe rendered as snapshot CSV files.
pub fn snapshot_csvs() -> (String, String) {
    let mut membership = String::from("ticker,name,industry,concept,description\n");
    for (ticker, name, industry, concept, description, _) in SECURITIES {
        membership.push_str(&format!(
            "{ticker},{name},{industry},\"{concept}\",\"{description}\"\n"
        ));
    }
    let mut prices = String::from("ticker,date,close,volume\n");
    for bar in bars() {
        prices.push_str(&format!(
            "{},{},{},{}\n",
            bar.ticker, bar.date, bar.close, bar.volume
        ));
    }
    (membership, prices)
}
