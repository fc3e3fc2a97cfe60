//! ThemeLab Runner: screen orchestration, providers, reports, cache.
//!
//! This crate builds on `themelab-core` to provide:
//! - Signal, theme-map and screen config loading
//! - Data providers (snapshot files, deterministic mock, in-memory)
//! - The screen pipeline with parallel per-security evaluation
//! - Deterministic Top-N ranking and per-row explanations
//! - JSON/CSV report artifacts
//! - A fingerprint-keyed report cache

pub mod atomic;
pub mod cache;
pub mod config;
pub mod explain;
pub mod provider;
pub mod ranking;
pub mod report;
pub mod runner;

pub use cache::{CacheEntry, CacheError, ReportCache};
pub use config::{
    load_screen_config, load_signals, load_theme_map, PipelineConfig, ScreenConfig,
    ShortHistoryPolicy,
};
pub use explain::{explain, render_legacy, Reason};
pub use provider::{DataProvider, InMemoryProvider, MockProvider, SnapshotProvider, Universe};
pub use ranking::{select_top, RankingError, ScoredSecurity};
pub use report::{write_report, Report, ReportError, ReportMeta, ReportRow, SCHEMA_VERSION};
pub use runner::{fingerprint_for, run_screen, run_screen_cached, RunError, RunRequest};
