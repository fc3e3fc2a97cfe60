//! ThemeLab Core: domain types, theme matching, indicators, scoring.
//!
//! This crate contains the pure, I/O-free part of the screener:
//! - Domain types (securities, price bars, trading calendar)
//! - Signals and the theme map, normalized at load time
//! - Term indexing and per-security theme matching
//! - Bounded theme score aggregation
//! - Point-in-time technical indicators
//! - Score fusion and run fingerprinting

pub mod domain;
pub mod error;
pub mod fingerprint;
pub mod indicators;
pub mod scoring;
pub mod signal;
pub mod text;
pub mod theme;

pub use error::{ConfigError, DataIntegrityError};
