//! Point-in-time technical indicators.
//!
//! Every indicator reads a date-ascending bar series whose last bar is the
//! most recent one visible at the evaluation date, and returns a single value
//! for that bar. [`compute`] cuts the series at the evaluation date before any
//! indicator sees it, so a bar dated after the evaluation date can never
//! influence a value.

pub mod momentum;
pub mod volatility;
pub mod volume;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{visible_bars, PriceBar};
use crate::error::DataIntegrityError;

pub use momentum::Momentum;
pub use volatility::Volatility;
pub use volume::AverageVolume;

/// Bars required for the full indicator set.
pub const FULL_HISTORY: usize = 61;

/// Trait for point-in-time indicators.
///
/// # Look-ahead contamination guard
/// `value` may only read `bars`; callers pass the series already truncated at
/// the evaluation date.
pub trait Indicator: Send + Sync {
    /// Reported name (e.g., "momentum_20").
    fn name(&self) -> &str;

    /// Number of bars before the last one that the value depends on.
    fn lookback(&self) -> usize;

    /// Value at the last bar, or `None` when the series is too short.
    fn value(&self, bars: &[PriceBar]) -> Option<f64>;
}

/// The indicator set the scoring engine consumes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Indicators {
    pub momentum_20: f64,
    pub momentum_60: f64,
    pub volatility_20: f64,
    pub avg_volume_20: f64,
}

impl Indicators {
    pub fn is_finite(&self) -> bool {
        self.momentum_20.is_finite()
            && self.momentum_60.is_finite()
            && self.volatility_20.is_finite()
            && self.avg_volume_20.is_finite()
    }
}

/// Compute the indicator set for one security at `evaluation_date`.
///
/// Bars must be strictly ascending by date. At least
/// `max(FULL_HISTORY, min_history)` bars dated on or before the evaluation
/// date are required; closes in that window must be finite and positive.
pub fn compute(
    ticker: &str,
    bars: &[PriceBar],
    evaluation_date: NaiveDate,
    min_history: usize,
) -> Result<Indicators, DataIntegrityError> {
    if let Some(w) = bars.windows(2).find(|w| w[1].date <= w[0].date) {
        return Err(DataIntegrityError::UnorderedBars {
            ticker: ticker.to_string(),
            date: w[1].date,
        });
    }

    let visible = visible_bars(bars, evaluation_date);
    let required = FULL_HISTORY.max(min_history);
    if visible.len() < required {
        return Err(DataIntegrityError::InsufficientHistory {
            ticker: ticker.to_string(),
            evaluation_date,
            required,
            available: visible.len(),
        });
    }

    let window = &visible[visible.len() - required..];
    for bar in window {
        if !bar.close.is_finite() {
            return Err(non_finite(ticker, "close"));
        }
        if !bar.volume.is_finite() {
            return Err(non_finite(ticker, "volume"));
        }
        if bar.close <= 0.0 {
            return Err(DataIntegrityError::NonPositiveClose {
                ticker: ticker.to_string(),
                date: bar.date,
                close: bar.close,
            });
        }
        if bar.volume < 0.0 {
            return Err(DataIntegrityError::NegativeVolume {
                ticker: ticker.to_string(),
                date: bar.date,
                volume: bar.volume,
            });
        }
    }

    Ok(Indicators {
        momentum_20: finite_value(&Momentum::new("momentum_20", 20), ticker, window)?,
        momentum_60: finite_value(&Momentum::new("momentum_60", 59), ticker, window)?,
        volatility_20: finite_value(&Volatility::new(20), ticker, window)?,
        avg_volume_20: finite_value(&AverageVolume::new(20), ticker, window)?,
    })
}

fn finite_value(
    indicator: &dyn Indicator,
    ticker: &str,
    bars: &[PriceBar],
) -> Result<f64, DataIntegrityError> {
    match indicator.value(bars) {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(non_finite(ticker, indicator.name())),
    }
}

fn non_finite(ticker: &str, field: &str) -> DataIntegrityError {
    DataIntegrityError::NonFinite {
        ticker: ticker.to_string(),
        field: field.to_string(),
    }
}

/// Create synthetic bars from close prices for testing.
///
/// One bar per calendar day from 2024-01-02, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<PriceBar> {
    let base_date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar {
            ticker: "TEST".to_string(),
            date: base_date + chrono::Duration::days(i as i64),
            close,
            volume: 1000.0,
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
