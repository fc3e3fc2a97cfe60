//! PriceBar: the unit of price history fed to the indicator calculator.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily close and traded volume for one security on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub ticker: String,
    pub date: NaiveDate,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Returns true if close or volume is NaN or infinite.
    pub fn is_void(&self) -> bool {
        !self.close.is_finite() || !self.volume.is_finite()
    }

    /// Close is finite and positive, volume is finite and non-negative.
    pub fn is_sane(&self) -> bool {
        !self.is_void() && self.close > 0.0 && self.volume >= 0.0
    }
}

/// The prefix of a date-ascending series visible at `evaluation_date`.
///
/// Bars dated after the evaluation date are never returned, whatever the
/// provider handed over.
pub fn visible_bars(bars: &[PriceBar], evaluation_date: NaiveDate) -> &[PriceBar] {
    let end = bars.partition_point(|b| b.date <= evaluation_date);
    &bars[..end]
}
