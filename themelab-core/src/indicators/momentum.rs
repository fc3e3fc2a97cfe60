//! Momentum: simple return over a fixed offset.
//!
//! momentum[t] = close[t] / close[t - offset] - 1
//! Lookback: offset.

use crate::domain::PriceBar;
use crate::indicators::Indicator;

#[derive(Debug, Clone)]
pub struct Momentum {
    offset: usize,
    name: String,
}

impl Momentum {
    /// `name` is the reported name, `offset` the number of bars back the
    /// reference close sits. A 60-bar inclusive window has offset 59.
    pub fn new(name: &str, offset: usize) -> Self {
        assert!(offset >= 1, "Momentum offset must be >= 1");
        Self {
            offset,
            name: name.to_string(),
        }
    }
}

impl Indicator for Momentum {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.offset
    }

    fn value(&self, bars: &[PriceBar]) -> Option<f64> {
        let n = bars.len();
        if n <= self.offset {
            return None;
        }
        let prev = bars[n - 1 - self.offset].close;
        let curr = bars[n - 1].close;
        if prev == 0.0 {
            return None;
        }
        Some(curr / prev - 1.0)
    }
}
