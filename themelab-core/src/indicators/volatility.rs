//! Volatility: sample standard deviation (ddof = 1) of the last `window`
//! simple daily returns.
//!
//! Lookback: window (window + 1 closes give window returns).

use crate::domain::PriceBar;
use crate::indicators::Indicator;

#[derive(Debug, Clone)]
pub struct Volatility {
    window: usize,
    name: String,
}

impl Volatility {
    pub fn new(window: usize) -> Self {
        assert!(window >= 2, "Volatility window must be >= 2");
        Self {
            window,
            name: format!("volatility_{window}"),
        }
    }
}

impl Indicator for Volatility {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.window
    }

    fn value(&self, bars: &[PriceBar]) -> Option<f64> {
        let n = bars.len();
        if n <= self.window {
            return None;
        }
        let tail = &bars[n - 1 - self.window..];
        let returns: Vec<f64> = tail
            .windows(2)
            .map(|w| w[1].close / w[0].close - 1.0)
            .collect();

        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let ss: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum();
        Some((ss / (returns.len() - 1) as f64).sqrt())
    }
}
