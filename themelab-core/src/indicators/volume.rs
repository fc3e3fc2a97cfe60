//! Average volume over the last `window` bars.

use crate::domain::PriceBar;
use crate::indicators::Indicator;

#[derive(Debug, Clone)]
pub struct AverageVolume {
    window: usize,
    name: String,
}

impl AverageVolume {
    pub fn new(window: usize) -> Self {
        assert!(window >= 1, "AverageVolume window must be >= 1");
        Self {
            window,
            name: format!("avg_volume_{window}"),
        }
    }
}

impl Indicator for AverageVolume {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.window - 1
    }

    fn value(&self, bars: &[PriceBar]) -> Option<f64> {
        let n = bars.len();
        if n < self.window {
            return None;
        }
        let sum: f64 = bars[n - self.window..].iter().map(|b| b.volume).sum();
        Some(sum / self.window as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn averages_the_tail() {
        let mut bars = make_bars(&[1.0, 1.0, 1.0, 1.0]);
        for (i, b) in bars.iter_mut().enumerate() {
            b.volume = (i + 1) as f64 * 100.0;
        }
        let avg = AverageVolume::new(2);
        assert_approx(avg.value(&bars).unwrap(), 350.0, DEFAULT_EPSILON);
    }

    #[test]
    fn too_few_bars() {
        assert!(AverageVolume::new(5).value(&make_bars(&[1.0])).is_none());
    }
}
