//! Incremental indicators powered by the `ta` crate
//!
//! The strategy core takes indicator values as inputs; this feed computes them
//! candle by candle for the CLI and scanner:
//! - `ema20`: EMA of closes (reported once `ema_period` candles were seen)
//! - `ema20_slope`: EMA change versus the previous candle
//! - `avg_range`: SMA of candle ranges (reported once `range_period` candles were seen)

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use ta::indicators::{ExponentialMovingAverage, SimpleMovingAverage};
use ta::Next;

use crate::{Candle, IndicatorSnapshot};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub ema_period: usize,
    pub range_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ema_period: 20,
            range_period: 14,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorFeed {
    ema: ExponentialMovingAverage,
    range: SimpleMovingAverage,
    ema_period: usize,
    range_period: usize,
    seen: usize,
    prev_ema: Option<f64>,
}

impl IndicatorFeed {
    pub fn new(ema_period: usize, range_period: usize) -> Result<Self> {
        let ema = ExponentialMovingAverage::new(ema_period)
            .map_err(|e| anyhow!("Invalid EMA period {}: {:?}", ema_period, e))?;
        let range = SimpleMovingAverage::new(range_period)
            .map_err(|e| anyhow!("Invalid range period {}: {:?}", range_period, e))?;

        Ok(Self {
            ema,
            range,
            ema_period,
            range_period,
            seen: 0,
            prev_ema: None,
        })
    }

    pub fn from_config(config: &IndicatorConfig) -> Result<Self> {
        Self::new(config.ema_period, config.range_period)
    }

    /// Candles consumed so far
    pub fn seen(&self) -> usize {
        self.seen
    }

    pub fn next(&mut self, candle: &Candle) -> IndicatorSnapshot {
        self.seen += 1;

        let ema_value = self.ema.next(candle.close);
        let ema20 = (self.seen >= self.ema_period).then_some(ema_value);
        let ema20_slope = match (ema20, self.prev_ema) {
            (Some(current), Some(prev)) => Some(current - prev),
            _ => None,
        };
        self.prev_ema = ema20;

        let range_value = self.range.next(candle.range());
        let avg_range = (self.seen >= self.range_period).then_some(range_value);

        IndicatorSnapshot {
            ema20,
            ema20_slope,
            avg_range,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::{TimeZone, Utc};

    fn candle(index: u64, close: f64, range: f64) -> Candle {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Candle::new_unchecked(index, ts, close, close + range, close, close)
    }

    #[test]
    fn test_warmup_periods() {
        let mut feed = IndicatorFeed::new(3, 2).unwrap();

        let first = feed.next(&candle(0, 1.1000, 0.0010));
        assert_eq!(first, IndicatorSnapshot::default());

        let second = feed.next(&candle(1, 1.1001, 0.0010));
        assert!(second.ema20.is_none());
        assert_abs_diff_eq!(second.avg_range.unwrap(), 0.0010, epsilon = 1e-12);

        let third = feed.next(&candle(2, 1.1002, 0.0010));
        assert!(third.ema20.is_some());
        // Slope needs two reported EMA values
        assert!(third.ema20_slope.is_none());

        let fourth = feed.next(&candle(3, 1.1003, 0.0010));
        assert!(fourth.ema20_slope.unwrap() > 0.0);
        assert_eq!(feed.seen(), 4);
    }

    #[test]
    fn test_slope_follows_trend() {
        let mut feed = IndicatorFeed::new(5, 5).unwrap();
        let mut last = IndicatorSnapshot::default();
        for i in 0..20u64 {
            last = feed.next(&candle(i, 1.2000 - i as f64 * 0.0005, 0.0008));
        }
        assert!(last.ema20_slope.unwrap() < 0.0);
        assert_abs_diff_eq!(last.avg_range.unwrap(), 0.0008, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_period_rejected() {
        assert!(IndicatorFeed::new(0, 14).is_err());
        assert!(IndicatorFeed::new(20, 0).is_err());
    }

    #[test]
    fn test_from_default_config() {
        let feed = IndicatorFeed::from_config(&IndicatorConfig::default()).unwrap();
        assert_eq!(feed.ema_period, 20);
        assert_eq!(feed.range_period, 14);
    }
}
