//! Impulse leg recognition
//!
//! A leg is a run of `run_length` consecutive candles that all close in the
//! same direction with strong bodies and strictly advancing closes.

use itertools::Itertools;

use super::config::ImpulseConfig;
use crate::{Candle, Direction, ImpulseLeg, IndicatorSnapshot};

#[derive(Debug, Clone)]
pub struct ImpulseDetector {
    config: ImpulseConfig,
}

impl ImpulseDetector {
    pub fn new(config: ImpulseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ImpulseConfig {
        &self.config
    }

    /// Number of trailing candles the detector looks at
    pub fn window(&self) -> usize {
        self.config.run_length.max(1)
    }

    /// Recognize a leg formed by the last `run_length` candles of `recent`.
    ///
    /// `indicators` is the snapshot of the newest candle.
    pub fn detect(&self, recent: &[Candle], indicators: &IndicatorSnapshot) -> Option<ImpulseLeg> {
        let n = self.window();
        if recent.len() < n {
            return None;
        }
        let run = &recent[recent.len() - n..];

        let direction = if run.iter().all(Candle::is_bullish) {
            Direction::Buy
        } else if run.iter().all(Candle::is_bearish) {
            Direction::Sell
        } else {
            return None;
        };

        let strong = run
            .iter()
            .all(|c| c.range() > 0.0 && c.body() >= self.config.min_body_ratio * c.range());
        if !strong {
            return None;
        }

        let advancing = run.iter().tuple_windows().all(|(a, b)| match direction {
            Direction::Buy => b.close > a.close,
            Direction::Sell => b.close < a.close,
        });
        if !advancing {
            return None;
        }

        let avg_body = run.iter().map(Candle::body).sum::<f64>() / n as f64;

        if let Some(avg_range) = indicators.avg_range {
            if avg_body < self.config.min_body_to_avg_range * avg_range {
                tracing::debug!(avg_body, avg_range, "Impulse candidate too small for volatility");
                return None;
            }
        }

        if self.config.require_slope_alignment {
            if let Some(slope) = indicators.ema20_slope {
                let aligned = match direction {
                    Direction::Buy => slope > 0.0,
                    Direction::Sell => slope < 0.0,
                };
                if !aligned {
                    tracing::debug!(%direction, slope, "Impulse candidate against EMA slope");
                    return None;
                }
            }
        }

        let high = run.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let low = run.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        if high - low <= 0.0 {
            return None;
        }

        Some(ImpulseLeg {
            direction,
            high,
            low,
            avg_body,
            start_index: run[0].index,
            end_index: run[n - 1].index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::{TimeZone, Utc};

    fn candle(index: u64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 13, 0, 0).unwrap();
        Candle::new_unchecked(index, ts, open, high, low, close)
    }

    fn bullish_run() -> Vec<Candle> {
        (0..5)
            .map(|i| {
                let base = 1.1000 + i as f64 * 0.0002;
                candle(i, base, base + 0.0003, base, base + 0.0002)
            })
            .collect()
    }

    fn bearish_run() -> Vec<Candle> {
        (0..5)
            .map(|i| {
                let base = 1.2000 - i as f64 * 0.0002;
                candle(i, base, base, base - 0.0003, base - 0.0002)
            })
            .collect()
    }

    fn detector() -> ImpulseDetector {
        ImpulseDetector::new(ImpulseConfig::default())
    }

    #[test]
    fn test_detects_bullish_run() {
        let ind = IndicatorSnapshot::new(Some(1.1000), Some(0.0002), Some(0.0003));
        let leg = detector().detect(&bullish_run(), &ind).unwrap();

        assert_eq!(leg.direction, Direction::Buy);
        assert_abs_diff_eq!(leg.low, 1.1000, epsilon = 1e-12);
        assert_abs_diff_eq!(leg.high, 1.1011, epsilon = 1e-12);
        assert_abs_diff_eq!(leg.avg_body, 0.0002, epsilon = 1e-12);
        assert_eq!((leg.start_index, leg.end_index), (0, 4));
    }

    #[test]
    fn test_detects_bearish_run() {
        let leg = detector()
            .detect(&bearish_run(), &IndicatorSnapshot::default())
            .unwrap();
        assert_eq!(leg.direction, Direction::Sell);
        assert_abs_diff_eq!(leg.high, 1.2000, epsilon = 1e-12);
        assert_abs_diff_eq!(leg.low, 1.1989, epsilon = 1e-12);
    }

    #[test]
    fn test_needs_full_run() {
        let run = bullish_run();
        assert!(detector().detect(&run[..4], &IndicatorSnapshot::default()).is_none());
    }

    #[test]
    fn test_uses_trailing_window_only() {
        let mut candles = vec![candle(0, 1.0990, 1.0995, 1.0980, 1.0985)];
        candles.extend(bullish_run().into_iter().map(|mut c| {
            c.index += 1;
            c
        }));
        let leg = detector()
            .detect(&candles, &IndicatorSnapshot::default())
            .unwrap();
        assert_eq!(leg.start_index, 1);
    }

    #[test]
    fn test_mixed_direction_rejected() {
        let mut run = bullish_run();
        run[2] = candle(2, 1.1006, 1.1007, 1.1003, 1.1004);
        assert!(detector().detect(&run, &IndicatorSnapshot::default()).is_none());
    }

    #[test]
    fn test_weak_bodies_rejected() {
        let mut run = bullish_run();
        // Body 1 pip on a 5 pip range
        run[3] = candle(3, 1.1006, 1.1010, 1.1005, 1.1007);
        assert!(detector().detect(&run, &IndicatorSnapshot::default()).is_none());
    }

    #[test]
    fn test_closes_must_advance() {
        let mut run = bullish_run();
        // Closes under candle 3
        run[4] = candle(4, 1.1005, 1.1008, 1.1005, 1.1007);
        assert!(detector().detect(&run, &IndicatorSnapshot::default()).is_none());
    }

    #[test]
    fn test_small_against_avg_range_rejected() {
        let ind = IndicatorSnapshot::default().with_avg_range(0.0010);
        assert!(detector().detect(&bullish_run(), &ind).is_none());
    }

    #[test]
    fn test_slope_alignment() {
        let against = IndicatorSnapshot::default().with_slope(-0.0001);
        assert!(detector().detect(&bullish_run(), &against).is_none());

        let relaxed = ImpulseDetector::new(ImpulseConfig {
            require_slope_alignment: false,
            ..ImpulseConfig::default()
        });
        assert!(relaxed.detect(&bullish_run(), &against).is_some());
    }
}
