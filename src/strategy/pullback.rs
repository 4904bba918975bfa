//! Pullback qualification
//!
//! A pullback is tradeable when it is short, retraces a bounded share of the
//! impulse, does not overshoot the impulse extreme, touches the EMA (when one
//! is supplied) and rests with bodies clearly smaller than the impulse's.
//! Checks run in a fixed order and stop at the first failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::config::PullbackConfig;
use crate::pips::PipScale;
use crate::{Candle, Direction, ImpulseLeg, IndicatorSnapshot};

/// Why a pullback did not qualify
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum PullbackRejection {
    #[error("candle count {count} out of range [{min}-{max}]")]
    CandleCount { count: usize, min: usize, max: usize },

    #[error("impulse leg has zero range")]
    DegenerateImpulse,

    #[error("wick overshoots impulse extreme by {overshoot_pips:.1} pips (limit {tolerance_pips:.1})")]
    WickOvershoot {
        overshoot_pips: f64,
        tolerance_pips: f64,
    },

    #[error("close beyond impulse extreme by {overshoot_pips:.1} pips (limit {tolerance_pips:.1})")]
    CloseOvershoot {
        overshoot_pips: f64,
        tolerance_pips: f64,
    },

    #[error("depth {depth:.3} out of range [{min:.2}-{max:.2}]")]
    DepthOutOfRange { depth: f64, min: f64, max: f64 },

    #[error("not near EMA (closest: {closest_pips:.1} pips, buffer {buffer_pips:.1})")]
    FarFromEma {
        closest_pips: f64,
        buffer_pips: f64,
    },

    #[error("body too large (pb: {pullback_avg_body:.5} vs impulse: {impulse_avg_body:.5})")]
    BodyTooLarge {
        pullback_avg_body: f64,
        impulse_avg_body: f64,
    },
}

impl PullbackRejection {
    /// True when more candles can never make the pullback qualify: the count
    /// only grows, and the pullback's extremes only move further out.
    pub fn is_terminal(&self) -> bool {
        match self {
            PullbackRejection::CandleCount { count, max, .. } => count > max,
            PullbackRejection::DegenerateImpulse
            | PullbackRejection::WickOvershoot { .. }
            | PullbackRejection::CloseOvershoot { .. } => true,
            PullbackRejection::DepthOutOfRange { depth, max, .. } => depth > max,
            PullbackRejection::FarFromEma { .. } | PullbackRejection::BodyTooLarge { .. } => false,
        }
    }
}

/// Measurements of a qualified pullback
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PullbackStats {
    pub candles: usize,
    pub depth: f64,
    /// Lowest low (BUY) or highest high (SELL) of the pullback
    pub extreme: f64,
}

#[derive(Debug, Clone)]
pub struct PullbackQualifier {
    config: PullbackConfig,
    pips: PipScale,
}

impl PullbackQualifier {
    pub fn new(config: PullbackConfig, pips: PipScale) -> Self {
        Self { config, pips }
    }

    pub fn config(&self) -> &PullbackConfig {
        &self.config
    }

    /// Is the pullback tradeable?
    pub fn qualify(
        &self,
        pb_candles: &[Candle],
        impulse: &ImpulseLeg,
        indicators: &IndicatorSnapshot,
    ) -> bool {
        match self.evaluate(pb_candles, impulse, indicators) {
            Ok(stats) => {
                tracing::info!(
                    candles = stats.candles,
                    depth = stats.depth,
                    "Pullback qualified: {} candles, {:.1}% depth",
                    stats.candles,
                    stats.depth * 100.0
                );
                true
            }
            Err(reason) => {
                tracing::debug!("PB qualification failed: {}", reason);
                false
            }
        }
    }

    /// Run every qualification check, returning the first failure.
    pub fn evaluate(
        &self,
        pb_candles: &[Candle],
        impulse: &ImpulseLeg,
        indicators: &IndicatorSnapshot,
    ) -> Result<PullbackStats, PullbackRejection> {
        let cfg = &self.config;
        let n = pb_candles.len();
        if n == 0 || n < cfg.min_candles || n > cfg.max_candles {
            return Err(PullbackRejection::CandleCount {
                count: n,
                min: cfg.min_candles,
                max: cfg.max_candles,
            });
        }

        let range_pips = self.pips.price_to_pips(impulse.range());
        if range_pips <= 0.0 {
            return Err(PullbackRejection::DegenerateImpulse);
        }

        let max_high = pb_candles.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let min_low = pb_candles.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        let max_close = pb_candles.iter().map(|c| c.close).fold(f64::MIN, f64::max);
        let min_close = pb_candles.iter().map(|c| c.close).fold(f64::MAX, f64::min);

        // (extreme, retracement, wick overshoot, close overshoot); distances in pips
        let (extreme, retrace_pips, wick_pips, close_pips) = match impulse.direction {
            Direction::Buy => (
                min_low,
                self.pips.price_to_pips(impulse.high - min_low),
                self.pips.price_to_pips(max_high - impulse.high),
                self.pips.price_to_pips(max_close - impulse.high),
            ),
            Direction::Sell => (
                max_high,
                self.pips.price_to_pips(max_high - impulse.low),
                self.pips.price_to_pips(impulse.low - min_low),
                self.pips.price_to_pips(impulse.low - min_close),
            ),
        };

        if wick_pips > cfg.wick_tolerance_pips {
            return Err(PullbackRejection::WickOvershoot {
                overshoot_pips: wick_pips,
                tolerance_pips: cfg.wick_tolerance_pips,
            });
        }

        if close_pips > cfg.close_tolerance_pips {
            return Err(PullbackRejection::CloseOvershoot {
                overshoot_pips: close_pips,
                tolerance_pips: cfg.close_tolerance_pips,
            });
        }

        let depth = retrace_pips / range_pips;
        if depth < cfg.min_depth || depth > cfg.max_depth {
            return Err(PullbackRejection::DepthOutOfRange {
                depth,
                min: cfg.min_depth,
                max: cfg.max_depth,
            });
        }

        if let Some(ema) = indicators.ema20 {
            let closest_pips = pb_candles
                .iter()
                .map(|c| self.ema_distance_pips(c, ema))
                .fold(f64::MAX, f64::min);

            if closest_pips > cfg.ema_buffer {
                return Err(PullbackRejection::FarFromEma {
                    closest_pips,
                    buffer_pips: cfg.ema_buffer,
                });
            }
        }

        let pb_avg_body = pb_candles.iter().map(Candle::body).sum::<f64>() / n as f64;
        if impulse.avg_body > 0.0 && pb_avg_body >= cfg.max_body_ratio * impulse.avg_body {
            return Err(PullbackRejection::BodyTooLarge {
                pullback_avg_body: pb_avg_body,
                impulse_avg_body: impulse.avg_body,
            });
        }

        Ok(PullbackStats {
            candles: n,
            depth,
            extreme,
        })
    }

    /// Share of the impulse range retraced so far, `None` for an empty
    /// pullback or a degenerate leg.
    pub fn depth(&self, pb_candles: &[Candle], impulse: &ImpulseLeg) -> Option<f64> {
        let range_pips = self.pips.price_to_pips(impulse.range());
        if range_pips <= 0.0 {
            return None;
        }
        let extreme = crate::types::pullback_extreme(impulse.direction, pb_candles)?;
        let retrace = match impulse.direction {
            Direction::Buy => impulse.high - extreme,
            Direction::Sell => extreme - impulse.low,
        };
        Some(self.pips.price_to_pips(retrace) / range_pips)
    }

    /// Zero when the candle straddles the EMA, otherwise the nearer of the
    /// wick ends' distances.
    fn ema_distance_pips(&self, candle: &Candle, ema: f64) -> f64 {
        if candle.low <= ema && ema <= candle.high {
            return 0.0;
        }
        let dist = (candle.low - ema).abs().min((candle.high - ema).abs());
        self.pips.price_to_pips(dist)
    }
}
