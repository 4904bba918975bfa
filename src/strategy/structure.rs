//! Structure invalidation
//!
//! A live setup breaks when price trades beyond the pullback extreme by more
//! than the structure buffer, or closes on the wrong side of the EMA by more
//! than the EMA buffer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::config::StructureConfig;
use crate::pips::PipScale;
use crate::{Candle, Direction, IndicatorSnapshot, Setup};

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum StructureBreak {
    #[error("invalidation level breached by {breach_pips:.1} pips (buffer {buffer_pips:.1})")]
    PriceBreach { breach_pips: f64, buffer_pips: f64 },

    #[error("close {close:.5} beyond EMA {ema:.5} by {distance_pips:.1} pips")]
    EmaClose {
        close: f64,
        ema: f64,
        distance_pips: f64,
    },
}

#[derive(Debug, Clone)]
pub struct StructureMonitor {
    config: StructureConfig,
    pips: PipScale,
}

impl StructureMonitor {
    pub fn new(config: StructureConfig, pips: PipScale) -> Self {
        Self { config, pips }
    }

    pub fn config(&self) -> &StructureConfig {
        &self.config
    }

    pub fn is_setup_valid(
        &self,
        setup: &Setup,
        candle: &Candle,
        indicators: &IndicatorSnapshot,
    ) -> bool {
        match self.check(setup, candle, indicators) {
            Ok(()) => true,
            Err(reason) => {
                tracing::info!("Structure broken: {}", reason);
                false
            }
        }
    }

    pub fn check(
        &self,
        setup: &Setup,
        candle: &Candle,
        indicators: &IndicatorSnapshot,
    ) -> Result<(), StructureBreak> {
        let cfg = &self.config;

        // Positive = beyond the level against the setup
        let (breach_pips, ema_excess_pips) = match setup.direction {
            Direction::Buy => (
                self.pips.price_to_pips(setup.invalidation_price - candle.low),
                indicators
                    .ema20
                    .map(|ema| (ema, self.pips.price_to_pips(ema - candle.close))),
            ),
            Direction::Sell => (
                self.pips.price_to_pips(candle.high - setup.invalidation_price),
                indicators
                    .ema20
                    .map(|ema| (ema, self.pips.price_to_pips(candle.close - ema))),
            ),
        };

        if breach_pips > cfg.structure_buffer_pips {
            return Err(StructureBreak::PriceBreach {
                breach_pips,
                buffer_pips: cfg.structure_buffer_pips,
            });
        }

        if let Some((ema, distance_pips)) = ema_excess_pips {
            if distance_pips > cfg.ema_buffer_pips {
                return Err(StructureBreak::EmaClose {
                    close: candle.close,
                    ema,
                    distance_pips,
                });
            }
        }

        Ok(())
    }
}
