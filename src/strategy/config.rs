//! Pullback strategy configuration
//!
//! Every field has a default so a config file only needs to list overrides.

use serde::{Deserialize, Serialize};

/// Impulse recognition parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpulseConfig {
    /// Consecutive same-direction candles forming a leg (default: 5)
    pub run_length: usize,

    /// Minimum body / range of every candle in the run (default: 0.5)
    pub min_body_ratio: f64,

    /// Minimum mean body as a fraction of `avg_range`, when supplied (default: 0.5)
    pub min_body_to_avg_range: f64,

    /// Require `ema20_slope` to agree with the leg direction, when supplied (default: true)
    pub require_slope_alignment: bool,
}

impl Default for ImpulseConfig {
    fn default() -> Self {
        Self {
            run_length: 5,
            min_body_ratio: 0.5,
            min_body_to_avg_range: 0.5,
            require_slope_alignment: true,
        }
    }
}

/// Pullback qualification parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullbackConfig {
    /// Minimum pullback candles (default: 2)
    pub min_candles: usize,

    /// Maximum pullback candles (default: 8)
    pub max_candles: usize,

    /// Minimum retracement of the impulse range (default: 0.20)
    pub min_depth: f64,

    /// Maximum retracement of the impulse range (default: 0.65)
    pub max_depth: f64,

    /// Pips within which a candle counts as touching the EMA (default: 2.0)
    pub ema_buffer: f64,

    /// Allowed wick overshoot beyond the impulse extreme in pips (default: 4.0)
    pub wick_tolerance_pips: f64,

    /// Allowed close overshoot beyond the impulse extreme in pips (default: 0.5)
    pub close_tolerance_pips: f64,

    /// Pullback mean body must stay below this fraction of the impulse mean body (default: 0.8)
    pub max_body_ratio: f64,
}

impl Default for PullbackConfig {
    fn default() -> Self {
        Self {
            min_candles: 2,
            max_candles: 8,
            min_depth: 0.20,
            max_depth: 0.65,
            ema_buffer: 2.0,
            wick_tolerance_pips: 4.0,
            close_tolerance_pips: 0.5,
            max_body_ratio: 0.8,
        }
    }
}

/// Structure invalidation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    /// Close beyond the EMA by more than this many pips breaks the setup (default: 1.0)
    pub ema_buffer_pips: f64,

    /// Tolerated penetration of the invalidation price in pips (default: 1.5)
    pub structure_buffer_pips: f64,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            ema_buffer_pips: 1.0,
            structure_buffer_pips: 1.5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub impulse: ImpulseConfig,
    pub pullback: PullbackConfig,
    pub structure: StructureConfig,
}
