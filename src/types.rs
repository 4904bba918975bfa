//! Core data types shared by the detection engine and its collaborators

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for candle data
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CandleValidationError {
    #[error("prices must be finite: open={open}, high={high}, low={low}, close={close}")]
    NonFinitePrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },

    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("open ({open}) must be between low ({low}) and high ({high})")]
    OpenOutOfRange { open: f64, low: f64, high: f64 },

    #[error("close ({close}) must be between low ({low}) and high ({high})")]
    CloseOutOfRange { close: f64, low: f64, high: f64 },

    #[error("prices must be positive: open={open}, high={high}, low={low}, close={close}")]
    NonPositivePrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

/// OHLC candle with its position in the feed.
///
/// `index` must strictly increase across a feed; the engine relies on it for
/// ordering and never reorders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub index: u64,
    pub timestamp: DateTime<Utc>,
}

impl Candle {
    /// Create a new candle with validation
    pub fn new(
        index: u64,
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    ) -> Result<Self, CandleValidationError> {
        let candle = Self::new_unchecked(index, timestamp, open, high, low, close);
        candle.validate()?;
        Ok(candle)
    }

    /// Create a candle without validation (for trusted sources or when validation is done separately)
    pub fn new_unchecked(
        index: u64,
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    ) -> Self {
        Self {
            open,
            high,
            low,
            close,
            index,
            timestamp,
        }
    }

    pub fn validate(&self) -> Result<(), CandleValidationError> {
        let prices = [self.open, self.high, self.low, self.close];
        if !prices.iter().all(|p| p.is_finite()) {
            return Err(CandleValidationError::NonFinitePrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0 {
            return Err(CandleValidationError::NonPositivePrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if self.high < self.low {
            return Err(CandleValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if self.open < self.low || self.open > self.high {
            return Err(CandleValidationError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }

        if self.close < self.low || self.close > self.high {
            return Err(CandleValidationError::CloseOutOfRange {
                close: self.close,
                low: self.low,
                high: self.high,
            });
        }

        Ok(())
    }

    /// Absolute body size
    #[inline]
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    #[inline]
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    #[inline]
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Traded instrument symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Symbol(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

/// Indicator values supplied alongside each candle.
///
/// Every field is optional; an absent value skips the checks that use it
/// rather than being read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ema20: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ema20_slope: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_range: Option<f64>,
}

impl IndicatorSnapshot {
    pub fn new(ema20: Option<f64>, ema20_slope: Option<f64>, avg_range: Option<f64>) -> Self {
        Self {
            ema20,
            ema20_slope,
            avg_range,
        }
    }

    pub fn with_ema(mut self, ema20: f64) -> Self {
        self.ema20 = Some(ema20);
        self
    }

    pub fn with_slope(mut self, slope: f64) -> Self {
        self.ema20_slope = Some(slope);
        self
    }

    pub fn with_avg_range(mut self, avg_range: f64) -> Self {
        self.avg_range = Some(avg_range);
        self
    }
}

/// Directional move that a pullback is measured against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpulseLeg {
    pub direction: Direction,
    pub high: f64,
    pub low: f64,
    pub avg_body: f64,
    pub start_index: u64,
    pub end_index: u64,
}

impl ImpulseLeg {
    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// The extreme a continuation breakout has to reclaim
    #[inline]
    pub fn extreme(&self) -> f64 {
        match self.direction {
            Direction::Buy => self.high,
            Direction::Sell => self.low,
        }
    }
}

/// Live hypothesis between pullback qualification and trigger/invalidation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setup {
    pub direction: Direction,
    pub invalidation_price: f64,
    pub trigger_price: f64,
    pub impulse: ImpulseLeg,
    pub pullback: Vec<Candle>,
}

impl Setup {
    /// Furthest point the pullback has reached against the impulse
    pub fn pullback_extreme(&self) -> f64 {
        pullback_extreme(self.direction, &self.pullback).unwrap_or(self.invalidation_price)
    }
}

/// Extreme of a pullback sequence against `direction`: lowest low for BUY,
/// highest high for SELL.
pub fn pullback_extreme(direction: Direction, candles: &[Candle]) -> Option<f64> {
    match direction {
        Direction::Buy => candles.iter().map(|c| c.low).reduce(f64::min),
        Direction::Sell => candles.iter().map(|c| c.high).reduce(f64::max),
    }
}

/// Trade signal handed to the execution layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: Symbol,
    pub direction: Direction,
    pub entry_price: f64,
    pub sl: f64,
    pub tp: f64,
    pub index: u64,
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    /// Stop distance in price units
    pub fn risk(&self) -> f64 {
        (self.entry_price - self.sl).abs()
    }

    /// Target distance in price units
    pub fn reward(&self) -> f64 {
        (self.tp - self.entry_price).abs()
    }
}
