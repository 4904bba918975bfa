//! Pullback Signals
//!
//! Per-symbol signal engine for intraday FX: waits for a strong impulse leg,
//! qualifies the retracement that follows, and emits a trade signal with
//! structural stop-loss / take-profit levels when price breaks back through
//! the impulse extreme. Includes session filtering, incremental indicators
//! and a CSV replay scanner.

pub mod config;
pub mod data;
pub mod error;
pub mod indicators;
pub mod pips;
pub mod risk;
pub mod scanner;
pub mod session;
pub mod strategy;
pub mod types;

pub use config::Config;
pub use error::{StrategyError, StrategyResult};
pub use pips::PipScale;
pub use risk::{RiskConfig, RiskEngine, SessionRiskState};
pub use strategy::{StrategyConfig, StrategyEngine, StrategyEvent, StrategyState};
pub use types::*;
