//! Diagnostic events emitted by the strategy engine
//!
//! Events describe why the state machine moved (or refused to move) with the
//! measurements behind each decision. They are observations only: a sink can
//! record, forward or drop them without affecting detection.

use serde::{Deserialize, Serialize};

use super::pullback::{PullbackRejection, PullbackStats};
use super::structure::StructureBreak;
use super::StrategyState;
use crate::risk::SessionRiskState;
use crate::{Direction, ImpulseLeg, Signal, Symbol};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StrategyEvent {
    StateChanged {
        symbol: Symbol,
        index: u64,
        from: StrategyState,
        to: StrategyState,
    },
    ImpulseDetected {
        symbol: Symbol,
        index: u64,
        leg: ImpulseLeg,
    },
    PullbackRejected {
        symbol: Symbol,
        index: u64,
        reason: PullbackRejection,
    },
    PullbackAbandoned {
        symbol: Symbol,
        index: u64,
        reason: PullbackRejection,
    },
    SetupArmed {
        symbol: Symbol,
        index: u64,
        direction: Direction,
        trigger_price: f64,
        invalidation_price: f64,
        stats: PullbackStats,
    },
    SetupInvalidated {
        symbol: Symbol,
        index: u64,
        reason: StructureBreak,
    },
    SetupExpired {
        symbol: Symbol,
        index: u64,
        candles: usize,
    },
    SignalSuppressed {
        symbol: Symbol,
        index: u64,
        direction: Direction,
        risk: SessionRiskState,
    },
    SignalEmitted {
        signal: Signal,
    },
}

/// Receiver for strategy events
pub trait EventSink {
    fn emit(&mut self, event: &StrategyEvent);
}

/// Renders events as `tracing` records
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: &StrategyEvent) {
        match event {
            StrategyEvent::StateChanged {
                symbol,
                index,
                from,
                to,
            } => {
                tracing::debug!(%symbol, index, "State transition: {:?} -> {:?}", from, to);
            }
            StrategyEvent::ImpulseDetected { symbol, index, leg } => {
                tracing::info!(
                    %symbol,
                    index,
                    direction = %leg.direction,
                    high = leg.high,
                    low = leg.low,
                    avg_body = leg.avg_body,
                    "Impulse detected"
                );
            }
            StrategyEvent::PullbackRejected {
                symbol,
                index,
                reason,
            } => {
                tracing::debug!(%symbol, index, "PB qualification: {}", reason);
            }
            StrategyEvent::PullbackAbandoned {
                symbol,
                index,
                reason,
            } => {
                tracing::info!(%symbol, index, "Pullback abandoned: {}", reason);
            }
            StrategyEvent::SetupArmed {
                symbol,
                index,
                direction,
                trigger_price,
                invalidation_price,
                stats,
            } => {
                tracing::info!(
                    %symbol,
                    index,
                    %direction,
                    trigger_price,
                    invalidation_price,
                    candles = stats.candles,
                    depth = stats.depth,
                    "Pullback qualified, waiting for trigger"
                );
            }
            StrategyEvent::SetupInvalidated {
                symbol,
                index,
                reason,
            } => {
                tracing::info!(%symbol, index, "Structure broken: {}", reason);
            }
            StrategyEvent::SetupExpired {
                symbol,
                index,
                candles,
            } => {
                tracing::info!(%symbol, index, candles, "Setup expired without trigger");
            }
            StrategyEvent::SignalSuppressed {
                symbol,
                index,
                direction,
                risk,
            } => {
                tracing::warn!(
                    %symbol,
                    index,
                    %direction,
                    trades = risk.trades_this_session,
                    consecutive_losses = risk.consecutive_losses,
                    "Breakout ignored: session risk limit reached"
                );
            }
            StrategyEvent::SignalEmitted { signal } => {
                tracing::info!(
                    symbol = %signal.symbol,
                    index = signal.index,
                    direction = %signal.direction,
                    entry = signal.entry_price,
                    sl = signal.sl,
                    tp = signal.tp,
                    "Signal"
                );
            }
        }
    }
}

/// Collects events, e.g. for tests or a downstream observer
impl EventSink for Vec<StrategyEvent> {
    fn emit(&mut self, event: &StrategyEvent) {
        self.push(event.clone());
    }
}
