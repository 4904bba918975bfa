//! Impulse / pullback / breakout strategy
//!
//! One [`StrategyEngine`] per traded symbol. Each call to
//! [`StrategyEngine::process_candle`] advances a three-stage state machine:
//!
//! ```text
//! WAITING_IMPULSE --leg detected--> WAITING_PULLBACK --qualified--> WAITING_TRIGGER
//!        ^                                 |                              |
//!        +------ abandoned (too deep, too long, overshoot) ---------------+
//!        +------ structure broken / expired / breakout (signal) ----------+
//! ```
//!
//! The engine is driven purely by candle order; it never looks at wall-clock
//! time and never decides when it is called.

pub mod config;
pub mod events;
pub mod impulse;
pub mod pullback;
pub mod structure;

pub use config::{ImpulseConfig, PullbackConfig, StrategyConfig, StructureConfig};
pub use events::{EventSink, StrategyEvent, TracingSink};
pub use impulse::ImpulseDetector;
pub use pullback::{PullbackQualifier, PullbackRejection, PullbackStats};
pub use structure::{StructureBreak, StructureMonitor};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::{StrategyError, StrategyResult};
use crate::risk::RiskEngine;
use crate::{Candle, Direction, ImpulseLeg, IndicatorSnapshot, Setup, Signal, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyState {
    #[default]
    WaitingImpulse,
    WaitingPullback,
    WaitingTrigger,
}

impl std::fmt::Display for StrategyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyState::WaitingImpulse => write!(f, "WAITING_IMPULSE"),
            StrategyState::WaitingPullback => write!(f, "WAITING_PULLBACK"),
            StrategyState::WaitingTrigger => write!(f, "WAITING_TRIGGER"),
        }
    }
}

pub struct StrategyEngine<S: EventSink = TracingSink> {
    symbol: Symbol,
    state: StrategyState,
    detector: ImpulseDetector,
    qualifier: PullbackQualifier,
    monitor: StructureMonitor,
    risk: RiskEngine,
    /// Trailing candles considered for the next impulse
    recent: VecDeque<Candle>,
    impulse: Option<ImpulseLeg>,
    pullback: Vec<Candle>,
    setup: Option<Setup>,
    last_index: Option<u64>,
    last_timestamp: Option<DateTime<Utc>>,
    sink: S,
}

impl StrategyEngine<TracingSink> {
    pub fn new(symbol: Symbol, config: StrategyConfig, risk: RiskEngine) -> Self {
        Self::with_sink(symbol, config, risk, TracingSink)
    }
}

impl<S: EventSink> StrategyEngine<S> {
    pub fn with_sink(symbol: Symbol, config: StrategyConfig, risk: RiskEngine, sink: S) -> Self {
        let pips = risk.pips();
        let detector = ImpulseDetector::new(config.impulse);
        Self {
            symbol,
            state: StrategyState::WaitingImpulse,
            recent: VecDeque::with_capacity(detector.window()),
            detector,
            qualifier: PullbackQualifier::new(config.pullback, pips),
            monitor: StructureMonitor::new(config.structure, pips),
            risk,
            impulse: None,
            pullback: Vec::new(),
            setup: None,
            last_index: None,
            last_timestamp: None,
            sink,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn state(&self) -> StrategyState {
        self.state
    }

    /// Live setup while in `WaitingTrigger`
    pub fn current_setup(&self) -> Option<&Setup> {
        self.setup.as_ref()
    }

    /// Leg being retraced while in `WaitingPullback` or `WaitingTrigger`
    pub fn impulse(&self) -> Option<&ImpulseLeg> {
        self.setup
            .as_ref()
            .map(|s| &s.impulse)
            .or(self.impulse.as_ref())
    }

    /// Pullback candles collected so far
    pub fn pullback_candles(&self) -> &[Candle] {
        match &self.setup {
            Some(setup) => &setup.pullback,
            None => &self.pullback,
        }
    }

    pub fn risk(&self) -> &RiskEngine {
        &self.risk
    }

    /// Session counters: register trade results and session boundaries here
    pub fn risk_mut(&mut self) -> &mut RiskEngine {
        &mut self.risk
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Drop any partial pattern and wait for a fresh impulse.
    /// Risk counters are left untouched.
    pub fn reset(&mut self) {
        self.recent.clear();
        self.impulse = None;
        self.pullback.clear();
        self.setup = None;
        self.state = StrategyState::WaitingImpulse;
    }

    /// Feed the next candle. Returns at most one signal.
    ///
    /// Candles must arrive with strictly increasing `index` and `timestamp`;
    /// anything else is rejected without touching the engine's state.
    pub fn process_candle(
        &mut self,
        candle: &Candle,
        indicators: &IndicatorSnapshot,
    ) -> StrategyResult<Option<Signal>> {
        if let Some(last) = self.last_index {
            if candle.index <= last {
                return Err(StrategyError::OutOfOrder {
                    last,
                    got: candle.index,
                });
            }
        }
        if let Some(last) = self.last_timestamp {
            if candle.timestamp <= last {
                return Err(StrategyError::TimestampNotAfter {
                    index: candle.index,
                    last,
                    got: candle.timestamp,
                });
            }
        }
        candle
            .validate()
            .map_err(|source| StrategyError::InvalidCandle {
                index: candle.index,
                source,
            })?;
        self.last_index = Some(candle.index);
        self.last_timestamp = Some(candle.timestamp);

        let signal = match self.state {
            StrategyState::WaitingImpulse => {
                self.on_waiting_impulse(candle, indicators);
                None
            }
            StrategyState::WaitingPullback => {
                self.on_waiting_pullback(candle, indicators);
                None
            }
            StrategyState::WaitingTrigger => self.on_waiting_trigger(candle, indicators),
        };

        Ok(signal)
    }

    fn on_waiting_impulse(&mut self, candle: &Candle, indicators: &IndicatorSnapshot) {
        if self.recent.len() == self.detector.window() {
            self.recent.pop_front();
        }
        self.recent.push_back(candle.clone());

        let Some(leg) = self.detector.detect(self.recent.make_contiguous(), indicators) else {
            return;
        };

        self.emit(StrategyEvent::ImpulseDetected {
            symbol: self.symbol.clone(),
            index: candle.index,
            leg: leg.clone(),
        });
        self.recent.clear();
        self.pullback.clear();
        self.impulse = Some(leg);
        self.transition_state(StrategyState::WaitingPullback, candle.index);
    }

    fn on_waiting_pullback(&mut self, candle: &Candle, indicators: &IndicatorSnapshot) {
        let Some(impulse) = self.impulse.clone() else {
            self.restart(candle, indicators);
            return;
        };
        self.pullback.push(candle.clone());

        match self.qualifier.evaluate(&self.pullback, &impulse, indicators) {
            Ok(stats) => {
                let setup = Setup {
                    direction: impulse.direction,
                    invalidation_price: stats.extreme,
                    trigger_price: impulse.extreme(),
                    impulse,
                    pullback: std::mem::take(&mut self.pullback),
                };
                self.emit(StrategyEvent::SetupArmed {
                    symbol: self.symbol.clone(),
                    index: candle.index,
                    direction: setup.direction,
                    trigger_price: setup.trigger_price,
                    invalidation_price: setup.invalidation_price,
                    stats,
                });
                self.setup = Some(setup);
                self.impulse = None;
                self.transition_state(StrategyState::WaitingTrigger, candle.index);
            }
            Err(reason) => {
                let cfg = self.qualifier.config();
                let depth = self.qualifier.depth(&self.pullback, &impulse);
                let abandon_reason = if reason.is_terminal() {
                    Some(reason.clone())
                } else {
                    depth.filter(|d| *d > cfg.max_depth).map(|depth| {
                        PullbackRejection::DepthOutOfRange {
                            depth,
                            min: cfg.min_depth,
                            max: cfg.max_depth,
                        }
                    })
                };

                match abandon_reason {
                    Some(reason) => {
                        self.emit(StrategyEvent::PullbackAbandoned {
                            symbol: self.symbol.clone(),
                            index: candle.index,
                            reason,
                        });
                        self.restart(candle, indicators);
                    }
                    None => self.emit(StrategyEvent::PullbackRejected {
                        symbol: self.symbol.clone(),
                        index: candle.index,
                        reason,
                    }),
                }
            }
        }
    }

    fn on_waiting_trigger(
        &mut self,
        candle: &Candle,
        indicators: &IndicatorSnapshot,
    ) -> Option<Signal> {
        let Some(setup) = self.setup.as_mut() else {
            self.restart(candle, indicators);
            return None;
        };

        if let Err(reason) = self.monitor.check(setup, candle, indicators) {
            self.emit(StrategyEvent::SetupInvalidated {
                symbol: self.symbol.clone(),
                index: candle.index,
                reason,
            });
            self.restart(candle, indicators);
            return None;
        }

        let breakout = match setup.direction {
            Direction::Buy => candle.close > setup.trigger_price,
            Direction::Sell => candle.close < setup.trigger_price,
        };

        if !breakout {
            setup.pullback.push(candle.clone());
            let candles = setup.pullback.len();
            if candles > self.qualifier.config().max_candles {
                self.emit(StrategyEvent::SetupExpired {
                    symbol: self.symbol.clone(),
                    index: candle.index,
                    candles,
                });
                self.restart(candle, indicators);
            }
            return None;
        }

        let direction = setup.direction;
        let pb_extreme = setup.pullback_extreme();

        if !self.risk.can_trade() {
            self.emit(StrategyEvent::SignalSuppressed {
                symbol: self.symbol.clone(),
                index: candle.index,
                direction,
                risk: self.risk.state(),
            });
            self.restart(candle, indicators);
            return None;
        }

        let entry_price = candle.close;
        let (sl, tp) = self.risk.calculate_sl_tp(direction, entry_price, pb_extreme);
        let signal = Signal {
            symbol: self.symbol.clone(),
            direction,
            entry_price,
            sl,
            tp,
            index: candle.index,
            timestamp: candle.timestamp,
        };
        self.risk.register_new_trade();

        self.emit(StrategyEvent::SignalEmitted {
            signal: signal.clone(),
        });
        self.restart(candle, indicators);

        Some(signal)
    }

    /// Back to `WaitingImpulse`; the candle that ended the attempt opens the
    /// next impulse window.
    fn restart(&mut self, candle: &Candle, indicators: &IndicatorSnapshot) {
        self.reset_pattern();
        self.transition_state(StrategyState::WaitingImpulse, candle.index);
        self.on_waiting_impulse(candle, indicators);
    }

    fn reset_pattern(&mut self) {
        self.recent.clear();
        self.impulse = None;
        self.pullback.clear();
        self.setup = None;
    }

    fn transition_state(&mut self, to: StrategyState, index: u64) {
        if self.state != to {
            let from = self.state;
            self.state = to;
            self.emit(StrategyEvent::StateChanged {
                symbol: self.symbol.clone(),
                index,
                from,
                to,
            });
        }
    }

    fn emit(&mut self, event: StrategyEvent) {
        self.sink.emit(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pips::PipScale;
    use crate::risk::RiskConfig;
    use chrono::{Duration, TimeZone, Utc};

    fn candle(index: u64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 13, 0, 0).unwrap() + Duration::minutes(5 * index as i64);
        Candle::new(index, ts, open, high, low, close).unwrap()
    }

    fn impulse_indicators() -> IndicatorSnapshot {
        IndicatorSnapshot::new(Some(1.1000), Some(0.0002), Some(0.0003))
    }

    fn pullback_indicators() -> IndicatorSnapshot {
        IndicatorSnapshot::new(Some(1.1006), Some(0.00016), Some(0.0003))
    }

    fn engine() -> StrategyEngine<Vec<StrategyEvent>> {
        let risk = RiskConfig::default().build(PipScale::default());
        StrategyEngine::with_sink(
            Symbol::new("EURUSD"),
            StrategyConfig::default(),
            risk,
            Vec::new(),
        )
    }

    /// Five bullish candles, indices 0..=4, leg 1.1000 - 1.1011
    fn feed_impulse(engine: &mut StrategyEngine<Vec<StrategyEvent>>) {
        for i in 0..5u64 {
            let base = 1.1000 + i as f64 * 0.0002;
            let c = candle(i, base, base + 0.0003, base, base + 0.0002);
            assert_eq!(engine.process_candle(&c, &impulse_indicators()).unwrap(), None);
        }
    }

    fn quiet_pullback_candle(index: u64) -> Candle {
        candle(index, 1.1007, 1.1008, 1.1007, 1.1007)
    }

    /// Impulse + two pullback candles: engine is armed
    fn armed_engine() -> StrategyEngine<Vec<StrategyEvent>> {
        let mut engine = engine();
        feed_impulse(&mut engine);
        for i in 5..7 {
            engine
                .process_candle(&quiet_pullback_candle(i), &pullback_indicators())
                .unwrap();
        }
        assert_eq!(engine.state(), StrategyState::WaitingTrigger);
        engine
    }

    #[test]
    fn test_impulse_moves_to_waiting_pullback() {
        let mut engine = engine();
        feed_impulse(&mut engine);

        assert_eq!(engine.state(), StrategyState::WaitingPullback);
        let leg = engine.impulse().unwrap();
        assert_eq!(leg.direction, Direction::Buy);
        assert_eq!((leg.start_index, leg.end_index), (0, 4));
        assert!(engine
            .sink()
            .iter()
            .any(|e| matches!(e, StrategyEvent::ImpulseDetected { .. })));
    }

    #[test]
    fn test_single_pullback_candle_keeps_waiting() {
        let mut engine = engine();
        feed_impulse(&mut engine);
        engine
            .process_candle(&quiet_pullback_candle(5), &pullback_indicators())
            .unwrap();

        assert_eq!(engine.state(), StrategyState::WaitingPullback);
        assert_eq!(engine.pullback_candles().len(), 1);
        assert!(matches!(
            engine.sink().last(),
            Some(StrategyEvent::PullbackRejected {
                reason: PullbackRejection::CandleCount { count: 1, .. },
                ..
            })
        ));
    }

    #[test]
    fn test_qualified_pullback_arms_setup() {
        let engine = armed_engine();
        let setup = engine.current_setup().unwrap();

        assert_eq!(setup.direction, Direction::Buy);
        assert_eq!(setup.trigger_price, setup.impulse.high);
        assert_eq!(setup.invalidation_price, 1.1007);
        assert_eq!(setup.pullback.len(), 2);
    }

    #[test]
    fn test_breakout_emits_signal_and_resets() {
        let mut engine = armed_engine();
        let trigger = engine.current_setup().unwrap().trigger_price;

        let c = candle(7, trigger, trigger + 0.0005, trigger - 0.0001, trigger + 0.0005);
        let signal = engine
            .process_candle(&c, &pullback_indicators())
            .unwrap()
            .unwrap();

        assert_eq!(signal.direction, Direction::Buy);
        assert_eq!(signal.index, 7);
        assert!(signal.sl < signal.entry_price);
        assert!(signal.tp > signal.entry_price);
        assert_eq!(engine.state(), StrategyState::WaitingImpulse);
        assert!(engine.current_setup().is_none());
        assert_eq!(engine.risk().state().trades_this_session, 1);
    }

    #[test]
    fn test_non_breakout_extends_pullback() {
        let mut engine = armed_engine();
        let out = engine
            .process_candle(&quiet_pullback_candle(7), &pullback_indicators())
            .unwrap();

        assert_eq!(out, None);
        assert_eq!(engine.state(), StrategyState::WaitingTrigger);
        assert_eq!(engine.pullback_candles().len(), 3);
    }

    #[test]
    fn test_structure_break_returns_to_waiting_impulse() {
        let mut engine = armed_engine();
        // 2 pips through the 1.1007 pullback low
        let c = candle(7, 1.1007, 1.1008, 1.1005, 1.1007);
        assert_eq!(engine.process_candle(&c, &pullback_indicators()).unwrap(), None);

        assert_eq!(engine.state(), StrategyState::WaitingImpulse);
        assert!(engine.current_setup().is_none());
        assert!(engine
            .sink()
            .iter()
            .any(|e| matches!(e, StrategyEvent::SetupInvalidated { .. })));
    }

    #[test]
    fn test_setup_expires_after_max_candles() {
        let mut engine = armed_engine();
        // Pullback holds 2 candles; 6 more reach the limit of 8
        for i in 7..13 {
            engine
                .process_candle(&quiet_pullback_candle(i), &pullback_indicators())
                .unwrap();
            assert_eq!(engine.state(), StrategyState::WaitingTrigger);
        }
        engine
            .process_candle(&quiet_pullback_candle(13), &pullback_indicators())
            .unwrap();

        assert_eq!(engine.state(), StrategyState::WaitingImpulse);
        assert!(matches!(
            engine.sink().iter().rev().find(|e| !matches!(e, StrategyEvent::StateChanged { .. })),
            Some(StrategyEvent::SetupExpired { candles: 9, .. })
        ));
    }

    #[test]
    fn test_pullback_without_qualifying_abandoned_after_max_candles() {
        let mut engine = engine();
        feed_impulse(&mut engine);
        // EMA far above the pullback: every evaluation misses the EMA zone
        let far_ema = IndicatorSnapshot::new(Some(1.1050), Some(0.0001), Some(0.0003));

        for i in 5..13 {
            engine
                .process_candle(&quiet_pullback_candle(i), &far_ema)
                .unwrap();
            assert_eq!(engine.state(), StrategyState::WaitingPullback);
        }
        assert_eq!(engine.pullback_candles().len(), 8);

        engine
            .process_candle(&quiet_pullback_candle(13), &far_ema)
            .unwrap();

        assert_eq!(engine.state(), StrategyState::WaitingImpulse);
        assert!(engine.impulse().is_none());
        assert!(engine.sink().iter().any(|e| matches!(
            e,
            StrategyEvent::PullbackAbandoned {
                reason: PullbackRejection::CandleCount { count: 9, .. },
                ..
            }
        )));
        assert!(engine.sink().iter().any(|e| matches!(
            e,
            StrategyEvent::PullbackRejected {
                reason: PullbackRejection::FarFromEma { .. },
                ..
            }
        )));
    }

    #[test]
    fn test_deep_pullback_is_abandoned() {
        let mut engine = engine();
        feed_impulse(&mut engine);
        // 8 of 11 pips retraced on the first candle
        let c = candle(5, 1.1007, 1.1008, 1.1003, 1.1005);
        engine.process_candle(&c, &pullback_indicators()).unwrap();

        assert_eq!(engine.state(), StrategyState::WaitingImpulse);
        assert!(engine.sink().iter().any(|e| matches!(
            e,
            StrategyEvent::PullbackAbandoned {
                reason: PullbackRejection::DepthOutOfRange { .. },
                ..
            }
        )));
    }

    #[test]
    fn test_risk_gate_suppresses_signal() {
        let mut engine = armed_engine();
        for _ in 0..5 {
            engine.risk_mut().register_new_trade();
        }
        let trigger = engine.current_setup().unwrap().trigger_price;
        let c = candle(7, trigger, trigger + 0.0005, trigger - 0.0001, trigger + 0.0005);

        assert_eq!(engine.process_candle(&c, &pullback_indicators()).unwrap(), None);
        assert_eq!(engine.state(), StrategyState::WaitingImpulse);
        assert_eq!(engine.risk().state().trades_this_session, 5);
        assert!(engine
            .sink()
            .iter()
            .any(|e| matches!(e, StrategyEvent::SignalSuppressed { .. })));
    }

    #[test]
    fn test_out_of_order_candle_rejected() {
        let mut engine = engine();
        feed_impulse(&mut engine);
        let stale = candle(4, 1.1007, 1.1008, 1.1007, 1.1007);

        let err = engine
            .process_candle(&stale, &pullback_indicators())
            .unwrap_err();
        assert_eq!(err, StrategyError::OutOfOrder { last: 4, got: 4 });
        assert_eq!(engine.state(), StrategyState::WaitingPullback);
        assert!(engine.pullback_candles().is_empty());
    }

    #[test]
    fn test_repeated_timestamp_rejected() {
        let mut engine = engine();
        feed_impulse(&mut engine);
        // Fresh index but the same bar time as index 4
        let last_ts = candle(4, 1.1008, 1.1011, 1.1008, 1.1010).timestamp;
        let stale = Candle::new(5, last_ts, 1.1007, 1.1008, 1.1007, 1.1007).unwrap();

        let err = engine
            .process_candle(&stale, &pullback_indicators())
            .unwrap_err();
        assert_eq!(
            err,
            StrategyError::TimestampNotAfter {
                index: 5,
                last: last_ts,
                got: last_ts,
            }
        );
        assert_eq!(engine.state(), StrategyState::WaitingPullback);
        assert!(engine.pullback_candles().is_empty());

        // The rejected index is still usable once the time moves forward
        engine
            .process_candle(&quiet_pullback_candle(5), &pullback_indicators())
            .unwrap();
        assert_eq!(engine.pullback_candles().len(), 1);
    }

    #[test]
    fn test_invalid_candle_rejected() {
        let mut engine = engine();
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 13, 0, 0).unwrap();
        let bad = Candle::new_unchecked(0, ts, 1.1000, 1.0990, 1.1000, 1.1000);

        let err = engine
            .process_candle(&bad, &IndicatorSnapshot::default())
            .unwrap_err();
        assert!(matches!(err, StrategyError::InvalidCandle { index: 0, .. }));
    }

    #[test]
    fn test_reset_keeps_risk_counters() {
        let mut engine = armed_engine();
        engine.risk_mut().register_new_trade();
        engine.reset();

        assert_eq!(engine.state(), StrategyState::WaitingImpulse);
        assert!(engine.current_setup().is_none());
        assert!(engine.impulse().is_none());
        assert_eq!(engine.risk().state().trades_this_session, 1);
    }
}
