//! Session risk engine
//!
//! Computes structural stop-loss / take-profit levels, decides when a
//! position has earned a breakeven stop, and gates how many trades a session
//! may open.
//!
//! # Stop placement
//!
//! ```text
//! BUY:  sl = pullback_low  - sl_buffer      (fallback: entry - fallback_sl if risk < min_risk)
//! SELL: sl = pullback_high + sl_buffer      (fallback: entry + fallback_sl if risk < min_risk)
//! tp  = entry ± risk * tp_multiplier
//! ```
//!
//! All distances are configured in pips and converted through the
//! instrument's [`PipScale`].

use serde::{Deserialize, Serialize};

use crate::pips::PipScale;
use crate::Direction;

/// Configuration for RiskEngine using builder pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub max_trades_session: u32,
    pub max_consecutive_losses: u32,
    /// Reward-to-risk ratio applied to the actual stop distance
    pub tp_multiplier: f64,
    /// Distance beyond the pullback extreme for the structural stop
    pub sl_buffer_pips: f64,
    /// Structural stops tighter than this fall back to `fallback_sl_pips`
    pub min_risk_pips: f64,
    pub fallback_sl_pips: f64,
    /// Unrealized profit at which the stop moves to entry
    pub breakeven_pips: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_trades_session: 5,
            max_consecutive_losses: 3,
            tp_multiplier: 1.5,
            sl_buffer_pips: 0.5,
            min_risk_pips: 4.0,
            fallback_sl_pips: 6.5,
            breakeven_pips: 7.0,
        }
    }
}

impl RiskConfig {
    /// Set maximum trades per session
    pub fn with_max_trades_session(mut self, max: u32) -> Self {
        self.max_trades_session = max;
        self
    }

    /// Set consecutive loss limit
    pub fn with_max_consecutive_losses(mut self, max: u32) -> Self {
        self.max_consecutive_losses = max;
        self
    }

    /// Set take profit multiple of risk (e.g., 1.5 = 1:1.5 RR)
    pub fn with_tp_multiplier(mut self, multiplier: f64) -> Self {
        self.tp_multiplier = multiplier;
        self
    }

    /// Set structural stop buffer and the minimum-risk fallback
    pub fn with_stop_rules(mut self, buffer: f64, min_risk: f64, fallback: f64) -> Self {
        self.sl_buffer_pips = buffer;
        self.min_risk_pips = min_risk;
        self.fallback_sl_pips = fallback;
        self
    }

    /// Set the breakeven activation distance
    pub fn with_breakeven_pips(mut self, pips: f64) -> Self {
        self.breakeven_pips = pips;
        self
    }

    /// Build the RiskEngine
    pub fn build(self, pips: PipScale) -> RiskEngine {
        RiskEngine::new(self, pips)
    }
}

/// Per-session trade counters. Reset only by an explicit caller action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRiskState {
    pub trades_this_session: u32,
    pub consecutive_losses: u32,
}

/// Risk engine owned by a single strategy engine (one per symbol)
#[derive(Debug, Clone)]
pub struct RiskEngine {
    config: RiskConfig,
    pips: PipScale,
    state: SessionRiskState,
}

impl RiskEngine {
    pub fn new(config: RiskConfig, pips: PipScale) -> Self {
        Self {
            config,
            pips,
            state: SessionRiskState::default(),
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn pips(&self) -> PipScale {
        self.pips
    }

    pub fn state(&self) -> SessionRiskState {
        self.state
    }

    /// Can a new trade be opened this session?
    pub fn can_trade(&self) -> bool {
        if self.state.trades_this_session >= self.config.max_trades_session {
            return false;
        }
        if self.state.consecutive_losses >= self.config.max_consecutive_losses {
            return false;
        }
        true
    }

    /// Stop-loss and take-profit for an entry against a pullback extreme.
    ///
    /// Returns `(sl, tp)`.
    pub fn calculate_sl_tp(
        &self,
        direction: Direction,
        entry_price: f64,
        pb_extreme: f64,
    ) -> (f64, f64) {
        let buffer = self.pips.pips_to_price(self.config.sl_buffer_pips);
        let fallback = self.pips.pips_to_price(self.config.fallback_sl_pips);

        match direction {
            Direction::Buy => {
                let mut sl = pb_extreme - buffer;
                if self.pips.price_to_pips(entry_price - sl) < self.config.min_risk_pips {
                    tracing::debug!(
                        structural_sl = sl,
                        fallback_pips = self.config.fallback_sl_pips,
                        "Structural stop too tight, using fallback"
                    );
                    sl = entry_price - fallback;
                }
                let risk = entry_price - sl;
                (sl, entry_price + risk * self.config.tp_multiplier)
            }
            Direction::Sell => {
                let mut sl = pb_extreme + buffer;
                if self.pips.price_to_pips(sl - entry_price) < self.config.min_risk_pips {
                    tracing::debug!(
                        structural_sl = sl,
                        fallback_pips = self.config.fallback_sl_pips,
                        "Structural stop too tight, using fallback"
                    );
                    sl = entry_price + fallback;
                }
                let risk = sl - entry_price;
                (sl, entry_price - risk * self.config.tp_multiplier)
            }
        }
    }

    /// Has the trade moved far enough in profit to protect it at entry?
    pub fn should_move_to_be(
        &self,
        direction: Direction,
        entry_price: f64,
        current_price: f64,
    ) -> bool {
        let profit_pips = match direction {
            Direction::Buy => self.pips.price_to_pips(current_price - entry_price),
            Direction::Sell => self.pips.price_to_pips(entry_price - current_price),
        };
        profit_pips >= self.config.breakeven_pips
    }

    /// Record an opened trade. Call exactly once per trade.
    pub fn register_new_trade(&mut self) {
        self.state.trades_this_session += 1;
        tracing::debug!(
            trades = self.state.trades_this_session,
            max = self.config.max_trades_session,
            "Trade registered"
        );
    }

    /// Record a closed trade's outcome. Call exactly once per trade.
    pub fn register_trade_result(&mut self, win: bool) {
        if win {
            self.state.consecutive_losses = 0;
        } else {
            self.state.consecutive_losses += 1;
            if self.state.consecutive_losses >= self.config.max_consecutive_losses {
                tracing::warn!(
                    losses = self.state.consecutive_losses,
                    "Consecutive loss limit reached, trading halted for session"
                );
            }
        }
    }

    pub fn reset_session(&mut self) {
        self.state = SessionRiskState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn engine() -> RiskEngine {
        RiskConfig::default().build(PipScale::default())
    }

    #[test]
    fn test_structural_stop_buy() {
        let rm = engine();
        // Pullback low 10 pips under entry -> 10.5 pip risk
        let (sl, tp) = rm.calculate_sl_tp(Direction::Buy, 1.1020, 1.1010);
        assert_abs_diff_eq!(sl, 1.10095, epsilon = 1e-10);
        assert_abs_diff_eq!(tp - 1.1020, 1.5 * (1.1020 - sl), epsilon = 1e-12);
    }

    #[test]
    fn test_structural_stop_sell() {
        let rm = engine();
        let (sl, tp) = rm.calculate_sl_tp(Direction::Sell, 1.1000, 1.1010);
        assert_abs_diff_eq!(sl, 1.10105, epsilon = 1e-10);
        assert!(tp < 1.1000);
        assert_abs_diff_eq!(1.1000 - tp, 1.5 * (sl - 1.1000), epsilon = 1e-12);
    }

    #[test]
    fn test_fallback_stop_when_structure_too_tight() {
        let rm = engine();
        let pips = rm.pips();

        // Extreme 1 pip away: 1.5 pip structural risk -> fallback 6.5
        let (sl, _) = rm.calculate_sl_tp(Direction::Buy, 1.1000, 1.0999);
        assert_eq!(pips.price_to_pips(1.1000 - sl), 6.5);

        let (sl, _) = rm.calculate_sl_tp(Direction::Sell, 1.1000, 1.1001);
        assert_eq!(pips.price_to_pips(sl - 1.1000), 6.5);

        // Extreme above a BUY entry still yields a stop below entry
        let (sl, tp) = rm.calculate_sl_tp(Direction::Buy, 1.1000, 1.1005);
        assert_eq!(pips.price_to_pips(1.1000 - sl), 6.5);
        assert!(tp > 1.1000);
    }

    #[test]
    fn test_fallback_boundary() {
        let rm = engine();
        let pips = rm.pips();

        // 3.5 pips + 0.5 buffer = exactly 4.0 -> structural stop kept
        let (sl, _) = rm.calculate_sl_tp(Direction::Buy, 1.1000, 1.1000 - 0.00035);
        assert_eq!(pips.price_to_pips(1.1000 - sl), 4.0);

        // 3.4 pips + 0.5 = 3.9 -> fallback
        let (sl, _) = rm.calculate_sl_tp(Direction::Buy, 1.1000, 1.1000 - 0.00034);
        assert_eq!(pips.price_to_pips(1.1000 - sl), 6.5);
    }

    #[test]
    fn test_custom_tp_multiplier() {
        let rm = RiskConfig::default()
            .with_tp_multiplier(2.0)
            .build(PipScale::default());
        let (sl, tp) = rm.calculate_sl_tp(Direction::Buy, 1.2000, 1.1990);
        assert_abs_diff_eq!(tp - 1.2000, 2.0 * (1.2000 - sl), epsilon = 1e-12);
    }

    #[test]
    fn test_move_to_breakeven() {
        let rm = engine();
        assert!(!rm.should_move_to_be(Direction::Buy, 1.1000, 1.10069999));
        assert!(rm.should_move_to_be(Direction::Buy, 1.1000, 1.1007));
        assert!(rm.should_move_to_be(Direction::Buy, 1.1000, 1.1010));
        assert!(!rm.should_move_to_be(Direction::Buy, 1.1000, 1.0990));

        assert!(rm.should_move_to_be(Direction::Sell, 1.1007, 1.1000));
        assert!(!rm.should_move_to_be(Direction::Sell, 1.1000, 1.0993001));
    }

    #[test]
    fn test_trade_count_gate() {
        let mut rm = RiskConfig::default()
            .with_max_trades_session(2)
            .build(PipScale::default());
        assert!(rm.can_trade());
        rm.register_new_trade();
        assert!(rm.can_trade());
        rm.register_new_trade();
        assert!(!rm.can_trade());

        rm.reset_session();
        assert!(rm.can_trade());
        assert_eq!(rm.state(), SessionRiskState::default());
    }

    #[test]
    fn test_consecutive_loss_gate() {
        let mut rm = engine();
        rm.register_trade_result(false);
        rm.register_trade_result(false);
        assert!(rm.can_trade());

        // A win clears the streak
        rm.register_trade_result(true);
        assert_eq!(rm.state().consecutive_losses, 0);

        for _ in 0..3 {
            rm.register_trade_result(false);
        }
        assert!(!rm.can_trade());

        rm.reset_session();
        assert!(rm.can_trade());
    }

    #[test]
    fn test_config_defaults_from_empty_json() {
        let config: RiskConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RiskConfig::default());

        let config: RiskConfig = serde_json::from_str(r#"{"tp_multiplier": 2.0}"#).unwrap();
        assert_eq!(config.tp_multiplier, 2.0);
        assert_eq!(config.max_trades_session, 5);
    }
}
