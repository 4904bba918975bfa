//! Configuration management
//!
//! A single JSON document describes the instruments to scan, where their
//! candle files live, and every strategy / risk / session threshold. All
//! sections except `instruments` may be omitted and fall back to defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::indicators::IndicatorConfig;
use crate::pips::PipScale;
use crate::risk::RiskConfig;
use crate::session::SessionConfig;
use crate::strategy::StrategyConfig;
use crate::Symbol;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub instruments: Vec<InstrumentConfig>,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub indicators: IndicatorConfig,
}

fn default_timeframe() -> String {
    "5m".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub symbol: String,
    /// Overrides the pip size guessed from the symbol
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pip_size: Option<f64>,
}

impl InstrumentConfig {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            pip_size: None,
        }
    }

    pub fn symbol(&self) -> Symbol {
        Symbol::new(self.symbol.clone())
    }

    pub fn pip_scale(&self) -> Result<PipScale> {
        match self.pip_size {
            Some(size) if size.is_finite() && size > 0.0 => Ok(PipScale::new(size)),
            Some(size) => anyhow::bail!("Invalid pip_size {} for {}", size, self.symbol),
            None => Ok(PipScale::for_symbol(&self.symbol)),
        }
    }
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn symbols(&self) -> Vec<Symbol> {
        self.instruments.iter().map(InstrumentConfig::symbol).collect()
    }

    pub fn instrument(&self, symbol: &Symbol) -> Option<&InstrumentConfig> {
        self.instruments.iter().find(|i| i.symbol == symbol.as_str())
    }

    /// Reject settings the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.instruments.is_empty() {
            anyhow::bail!("Config must list at least one instrument");
        }
        for instrument in &self.instruments {
            instrument.pip_scale()?;
        }

        let pb = &self.strategy.pullback;
        if pb.min_candles > pb.max_candles {
            anyhow::bail!(
                "pullback.min_candles ({}) exceeds pullback.max_candles ({})",
                pb.min_candles,
                pb.max_candles
            );
        }
        if pb.min_depth > pb.max_depth {
            anyhow::bail!(
                "pullback.min_depth ({}) exceeds pullback.max_depth ({})",
                pb.min_depth,
                pb.max_depth
            );
        }
        if self.strategy.impulse.run_length == 0 {
            anyhow::bail!("impulse.run_length must be at least 1");
        }
        if self.risk.tp_multiplier <= 0.0 {
            anyhow::bail!("risk.tp_multiplier must be positive");
        }

        Ok(())
    }
}
