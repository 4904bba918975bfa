//! Historical replay of candle files through the strategy
//!
//! Per symbol: candle → indicator feed → session filter → engine. The risk
//! session and any partial pattern are reset whenever a new session window
//! opens. Symbols are independent and are scanned in parallel.

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::{Config, InstrumentConfig};
use crate::error::StrategyResult;
use crate::indicators::IndicatorFeed;
use crate::session::{SessionKey, SessionSchedule};
use crate::strategy::{EventSink, StrategyEngine, TracingSink};
use crate::{Candle, Signal, Symbol};

/// Outcome of replaying one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub symbol: Symbol,
    pub candles: usize,
    pub in_session: usize,
    pub sessions: usize,
    pub signals: Vec<Signal>,
}

pub struct SymbolScanner<S: EventSink = TracingSink> {
    engine: StrategyEngine<S>,
    feed: IndicatorFeed,
    schedule: SessionSchedule,
    current_session: Option<SessionKey>,
    report: ScanReport,
}

impl SymbolScanner<TracingSink> {
    pub fn new(instrument: &InstrumentConfig, config: &Config) -> Result<Self> {
        Self::with_sink(instrument, config, TracingSink)
    }
}

impl<S: EventSink> SymbolScanner<S> {
    pub fn with_sink(instrument: &InstrumentConfig, config: &Config, sink: S) -> Result<Self> {
        let symbol = instrument.symbol();
        let risk = config.risk.clone().build(instrument.pip_scale()?);
        let engine = StrategyEngine::with_sink(symbol.clone(), config.strategy.clone(), risk, sink);

        Ok(Self {
            engine,
            feed: IndicatorFeed::from_config(&config.indicators)?,
            schedule: SessionSchedule::from_config(&config.session)?,
            current_session: None,
            report: ScanReport {
                symbol,
                candles: 0,
                in_session: 0,
                sessions: 0,
                signals: Vec::new(),
            },
        })
    }

    pub fn engine(&self) -> &StrategyEngine<S> {
        &self.engine
    }

    pub fn report(&self) -> &ScanReport {
        &self.report
    }

    pub fn into_report(self) -> ScanReport {
        self.report
    }

    /// Feed one candle. Indicators see every candle; the engine only sees
    /// candles inside a session window.
    pub fn on_candle(&mut self, candle: &Candle) -> StrategyResult<Option<Signal>> {
        self.report.candles += 1;
        let snapshot = self.feed.next(candle);

        let Some(key) = self.schedule.window_for(candle.timestamp) else {
            return Ok(None);
        };

        if self.current_session.as_ref() != Some(&key) {
            debug!(symbol = %self.report.symbol, session = %key, "New session");
            self.engine.risk_mut().reset_session();
            self.engine.reset();
            self.current_session = Some(key);
            self.report.sessions += 1;
        }

        self.report.in_session += 1;
        let signal = self.engine.process_candle(candle, &snapshot)?;
        if let Some(signal) = &signal {
            self.report.signals.push(signal.clone());
        }
        Ok(signal)
    }

    pub fn run(&mut self, candles: &[Candle]) -> StrategyResult<&ScanReport> {
        for candle in candles {
            self.on_candle(candle)?;
        }
        Ok(&self.report)
    }
}

/// Replay every symbol's candles, one engine per symbol, in parallel.
/// Reports come back sorted by symbol.
pub fn scan_all(config: &Config, data: &HashMap<Symbol, Vec<Candle>>) -> Result<Vec<ScanReport>> {
    let mut reports = data
        .par_iter()
        .map(|(symbol, candles)| -> Result<ScanReport> {
            let instrument = config
                .instrument(symbol)
                .cloned()
                .unwrap_or_else(|| InstrumentConfig::new(symbol.as_str()));
            let mut scanner = SymbolScanner::new(&instrument, config)?;
            scanner
                .run(candles)
                .context(format!("Scan failed for {}", symbol))?;
            let report = scanner.into_report();
            info!(
                "{}: {} candles, {} in session, {} signals",
                report.symbol,
                report.candles,
                report.in_session,
                report.signals.len()
            );
            Ok(report)
        })
        .collect::<Result<Vec<_>>>()?;

    reports.sort_by(|a, b| a.symbol.as_str().cmp(b.symbol.as_str()));
    Ok(reports)
}
