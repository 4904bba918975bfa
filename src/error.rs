//! Engine error types

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::CandleValidationError;

/// Caller contract violations detected while feeding the engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error("candle index {got} is not after previous index {last}")]
    OutOfOrder { last: u64, got: u64 },

    #[error("candle {index} timestamp {got} is not after previous timestamp {last}")]
    TimestampNotAfter {
        index: u64,
        last: DateTime<Utc>,
        got: DateTime<Utc>,
    },

    #[error("invalid candle at index {index}: {source}")]
    InvalidCandle {
        index: u64,
        #[source]
        source: CandleValidationError,
    },
}

pub type StrategyResult<T> = Result<T, StrategyError>;
