//! Candle data loading
//!
//! CSV files carry a header row with `datetime,open,high,low,close` (extra
//! columns such as volume are ignored). Candles are validated on load and
//! indexed sequentially in file order.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::{Candle, Symbol};

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // No timezone: assume UTC
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
        })
        .context(format!("Failed to parse datetime: {}", s))
}

fn parse_field(record: &csv::StringRecord, idx: usize, name: &str) -> Result<f64> {
    record
        .get(idx)
        .context(format!("Missing {} column", name))?
        .trim()
        .parse()
        .context(format!("Failed to parse {}", name))
}

/// Load candles from a CSV file. Any row that fails to parse or validate
/// aborts the load with the row number in the error chain.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .context(format!("Failed to open CSV file: {}", path.display()))?;

    let mut candles: Vec<Candle> = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let row = row_idx + 1;
        let record = result.context(format!("Failed to read row {}", row))?;

        let dt_str = record
            .get(0)
            .context(format!("Missing datetime column at row {}", row))?;
        let timestamp = parse_datetime(dt_str.trim()).context(format!("Row {}", row))?;
        let open = parse_field(&record, 1, "open").context(format!("Row {}", row))?;
        let high = parse_field(&record, 2, "high").context(format!("Row {}", row))?;
        let low = parse_field(&record, 3, "low").context(format!("Row {}", row))?;
        let close = parse_field(&record, 4, "close").context(format!("Row {}", row))?;

        let index = candles.len() as u64;
        let candle = Candle::new(index, timestamp, open, high, low, close).context(format!(
            "Invalid candle at row {} of {}",
            row,
            path.display()
        ))?;
        candles.push(candle);
    }

    Ok(candles)
}

/// Load `{symbol}_{timeframe}.csv` for each symbol from `data_dir`
pub fn load_multi_symbol(
    data_dir: impl AsRef<Path>,
    symbols: &[Symbol],
    timeframe: &str,
) -> Result<HashMap<Symbol, Vec<Candle>>> {
    let mut data = HashMap::new();

    for symbol in symbols {
        let filename = format!("{}_{}.csv", symbol.as_str(), timeframe);
        let path = data_dir.as_ref().join(&filename);

        if !path.exists() {
            warn!("Data file not found: {}", path.display());
            continue;
        }

        let candles = load_csv(&path).context(format!("Failed to load data for {}", symbol))?;

        info!("Loaded {} candles for {}", candles.len(), symbol);
        data.insert(symbol.clone(), candles);
    }

    if data.is_empty() {
        anyhow::bail!("No data loaded for any symbol");
    }

    Ok(data)
}

/// Keep candles between `start` and `end` (inclusive, YYYY-MM-DD). Indices
/// are kept as loaded so they stay strictly increasing.
pub fn filter_candles_by_date(
    candles: Vec<Candle>,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<Vec<Candle>> {
    let start = start
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").context(format!("Invalid start date: {}", s)))
        .transpose()?;
    let end = end
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").context(format!("Invalid end date: {}", s)))
        .transpose()?;

    Ok(candles
        .into_iter()
        .filter(|c| {
            let date = c.timestamp.date_naive();
            start.map_or(true, |s| date >= s) && end.map_or(true, |e| date <= e)
        })
        .collect())
}
