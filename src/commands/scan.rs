//! Scan command implementation

use anyhow::Result;
use pullback_signals::{data, scanner, Config};
use tracing::{debug, info};

pub fn run(
    config_path: String,
    json: bool,
    start_override: Option<String>,
    end_override: Option<String>,
) -> Result<()> {
    info!("Starting scan");

    let config = Config::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path);

    info!("Loading data from: {}", config.data_dir);
    let symbols = config.symbols();
    debug!("Symbols: {:?}", symbols);

    let mut data = data::load_multi_symbol(&config.data_dir, &symbols, &config.timeframe)?;

    if start_override.is_some() || end_override.is_some() {
        info!(
            "Restricting candles to {} .. {}",
            start_override.as_deref().unwrap_or("start"),
            end_override.as_deref().unwrap_or("end")
        );
        for candles in data.values_mut() {
            let all = std::mem::take(candles);
            *candles =
                data::filter_candles_by_date(all, start_override.as_deref(), end_override.as_deref())?;
        }
    }

    info!("Loaded data for {} symbols", data.len());

    let reports = scanner::scan_all(&config, &data)?;

    if json {
        for report in &reports {
            for signal in &report.signals {
                println!("{}", serde_json::to_string(signal)?);
            }
        }
        return Ok(());
    }

    println!("\n{}", "=".repeat(78));
    println!("SIGNALS");
    println!("{}", "=".repeat(78));
    println!(
        "{:<10} {:<20} {:<5} {:>12} {:>12} {:>12} {:>8}",
        "Symbol", "Time (UTC)", "Side", "Entry", "SL", "TP", "Risk"
    );
    println!("{}", "-".repeat(78));

    for report in &reports {
        let pips = config
            .instrument(&report.symbol)
            .map(|i| i.pip_scale())
            .transpose()?
            .unwrap_or_else(|| pullback_signals::PipScale::for_symbol(report.symbol.as_str()));

        for signal in &report.signals {
            println!(
                "{:<10} {:<20} {:<5} {:>12.5} {:>12.5} {:>12.5} {:>8.1}",
                signal.symbol.as_str(),
                signal.timestamp.format("%Y-%m-%d %H:%M").to_string(),
                signal.direction.to_string(),
                signal.entry_price,
                signal.sl,
                signal.tp,
                pips.price_to_pips(signal.risk())
            );
        }
    }

    println!("{}", "-".repeat(78));
    for report in &reports {
        println!(
            "{:<10} candles: {:>7}  in session: {:>7}  sessions: {:>4}  signals: {:>4}",
            report.symbol.as_str(),
            report.candles,
            report.in_session,
            report.sessions,
            report.signals.len()
        );
    }
    println!("{}", "=".repeat(78));

    info!("Scan completed successfully");

    Ok(())
}
