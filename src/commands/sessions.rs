//! Sessions command implementation

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pullback_signals::session::SessionSchedule;
use pullback_signals::Config;
use tracing::info;

pub fn run(config_path: String, at: Option<String>) -> Result<()> {
    let config = Config::from_file(&config_path)?;
    let schedule = SessionSchedule::from_config(&config.session)?;

    let ts = match at {
        Some(s) => DateTime::parse_from_rfc3339(&s)
            .context(format!("Invalid RFC3339 timestamp: {}", s))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    println!("UTC:    {}", ts.format("%Y-%m-%d %H:%M:%S"));
    println!("Local:  {}", schedule.to_local(ts).format("%Y-%m-%d %H:%M:%S %:z"));
    for window in schedule.windows() {
        println!("  {:<10} {} - {}", window.name, window.start.format("%H:%M"), window.end.format("%H:%M"));
    }

    match schedule.window_for(ts) {
        Some(key) => {
            info!("Session active: {}", key);
            println!("Active: {}", key);
        }
        None => println!("Active: no tradeable session"),
    }

    Ok(())
}
