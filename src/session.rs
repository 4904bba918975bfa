//! Trading session windows
//!
//! Signals are only looked for during the London and New York sessions,
//! expressed in a fixed local offset (IST by default). Windows are inclusive
//! at both ends.

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};
use serde::{Deserialize, Serialize};

/// IST = UTC + 5:30
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 5 * 60 + 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub name: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SessionWindow {
    pub fn new(name: impl Into<String>, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            name: name.into(),
            start,
            end,
        }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub utc_offset_minutes: i32,
    pub windows: Vec<SessionWindow>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            windows: default_windows(),
        }
    }
}

fn default_windows() -> Vec<SessionWindow> {
    let hm = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default();
    vec![
        SessionWindow::new("london", hm(12, 30), hm(16, 30)),
        SessionWindow::new("new_york", hm(18, 30), hm(21, 30)),
    ]
}

/// Identifies one occurrence of a session window (e.g. London on a given day)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub date: NaiveDate,
    pub window: String,
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.date, self.window)
    }
}

#[derive(Debug, Clone)]
pub struct SessionSchedule {
    offset: FixedOffset,
    windows: Vec<SessionWindow>,
}

impl Default for SessionSchedule {
    fn default() -> Self {
        Self {
            offset: FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60).unwrap_or(Utc.fix()),
            windows: default_windows(),
        }
    }
}

impl SessionSchedule {
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60)
            .context(format!("Invalid UTC offset: {} minutes", config.utc_offset_minutes))?;
        Ok(Self {
            offset,
            windows: config.windows.clone(),
        })
    }

    pub fn windows(&self) -> &[SessionWindow] {
        &self.windows
    }

    pub fn to_local(&self, ts: DateTime<Utc>) -> DateTime<FixedOffset> {
        ts.with_timezone(&self.offset)
    }

    pub fn is_active(&self, ts: DateTime<Utc>) -> bool {
        self.window_for(ts).is_some()
    }

    /// Session occurrence containing `ts`, if any
    pub fn window_for(&self, ts: DateTime<Utc>) -> Option<SessionKey> {
        let local = self.to_local(ts);
        let time = local.time();
        self.windows
            .iter()
            .find(|w| w.contains(time))
            .map(|w| SessionKey {
                date: local.date_naive(),
                window: w.name.clone(),
            })
    }
}
