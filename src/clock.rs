use crate::error::{Result, ScraperError};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Wall clock in the newsroom's timezone. Snapshot names and freshness
/// notes are rendered from it.
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    tz: Tz,
    fixed: Option<DateTime<Utc>>,
}

impl RunClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz, fixed: None }
    }

    /// Clock pinned to one instant, for tests and reruns
    pub fn fixed(tz: Tz, at: DateTime<Utc>) -> Self {
        Self { tz, fixed: Some(at) }
    }

    pub fn now(&self) -> DateTime<Tz> {
        self.fixed.unwrap_or_else(Utc::now).with_timezone(&self.tz)
    }

    /// `YYYY-MM-DD_HH-MM`, used in snapshot file names
    pub fn snapshot_stamp(&self) -> String {
        self.now().format("%Y-%m-%d_%H-%M").to_string()
    }

    /// e.g. `Last updated: 11/05/2024, 08:30 PM PST`. The abbreviation follows
    /// daylight saving time.
    pub fn freshness_note(&self, prefix: &str) -> String {
        format!("{} {}", prefix, self.now().format("%m/%d/%Y, %I:%M %p %Z"))
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| ScraperError::config(format!("invalid timezone '{}': {}", name, e)))
}
