use chrono::{DateTime, Datelike, Local, Utc};
use chrono_tz::Tz;
use tracing::{debug, error, warn};

use crate::config::Config;

pub const TIMEZONE_KEY: &str = "timezone";

/// Calendar used for the date line and the day-of-year phrase rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WidgetClock {
    #[default]
    Local,
    Zone(Tz),
}

impl WidgetClock {
    pub fn from_config(cfg: &Config) -> Self {
        let Some(raw) = cfg.get(TIMEZONE_KEY) else {
            debug!("no timezone configured; using system local time");
            return WidgetClock::Local;
        };

        if raw.trim().eq_ignore_ascii_case("local") {
            return WidgetClock::Local;
        }

        parse_timezone(&raw, "config")
            .map(WidgetClock::Zone)
            .unwrap_or(WidgetClock::Local)
    }

    /// 1-based day of the year at `now`.
    pub fn day_of_year(&self, now: DateTime<Utc>) -> u32 {
        match self {
            WidgetClock::Local => now.with_timezone(&Local).ordinal(),
            WidgetClock::Zone(tz) => now.with_timezone(tz).ordinal(),
        }
    }

    pub fn format(&self, now: DateTime<Utc>, pattern: &str) -> String {
        match self {
            WidgetClock::Local => now.with_timezone(&Local).format(pattern).to_string(),
            WidgetClock::Zone(tz) => now.with_timezone(tz).format(pattern).to_string(),
        }
    }
}

fn parse_timezone(raw: &str, source: &str) -> Option<Tz> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        warn!(source, "timezone setting was empty");
        return None;
    }

    match trimmed.parse::<Tz>() {
        Ok(tz) => {
            debug!(source, timezone = %trimmed, "resolved widget timezone");
            Some(tz)
        }
        Err(err) => {
            error!(source, timezone = %trimmed, error = %err, "invalid timezone; using system local time");
            None
        }
    }
}
