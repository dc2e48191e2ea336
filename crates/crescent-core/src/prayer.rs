use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, instrument};

use crate::datetime::WidgetClock;
use crate::store::{Store, keys};

const DHUHR_FARD: &str = "ظهر (فرض)";
const DHUHR: &str = "ظهر";
const TIME_PLACEHOLDER: &str = "--:--";
const COUNTDOWN_PLACEHOLDER: &str = "--:--:--";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    Running(TimeDelta),
    Elapsed,
}

impl Countdown {
    fn until(target_millis: i64, now: DateTime<Utc>) -> Self {
        let remaining = target_millis.saturating_sub(now.timestamp_millis());
        if remaining > 0 {
            Countdown::Running(TimeDelta::milliseconds(remaining))
        } else {
            Countdown::Elapsed
        }
    }

    pub fn display(&self) -> String {
        match self {
            Countdown::Running(remaining) => {
                let secs = remaining.num_seconds();
                format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
            }
            Countdown::Elapsed => COUNTDOWN_PLACEHOLDER.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrayerView {
    pub name: String,
    pub time: String,
    pub date_line: String,
    pub location: String,
    pub countdown: Countdown,
}

#[instrument(skip(store, clock, location_placeholder))]
pub fn prayer_view(
    store: &dyn Store,
    now: DateTime<Utc>,
    clock: &WidgetClock,
    location_placeholder: &str,
) -> anyhow::Result<PrayerView> {
    let name = store.string_or(keys::NEXT_PRAYER_NAME, "--")?;
    let name = if name == DHUHR_FARD {
        DHUHR.to_string()
    } else {
        name
    };

    let time = store.string_or(keys::NEXT_PRAYER_TIME, TIME_PLACEHOLDER)?;
    let target = store.int_or(keys::NEXT_PRAYER_MILLIS, 0)?;
    let hijri = store.string_or(keys::HIJRI_DATE, "")?;
    let location = store.string_or(keys::LOCATION, location_placeholder)?;

    let date_line = format!("{} • {}", clock.format(now, "%a, %b %d"), hijri);
    let countdown = Countdown::until(target, now);
    debug!(name = %name, ?countdown, "built prayer card");

    Ok(PrayerView {
        name,
        time,
        date_line,
        location,
        countdown,
    })
}

/// Compact card combining the next prayer with the host's task summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryCard {
    pub prayer_name: String,
    pub prayer_time: String,
    pub tasks_summary: String,
}

pub fn summary_card(store: &dyn Store) -> anyhow::Result<SummaryCard> {
    Ok(SummaryCard {
        prayer_name: store.string_or(keys::NEXT_PRAYER_NAME, "Next Prayer")?,
        prayer_time: store.string_or(keys::NEXT_PRAYER_TIME, TIME_PLACEHOLDER)?,
        tasks_summary: store.string_or(keys::TASKS_SUMMARY, "No pending tasks")?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::{Countdown, prayer_view, summary_card};
    use crate::datetime::WidgetClock;
    use crate::store::{MemoryStore, StoreValue, keys};

    #[test]
    fn prayer_card_maps_dhuhr_and_runs_countdown() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let target = now.timestamp_millis() + (3 * 3600 + 5 * 60 + 9) * 1000;
        let store = MemoryStore::with_values([
            (keys::NEXT_PRAYER_NAME, StoreValue::from("ظهر (فرض)")),
            (keys::NEXT_PRAYER_TIME, StoreValue::from("12:05")),
            (keys::NEXT_PRAYER_MILLIS, StoreValue::Int(target)),
            (keys::HIJRI_DATE, StoreValue::from("13 Ramadan 1447")),
        ]);

        let view = prayer_view(&store, now, &WidgetClock::Zone(chrono_tz::UTC), "set location")
            .expect("view");
        assert_eq!(view.name, "ظهر");
        assert_eq!(view.time, "12:05");
        assert_eq!(view.date_line, "Mon, Mar 02 • 13 Ramadan 1447");
        assert_eq!(view.location, "set location");
        assert_eq!(
            view.countdown,
            Countdown::Running(TimeDelta::milliseconds(target - now.timestamp_millis()))
        );
        assert_eq!(view.countdown.display(), "03:05:09");
    }

    #[test]
    fn past_or_missing_prayer_shows_placeholders() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let store = MemoryStore::with_values([(
            keys::NEXT_PRAYER_MILLIS,
            StoreValue::Int(now.timestamp_millis() - 1),
        )]);

        let view = prayer_view(&store, now, &WidgetClock::Zone(chrono_tz::UTC), "-").expect("view");
        assert_eq!(view.name, "--");
        assert_eq!(view.time, "--:--");
        assert_eq!(view.countdown, Countdown::Elapsed);
        assert_eq!(view.countdown.display(), "--:--:--");
    }

    #[test]
    fn summary_card_defaults() {
        let card = summary_card(&MemoryStore::new()).expect("card");
        assert_eq!(card.prayer_name, "Next Prayer");
        assert_eq!(card.prayer_time, "--:--");
        assert_eq!(card.tasks_summary, "No pending tasks");
    }
}
