//! Start-time resolution for scheduled ramps.

use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeDelta, TimeZone};
use serde::{Deserialize, Serialize};

const MINUTES_PER_DAY: i64 = 24 * 60;

/// When a daily ramp begins.
///
/// The sunrise time itself comes from the caller (a weather service, an
/// almanac table, ...); this only applies the offset and picks the day.
///
/// ```
/// use chrono::NaiveTime;
/// use tuya_sunrise_rs::StartMode;
///
/// let mode: StartMode = serde_json::from_str(
///     r#"{"mode": "sunrise", "sunrise": "06:45:00", "offset_minutes": -30}"#,
/// ).unwrap();
/// assert_eq!(mode.start_time(), NaiveTime::from_hms_opt(6, 15, 0).unwrap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum StartMode {
    /// Same clock time every day.
    Fixed { at: NaiveTime },
    /// Relative to sunrise; a negative offset starts before it.
    Sunrise {
        sunrise: NaiveTime,
        #[serde(default)]
        offset_minutes: i64,
    },
}

impl StartMode {
    /// Clock time the ramp starts at. Offsets wrap around midnight.
    pub fn start_time(&self) -> NaiveTime {
        match *self {
            StartMode::Fixed { at } => at,
            StartMode::Sunrise {
                sunrise,
                offset_minutes,
            } => {
                let minutes = offset_minutes.rem_euclid(MINUTES_PER_DAY);
                sunrise.overflowing_add_signed(TimeDelta::minutes(minutes)).0
            }
        }
    }

    /// The next start strictly after `now`: today if still ahead, else tomorrow.
    pub fn next_start(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date().and_time(self.start_time());
        if today > now {
            today
        } else {
            today + TimeDelta::days(1)
        }
    }

    /// [`StartMode::next_start`] in the local time zone.
    ///
    /// A start time that falls into a DST gap is shifted by the gap.
    pub fn next_start_local(&self, now: DateTime<Local>) -> DateTime<Local> {
        let naive = self.next_start(now.naive_local());
        Local
            .from_local_datetime(&naive)
            .earliest()
            .unwrap_or_else(|| now + (naive - now.naive_local()))
    }
}

/// When [`crate::Controller::start_ramp`] should begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartAt {
    Now,
    At(DateTime<Local>),
}

impl StartAt {
    /// How long to wait from `now`; zero if the time has already passed.
    pub fn delay_from(&self, now: DateTime<Local>) -> Duration {
        match self {
            StartAt::Now => Duration::ZERO,
            StartAt::At(at) => (*at - now).to_std().unwrap_or(Duration::ZERO),
        }
    }
}

impl From<&StartMode> for StartAt {
    fn from(mode: &StartMode) -> Self {
        StartAt::At(mode.next_start_local(Local::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_fixed_today_or_tomorrow() {
        let mode = StartMode::Fixed { at: time(6, 30) };
        assert_eq!(mode.next_start(at(5, 0)), at(6, 30));
        // Exactly at the start time counts as passed
        assert_eq!(mode.next_start(at(6, 30)), at(6, 30) + TimeDelta::days(1));
        assert_eq!(mode.next_start(at(22, 0)), at(6, 30) + TimeDelta::days(1));
    }

    #[test]
    fn test_sunrise_offset_wraps_midnight() {
        let mode = StartMode::Sunrise {
            sunrise: time(0, 10),
            offset_minutes: -30,
        };
        assert_eq!(mode.start_time(), time(23, 40));
        assert_eq!(mode.next_start(at(12, 0)), at(23, 40));

        let late = StartMode::Sunrise {
            sunrise: time(23, 50),
            offset_minutes: 20,
        };
        assert_eq!(late.start_time(), time(0, 10));
    }

    #[test]
    fn test_deserialize_modes() {
        let fixed: StartMode = serde_json::from_str(r#"{"mode": "fixed", "at": "06:00:00"}"#).unwrap();
        assert_eq!(fixed, StartMode::Fixed { at: time(6, 0) });

        let sunrise: StartMode =
            serde_json::from_str(r#"{"mode": "sunrise", "sunrise": "07:12:00"}"#).unwrap();
        assert_eq!(sunrise.start_time(), time(7, 12));

        assert!(serde_json::from_str::<StartMode>(r#"{"mode": "moonrise"}"#).is_err());
    }

    #[test]
    fn test_delay_from() {
        let now = Local::now();
        assert_eq!(StartAt::Now.delay_from(now), Duration::ZERO);
        assert_eq!(
            StartAt::At(now - TimeDelta::minutes(5)).delay_from(now),
            Duration::ZERO
        );
        assert_eq!(
            StartAt::At(now + TimeDelta::seconds(90)).delay_from(now),
            Duration::from_secs(90)
        );
    }
}
