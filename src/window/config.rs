use anyhow::Result;
use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gate::{classify, Phase};
use crate::store::Storage;

/// Storage key the admin page writes the voting window under.
pub const CONFIG_KEY: &str = "votingConfig";

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no voting configuration found")]
    Missing,
    #[error("voting configuration is unparsable: {0}")]
    Unparsable(String),
    #[error("voting window must start before it ends (start {start}, end {end})")]
    InvertedWindow { start: String, end: String },
}

/// The `[start, end)` range during which votes are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotingWindowConfig {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl VotingWindowConfig {
    pub fn new(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> Self {
        Self { start, end }
    }

    pub fn classify(&self, now: DateTime<FixedOffset>) -> Phase {
        classify(now, self.start, self.end)
    }

    pub fn is_ordered(&self) -> bool {
        self.start < self.end
    }
}

/// Wire shape of the persisted value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PersistedWindow {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowSource {
    Persisted,
    Default { reason: ConfigError },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedWindow {
    pub config: VotingWindowConfig,
    pub source: WindowSource,
}

/// Parses one instant the way a browser `Date` reads ISO strings: offset or
/// `Z` forms are absolute, date-times without an offset are local to `tz`,
/// and a bare date is UTC midnight.
pub fn parse_instant<Tz: TimeZone>(raw: &str, tz: &Tz) -> Result<DateTime<FixedOffset>, ConfigError> {
    let raw = raw.trim();

    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant);
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|instant| instant.fixed_offset())
                .ok_or_else(|| {
                    ConfigError::Unparsable(format!("'{raw}' does not exist in the local time zone"))
                });
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)).fixed_offset());
    }

    Err(ConfigError::Unparsable(format!("invalid date '{raw}'")))
}

pub fn parse_window<Tz: TimeZone>(raw: &str, tz: &Tz) -> Result<VotingWindowConfig, ConfigError> {
    let persisted: PersistedWindow =
        serde_json::from_str(raw).map_err(|err| ConfigError::Unparsable(err.to_string()))?;

    Ok(VotingWindowConfig {
        start: parse_instant(&persisted.start_date, tz)?,
        end: parse_instant(&persisted.end_date, tz)?,
    })
}

fn local_instant<Tz: TimeZone>(
    tz: &Tz,
    year: i32,
    month: u32,
    day: u32,
    (hour, minute, second): (u32, u32, u32),
) -> DateTime<FixedOffset> {
    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .unwrap_or_default();

    tz.from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
        .fixed_offset()
}

/// Window used when nothing usable is persisted. The dates are wall-clock
/// times in `tz`, each resolved with the offset in force on that date.
///
/// The "has this year's event passed" cutoff is Nov 22 19:01:00 while the
/// window itself ends on Oct 6 16:20:00. Between those two dates the
/// fallback is a window that has already closed.
pub fn default_window<Tz: TimeZone>(tz: &Tz, now: &DateTime<FixedOffset>) -> VotingWindowConfig {
    let current_year = now.with_timezone(tz).year();
    let cutoff = local_instant(tz, current_year, 11, 22, (19, 1, 0));

    let event_year = if *now > cutoff {
        current_year + 1
    } else {
        current_year
    };

    VotingWindowConfig {
        start: local_instant(tz, event_year, 5, 25, (20, 20, 0)),
        end: local_instant(tz, event_year, 10, 6, (16, 20, 0)),
    }
}

/// Turns the raw persisted value into a window, substituting the default
/// window when it is missing or unparsable. Offset-less values are read as
/// wall-clock times in `tz`.
pub fn resolve_window<Tz: TimeZone>(
    raw: Option<&str>,
    tz: &Tz,
    now: &DateTime<FixedOffset>,
) -> LoadedWindow {
    let parsed = match raw {
        Some(raw) => parse_window(raw, tz),
        None => Err(ConfigError::Missing),
    };

    match parsed {
        Ok(config) => {
            if !config.is_ordered() {
                warn!(
                    "stored voting window ends before it starts ({} >= {})",
                    config.start, config.end
                );
            }
            LoadedWindow {
                config,
                source: WindowSource::Persisted,
            }
        }
        Err(reason) => {
            warn!("{reason}; using default voting dates");
            LoadedWindow {
                config: default_window(tz, now),
                source: WindowSource::Default { reason },
            }
        }
    }
}

/// Reads the persisted window from `storage`, falling back to the default
/// computed for `now` in `tz`.
pub async fn load_window<Tz: TimeZone>(
    storage: &Storage,
    tz: &Tz,
    now: &DateTime<FixedOffset>,
) -> Result<LoadedWindow> {
    let raw = storage.get_item(CONFIG_KEY).await?;
    Ok(resolve_window(raw.as_deref(), tz, now))
}

#[cfg(test)]
mod tests {
    use chrono::{LocalResult, TimeDelta};

    use super::*;

    fn wib() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    fn at(raw: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(raw).unwrap()
    }

    /// Central European time for 2025: +01:00, and +02:00 from
    /// Mar 30 01:00 UTC until Oct 26 01:00 UTC.
    #[derive(Debug, Clone, Copy)]
    struct Cet2025;

    impl Cet2025 {
        fn winter() -> FixedOffset {
            FixedOffset::east_opt(3600).unwrap()
        }

        fn summer() -> FixedOffset {
            FixedOffset::east_opt(2 * 3600).unwrap()
        }
    }

    impl TimeZone for Cet2025 {
        type Offset = FixedOffset;

        fn from_offset(_: &FixedOffset) -> Self {
            Cet2025
        }

        fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
            self.offset_from_local_datetime(&local.and_time(NaiveTime::MIN))
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            let fits: Vec<FixedOffset> = [Self::summer(), Self::winter()]
                .into_iter()
                .filter(|offset| {
                    let utc = *local - TimeDelta::seconds(i64::from(offset.local_minus_utc()));
                    self.offset_from_utc_datetime(&utc) == *offset
                })
                .collect();
            match fits.as_slice() {
                [only] => LocalResult::Single(*only),
                [earliest, latest] => LocalResult::Ambiguous(*earliest, *latest),
                _ => LocalResult::None,
            }
        }

        fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
            self.offset_from_utc_datetime(&utc.and_time(NaiveTime::MIN))
        }

        fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
            let switch = |month, day| {
                NaiveDate::from_ymd_opt(2025, month, day)
                    .unwrap()
                    .and_hms_opt(1, 0, 0)
                    .unwrap()
            };
            if (switch(3, 30)..switch(10, 26)).contains(utc) {
                Self::summer()
            } else {
                Self::winter()
            }
        }
    }

    #[test]
    fn parses_persisted_json() {
        let raw = r#"{"startDate":"2025-05-25T13:20:00.000Z","endDate":"2025-10-06T09:20:00.000Z"}"#;
        let window = parse_window(raw, &wib()).unwrap();
        assert_eq!(window.start, at("2025-05-25T20:20:00+07:00"));
        assert_eq!(window.end, at("2025-10-06T16:20:00+07:00"));
    }

    #[test]
    fn naive_instants_are_local_and_dates_are_utc() {
        assert_eq!(
            parse_instant("2025-05-25T20:20", &wib()).unwrap(),
            at("2025-05-25T20:20:00+07:00")
        );
        assert_eq!(
            parse_instant("2025-05-25T20:20:00.500", &wib()).unwrap(),
            at("2025-05-25T20:20:00.500+07:00")
        );
        assert_eq!(
            parse_instant("2025-05-25", &wib()).unwrap(),
            at("2025-05-25T00:00:00Z")
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_window("not json", &wib()),
            Err(ConfigError::Unparsable(_))
        ));
        assert!(matches!(
            parse_window(r#"{"startDate":"soon","endDate":"2025-10-06"}"#, &wib()),
            Err(ConfigError::Unparsable(_))
        ));
        assert!(matches!(
            parse_window(r#"{"startDate":"2025-05-25"}"#, &wib()),
            Err(ConfigError::Unparsable(_))
        ));
    }

    #[test]
    fn default_window_uses_current_year_before_cutoff() {
        let now = at("2025-06-01T10:00:00+07:00");
        let window = default_window(&wib(), &now);
        assert_eq!(window.start, at("2025-05-25T20:20:00+07:00"));
        assert_eq!(window.end, at("2025-10-06T16:20:00+07:00"));
    }

    #[test]
    fn default_window_rolls_over_after_cutoff() {
        let on_cutoff = default_window(&wib(), &at("2025-11-22T19:01:00+07:00"));
        assert_eq!(on_cutoff.start, at("2025-05-25T20:20:00+07:00"));

        let past_cutoff = default_window(&wib(), &at("2025-11-22T19:01:01+07:00"));
        assert_eq!(past_cutoff.start, at("2026-05-25T20:20:00+07:00"));
        assert_eq!(past_cutoff.end, at("2026-10-06T16:20:00+07:00"));
    }

    #[test]
    fn default_window_between_end_and_cutoff_is_already_over() {
        let now = at("2025-10-20T12:00:00+07:00");
        let window = default_window(&wib(), &now);
        assert_eq!(window.classify(now), Phase::After);
    }

    #[test]
    fn resolve_reports_why_it_fell_back() {
        let now = at("2025-06-01T10:00:00+07:00");

        let missing = resolve_window(None, &wib(), &now);
        assert_eq!(
            missing.source,
            WindowSource::Default {
                reason: ConfigError::Missing
            }
        );
        assert_eq!(missing.config.start, at("2025-05-25T20:20:00+07:00"));

        let broken = resolve_window(Some("{"), &wib(), &now);
        assert!(matches!(
            broken.source,
            WindowSource::Default {
                reason: ConfigError::Unparsable(_)
            }
        ));

        let stored = resolve_window(
            Some(r#"{"startDate":"2025-01-01T00:00:00Z","endDate":"2025-01-02T00:00:00Z"}"#),
            &wib(),
            &now,
        );
        assert_eq!(stored.source, WindowSource::Persisted);
        assert_eq!(stored.config.end, at("2025-01-02T00:00:00Z"));
    }

    #[test]
    fn inverted_persisted_window_is_kept_as_is() {
        let now = at("2025-06-01T10:00:00+07:00");
        let loaded = resolve_window(
            Some(r#"{"startDate":"2025-02-01T00:00:00Z","endDate":"2025-01-01T00:00:00Z"}"#),
            &wib(),
            &now,
        );
        assert_eq!(loaded.source, WindowSource::Persisted);
        assert!(!loaded.config.is_ordered());
    }

    #[test]
    fn default_window_uses_each_dates_own_offset() {
        // Computed in winter, the window dates still fall in summer time.
        let now = at("2025-01-10T12:00:00+01:00");
        let window = default_window(&Cet2025, &now);
        assert_eq!(window.start, at("2025-05-25T20:20:00+02:00"));
        assert_eq!(window.end, at("2025-10-06T16:20:00+02:00"));

        // Nov 22 is back in winter time, so the cutoff is 19:01 at +01:00.
        let on_cutoff = default_window(&Cet2025, &at("2025-11-22T19:01:00+01:00"));
        assert_eq!(on_cutoff.start.year(), 2025);
        let past_cutoff = default_window(&Cet2025, &at("2025-11-22T19:01:01+01:00"));
        assert_eq!(past_cutoff.start.year(), 2026);
    }

    #[test]
    fn naive_stored_dates_use_the_offset_of_that_date() {
        let now = at("2025-01-10T12:00:00+01:00");
        let loaded = resolve_window(
            Some(r#"{"startDate":"2025-05-25T20:20","endDate":"2025-12-01T08:00"}"#),
            &Cet2025,
            &now,
        );
        assert_eq!(loaded.source, WindowSource::Persisted);
        assert_eq!(loaded.config.start, at("2025-05-25T20:20:00+02:00"));
        assert_eq!(loaded.config.end, at("2025-12-01T08:00:00+01:00"));
    }

    #[test]
    fn skipped_local_time_is_unparsable() {
        assert!(matches!(
            parse_instant("2025-03-30T02:30", &Cet2025),
            Err(ConfigError::Unparsable(_))
        ));
    }
}
