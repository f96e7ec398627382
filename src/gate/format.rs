use chrono::{DateTime, Duration, FixedOffset};
use serde::Serialize;

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Readout shown whenever voting is not open.
pub const ZERO_READOUT: &str = "00:00:00";

/// The four numeric countdown fields, each at least two digits wide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountdownFields {
    pub days: String,
    pub hours: String,
    pub minutes: String,
    pub seconds: String,
}

impl CountdownFields {
    pub fn from_remaining(remaining: Duration) -> Self {
        let ms = remaining.num_milliseconds().max(0);
        Self {
            days: format!("{:02}", ms / MS_PER_DAY),
            hours: format!("{:02}", (ms % MS_PER_DAY) / MS_PER_HOUR),
            minutes: format!("{:02}", (ms % MS_PER_HOUR) / MS_PER_MINUTE),
            seconds: format!("{:02}", (ms % MS_PER_MINUTE) / MS_PER_SECOND),
        }
    }

    /// `DD:HH:MM:SS`
    pub fn joined(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.days, self.hours, self.minutes, self.seconds
        )
    }
}

/// `HH:MM:SS` of the remaining time. Whole days are dropped; the hours
/// field is the hour within the current day.
pub fn format_remaining(remaining: Duration) -> String {
    let ms = remaining.num_milliseconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        (ms % MS_PER_DAY) / MS_PER_HOUR,
        (ms % MS_PER_HOUR) / MS_PER_MINUTE,
        (ms % MS_PER_MINUTE) / MS_PER_SECOND
    )
}

pub fn format_wall_clock(now: DateTime<FixedOffset>) -> String {
    now.format("%H:%M:%S").to_string()
}
