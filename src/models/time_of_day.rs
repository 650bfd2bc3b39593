use std::{convert::TryFrom, fmt, str::FromStr};

use chrono::{NaiveTime, Timelike};
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

/// Number of minutes in a day
pub const MINUTES_PER_DAY: u32 = 24 * 60;

lazy_static::lazy_static! {
    static ref TIME_REGEX: regex::Regex =
        regex::Regex::new("^([0-9]{1,2}):([0-9]{2})(:[0-9]{2})?$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeOfDayError {
    #[error("invalid time format: '{0}', expected HH:MM")]
    Format(String),
    #[error("time out of range: {hour:02}:{minute:02}")]
    OutOfRange { hour: u32, minute: u32 },
}

/// A wall-clock time with minute resolution
///
/// Serialized as `"HH:MM"`. Parsing also accepts `"HH:MM:SS"`, the seconds are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u32,
    minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self, TimeOfDayError> {
        if hour >= 24 || minute >= 60 {
            return Err(TimeOfDayError::OutOfRange { hour, minute });
        }

        Ok(Self { hour, minute })
    }

    /// Build a time from a (possibly fractional or out of range) number of minutes since
    /// midnight, wrapping around the clock and truncating to the minute
    pub fn from_minutes(minutes: f64) -> Self {
        let minutes = minutes.rem_euclid(MINUTES_PER_DAY as f64).floor() as u32 % MINUTES_PER_DAY;

        Self {
            hour: minutes / 60,
            minute: minutes % 60,
        }
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn minutes_since_midnight(&self) -> u32 {
        self.hour * 60 + self.minute
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeOfDayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = TIME_REGEX
            .captures(s.trim())
            .ok_or_else(|| TimeOfDayError::Format(s.to_owned()))?;

        // Both groups are made of ASCII digits only
        let hour = captures[1]
            .parse()
            .map_err(|_| TimeOfDayError::Format(s.to_owned()))?;
        let minute = captures[2]
            .parse()
            .map_err(|_| TimeOfDayError::Format(s.to_owned()))?;

        Self::new(hour, minute)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = TimeOfDayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(time: TimeOfDay) -> Self {
        time.to_string()
    }
}

impl From<TimeOfDay> for NaiveTime {
    fn from(time: TimeOfDay) -> Self {
        // Fields are range-checked on construction
        NaiveTime::from_hms_opt(time.hour, time.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl From<NaiveTime> for TimeOfDay {
    fn from(time: NaiveTime) -> Self {
        Self {
            hour: time.hour(),
            minute: time.minute(),
        }
    }
}
