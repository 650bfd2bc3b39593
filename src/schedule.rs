//! Day/night color temperature schedule
//!
//! All computations use minutes since midnight, modulo one day, so windows that cross midnight
//! need no special handling.

use chrono::{NaiveTime, Timelike};

use crate::models::{ScheduleConfig, Temperature, MINUTES_PER_DAY};

const DAY: f64 = MINUTES_PER_DAY as f64;

/// Minutes from `from` to `to`, going forward on the clock
fn elapsed(from: f64, to: f64) -> f64 {
    (to - from).rem_euclid(DAY)
}

/// Minutes since midnight, with sub-minute precision
pub fn minutes_of(time: NaiveTime) -> f64 {
    time.num_seconds_from_midnight() as f64 / 60. + time.nanosecond() as f64 / 60e9
}

/// Evaluates a [`ScheduleConfig`] at a given time of day
#[derive(Debug, Clone)]
pub struct TemperatureSchedule {
    high_temp: Temperature,
    low_temp: Temperature,
    sunset: f64,
    sunset_adapted: f64,
    sunrise: f64,
    adaptation: f64,
    corrected: bool,
}

impl TemperatureSchedule {
    pub fn new(config: &ScheduleConfig) -> Self {
        let adaptation = if config.adaptation_minutes.is_finite() {
            config.adaptation_minutes.max(0.).min(DAY - 1.)
        } else {
            0.
        };

        let sunset = config.sunset.minutes_since_midnight() as f64;
        let sunset_adapted = (sunset - adaptation).rem_euclid(DAY);

        let mut sunrise = config.sunrise.minutes_since_midnight() as f64;
        let corrected = sunrise >= sunset_adapted;

        if corrected {
            warn!(
                sunrise = %config.sunrise,
                sunset = %config.sunset,
                adaptation_minutes = adaptation,
                "sunrise is not before sunset minus adaptation, using sunset minus adaptation"
            );

            sunrise = sunset_adapted;
        }

        Self {
            high_temp: config.high_temp,
            low_temp: config.low_temp,
            sunset,
            sunset_adapted,
            sunrise,
            adaptation,
            corrected,
        }
    }

    /// Sunrise used for evaluation, in minutes since midnight
    pub fn effective_sunrise(&self) -> f64 {
        self.sunrise
    }

    /// `true` if the configured sunrise had to be moved
    pub fn corrected(&self) -> bool {
        self.corrected
    }

    /// How far into the night `now` is: 0 during the day, 1 during the night, in between
    /// during dusk and dawn
    pub fn night_factor(&self, now: NaiveTime) -> f64 {
        let now = minutes_of(now);

        // Dusk
        if self.adaptation > 0. {
            let since = elapsed(self.sunset_adapted, now);
            if since <= self.adaptation {
                return since / self.adaptation;
            }
        }

        // Night
        if elapsed(self.sunset, now) <= elapsed(self.sunset, self.sunrise) {
            return 1.;
        }

        // Dawn
        if self.adaptation > 0. {
            let since = elapsed(self.sunrise, now);
            if since <= self.adaptation {
                return 1. - since / self.adaptation;
            }
        }

        0.
    }

    pub fn target_temperature(&self, now: NaiveTime) -> Temperature {
        lerp(
            self.low_temp as f64,
            self.high_temp as f64,
            self.night_factor(now),
        )
        .round() as Temperature
    }
}

/// Linear interpolation from `from` (at 0) to `to` (at 1)
pub fn lerp(from: f64, to: f64, factor: f64) -> f64 {
    from + (to - from) * factor
}
