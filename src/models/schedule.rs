use serde_derive::{Deserialize, Serialize};
use validator::Validate;

use super::{Temperature, TimeOfDay, MINUTES_PER_DAY};

/// Day/night color temperature schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Temperature held during the night
    #[validate(range(min = 0, max = 1000))]
    pub high_temp: Temperature,
    /// Temperature held during the day, usually neutral
    #[validate(range(min = 0, max = 1000))]
    pub low_temp: Temperature,
    /// End of the night
    pub sunrise: TimeOfDay,
    /// Start of the night
    pub sunset: TimeOfDay,
    /// Length of the dusk and dawn transitions, in minutes
    #[validate(range(min = 0.0, max = 720.0))]
    pub adaptation_minutes: f64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            high_temp: 60,
            low_temp: 0,
            sunrise: TimeOfDay::from_minutes(6. * 60.),
            sunset: TimeOfDay::from_minutes(19. * 60.),
            adaptation_minutes: 60.,
        }
    }
}

impl ScheduleConfig {
    /// Sunset minus the adaptation time, in minutes since midnight
    pub fn sunset_adapted(&self) -> f64 {
        (self.sunset.minutes_since_midnight() as f64 - self.adaptation_minutes)
            .rem_euclid(MINUTES_PER_DAY as f64)
    }

    /// Enforce that sunrise happens strictly before the adapted sunset
    ///
    /// Returns `true` if the sunrise time was not valid.
    pub fn clamp_sunrise(&mut self) -> bool {
        let sunset_adapted = self.sunset_adapted();

        if self.sunrise.minutes_since_midnight() as f64 >= sunset_adapted {
            let clamped = TimeOfDay::from_minutes(sunset_adapted);

            warn!(
                sunrise = %self.sunrise,
                sunset = %self.sunset,
                adaptation_minutes = self.adaptation_minutes,
                clamped = %clamped,
                "sunrise time is later or equal to sunset - adaptation, setting to sunset - adaptation"
            );

            self.sunrise = clamped;
            return true;
        }

        false
    }
}

/// Candidate schedule collected field by field, committed with [`ScheduleDraft::accept`]
#[derive(Debug, Clone, Default)]
pub struct ScheduleDraft {
    config: ScheduleConfig,
}

impl ScheduleDraft {
    pub fn new(current: &ScheduleConfig) -> Self {
        Self {
            config: current.clone(),
        }
    }

    pub fn high_temp(&mut self, high_temp: Temperature) -> &mut Self {
        self.config.high_temp = high_temp;
        self
    }

    pub fn low_temp(&mut self, low_temp: Temperature) -> &mut Self {
        self.config.low_temp = low_temp;
        self
    }

    pub fn sunrise(&mut self, sunrise: TimeOfDay) -> &mut Self {
        self.config.sunrise = sunrise;
        self
    }

    pub fn sunset(&mut self, sunset: TimeOfDay) -> &mut Self {
        self.config.sunset = sunset;
        self
    }

    pub fn adaptation_minutes(&mut self, adaptation_minutes: f64) -> &mut Self {
        self.config.adaptation_minutes = adaptation_minutes;
        self
    }

    /// Produce the schedule to commit, with the sunrise clamp applied
    pub fn accept(&self) -> ScheduleConfig {
        let mut config = self.config.clone();
        config.clamp_sunrise();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    #[test]
    fn default_schedule_is_valid() {
        let mut config = ScheduleConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.clamp_sunrise());
    }

    #[test]
    fn accept_clamps_late_sunrise() {
        let config = ScheduleDraft::default()
            .sunset(time("19:00"))
            .adaptation_minutes(120.)
            .sunrise(time("18:30"))
            .accept();

        assert_eq!(config.sunrise, time("17:00"));
        assert_eq!(config.sunset, time("19:00"));
    }

    #[test]
    fn sunrise_equal_to_adapted_sunset_is_reported() {
        let mut config = ScheduleDraft::default()
            .sunset(time("20:00"))
            .adaptation_minutes(60.)
            .sunrise(time("19:00"))
            .accept();

        assert_eq!(config.sunrise, time("19:00"));
        assert!(config.clamp_sunrise());
        assert_eq!(config.sunrise, time("19:00"));
    }

    #[test]
    fn accept_keeps_valid_sunrise() {
        let config = ScheduleDraft::default()
            .sunset(time("20:00"))
            .sunrise(time("06:00"))
            .adaptation_minutes(60.)
            .high_temp(40)
            .accept();

        assert_eq!(config.sunrise, time("06:00"));
        assert_eq!(config.high_temp, 40);
    }

    #[test]
    fn sunset_adapted_wraps_before_midnight() {
        let config = ScheduleDraft::default()
            .sunset(time("00:30"))
            .adaptation_minutes(60.)
            .accept();

        assert_eq!(config.sunset_adapted(), 23. * 60. + 30.);
        // 06:00 is before 23:30 on the clock, nothing to correct
        assert_eq!(config.sunrise, time("06:00"));
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        let mut config = ScheduleConfig::default();
        config.adaptation_minutes = -5.;
        assert!(config.validate().is_err());

        let mut config = ScheduleConfig::default();
        config.high_temp = 5000;
        assert!(config.validate().is_err());
    }
}
