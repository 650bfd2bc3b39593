use parse_display::{Display, FromStr};
use serde_derive::{Deserialize, Serialize};
use strum_macros::IntoStaticStr;
use thiserror::Error;
use validator::{Validate, ValidationError};

pub mod backend;

mod schedule;
pub use schedule::*;

mod time_of_day;
pub use time_of_day::*;

/// Output brightness, nominally in `0..=255`
pub type Brightness = u32;

/// Color temperature shift: 0 is neutral, larger values are warmer
pub type Temperature = i32;

/// Brightness of an unadjusted display
pub const DEFAULT_BRIGHTNESS: Brightness = 255;

/// Temperature of an unadjusted display
pub const NEUTRAL_TEMPERATURE: Temperature = 0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("error parsing configuration: {0}")]
    Deserialize(#[from] toml::de::Error),
    #[error("error serializing configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Display access method
#[derive(
    Display,
    FromStr,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    IntoStaticStr,
)]
#[display(style = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Backend {
    /// XF86VidMode gamma ramps and root window capture
    X11,
    /// In-memory display, for testing
    Dummy,
}

impl Default for Backend {
    fn default() -> Self {
        if cfg!(feature = "x11") {
            Self::X11
        } else {
            Self::Dummy
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ControlConfig {
    /// Delay between two ticks of the control loop
    #[validate(range(min = 10, max = 60000))]
    pub interval_ms: u64,
    /// Only every `sample_step`-th pixel of every `sample_step`-th row is used for estimation
    #[validate(range(min = 1, max = 1024))]
    pub sample_step: u32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            sample_step: 8,
        }
    }
}

fn validate_brightness_range(config: &BrightnessConfig) -> Result<(), ValidationError> {
    if config.min > config.max || config.min > config.night_max {
        return Err(ValidationError::new("brightness_range"));
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_brightness_range"))]
pub struct BrightnessConfig {
    /// Follow the screen contents. When disabled, `manual` is used.
    pub auto: bool,
    #[validate(range(max = 255))]
    pub manual: Brightness,
    #[validate(range(max = 255))]
    pub min: Brightness,
    /// Upper bound during the day
    #[validate(range(max = 255))]
    pub max: Brightness,
    /// Upper bound during the night, interpolated with `max` along the schedule
    #[validate(range(max = 255))]
    pub night_max: Brightness,
    /// Added to the inverted screen brightness
    #[validate(range(min = -255, max = 255))]
    pub offset: i32,
    /// Largest brightness change per tick, 0 to disable rate limiting
    #[validate(range(max = 255))]
    pub step: u32,
    /// Screen brightness change required before retargeting
    #[validate(range(max = 255))]
    pub threshold: u32,
}

impl Default for BrightnessConfig {
    fn default() -> Self {
        Self {
            auto: true,
            manual: DEFAULT_BRIGHTNESS,
            min: 64,
            max: DEFAULT_BRIGHTNESS,
            night_max: DEFAULT_BRIGHTNESS,
            offset: 70,
            step: 4,
            threshold: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TemperatureConfig {
    /// Follow the schedule. When disabled, `manual` is used.
    pub auto: bool,
    #[validate(range(min = 0, max = 1000))]
    pub manual: Temperature,
    /// Largest temperature change per tick, 0 to disable rate limiting
    #[validate(range(max = 1000))]
    pub step: u32,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            auto: true,
            manual: NEUTRAL_TEMPERATURE,
            step: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DummyConfig {
    #[validate(range(min = 2, max = 65536))]
    pub ramp_size: u32,
    #[validate(range(min = 1, max = 16384))]
    pub width: u32,
    #[validate(range(min = 1, max = 16384))]
    pub height: u32,
    /// Gray level of the simulated screen
    pub luma: u8,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            ramp_size: 2048,
            width: 640,
            height: 360,
            luma: 128,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    /// Restore the gamma ramp found at startup on exit, instead of a neutral ramp
    pub restore_previous: bool,
    #[validate(nested)]
    pub control: ControlConfig,
    #[validate(nested)]
    pub brightness: BrightnessConfig,
    #[validate(nested)]
    pub temperature: TemperatureConfig,
    #[validate(nested)]
    pub schedule: ScheduleConfig,
    #[validate(nested)]
    pub dummy: DummyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            restore_previous: true,
            control: ControlConfig::default(),
            brightness: BrightnessConfig::default(),
            temperature: TemperatureConfig::default(),
            schedule: ScheduleConfig::default(),
            dummy: DummyConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
