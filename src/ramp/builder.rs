use super::Ramp;
use crate::models::{Brightness, Temperature, DEFAULT_BRIGHTNESS, NEUTRAL_TEMPERATURE};

/// Maps an 8-bit brightness onto the ramp value range
const SLOPE: f64 = 32. / 255.;

/// Green attenuation per unit of temperature is `1 / GREEN_DIVISOR`
const GREEN_DIVISOR: f64 = 270.;

/// Blue attenuation per unit of temperature is `1 / BLUE_DIVISOR`
const BLUE_DIVISOR: f64 = 100.;

/// Builds gamma ramps of a fixed size from a brightness and a temperature
///
/// Red is never attenuated. Warmer temperatures divide green, and blue even more, which shifts
/// the screen towards amber while brightness stays anchored to the red channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GammaRampBuilder {
    ramp_size: usize,
}

impl GammaRampBuilder {
    pub fn new(ramp_size: usize) -> Self {
        Self { ramp_size }
    }

    pub fn ramp_size(&self) -> usize {
        self.ramp_size
    }

    pub fn build(&self, brightness: Brightness, temperature: Temperature) -> Ramp {
        let mut ramp = Ramp::zeroed(self.ramp_size);
        self.fill(&mut ramp, brightness, temperature);
        ramp
    }

    /// The ramp of an unadjusted display
    pub fn neutral(&self) -> Ramp {
        self.build(DEFAULT_BRIGHTNESS, NEUTRAL_TEMPERATURE)
    }

    fn fill(&self, ramp: &mut Ramp, brightness: Brightness, temperature: Temperature) {
        let (gdiv, bdiv) = if temperature > 1 {
            let t = f64::from(temperature);
            (1. + t / GREEN_DIVISOR, 1. + t / BLUE_DIVISOR)
        } else {
            (1., 1.)
        };

        let output = SLOPE * f64::from(brightness);
        let (r, g, b) = ramp.channels_mut();

        for (i, ((r, g), b)) in r.iter_mut().zip(g.iter_mut()).zip(b.iter_mut()).enumerate() {
            let raw = (i as f64 * output).round().min(f64::from(u16::MAX));

            *r = raw as u16;
            *g = (raw / gdiv) as u16;
            *b = (raw / bdiv) as u16;
        }
    }
}
