//! Gamma ramp tables and the resource owning the display's ramp

use thiserror::Error;

mod builder;
pub use builder::*;

mod store;
pub use store::*;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("mismatched ramp channel lengths (red: {red}, green: {green}, blue: {blue})")]
pub struct RampLengthError {
    pub red: usize,
    pub green: usize,
    pub blue: usize,
}

/// Per-channel 16-bit lookup tables of equal length
#[derive(Clone, PartialEq, Eq)]
pub struct Ramp {
    red: Vec<u16>,
    green: Vec<u16>,
    blue: Vec<u16>,
}

impl std::fmt::Debug for Ramp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut f = f.debug_struct("Ramp");
        f.field("len", &self.len());

        if self.len() > 8 {
            f.field("red", &format!("[{:?}..{:?}]", self.red.first(), self.red.last()));
            f.field(
                "green",
                &format!("[{:?}..{:?}]", self.green.first(), self.green.last()),
            );
            f.field("blue", &format!("[{:?}..{:?}]", self.blue.first(), self.blue.last()));
        } else {
            f.field("red", &self.red);
            f.field("green", &self.green);
            f.field("blue", &self.blue);
        }

        f.finish()
    }
}

impl Ramp {
    pub fn new(red: Vec<u16>, green: Vec<u16>, blue: Vec<u16>) -> Result<Self, RampLengthError> {
        if red.len() != green.len() || red.len() != blue.len() {
            return Err(RampLengthError {
                red: red.len(),
                green: green.len(),
                blue: blue.len(),
            });
        }

        Ok(Self { red, green, blue })
    }

    /// A ramp of `len` zeros in every channel
    pub fn zeroed(len: usize) -> Self {
        Self {
            red: vec![0; len],
            green: vec![0; len],
            blue: vec![0; len],
        }
    }

    /// The identity ramp, spanning the full 16-bit range
    pub fn linear(len: usize) -> Self {
        let mut ramp = Self::zeroed(len);
        let max = len.saturating_sub(1).max(1) as u64;

        for (i, value) in ramp.red.iter_mut().enumerate() {
            *value = (i as u64 * u16::MAX as u64 / max) as u16;
        }
        ramp.green.copy_from_slice(&ramp.red);
        ramp.blue.copy_from_slice(&ramp.red);

        ramp
    }

    pub fn len(&self) -> usize {
        self.red.len()
    }

    pub fn is_empty(&self) -> bool {
        self.red.is_empty()
    }

    pub fn red(&self) -> &[u16] {
        &self.red
    }

    pub fn green(&self) -> &[u16] {
        &self.green
    }

    pub fn blue(&self) -> &[u16] {
        &self.blue
    }

    /// Mutable access to the red, green and blue channels
    pub fn channels_mut(&mut self) -> (&mut [u16], &mut [u16], &mut [u16]) {
        (&mut self.red, &mut self.green, &mut self.blue)
    }
}
