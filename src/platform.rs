//! Display access: gamma ramp reads and writes, and screen captures

use thiserror::Error;

use crate::{
    image::{Sample, SampleError},
    models::{Backend, Config},
    ramp::Ramp,
};

mod dummy;
pub use dummy::DummyDisplay;

#[cfg(feature = "x11")]
mod x11;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("backend not supported: {0}")]
    NotSupported(&'static str),
    #[error("invalid ramp size: expected {expected}, got {actual}")]
    InvalidRampSize { expected: usize, actual: usize },
    #[error("invalid screen sample: {0}")]
    Sample(#[from] SampleError),
    #[error("simulated failure: {0}")]
    Simulated(&'static str),
    #[cfg(feature = "x11")]
    #[error("failed to connect to the X server: {0}")]
    Connect(#[from] x11rb::errors::ConnectError),
    #[cfg(feature = "x11")]
    #[error("X connection error: {0}")]
    Connection(#[from] x11rb::errors::ConnectionError),
    #[cfg(feature = "x11")]
    #[error("X request error: {0}")]
    Reply(#[from] x11rb::errors::ReplyError),
}

/// Read and write access to the gamma ramp of a display
pub trait RampTarget: Send {
    /// Number of entries per channel of the display's gamma ramp
    fn ramp_size(&mut self) -> Result<usize, PlatformError>;

    /// Read the current gamma ramp, which should have `size` entries per channel
    fn read_ramp(&mut self, size: usize) -> Result<Ramp, PlatformError>;

    /// Replace the gamma ramp of the display
    fn write_ramp(&mut self, ramp: &Ramp) -> Result<(), PlatformError>;
}

/// Source of screen contents for brightness estimation
pub trait ScreenSource: Send {
    fn capture(&mut self) -> Result<Sample, PlatformError>;
}

/// Both halves of an opened display
pub struct Platform {
    pub ramp: Box<dyn RampTarget>,
    pub screen: Box<dyn ScreenSource>,
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform").finish()
    }
}

impl From<DummyDisplay> for Platform {
    fn from(display: DummyDisplay) -> Self {
        Self {
            ramp: Box::new(display.clone()),
            screen: Box::new(display),
        }
    }
}

/// Open the display selected by the configured backend
#[instrument(skip(config), fields(backend = %config.backend))]
pub fn open(config: &Config) -> Result<Platform, PlatformError> {
    match config.backend {
        Backend::Dummy => Ok(DummyDisplay::new(&config.dummy).into()),
        #[cfg(feature = "x11")]
        Backend::X11 => x11::open(),
        #[cfg(not(feature = "x11"))]
        other => Err(PlatformError::NotSupported(other.into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_dummy() {
        let mut config = Config::default();
        config.backend = Backend::Dummy;
        config.dummy.ramp_size = 512;

        let mut platform = open(&config).unwrap();
        assert_eq!(platform.ramp.ramp_size().unwrap(), 512);
        assert_eq!(
            platform.screen.capture().unwrap().width(),
            config.dummy.width as usize
        );
    }
}
