use thiserror::Error;

use super::{GammaRampBuilder, Ramp};
use crate::platform::{PlatformError, RampTarget};

#[derive(Debug, Error)]
pub enum RampError {
    #[error("gamma ramps are not supported by this display: {0}")]
    UnsupportedPlatform(PlatformError),
    #[error("failed to capture the initial gamma ramp: {0}")]
    CaptureFailed(PlatformError),
    #[error("failed to apply gamma ramp: {0}")]
    ApplyFailed(PlatformError),
    #[error("gamma ramp already restored")]
    Released,
}

/// Owner of the display's gamma ramp
///
/// The ramp found at initialization is kept as a backup and written back by
/// [`RampStore::restore`], or when the store is dropped. Restoration happens at most once.
pub struct RampStore {
    target: Box<dyn RampTarget>,
    builder: GammaRampBuilder,
    backup: Option<Ramp>,
    restored: bool,
}

impl std::fmt::Debug for RampStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RampStore")
            .field("ramp_size", &self.builder.ramp_size())
            .field("backup", &self.backup.is_some())
            .field("restored", &self.restored)
            .finish()
    }
}

impl RampStore {
    #[instrument(skip(target))]
    pub fn initialize(mut target: Box<dyn RampTarget>) -> Result<Self, RampError> {
        let ramp_size = target.ramp_size().map_err(RampError::UnsupportedPlatform)?;

        if ramp_size == 0 {
            return Err(RampError::UnsupportedPlatform(
                PlatformError::InvalidRampSize {
                    expected: 1,
                    actual: 0,
                },
            ));
        }

        let backup = match Self::capture(target.as_mut(), ramp_size) {
            Ok(ramp) => Some(ramp),
            Err(error) => {
                warn!(error = %error, "a neutral ramp will be restored on exit");
                None
            }
        };

        info!(ramp_size, backup = backup.is_some(), "gamma ramp store initialized");

        Ok(Self {
            target,
            builder: GammaRampBuilder::new(ramp_size),
            backup,
            restored: false,
        })
    }

    fn capture(target: &mut dyn RampTarget, ramp_size: usize) -> Result<Ramp, RampError> {
        let ramp = target
            .read_ramp(ramp_size)
            .map_err(RampError::CaptureFailed)?;

        if ramp.len() != ramp_size {
            return Err(RampError::CaptureFailed(PlatformError::InvalidRampSize {
                expected: ramp_size,
                actual: ramp.len(),
            }));
        }

        Ok(ramp)
    }

    pub fn ramp_size(&self) -> usize {
        self.builder.ramp_size()
    }

    /// Builder for ramps that fit this display
    pub fn builder(&self) -> GammaRampBuilder {
        self.builder
    }

    /// Ramp captured at initialization, if the capture succeeded
    pub fn backup(&self) -> Option<&Ramp> {
        self.backup.as_ref()
    }

    pub fn is_restored(&self) -> bool {
        self.restored
    }

    pub fn apply(&mut self, ramp: &Ramp) -> Result<(), RampError> {
        if self.restored {
            return Err(RampError::Released);
        }

        if ramp.len() != self.ramp_size() {
            return Err(RampError::ApplyFailed(PlatformError::InvalidRampSize {
                expected: self.ramp_size(),
                actual: ramp.len(),
            }));
        }

        self.target.write_ramp(ramp).map_err(RampError::ApplyFailed)
    }

    /// Write back the initial ramp, or a neutral one if `use_previous` is false or no backup
    /// was captured
    ///
    /// Only the first call has any effect.
    pub fn restore(&mut self, use_previous: bool) -> Result<(), RampError> {
        if self.restored {
            return Ok(());
        }

        self.restored = true;

        let result = match self.backup.as_ref() {
            Some(backup) if use_previous => {
                debug!("restoring initial gamma ramp");
                self.target.write_ramp(backup)
            }
            _ => {
                debug!("restoring neutral gamma ramp");
                self.target.write_ramp(&self.builder.neutral())
            }
        };

        result.map_err(RampError::ApplyFailed)
    }
}

impl Drop for RampStore {
    fn drop(&mut self) {
        if let Err(error) = self.restore(true) {
            error!(error = %error, "failed to restore gamma ramp");
        }
    }
}
