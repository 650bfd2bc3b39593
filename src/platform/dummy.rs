use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{PlatformError, RampTarget, ScreenSource};
use crate::{
    image::{PixelLayout, Sample},
    models::DummyConfig,
    ramp::Ramp,
};

/// Scanlines of the simulated frame are padded to this many bytes
const ROW_ALIGN: usize = 64;

#[derive(Debug)]
struct DummyState {
    ramp: Ramp,
    width: usize,
    height: usize,
    luma: u8,
    writes: usize,
    fail_capture: bool,
    fail_read: bool,
    fail_write: bool,
}

/// In-memory display
///
/// Clones share the same state, so a test can keep one to inspect the ramp written by the
/// control loop, or to change what the screen shows.
#[derive(Debug, Clone)]
pub struct DummyDisplay {
    state: Arc<Mutex<DummyState>>,
}

impl DummyDisplay {
    pub fn new(config: &DummyConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(DummyState {
                ramp: Ramp::linear(config.ramp_size as _),
                width: config.width as _,
                height: config.height as _,
                luma: config.luma,
                writes: 0,
                fail_capture: false,
                fail_read: false,
                fail_write: false,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, DummyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current gamma ramp of the display
    pub fn ramp(&self) -> Ramp {
        self.state().ramp.clone()
    }

    /// Number of successful ramp writes
    pub fn writes(&self) -> usize {
        self.state().writes
    }

    pub fn set_luma(&self, luma: u8) {
        self.state().luma = luma;
    }

    pub fn set_capture_failure(&self, fail: bool) {
        self.state().fail_capture = fail;
    }

    pub fn set_read_failure(&self, fail: bool) {
        self.state().fail_read = fail;
    }

    pub fn set_write_failure(&self, fail: bool) {
        self.state().fail_write = fail;
    }
}

impl RampTarget for DummyDisplay {
    fn ramp_size(&mut self) -> Result<usize, PlatformError> {
        Ok(self.state().ramp.len())
    }

    fn read_ramp(&mut self, size: usize) -> Result<Ramp, PlatformError> {
        let state = self.state();

        if state.fail_read {
            return Err(PlatformError::Simulated("read_ramp"));
        }

        if size != state.ramp.len() {
            return Err(PlatformError::InvalidRampSize {
                expected: state.ramp.len(),
                actual: size,
            });
        }

        Ok(state.ramp.clone())
    }

    fn write_ramp(&mut self, ramp: &Ramp) -> Result<(), PlatformError> {
        let mut state = self.state();

        if state.fail_write {
            return Err(PlatformError::Simulated("write_ramp"));
        }

        if ramp.len() != state.ramp.len() {
            return Err(PlatformError::InvalidRampSize {
                expected: state.ramp.len(),
                actual: ramp.len(),
            });
        }

        state.ramp = ramp.clone();
        state.writes += 1;

        debug!(writes = state.writes, ramp = ?state.ramp, "dummy ramp written");
        Ok(())
    }
}

impl ScreenSource for DummyDisplay {
    fn capture(&mut self) -> Result<Sample, PlatformError> {
        let state = self.state();

        if state.fail_capture {
            return Err(PlatformError::Simulated("capture"));
        }

        let layout = PixelLayout::BGRX;
        let row_len = state.width * layout.bytes_per_pixel;
        let stride = (row_len + ROW_ALIGN - 1) / ROW_ALIGN * ROW_ALIGN;

        let mut data = vec![0u8; stride * state.height];
        for row in data.chunks_exact_mut(stride) {
            for pixel in row[..row_len].chunks_exact_mut(layout.bytes_per_pixel) {
                pixel[layout.red] = state.luma;
                pixel[layout.green] = state.luma;
                pixel[layout.blue] = state.luma;
            }
        }

        Ok(Sample::new(
            data,
            state.width,
            state.height,
            stride,
            layout,
        )?)
    }
}
