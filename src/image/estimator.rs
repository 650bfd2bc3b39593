use super::Sample;
use crate::models::Brightness;

/// Estimate returned for empty rasters
pub const MIN_BRIGHTNESS: Brightness = 0;

/// Rec. 709 luma weights, scaled by `LUMA_SCALE`
const LUMA_RED: u64 = 2126;
const LUMA_GREEN: u64 = 7152;
const LUMA_BLUE: u64 = 722;
const LUMA_SCALE: u64 = LUMA_RED + LUMA_GREEN + LUMA_BLUE;

/// Reduces a screen raster to its mean perceived brightness
#[derive(Debug, Clone, Copy)]
pub struct BrightnessEstimator {
    step: usize,
}

impl Default for BrightnessEstimator {
    fn default() -> Self {
        Self::new(1)
    }
}

impl BrightnessEstimator {
    /// Create an estimator which looks at every `step`-th pixel of every `step`-th row
    pub fn new(step: usize) -> Self {
        Self { step: step.max(1) }
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// Mean luma of the sampled pixels, in `0..=255`
    pub fn estimate(&self, sample: &Sample) -> Brightness {
        if sample.is_empty() {
            return MIN_BRIGHTNESS;
        }

        let layout = sample.layout();
        let bpp = layout.bytes_per_pixel;
        let row_len = sample.width() * bpp;

        let mut acc = 0u64;
        let mut cnt = 0u64;

        for row in sample
            .data()
            .chunks_exact(sample.stride())
            .step_by(self.step)
        {
            // Skip the scanline padding
            for pixel in row[..row_len].chunks_exact(bpp).step_by(self.step) {
                acc += pixel[layout.red] as u64 * LUMA_RED
                    + pixel[layout.green] as u64 * LUMA_GREEN
                    + pixel[layout.blue] as u64 * LUMA_BLUE;
                cnt += 1;
            }
        }

        if cnt == 0 {
            return MIN_BRIGHTNESS;
        }

        // Rounded mean
        let scale = cnt * LUMA_SCALE;
        ((acc + scale / 2) / scale) as Brightness
    }
}
