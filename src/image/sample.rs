use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SampleError {
    #[error("invalid data ({data} bytes) for the given dimensions ({stride} x {height} = {expected})")]
    InvalidData {
        data: usize,
        stride: usize,
        height: usize,
        expected: usize,
    },
    #[error("stride too small ({stride} bytes) for {width} pixels of {bytes_per_pixel} bytes")]
    InvalidStride {
        stride: usize,
        width: usize,
        bytes_per_pixel: usize,
    },
    #[error("invalid pixel layout: {0:?}")]
    InvalidLayout(PixelLayout),
}

/// Position of the color channels within a pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelLayout {
    pub bytes_per_pixel: usize,
    pub red: usize,
    pub green: usize,
    pub blue: usize,
}

impl PixelLayout {
    /// 32-bit pixels stored blue first, as produced by little-endian X servers
    pub const BGRX: Self = Self {
        bytes_per_pixel: 4,
        red: 2,
        green: 1,
        blue: 0,
    };

    /// 32-bit pixels stored padding first, as produced by big-endian X servers
    pub const XRGB: Self = Self {
        bytes_per_pixel: 4,
        red: 1,
        green: 2,
        blue: 3,
    };

    /// Packed 24-bit pixels stored blue first
    pub const BGR: Self = Self {
        bytes_per_pixel: 3,
        red: 2,
        green: 1,
        blue: 0,
    };

    fn is_valid(&self) -> bool {
        self.bytes_per_pixel > 0
            && self.red < self.bytes_per_pixel
            && self.green < self.bytes_per_pixel
            && self.blue < self.bytes_per_pixel
    }
}

/// A captured screen raster
///
/// Rows are `stride` bytes apart, which may be more than `width * bytes_per_pixel` when the
/// platform pads scanlines.
#[derive(Clone)]
pub struct Sample {
    data: Vec<u8>,
    width: usize,
    height: usize,
    stride: usize,
    layout: PixelLayout,
}

impl std::fmt::Debug for Sample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut f = f.debug_struct("Sample");
        f.field("width", &self.width);
        f.field("height", &self.height);
        f.field("stride", &self.stride);
        f.field("layout", &self.layout);

        if self.data.len() > 32 {
            f.field("data", &format!("[{} bytes]", self.data.len()));
        } else {
            f.field("data", &self.data);
        }

        f.finish()
    }
}

impl Sample {
    pub fn new(
        data: Vec<u8>,
        width: usize,
        height: usize,
        stride: usize,
        layout: PixelLayout,
    ) -> Result<Self, SampleError> {
        if !layout.is_valid() {
            return Err(SampleError::InvalidLayout(layout));
        }

        if stride < width * layout.bytes_per_pixel {
            return Err(SampleError::InvalidStride {
                stride,
                width,
                bytes_per_pixel: layout.bytes_per_pixel,
            });
        }

        let expected = stride * height;
        if data.len() != expected {
            return Err(SampleError::InvalidData {
                data: data.len(),
                stride,
                height,
                expected,
            });
        }

        Ok(Self {
            data,
            width,
            height,
            stride,
            layout,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() || self.width == 0 || self.height == 0
    }

    /// Get the color of the pixel at the given location
    pub fn rgb_at(&self, x: usize, y: usize) -> Option<(u8, u8, u8)> {
        if x >= self.width || y >= self.height {
            return None;
        }

        let offset = y * self.stride + x * self.layout.bytes_per_pixel;
        let pixel = &self.data[offset..offset + self.layout.bytes_per_pixel];

        Some((
            pixel[self.layout.red],
            pixel[self.layout.green],
            pixel[self.layout.blue],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_rows_are_addressed_by_stride() {
        // 2x2 BGRX image with 4 bytes of padding per row
        let data = vec![
            0, 0, 10, 0, 0, 20, 0, 0, 0xEE, 0xEE, 0xEE, 0xEE, //
            30, 0, 0, 0, 1, 2, 3, 0, 0xEE, 0xEE, 0xEE, 0xEE,
        ];
        let sample = Sample::new(data, 2, 2, 12, PixelLayout::BGRX).unwrap();

        assert_eq!(sample.rgb_at(0, 0), Some((10, 0, 0)));
        assert_eq!(sample.rgb_at(1, 0), Some((0, 20, 0)));
        assert_eq!(sample.rgb_at(0, 1), Some((0, 0, 30)));
        assert_eq!(sample.rgb_at(1, 1), Some((3, 2, 1)));
        assert_eq!(sample.rgb_at(2, 1), None);
    }

    #[test]
    fn rejects_short_buffer() {
        let result = Sample::new(vec![0; 15], 2, 2, 8, PixelLayout::BGRX);
        assert_eq!(
            result.unwrap_err(),
            SampleError::InvalidData {
                data: 15,
                stride: 8,
                height: 2,
                expected: 16
            }
        );
    }

    #[test]
    fn rejects_stride_narrower_than_row() {
        let result = Sample::new(vec![0; 12], 2, 2, 6, PixelLayout::BGRX);
        assert!(matches!(result, Err(SampleError::InvalidStride { .. })));
    }

    #[test]
    fn empty_sample_is_allowed() {
        let sample = Sample::new(Vec::new(), 0, 0, 0, PixelLayout::BGRX).unwrap();
        assert!(sample.is_empty());
    }
}
