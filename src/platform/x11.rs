use std::{convert::TryFrom, sync::Arc};

use x11rb::{
    connection::{Connection, RequestConnection},
    protocol::{
        xf86vidmode::{self, ConnectionExt as _},
        xproto::{ConnectionExt as _, ImageFormat, ImageOrder, Window},
    },
    rust_connection::RustConnection,
};

use super::{Platform, PlatformError, RampTarget, ScreenSource};
use crate::{
    image::{PixelLayout, Sample},
    ramp::Ramp,
};

#[instrument]
pub fn open() -> Result<Platform, PlatformError> {
    let (conn, screen_num) = x11rb::connect(None)?;

    if conn
        .extension_information(xf86vidmode::X11_EXTENSION_NAME)?
        .is_none()
    {
        return Err(PlatformError::NotSupported(xf86vidmode::X11_EXTENSION_NAME));
    }

    let version = conn.xf86vidmode_query_version()?.reply()?;
    debug!(
        major = version.major_version,
        minor = version.minor_version,
        "XF86VidMode extension found"
    );

    let conn = Arc::new(conn);
    let screen = X11Screen::new(conn.clone(), screen_num)?;
    let screen_num =
        u16::try_from(screen_num).map_err(|_| PlatformError::NotSupported("screen number"))?;

    Ok(Platform {
        ramp: Box::new(X11Ramp {
            conn,
            screen: screen_num,
        }),
        screen: Box::new(screen),
    })
}

/// Bytes per scanline of a `width` pixels wide Z-pixmap, scanlines being padded to a multiple
/// of `scanline_pad` bits
fn stride(width: usize, bits_per_pixel: u8, scanline_pad: u8) -> usize {
    let bits = width * bits_per_pixel as usize;
    let pad = scanline_pad.max(8) as usize;
    (bits + pad - 1) / pad * pad / 8
}

fn ramp_len(len: usize) -> Result<u16, PlatformError> {
    u16::try_from(len).map_err(|_| PlatformError::InvalidRampSize {
        expected: u16::MAX as usize,
        actual: len,
    })
}

struct X11Ramp {
    conn: Arc<RustConnection>,
    screen: u16,
}

impl RampTarget for X11Ramp {
    fn ramp_size(&mut self) -> Result<usize, PlatformError> {
        let reply = self
            .conn
            .xf86vidmode_get_gamma_ramp_size(self.screen)?
            .reply()?;

        Ok(reply.size as usize)
    }

    fn read_ramp(&mut self, size: usize) -> Result<Ramp, PlatformError> {
        let reply = self
            .conn
            .xf86vidmode_get_gamma_ramp(self.screen, ramp_len(size)?)?
            .reply()?;

        if reply.red.len() != size {
            return Err(PlatformError::InvalidRampSize {
                expected: size,
                actual: reply.red.len(),
            });
        }

        Ramp::new(reply.red, reply.green, reply.blue).map_err(|err| {
            PlatformError::InvalidRampSize {
                expected: size,
                actual: err.green.min(err.blue),
            }
        })
    }

    fn write_ramp(&mut self, ramp: &Ramp) -> Result<(), PlatformError> {
        self.conn
            .xf86vidmode_set_gamma_ramp(
                self.screen,
                ramp_len(ramp.len())?,
                ramp.red(),
                ramp.green(),
                ramp.blue(),
            )?
            .check()?;

        Ok(())
    }
}

struct X11Screen {
    conn: Arc<RustConnection>,
    root: Window,
    width: u16,
    height: u16,
    stride: usize,
    layout: PixelLayout,
}

impl X11Screen {
    fn new(conn: Arc<RustConnection>, screen_num: usize) -> Result<Self, PlatformError> {
        let setup = conn.setup();
        let screen = setup
            .roots
            .get(screen_num)
            .ok_or(PlatformError::NotSupported("screen number"))?;

        let format = setup
            .pixmap_formats
            .iter()
            .find(|format| format.depth == screen.root_depth)
            .ok_or(PlatformError::NotSupported("root window depth"))?;

        let layout = match (format.bits_per_pixel, setup.image_byte_order) {
            (32, ImageOrder::LSB_FIRST) => PixelLayout::BGRX,
            (32, _) => PixelLayout::XRGB,
            (24, ImageOrder::LSB_FIRST) => PixelLayout::BGR,
            _ => return Err(PlatformError::NotSupported("pixel format")),
        };

        let width = screen.width_in_pixels as usize;
        let stride = stride(width, format.bits_per_pixel, format.scanline_pad);

        info!(
            width,
            height = screen.height_in_pixels,
            depth = screen.root_depth,
            bits_per_pixel = format.bits_per_pixel,
            stride,
            "opened root window"
        );

        Ok(Self {
            root: screen.root,
            width: screen.width_in_pixels,
            height: screen.height_in_pixels,
            stride,
            layout,
            conn,
        })
    }
}

impl ScreenSource for X11Screen {
    fn capture(&mut self) -> Result<Sample, PlatformError> {
        let reply = self
            .conn
            .get_image(
                ImageFormat::Z_PIXMAP,
                self.root,
                0,
                0,
                self.width,
                self.height,
                !0,
            )?
            .reply()?;

        Ok(Sample::new(
            reply.data,
            self.width as usize,
            self.height as usize,
            self.stride,
            self.layout,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_rows_are_padded() {
        // 1366 * 3 = 4098 bytes, padded to 32 bits
        assert_eq!(stride(1366, 24, 32), 4100);
        assert_eq!(stride(1366, 24, 8), 4098);
        assert_eq!(stride(1, 24, 32), 4);
    }

    #[test]
    fn aligned_rows_are_unchanged() {
        assert_eq!(stride(1366, 32, 32), 5464);
        assert_eq!(stride(1920, 32, 32), 7680);
        assert_eq!(stride(1920, 24, 32), 5760);
    }

    #[test]
    fn ramp_len_fits_protocol() {
        assert_eq!(ramp_len(2048).unwrap(), 2048);
        assert!(matches!(
            ramp_len(70000),
            Err(PlatformError::InvalidRampSize { actual: 70000, .. })
        ));
    }
}
