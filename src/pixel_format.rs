//! The negotiated per-session pixel layout, and the RGBA -> wire transform.

use anyhow::{bail, Result};

/// Client-negotiated pixel format (RFB section 7.4).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelFormat {
    pub bits_per_pixel: u8,
    pub depth: u8,
    pub big_endian: bool,
    pub true_colour: bool,
    pub red_max: u16,
    pub green_max: u16,
    pub blue_max: u16,
    pub red_shift: u8,
    pub green_shift: u8,
    pub blue_shift: u8,
}

impl PixelFormat {
    /// Session birth default: 16bpp, depth 16, little-endian, true-colour,
    /// 5-5-5 RGB with shifts {10,5,0}.
    pub fn default_session() -> Self {
        Self {
            bits_per_pixel: 16,
            depth: 16,
            big_endian: false,
            true_colour: true,
            red_max: 0x1F,
            green_max: 0x1F,
            blue_max: 0x1F,
            red_shift: 10,
            green_shift: 5,
            blue_shift: 0,
        }
    }

    /// Parse the 16-byte wire representation (already stripped of the
    /// surrounding 3+3 padding bytes).
    pub fn from_wire_bytes(buf: &[u8; 16]) -> Self {
        Self {
            bits_per_pixel: buf[0],
            depth: buf[1],
            big_endian: buf[2] != 0,
            true_colour: buf[3] != 0,
            red_max: u16::from_be_bytes([buf[4], buf[5]]),
            green_max: u16::from_be_bytes([buf[6], buf[7]]),
            blue_max: u16::from_be_bytes([buf[8], buf[9]]),
            red_shift: buf[10],
            green_shift: buf[11],
            blue_shift: buf[12],
            // buf[13..16] is padding
        }
    }

    /// Serialize to the 16-byte wire representation used by both
    /// `SetPixelFormat` and `ServerInit`.
    pub fn to_wire_bytes(&self) -> [u8; 16] {
        let mut buf = [0u8; 16];
        buf[0] = self.bits_per_pixel;
        buf[1] = self.depth;
        buf[2] = self.big_endian as u8;
        buf[3] = self.true_colour as u8;
        buf[4..6].copy_from_slice(&self.red_max.to_be_bytes());
        buf[6..8].copy_from_slice(&self.green_max.to_be_bytes());
        buf[8..10].copy_from_slice(&self.blue_max.to_be_bytes());
        buf[10] = self.red_shift;
        buf[11] = self.green_shift;
        buf[12] = self.blue_shift;
        buf
    }
}

/// How far to right-shift a 16-bit channel sample to fit it into `max`.
fn scale_shift(max: u16) -> Result<u32> {
    match max {
        0x1F => Ok(11), // 5-bit channel
        0xFF => Ok(8),  // 8-bit channel
        other => bail!("unsupported pixel format channel max: 0x{other:02x}"),
    }
}

/// Convert one RGBA8 frame to the wire bytes of `format`, appending into
/// `out` (not cleared first, so callers can build up multiple rows/rects).
///
/// `frame` is tightly packed RGBA8 rows of `width*height*4` bytes; `x`/`y`/
/// `w`/`h` select a sub-rectangle to emit, row-major.
pub fn encode_rect(
    frame: &[u8],
    frame_width: u16,
    format: &PixelFormat,
    x: u16,
    y: u16,
    w: u16,
    h: u16,
    out: &mut Vec<u8>,
) -> Result<()> {
    if !format.true_colour {
        bail!("colourmap pixel formats are not supported");
    }
    let r_shift = scale_shift(format.red_max)?;
    let g_shift = scale_shift(format.green_max)?;
    let b_shift = scale_shift(format.blue_max)?;
    let bytes_pp = (format.bits_per_pixel / 8) as usize;
    let stride = frame_width as usize * 4;

    out.reserve(w as usize * h as usize * bytes_pp);

    for row in y..y + h {
        let row_start = row as usize * stride + x as usize * 4;
        for col in 0..w as usize {
            let off = row_start + col * 4;
            let r16 = frame[off] as u32 * 257; // 8-bit -> 16-bit
            let g16 = frame[off + 1] as u32 * 257;
            let b16 = frame[off + 2] as u32 * 257;

            let r = (r16 >> r_shift) & format.red_max as u32;
            let g = (g16 >> g_shift) & format.green_max as u32;
            let b = (b16 >> b_shift) & format.blue_max as u32;

            let pixel = (r << format.red_shift) | (g << format.green_shift) | (b << format.blue_shift);

            match bytes_pp {
                4 => {
                    if format.big_endian {
                        out.extend_from_slice(&pixel.to_be_bytes());
                    } else {
                        out.extend_from_slice(&pixel.to_le_bytes());
                    }
                }
                2 => {
                    if format.big_endian {
                        out.extend_from_slice(&(pixel as u16).to_be_bytes());
                    } else {
                        out.extend_from_slice(&(pixel as u16).to_le_bytes());
                    }
                }
                1 => out.push(pixel as u8),
                other => bail!("unsupported bits-per-pixel: {}", other * 8),
            }
        }
    }
    Ok(())
}
