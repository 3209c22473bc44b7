//! Tight encoding (code 7) restricted to its JPEG compression-control
//! variant: every rectangle is re-encoded as a standalone JPEG stream.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, ImageEncoder};

use super::tight::write_tight_envelope;
use super::{Encoder, RectGeometry};
use crate::pixel_format::PixelFormat;

/// Tight compression-control byte selecting the JPEG filter, quality left at
/// the encoder's default (no fine-grained quality negotiation from the spec).
const JPEG_CONTROL_BYTE: u8 = 0b1001_0000;
const JPEG_QUALITY: u8 = 80;

pub struct TightJpegEncoder {
    quality: u8,
}

impl Default for TightJpegEncoder {
    fn default() -> Self {
        Self { quality: JPEG_QUALITY }
    }
}

impl Encoder for TightJpegEncoder {
    fn code(&self) -> i32 {
        7
    }

    /// Ignores the client's negotiated [`PixelFormat`]: Tight-JPEG always
    /// ships full 24-bit colour inside the JPEG stream itself.
    fn encode(
        &self,
        frame: &[u8],
        frame_width: u16,
        _format: &PixelFormat,
        geom: RectGeometry,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let rgb = extract_rgb(frame, frame_width, geom);

        let mut jpeg_bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg_bytes, self.quality)
            .write_image(&rgb, geom.width as u32, geom.height as u32, ColorType::Rgb8)
            .context("jpeg-encode tight rectangle")?;

        write_tight_envelope(JPEG_CONTROL_BYTE, &jpeg_bytes, out);
        Ok(())
    }
}

/// Pull a sub-rectangle out of a tightly packed RGBA8 frame as RGB8.
fn extract_rgb(frame: &[u8], frame_width: u16, geom: RectGeometry) -> Vec<u8> {
    let stride = frame_width as usize * 4;
    let mut rgb = Vec::with_capacity(geom.width as usize * geom.height as usize * 3);
    for row in geom.y..geom.y + geom.height {
        let row_start = row as usize * stride + geom.x as usize * 4;
        for col in 0..geom.width as usize {
            let off = row_start + col * 4;
            rgb.extend_from_slice(&frame[off..off + 3]);
        }
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_starts_with_the_jpeg_control_byte() {
        let format = PixelFormat::default_session();
        let (w, h) = (16u16, 16u16);
        let mut frame = Vec::with_capacity(w as usize * h as usize * 4);
        for i in 0..(w as usize * h as usize) {
            frame.extend_from_slice(&[(i % 255) as u8, 0, 0, 255]);
        }
        let mut out = Vec::new();
        TightJpegEncoder::default()
            .encode(&frame, w, &format, RectGeometry { x: 0, y: 0, width: w, height: h }, &mut out)
            .unwrap();
        assert_eq!(out[0], JPEG_CONTROL_BYTE);
        assert!(out.len() > 2);
    }
}
