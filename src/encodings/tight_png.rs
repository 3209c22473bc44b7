//! Tight encoding restricted to its PNG compression-control variant
//! (pseudo-encoding -260, "TightPNG"): every rectangle is a standalone PNG.

use anyhow::{Context, Result};
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};

use super::tight::write_tight_envelope;
use super::{Encoder, RectGeometry};
use crate::pixel_format::PixelFormat;

const PNG_CONTROL_BYTE: u8 = 0b0101_0000;

#[derive(Default)]
pub struct TightPngEncoder;

impl Encoder for TightPngEncoder {
    fn code(&self) -> i32 {
        -260
    }

    /// Ignores the client's negotiated [`PixelFormat`] like its JPEG sibling:
    /// the PNG stream carries its own colour type.
    fn encode(
        &self,
        frame: &[u8],
        frame_width: u16,
        _format: &PixelFormat,
        geom: RectGeometry,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let rgba = extract_rgba(frame, frame_width, geom);

        let mut png_bytes = Vec::new();
        PngEncoder::new(&mut png_bytes)
            .write_image(&rgba, geom.width as u32, geom.height as u32, ColorType::Rgba8)
            .context("png-encode tight rectangle")?;

        write_tight_envelope(PNG_CONTROL_BYTE, &png_bytes, out);
        Ok(())
    }
}

/// Pull a sub-rectangle out of a tightly packed RGBA8 frame.
fn extract_rgba(frame: &[u8], frame_width: u16, geom: RectGeometry) -> Vec<u8> {
    let stride = frame_width as usize * 4;
    let mut rgba = Vec::with_capacity(geom.width as usize * geom.height as usize * 4);
    for row in geom.y..geom.y + geom.height {
        let row_start = row as usize * stride + geom.x as usize * 4;
        let row_end = row_start + geom.width as usize * 4;
        rgba.extend_from_slice(&frame[row_start..row_end]);
    }
    rgba
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_starts_with_the_png_control_byte_and_decodes() {
        let format = PixelFormat::default_session();
        let (w, h) = (8u16, 5u16);
        let mut frame = Vec::with_capacity(w as usize * h as usize * 4);
        for i in 0..(w as usize * h as usize) {
            frame.extend_from_slice(&[0, (i % 255) as u8, 0, 255]);
        }
        let mut out = Vec::new();
        TightPngEncoder
            .encode(&frame, w, &format, RectGeometry { x: 0, y: 0, width: w, height: h }, &mut out)
            .unwrap();
        assert_eq!(out[0], PNG_CONTROL_BYTE);

        let (len, consumed) = super::super::tight::decode_tight_length(&out[1..]).unwrap();
        let payload = &out[1 + consumed..];
        assert_eq!(payload.len(), len);
        image::load_from_memory_with_format(payload, image::ImageFormat::Png).unwrap();
    }
}
