use anyhow::Result;

use super::{Encoder, RectGeometry};
use crate::pixel_format::{self, PixelFormat};

/// Raw encoding (code 0) — mandatory per RFC 6143. Pixels row-major, emitted
/// through the pixel format transform with no compression.
pub struct RawEncoder;

impl Encoder for RawEncoder {
    fn code(&self) -> i32 {
        0
    }

    fn encode(
        &self,
        frame: &[u8],
        frame_width: u16,
        format: &PixelFormat,
        geom: RectGeometry,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        pixel_format::encode_rect(frame, frame_width, format, geom.x, geom.y, geom.width, geom.height, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_payload_matches_pixel_transform_byte_count() {
        let format = PixelFormat::default_session();
        let (w, h) = (4u16, 3u16);
        let frame = vec![0x42u8; w as usize * h as usize * 4];
        let mut out = Vec::new();
        RawEncoder
            .encode(&frame, w, &format, RectGeometry { x: 0, y: 0, width: w, height: h }, &mut out)
            .unwrap();
        assert_eq!(out.len(), w as usize * h as usize * (format.bits_per_pixel as usize / 8));
    }
}
