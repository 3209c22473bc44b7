//! Pluggable rectangle encoders. Each encoder advertises an integer code and
//! serializes one rectangle's pixels under a [`PixelFormat`].
//!
//! Encoders are stateless: several sessions share the same `Arc<dyn Encoder>`,
//! so `encode` must not mutate any shared state.

mod raw;
mod tight;
mod tight_jpeg;
mod tight_png;

pub use raw::RawEncoder;
pub use tight::{decode_tight_length, encode_tight_length};
pub use tight_jpeg::TightJpegEncoder;
pub use tight_png::TightPngEncoder;

use anyhow::Result;

use crate::pixel_format::PixelFormat;

/// One rectangle's worth of coordinates, independent of how it's encoded.
#[derive(Clone, Copy, Debug)]
pub struct RectGeometry {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

/// A pluggable rectangle encoder, selected by its RFB encoding code.
pub trait Encoder: Send + Sync {
    fn code(&self) -> i32;

    /// Serialize the sub-rectangle of `frame` described by `geom` into `out`,
    /// under `format`. `frame` is tightly packed RGBA8, `frame_width*frame_height*4`
    /// bytes.
    fn encode(
        &self,
        frame: &[u8],
        frame_width: u16,
        format: &PixelFormat,
        geom: RectGeometry,
        out: &mut Vec<u8>,
    ) -> Result<()>;
}

/// Write a complete rectangle: 12-byte header (X,Y,W,H as u16, encoding code
/// as i32) followed by the encoder's payload.
pub fn write_rectangle(
    encoder: &dyn Encoder,
    frame: &[u8],
    frame_width: u16,
    format: &PixelFormat,
    geom: RectGeometry,
    out: &mut Vec<u8>,
) -> Result<()> {
    out.extend_from_slice(&geom.x.to_be_bytes());
    out.extend_from_slice(&geom.y.to_be_bytes());
    out.extend_from_slice(&geom.width.to_be_bytes());
    out.extend_from_slice(&geom.height.to_be_bytes());
    out.extend_from_slice(&encoder.code().to_be_bytes());
    encoder.encode(frame, frame_width, format, geom, out)
}

/// Server-level, immutable-after-construction ordered list of enabled
/// encoders, keyed by their RFB code.
pub struct EncoderRegistry {
    encoders: Vec<std::sync::Arc<dyn Encoder>>,
}

impl EncoderRegistry {
    pub fn new(encoders: Vec<std::sync::Arc<dyn Encoder>>) -> Self {
        Self { encoders }
    }

    /// All encoders enabled in order, for building the Tight encoding
    /// capability table and for selection below.
    pub fn enabled(&self) -> &[std::sync::Arc<dyn Encoder>] {
        &self.encoders
    }

    /// First server-enabled encoder whose code appears in `client_codes`, in
    /// the client's supplied order. `None` if no overlap.
    pub fn select(&self, client_codes: &[i32]) -> Option<std::sync::Arc<dyn Encoder>> {
        for code in client_codes {
            if let Some(enc) = self.encoders.iter().find(|e| e.code() == *code) {
                return Some(enc.clone());
            }
        }
        None
    }

    pub fn by_code(&self, code: i32) -> Option<std::sync::Arc<dyn Encoder>> {
        self.encoders.iter().find(|e| e.code() == code).cloned()
    }
}
