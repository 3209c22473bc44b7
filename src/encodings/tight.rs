//! Shared Tight framing: the variable-length byte count and the
//! compression-control byte + length + payload envelope used by both the
//! JPEG and PNG Tight variants.

use anyhow::{bail, Result};

/// Encode `len` as Tight's 1-3 byte variable-length integer.
pub fn encode_tight_length(len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(3);
    let mut v = len;

    let b0 = (v & 0x7F) as u8;
    v >>= 7;
    if len <= 0x7F {
        out.push(b0);
        return out;
    }
    out.push(b0 | 0x80);

    let b1 = (v & 0x7F) as u8;
    v >>= 7;
    if len <= 0x3FFF {
        out.push(b1);
        return out;
    }
    out.push(b1 | 0x80);

    out.push((v & 0xFF) as u8);
    out
}

/// Decode a Tight variable-length integer from the front of `bytes`.
/// Returns `(value, bytes_consumed)`.
pub fn decode_tight_length(bytes: &[u8]) -> Result<(usize, usize)> {
    let mut value = 0usize;
    for i in 0..3 {
        let Some(&b) = bytes.get(i) else {
            bail!("truncated tight length");
        };
        value |= ((b & 0x7F) as usize) << (7 * i);
        if b & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    bail!("tight length encoded in more than 3 bytes")
}

/// Write a Tight basic-compression rectangle payload: one control byte,
/// then the variable-length size of `compressed`, then `compressed` itself.
pub fn write_tight_envelope(control_byte: u8, compressed: &[u8], out: &mut Vec<u8>) {
    out.push(control_byte);
    out.extend_from_slice(&encode_tight_length(compressed.len()));
    out.extend_from_slice(compressed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_lengths_match_spec_examples() {
        assert_eq!(encode_tight_length(0x7F), vec![0x7F]);
        assert_eq!(encode_tight_length(0x80), vec![0x80, 0x01]);
        assert_eq!(encode_tight_length(0x3FFF), vec![0xFF, 0x7F]);
        assert_eq!(encode_tight_length(0x4000), vec![0x80, 0x80, 0x01]);
    }

    #[test]
    fn encode_decode_roundtrip_across_the_range() {
        for len in (0..(1usize << 21)).step_by(4999) {
            let encoded = encode_tight_length(len);
            assert!(encoded.len() <= 3);
            let expected_len = if len <= 0x7F {
                1
            } else if len <= 0x3FFF {
                2
            } else {
                3
            };
            assert_eq!(encoded.len(), expected_len);

            let (decoded, consumed) = decode_tight_length(&encoded).unwrap();
            assert_eq!(decoded, len);
            assert_eq!(consumed, encoded.len());
        }
    }

    #[test]
    fn truncated_input_is_an_error() {
        assert!(decode_tight_length(&[0x80]).is_err());
    }
}
