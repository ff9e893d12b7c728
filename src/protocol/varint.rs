//! VarInt codec.
//!
//! 7 data bits per byte, least significant group first, MSB set on every
//! byte except the last. A value occupies 1 to 5 bytes.

use thiserror::Error;

/// Maximum encoded size of a 32-bit VarInt.
pub const MAX_VARINT_LEN: usize = 5;

const SEGMENT_BITS: u8 = 0x7F;
const CONTINUE_BIT: u8 = 0x80;

/// Error type for VarInt decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VarIntError {
    /// The buffer ended before a terminating byte. More data may fix this.
    #[error("incomplete varint")]
    Incomplete,
    /// A sixth byte would be required.
    #[error("varint longer than {MAX_VARINT_LEN} bytes")]
    TooLong,
}

/// Decode a VarInt starting at `offset`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode(buf: &[u8], offset: usize) -> Result<(u32, usize), VarIntError> {
    let mut value: u32 = 0;

    for i in 0..MAX_VARINT_LEN {
        let byte = *buf.get(offset + i).ok_or(VarIntError::Incomplete)?;
        value |= u32::from(byte & SEGMENT_BITS) << (7 * i);
        if byte & CONTINUE_BIT == 0 {
            return Ok((value, i + 1));
        }
    }

    Err(VarIntError::TooLong)
}

/// Encode `value` as a VarInt.
pub fn encode(value: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(value));
    let mut rest = value;
    loop {
        let byte = (rest & u32::from(SEGMENT_BITS)) as u8;
        rest >>= 7;
        if rest == 0 {
            out.push(byte);
            return out;
        }
        out.push(byte | CONTINUE_BIT);
    }
}

/// Number of bytes `encode(value)` produces.
pub fn encoded_len(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0x0FFF_FFFF => 4,
        _ => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_values() {
        assert_eq!(decode(&[0x00], 0), Ok((0, 1)));
        assert_eq!(decode(&[0x7F], 0), Ok((127, 1)));
        assert_eq!(decode(&[0x80, 0x01], 0), Ok((128, 2)));
        assert_eq!(decode(&[0xAC, 0x02], 0), Ok((300, 2)));
        assert_eq!(decode(&[0xFF, 0xFF, 0xFF, 0xFF, 0x0F], 0), Ok((u32::MAX, 5)));
    }

    #[test]
    fn decodes_at_offset() {
        let buf = [0xFF, 0xAC, 0x02, 0x05];
        assert_eq!(decode(&buf, 1), Ok((300, 2)));
        assert_eq!(decode(&buf, 3), Ok((5, 1)));
    }

    #[test]
    fn round_trips_across_ranges() {
        let samples = (0..=20_000u32)
            .chain((0..32).map(|shift| 1u32 << shift))
            .chain((1..32).map(|shift| (1u32 << shift) - 1))
            .chain([u32::MAX - 1, u32::MAX]);

        for v in samples {
            let bytes = encode(v);
            assert_eq!(bytes.len(), encoded_len(v), "length for {v}");
            assert_eq!(decode(&bytes, 0), Ok((v, bytes.len())), "value {v}");
        }
    }

    #[test]
    fn truncated_buffer_is_incomplete() {
        assert_eq!(decode(&[], 0), Err(VarIntError::Incomplete));
        assert_eq!(decode(&[0x80], 0), Err(VarIntError::Incomplete));
        assert_eq!(decode(&[0xFF, 0xFF, 0xFF, 0xFF], 0), Err(VarIntError::Incomplete));
        assert_eq!(decode(&[0x01], 1), Err(VarIntError::Incomplete));
    }

    #[test]
    fn sixth_byte_is_too_long() {
        assert_eq!(
            decode(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01], 0),
            Err(VarIntError::TooLong)
        );
        // rejected even before the sixth byte arrives
        assert_eq!(decode(&[0x80; 5], 0), Err(VarIntError::TooLong));
    }
}
