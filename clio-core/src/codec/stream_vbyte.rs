//! Stream-varbyte codec.
//!
//! Values are encoded in groups of four. Each group is described by one
//! control byte: two bits per value giving its width minus one (1-4 bytes,
//! little-endian). All control bytes come first, then the data area, so the
//! widths of a whole block can be scanned without touching the data:
//!
//! ```text
//! [control: ceil(n/4) bytes] [data: 1-4 bytes per value]
//! ```
//!
//! A trailing partial group uses width 1 for its missing slots. Values must
//! fit in `u32`; posting streams (document deltas, frequencies, quantized
//! scores) satisfy this by construction.

use super::Codec;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct StreamVByte;

#[inline]
fn byte_width(v: u32) -> usize {
    if v < (1 << 8) {
        1
    } else if v < (1 << 16) {
        2
    } else if v < (1 << 24) {
        3
    } else {
        4
    }
}

impl Codec for StreamVByte {
    fn encode(&self, values: &[u64], out: &mut Vec<u8>) {
        if values.is_empty() {
            return;
        }
        let control_len = values.len().div_ceil(4);
        let control_start = out.len();
        out.resize(control_start + control_len, 0);

        let mut data = Vec::with_capacity(values.len() * 2);
        for (i, &v) in values.iter().enumerate() {
            debug_assert!(v <= u64::from(u32::MAX), "stream-varbyte value exceeds u32");
            let v = v as u32;
            let width = byte_width(v);
            out[control_start + i / 4] |= ((width - 1) as u8) << ((i % 4) * 2);
            data.extend_from_slice(&v.to_le_bytes()[..width]);
        }
        out.extend_from_slice(&data);
    }

    fn decode(&self, bytes: &[u8], count: usize) -> Result<(Vec<u64>, usize)> {
        if count == 0 {
            return Ok((Vec::new(), 0));
        }
        let control_len = count.div_ceil(4);
        if bytes.len() < control_len {
            return Err(Error::Malformed("truncated stream-varbyte control area".into()));
        }
        let (control, data) = bytes.split_at(control_len);

        let mut values = Vec::with_capacity(count);
        let mut pos = 0;
        for i in 0..count {
            let width = ((control[i / 4] >> ((i % 4) * 2)) & 0b11) as usize + 1;
            if pos + width > data.len() {
                return Err(Error::Malformed("truncated stream-varbyte data area".into()));
            }
            let mut le = [0u8; 4];
            le[..width].copy_from_slice(&data[pos..pos + width]);
            values.push(u64::from(u32::from_le_bytes(le)));
            pos += width;
        }
        Ok((values, control_len + pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_bits_select_width() {
        let mut buf = Vec::new();
        StreamVByte.encode(&[1, 300, 70_000, 1 << 25], &mut buf);
        // widths 1, 2, 3, 4 -> control 0b11_10_01_00
        assert_eq!(buf[0], 0b11100100);
        assert_eq!(buf.len(), 1 + 1 + 2 + 3 + 4);
    }

    #[test]
    fn partial_group() {
        let mut buf = Vec::new();
        StreamVByte.encode(&[9, 10], &mut buf);
        assert_eq!(buf.len(), 1 + 2);
        let (values, consumed) = StreamVByte.decode(&buf, 2).unwrap();
        assert_eq!(values, vec![9, 10]);
        assert_eq!(consumed, 3);
    }

    #[test]
    fn concatenated_groups_decode_independently() {
        // Two separately encoded runs back to back, as produced by block
        // encoding: the second must decode starting from its own first byte.
        let mut buf = Vec::new();
        StreamVByte.encode(&[5, 6, 7, 8, 9], &mut buf);
        let first_len = buf.len();
        StreamVByte.encode(&[100_000, 1], &mut buf);

        let (first, consumed) = StreamVByte.decode(&buf, 5).unwrap();
        assert_eq!(first, vec![5, 6, 7, 8, 9]);
        assert_eq!(consumed, first_len);
        let (second, _) = StreamVByte.decode(&buf[consumed..], 2).unwrap();
        assert_eq!(second, vec![100_000, 1]);
    }
}
