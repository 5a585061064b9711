//! Integer codecs for posting blobs and compact tables.
//!
//! A codec is a capability with three operations: `encode`, `decode`, and
//! `decode_delta` (decode + running prefix sum). Blocks are encoded so that
//! each one is independently decodable starting from its first byte.
//!
//! Two codecs are recognized:
//! - [`VarByte`] - variable-byte, any `u64` value
//! - [`StreamVByte`] - stream-varbyte, `u32` values only, group-aligned
//!
//! The codec used for posting blobs is chosen at build time and recorded in
//! `properties.json`; compact tables always use varbyte.

mod stream_vbyte;
mod varbyte;

pub use stream_vbyte::StreamVByte;
pub use varbyte::VarByte;

use crate::error::{Error, Result};

/// Encode/decode a stream of non-negative integers.
pub trait Codec {
    /// Append the encoding of `values` to `out`.
    fn encode(&self, values: &[u64], out: &mut Vec<u8>);

    /// Decode exactly `count` values from the front of `bytes`.
    ///
    /// Returns the values and the number of bytes consumed.
    fn decode(&self, bytes: &[u8], count: usize) -> Result<(Vec<u64>, usize)>;

    /// Decode `count` values and return their running prefix sum.
    fn decode_delta(&self, bytes: &[u8], count: usize) -> Result<(Vec<u64>, usize)> {
        let (mut values, consumed) = self.decode(bytes, count)?;
        let mut sum = 0u64;
        for v in values.iter_mut() {
            sum = sum.wrapping_add(*v);
            *v = sum;
        }
        Ok((values, consumed))
    }
}

/// Codec selector persisted in `properties.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecKind {
    #[default]
    VarByte,
    StreamVByte,
}

impl CodecKind {
    pub fn name(&self) -> &'static str {
        match self {
            CodecKind::VarByte => "varbyte",
            CodecKind::StreamVByte => "streamvbyte",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "varbyte" => Ok(CodecKind::VarByte),
            "streamvbyte" => Ok(CodecKind::StreamVByte),
            other => Err(Error::Malformed(format!("unknown codec: {}", other))),
        }
    }
}

impl Codec for CodecKind {
    fn encode(&self, values: &[u64], out: &mut Vec<u8>) {
        match self {
            CodecKind::VarByte => VarByte.encode(values, out),
            CodecKind::StreamVByte => StreamVByte.encode(values, out),
        }
    }

    fn decode(&self, bytes: &[u8], count: usize) -> Result<(Vec<u64>, usize)> {
        match self {
            CodecKind::VarByte => VarByte.decode(bytes, count),
            CodecKind::StreamVByte => StreamVByte.decode(bytes, count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(codec: &impl Codec, values: &[u64]) {
        let mut buf = Vec::new();
        codec.encode(values, &mut buf);
        let (decoded, consumed) = codec.decode(&buf, values.len()).unwrap();
        assert_eq!(decoded, values);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn varbyte_round_trip() {
        round_trip(&VarByte, &[]);
        round_trip(&VarByte, &[0]);
        round_trip(&VarByte, &[0, 1, 127, 128, 213, 16_383, 16_384]);
        round_trip(&VarByte, &[0, 213, 12_148_409_321]);
        round_trip(&VarByte, &[u64::MAX]);
    }

    #[test]
    fn stream_vbyte_round_trip() {
        round_trip(&StreamVByte, &[]);
        round_trip(&StreamVByte, &[0]);
        round_trip(&StreamVByte, &[1, 2, 3]);
        round_trip(&StreamVByte, &[0, 255, 256, 65_535, 65_536, 1 << 24, u32::MAX as u64]);
        let many: Vec<u64> = (0..1000).map(|i| i * 7).collect();
        round_trip(&StreamVByte, &many);
    }

    #[test]
    fn decode_delta_prefix_sums() {
        let deltas = [3u64, 7, 0, 5];
        let mut buf = Vec::new();
        VarByte.encode(&deltas, &mut buf);
        let (sums, _) = VarByte.decode_delta(&buf, 4).unwrap();
        assert_eq!(sums, vec![3, 10, 10, 15]);
    }

    #[test]
    fn decode_truncated_is_error() {
        let mut buf = Vec::new();
        VarByte.encode(&[300, 300], &mut buf);
        buf.truncate(buf.len() - 1);
        assert!(VarByte.decode(&buf, 2).is_err());

        let mut buf = Vec::new();
        StreamVByte.encode(&[70_000, 70_000], &mut buf);
        buf.truncate(buf.len() - 1);
        assert!(StreamVByte.decode(&buf, 2).is_err());
    }

    #[test]
    fn codec_kind_names() {
        assert_eq!(CodecKind::VarByte.name(), "varbyte");
        assert_eq!(CodecKind::from_name("streamvbyte").unwrap(), CodecKind::StreamVByte);
        assert!(CodecKind::from_name("simple9").is_err());
    }
}
