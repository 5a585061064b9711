//! Compact table: a block-partitioned, random-access compressed array keyed
//! by dense integer id.
//!
//! ## Byte layout (little-endian)
//!
//! ```text
//! header:  count(u32) | block_size(u32) | flags(u32)
//! leaders: (key: u32, ptr: u32) x ceil(count / block_size)
//! blocks:  varbyte-encoded values in leader order, no padding
//! ```
//!
//! `key` is `block_index * block_size`; `ptr` is the absolute byte offset of
//! the block's encoded bytes within the table. With the delta flag set, each
//! block stores its first value absolute followed by consecutive differences,
//! so a lookup prefix-sums `skip + 1` decoded values. Offsets into posting
//! blobs are stored this way because they are non-decreasing.

use std::io::{self, Write};

use byteorder::{ByteOrder, LittleEndian};

use crate::codec::{Codec, VarByte};
use crate::error::{Error, Result};

/// Flag bit 0: blocks are delta-encoded. All other bits are reserved.
pub const FLAG_DELTA_ENCODING: u32 = 1;

/// Default number of values per block.
pub const DEFAULT_BLOCK_SIZE: u32 = 256;

const HEADER_SIZE: usize = 12;
const LEADER_SIZE: usize = 8;

/// Read-only view over a serialized compact table.
#[derive(Debug, Clone, Copy)]
pub struct CompactTable<'a> {
    data: &'a [u8],
    count: u32,
    block_size: u32,
    delta: bool,
    leader_count: u32,
}

impl<'a> CompactTable<'a> {
    /// Validate the header and leader array and store a view.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::Malformed("compact table shorter than header".into()));
        }
        let count = LittleEndian::read_u32(&data[0..4]);
        let block_size = LittleEndian::read_u32(&data[4..8]);
        let flags = LittleEndian::read_u32(&data[8..12]);
        if flags & !FLAG_DELTA_ENCODING != 0 {
            return Err(Error::Malformed(format!(
                "compact table has unknown flag bits: {:#x}",
                flags
            )));
        }
        if count > 0 && block_size == 0 {
            return Err(Error::Invariant(
                "compact table has entries but no leader blocks".into(),
            ));
        }

        let leader_count = if block_size == 0 { 0 } else { count.div_ceil(block_size) };
        let leaders_end = HEADER_SIZE + leader_count as usize * LEADER_SIZE;
        if data.len() < leaders_end {
            return Err(Error::Malformed("compact table leader array truncated".into()));
        }

        let table = Self {
            data,
            count,
            block_size,
            delta: flags & FLAG_DELTA_ENCODING != 0,
            leader_count,
        };

        let mut prev: Option<(u32, u32)> = None;
        for block in 0..leader_count {
            let (key, ptr) = table.leader(block);
            if block == 0 && key != 0 {
                return Err(Error::Malformed("first leader key must be 0".into()));
            }
            if ptr as usize > data.len() || (ptr as usize) < leaders_end {
                return Err(Error::Malformed(format!(
                    "leader ptr {} outside block area {}..{}",
                    ptr,
                    leaders_end,
                    data.len()
                )));
            }
            if let Some((pkey, pptr)) = prev
                && (key <= pkey || ptr <= pptr)
            {
                return Err(Error::Malformed("leader array is not strictly increasing".into()));
            }
            prev = Some((key, ptr));
        }

        Ok(table)
    }

    #[inline]
    fn leader(&self, block: u32) -> (u32, u32) {
        let at = HEADER_SIZE + block as usize * LEADER_SIZE;
        (
            LittleEndian::read_u32(&self.data[at..at + 4]),
            LittleEndian::read_u32(&self.data[at + 4..at + 8]),
        )
    }

    pub fn size(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_delta(&self) -> bool {
        self.delta
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// The stored bytes, verbatim.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Value at position `index`.
    pub fn at(&self, index: usize) -> Result<u64> {
        if index >= self.count as usize {
            return Err(Error::out_of_range(
                "compact table index",
                index as u64,
                self.count as u64,
            ));
        }
        // Largest leader with key <= index; unique because keys are strictly
        // increasing and leaders[0].key == 0.
        let mut lo = 0u32;
        let mut hi = self.leader_count;
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if self.leader(mid).0 as usize <= index {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let (key, ptr) = self.leader(lo);
        let skip = index - key as usize;
        let block = &self.data[ptr as usize..];
        let values = if self.delta {
            VarByte.decode_delta(block, skip + 1)?.0
        } else {
            VarByte.decode(block, skip + 1)?.0
        };
        Ok(*values.last().expect("decoded skip + 1 >= 1 values"))
    }

    /// Stream the stored bytes out verbatim.
    pub fn write_to<W: Write + ?Sized>(&self, sink: &mut W) -> io::Result<usize> {
        sink.write_all(self.data)?;
        Ok(self.data.len())
    }

    /// Decode every value in order. Intended for small tables and tests.
    pub fn to_vec(&self) -> Result<Vec<u64>> {
        let mut out = Vec::with_capacity(self.count as usize);
        for block in 0..self.leader_count {
            let (key, ptr) = self.leader(block);
            let len = (self.count as usize - key as usize).min(self.block_size as usize);
            let bytes = &self.data[ptr as usize..];
            let values = if self.delta {
                VarByte.decode_delta(bytes, len)?.0
            } else {
                VarByte.decode(bytes, len)?.0
            };
            out.extend(values);
        }
        Ok(out)
    }
}

/// Serialize `values` as a compact table.
pub fn build_compact_table(values: &[u64], delta: bool, block_size: u32) -> Vec<u8> {
    assert!(block_size > 0, "block size must be positive");
    let count = values.len() as u32;
    let block_count = count.div_ceil(block_size);
    let data_offset = HEADER_SIZE + block_count as usize * LEADER_SIZE;

    let flags = if delta { FLAG_DELTA_ENCODING } else { 0 };
    let mut out = Vec::with_capacity(data_offset + values.len());
    out.resize(HEADER_SIZE, 0);
    LittleEndian::write_u32(&mut out[0..4], count);
    LittleEndian::write_u32(&mut out[4..8], block_size);
    LittleEndian::write_u32(&mut out[8..12], flags);

    let mut blocks = Vec::new();
    for block in 0..block_count {
        let beg = (block * block_size) as usize;
        let end = (beg + block_size as usize).min(values.len());
        let ptr = (data_offset + blocks.len()) as u32;
        out.extend_from_slice(&(beg as u32).to_le_bytes());
        out.extend_from_slice(&ptr.to_le_bytes());

        let chunk = &values[beg..end];
        if delta {
            let mut prev = 0u64;
            for (i, &v) in chunk.iter().enumerate() {
                debug_assert!(i == 0 || v >= prev, "delta-encoded values must be non-decreasing");
                VarByte::encode_one(if i == 0 { v } else { v - prev }, &mut blocks);
                prev = v;
            }
        } else {
            VarByte.encode(chunk, &mut blocks);
        }
    }
    out.extend_from_slice(&blocks);
    out
}

/// Serialize a table of byte offsets (delta-encoded, default block size).
pub fn build_offset_table(values: &[u64]) -> Vec<u8> {
    build_compact_table(values, true, DEFAULT_BLOCK_SIZE)
}
