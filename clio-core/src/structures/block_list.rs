//! Block-encoded posting lists with skip support.
//!
//! A list is a sequence of fixed-size blocks, each independently decodable.
//! Per-term byte layout:
//!
//! ```text
//! vbyte(num_encoded_bytes) | vbyte(num_postings) |
//!   block_index | concat(block_bytes)
//! ```
//!
//! `num_encoded_bytes` counts everything after itself. Document lists store
//! `(last_doc: vbyte, offset: vbyte)` per block in the index - the last
//! document id is the skip hint that lets `seek` jump whole blocks. Payload
//! lists (frequencies, quantized scores) store only the offset. Offsets are
//! relative to the start of the blocks area.
//!
//! Document blocks hold delta sequences: the first delta is taken against the
//! previous block's last document id (0 for block 0), so a block decodes to
//! absolute ids with one prefix sum. Payload blocks hold the values directly.
//!
//! The number of blocks is not stored; it is `ceil(count / block_size)` with
//! the block size supplied by the caller (`skip_block_size` from the index
//! properties).

use std::io::{self, Write};

use crate::codec::{Codec, CodecKind, VarByte};
use crate::error::{Error, Result};
use crate::DocId;

/// Sentinel document id: iterator exhausted.
pub const TERMINATED: DocId = DocId::MAX;

// ── Builder ───────────────────────────────────────────────────────────────

/// Accumulates one term's values and encodes them as a block list.
#[derive(Debug, Clone)]
pub struct BlockListBuilder {
    block_size: usize,
    codec: CodecKind,
    documents: bool,
    values: Vec<u32>,
}

impl BlockListBuilder {
    /// Builder for a document-id list (delta blocks + skip hints).
    pub fn documents(block_size: usize, codec: CodecKind) -> Self {
        assert!(block_size > 0, "block size must be positive");
        Self { block_size, codec, documents: true, values: Vec::new() }
    }

    /// Builder for a payload list (raw blocks, no skip hints).
    pub fn payloads(block_size: usize, codec: CodecKind) -> Self {
        assert!(block_size > 0, "block size must be positive");
        Self { block_size, codec, documents: false, values: Vec::new() }
    }

    pub fn add(&mut self, value: u32) {
        debug_assert!(
            !self.documents || self.values.last().is_none_or(|&last| last < value),
            "document ids must be strictly increasing"
        );
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Encode the accumulated list.
    pub fn build(&self) -> Vec<u8> {
        let n = self.values.len();
        let mut blocks = Vec::new();
        let mut index = Vec::new();

        let mut prev_last = 0u32;
        for chunk_start in (0..n).step_by(self.block_size) {
            let chunk = &self.values[chunk_start..(chunk_start + self.block_size).min(n)];
            let offset = blocks.len() as u64;

            if self.documents {
                let mut deltas = Vec::with_capacity(chunk.len());
                let mut prev = prev_last;
                for (i, &v) in chunk.iter().enumerate() {
                    let base = if chunk_start == 0 && i == 0 { 0 } else { prev };
                    deltas.push(u64::from(v - base));
                    prev = v;
                }
                self.codec.encode(&deltas, &mut blocks);
                let last = *chunk.last().expect("chunks are non-empty");
                VarByte::encode_one(u64::from(last), &mut index);
                prev_last = last;
            } else {
                let raw: Vec<u64> = chunk.iter().map(|&v| u64::from(v)).collect();
                self.codec.encode(&raw, &mut blocks);
            }
            VarByte::encode_one(offset, &mut index);
        }

        let mut body = Vec::with_capacity(1 + index.len() + blocks.len());
        VarByte::encode_one(n as u64, &mut body);
        body.extend_from_slice(&index);
        body.extend_from_slice(&blocks);

        let mut out = Vec::with_capacity(body.len() + 2);
        VarByte::encode_one(body.len() as u64, &mut out);
        out.extend_from_slice(&body);
        out
    }

    /// Encode and write the list; returns the number of bytes written.
    pub fn write_to<W: Write + ?Sized>(&self, sink: &mut W) -> io::Result<usize> {
        let bytes = self.build();
        sink.write_all(&bytes)?;
        Ok(bytes.len())
    }
}

// ── Views ─────────────────────────────────────────────────────────────────

/// Parsed list header shared by both view kinds.
#[derive(Debug, Clone, Default)]
struct ListHeader<'a> {
    blocks: &'a [u8],
    /// Byte offset of each block within `blocks`.
    offsets: Vec<u32>,
    /// Last document id per block (document lists only).
    skip_hints: Vec<u32>,
    count: usize,
    block_size: usize,
}

impl<'a> ListHeader<'a> {
    fn parse(
        slice: &'a [u8],
        count: usize,
        block_size: usize,
        documents: bool,
    ) -> Result<Self> {
        if slice.is_empty() {
            if count != 0 {
                return Err(Error::Malformed(format!(
                    "{} postings declared for an empty list slice",
                    count
                )));
            }
            return Ok(Self::default());
        }
        if block_size == 0 {
            return Err(Error::Malformed("skip block size is zero".into()));
        }

        let (size, size_len) = VarByte::decode_one(slice)?;
        let body = &slice[size_len..];
        if (size as usize) > body.len() {
            return Err(Error::Malformed(format!(
                "list header declares {} bytes but slice holds {}",
                size,
                body.len()
            )));
        }
        let body = &body[..size as usize];

        let (n, mut pos) = VarByte::decode_one(body)?;
        if n as usize != count {
            return Err(Error::Malformed(format!(
                "list holds {} postings but {} were declared",
                n, count
            )));
        }

        let num_blocks = count.div_ceil(block_size);
        let mut offsets = Vec::with_capacity(num_blocks);
        let mut skip_hints = Vec::with_capacity(if documents { num_blocks } else { 0 });
        for _ in 0..num_blocks {
            if documents {
                let (hint, len) = VarByte::decode_one(&body[pos..])?;
                skip_hints.push(u32::try_from(hint).map_err(|_| {
                    Error::Malformed("skip hint exceeds document id range".into())
                })?);
                pos += len;
            }
            let (offset, len) = VarByte::decode_one(&body[pos..])?;
            offsets.push(u32::try_from(offset).map_err(|_| {
                Error::Malformed("block offset exceeds list size".into())
            })?);
            pos += len;
        }

        let blocks = &body[pos..];
        if let Some(&first) = offsets.first()
            && first != 0
        {
            return Err(Error::Malformed("first block offset must be 0".into()));
        }
        for (k, &offset) in offsets.iter().enumerate() {
            if offset as usize > blocks.len() {
                return Err(Error::Malformed("block offset outside list body".into()));
            }
            if k > 0 && offset <= offsets[k - 1] {
                return Err(Error::Malformed("block offsets are not strictly increasing".into()));
            }
        }

        Ok(Self { blocks, offsets, skip_hints, count, block_size })
    }

    fn num_blocks(&self) -> usize {
        self.offsets.len()
    }

    fn block_len(&self, k: usize) -> usize {
        let start = k * self.block_size;
        (self.count - start).min(self.block_size)
    }

    fn block_bytes(&self, k: usize) -> &'a [u8] {
        let start = self.offsets[k] as usize;
        let end = self
            .offsets
            .get(k + 1)
            .map_or(self.blocks.len(), |&next| next as usize);
        &self.blocks[start..end]
    }
}

/// Lazy view over one term's encoded document-id list.
#[derive(Debug, Clone, Default)]
pub struct DocumentListView<'a> {
    header: ListHeader<'a>,
    codec: CodecKind,
}

impl<'a> DocumentListView<'a> {
    pub fn parse(
        slice: &'a [u8],
        count: usize,
        block_size: usize,
        codec: CodecKind,
    ) -> Result<Self> {
        Ok(Self { header: ListHeader::parse(slice, count, block_size, true)?, codec })
    }

    /// A view with no postings; used for absent terms.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.header.count
    }

    pub fn is_empty(&self) -> bool {
        self.header.count == 0
    }

    pub fn iter(&self) -> Result<DocumentIterator<'a>> {
        DocumentIterator::new(self.header.clone(), self.codec)
    }
}

/// Lazy view over one term's encoded payload list.
#[derive(Debug, Clone, Default)]
pub struct PayloadListView<'a> {
    header: ListHeader<'a>,
    codec: CodecKind,
}

impl<'a> PayloadListView<'a> {
    pub fn parse(
        slice: &'a [u8],
        count: usize,
        block_size: usize,
        codec: CodecKind,
    ) -> Result<Self> {
        Ok(Self { header: ListHeader::parse(slice, count, block_size, false)?, codec })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.header.count
    }

    pub fn is_empty(&self) -> bool {
        self.header.count == 0
    }

    pub fn iter(&self) -> Result<PayloadIterator<'a>> {
        PayloadIterator::new(self.header.clone(), self.codec)
    }
}

// ── Iterators ─────────────────────────────────────────────────────────────

/// Cursor over a document list. Decodes one block at a time; `seek` consults
/// the skip hints to jump blocks without decoding them.
pub struct DocumentIterator<'a> {
    header: ListHeader<'a>,
    codec: CodecKind,
    current_block: usize,
    buffer: Vec<DocId>,
    pos: usize,
    exhausted: bool,
    pending: Option<Error>,
}

impl<'a> DocumentIterator<'a> {
    fn new(header: ListHeader<'a>, codec: CodecKind) -> Result<Self> {
        let mut iter = Self {
            exhausted: header.num_blocks() == 0,
            header,
            codec,
            current_block: 0,
            buffer: Vec::new(),
            pos: 0,
            pending: None,
        };
        if !iter.exhausted {
            iter.load_block(0)?;
        }
        Ok(iter)
    }

    fn load_block(&mut self, k: usize) -> Result<()> {
        if k >= self.header.num_blocks() {
            self.exhausted = true;
            return Ok(());
        }
        let len = self.header.block_len(k);
        let (deltas, _) = self.codec.decode(self.header.block_bytes(k), len)?;

        let base = if k == 0 { 0 } else { u64::from(self.header.skip_hints[k - 1]) };
        let mut absolute = Vec::with_capacity(len);
        let mut acc = base;
        for (i, &d) in deltas.iter().enumerate() {
            if d == 0 && !(k == 0 && i == 0) {
                return Err(Error::Malformed("document ids are not strictly increasing".into()));
            }
            acc += d;
            let doc = u32::try_from(acc)
                .map_err(|_| Error::Malformed("document id exceeds u32 range".into()))?;
            absolute.push(doc);
        }
        if absolute.last() != Some(&self.header.skip_hints[k]) {
            return Err(Error::Malformed("block skip hint disagrees with decoded ids".into()));
        }

        self.current_block = k;
        self.buffer = absolute;
        self.pos = 0;
        Ok(())
    }

    /// Current document id, or [`TERMINATED`].
    pub fn doc(&self) -> DocId {
        if self.exhausted { TERMINATED } else { self.buffer[self.pos] }
    }

    /// Advance to the next posting; returns the new current id or [`TERMINATED`].
    pub fn advance(&mut self) -> Result<DocId> {
        if self.exhausted {
            return Ok(TERMINATED);
        }
        self.pos += 1;
        if self.pos >= self.buffer.len() {
            self.load_block(self.current_block + 1)?;
        }
        Ok(self.doc())
    }

    /// Advance so the current document id is the least one `>= target`, or
    /// exhaust if none exists. Never moves backwards.
    pub fn seek(&mut self, target: DocId) -> Result<DocId> {
        if self.exhausted {
            return Ok(TERMINATED);
        }
        if self.doc() >= target {
            return Ok(self.doc());
        }
        // First not-yet-passed block whose last id reaches the target.
        let mut block = self.current_block;
        while block < self.header.num_blocks() && self.header.skip_hints[block] < target {
            block += 1;
        }
        if block >= self.header.num_blocks() {
            self.exhausted = true;
            return Ok(TERMINATED);
        }
        if block != self.current_block {
            self.load_block(block)?;
        }
        while self.buffer[self.pos] < target {
            self.pos += 1;
            debug_assert!(self.pos < self.buffer.len(), "skip hint guarantees a hit");
        }
        Ok(self.doc())
    }

    /// Number of postings not yet returned, including the current one.
    pub fn remaining(&self) -> usize {
        if self.exhausted {
            0
        } else {
            self.header.count - self.current_block * self.header.block_size - self.pos
        }
    }
}

impl Iterator for DocumentIterator<'_> {
    type Item = Result<DocId>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending.take() {
            return Some(Err(err));
        }
        let doc = self.doc();
        if doc == TERMINATED {
            return None;
        }
        if let Err(err) = self.advance() {
            // The current posting is intact; surface the error on the next pull.
            self.pending = Some(err);
            self.exhausted = true;
        }
        Some(Ok(doc))
    }
}

/// Cursor over a payload list; advances in lockstep with a document cursor.
pub struct PayloadIterator<'a> {
    header: ListHeader<'a>,
    codec: CodecKind,
    current_block: usize,
    buffer: Vec<u32>,
    pos: usize,
    exhausted: bool,
    pending: Option<Error>,
}

impl<'a> PayloadIterator<'a> {
    fn new(header: ListHeader<'a>, codec: CodecKind) -> Result<Self> {
        let mut iter = Self {
            exhausted: header.num_blocks() == 0,
            header,
            codec,
            current_block: 0,
            buffer: Vec::new(),
            pos: 0,
            pending: None,
        };
        if !iter.exhausted {
            iter.load_block(0)?;
        }
        Ok(iter)
    }

    fn load_block(&mut self, k: usize) -> Result<()> {
        if k >= self.header.num_blocks() {
            self.exhausted = true;
            return Ok(());
        }
        let len = self.header.block_len(k);
        let (raw, _) = self.codec.decode(self.header.block_bytes(k), len)?;
        let mut values = Vec::with_capacity(len);
        for v in raw {
            values.push(u32::try_from(v).map_err(|_| {
                Error::Malformed("payload value exceeds u32 range".into())
            })?);
        }
        self.current_block = k;
        self.buffer = values;
        self.pos = 0;
        Ok(())
    }

    /// Current payload value; 0 once exhausted.
    pub fn payload(&self) -> u32 {
        if self.exhausted { 0 } else { self.buffer[self.pos] }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Advance to the next payload; returns false once exhausted.
    pub fn advance(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        self.pos += 1;
        if self.pos >= self.buffer.len() {
            self.load_block(self.current_block + 1)?;
        }
        Ok(!self.exhausted)
    }
}

impl Iterator for PayloadIterator<'_> {
    type Item = Result<u32>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending.take() {
            return Some(Err(err));
        }
        if self.exhausted {
            return None;
        }
        let value = self.payload();
        if let Err(err) = self.advance() {
            self.pending = Some(err);
            self.exhausted = true;
        }
        Some(Ok(value))
    }
}
