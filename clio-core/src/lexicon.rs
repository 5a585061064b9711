//! String lexicon: dense id -> key and key -> id over a read-only byte region.
//!
//! ## Byte layout (little-endian)
//!
//! ```text
//! count(u32) | sorted(u8) | end_offset(u32) x count | concatenated UTF-8 keys
//! ```
//!
//! `end_offset[i]` is the byte offset one past key `i` within the key area,
//! so key `i` spans `end_offset[i-1] .. end_offset[i]` (0 for `i = 0`).
//! When `sorted` is 1 the keys are strictly increasing and `index_at` binary
//! searches; otherwise it scans. Term lexicons are written sorted (term ids
//! are assigned in lexicographic order); title lexicons follow document
//! order and are usually unsorted.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

const HEADER_SIZE: usize = 5;

/// Read-only lexicon view.
#[derive(Debug, Clone, Copy)]
pub struct Lexicon<'a> {
    offsets: &'a [u8],
    keys: &'a [u8],
    count: u32,
    sorted: bool,
}

impl<'a> Lexicon<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::Malformed("lexicon shorter than header".into()));
        }
        let count = LittleEndian::read_u32(&data[0..4]);
        let sorted = match data[4] {
            0 => false,
            1 => true,
            other => {
                return Err(Error::Malformed(format!("unknown lexicon sort flag: {}", other)));
            }
        };
        let offsets_end = HEADER_SIZE + count as usize * 4;
        if data.len() < offsets_end {
            return Err(Error::Malformed("lexicon offset array truncated".into()));
        }
        let (offsets, keys) = (&data[HEADER_SIZE..offsets_end], &data[offsets_end..]);

        let mut prev = 0u32;
        for i in 0..count as usize {
            let end = LittleEndian::read_u32(&offsets[i * 4..i * 4 + 4]);
            if end < prev || end as usize > keys.len() {
                return Err(Error::Malformed("lexicon offsets are not monotonic".into()));
            }
            prev = end;
        }

        Ok(Self { offsets, keys, count, sorted })
    }

    pub fn len(&self) -> usize {
        self.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    #[inline]
    fn span(&self, id: usize) -> (usize, usize) {
        let start = if id == 0 {
            0
        } else {
            LittleEndian::read_u32(&self.offsets[(id - 1) * 4..id * 4]) as usize
        };
        let end = LittleEndian::read_u32(&self.offsets[id * 4..id * 4 + 4]) as usize;
        (start, end)
    }

    /// Key with the given dense id.
    pub fn key_at(&self, id: usize) -> Result<&'a str> {
        if id >= self.count as usize {
            return Err(Error::out_of_range("lexicon id", id as u64, self.count as u64));
        }
        let (start, end) = self.span(id);
        std::str::from_utf8(&self.keys[start..end])
            .map_err(|_| Error::Malformed(format!("lexicon key {} is not valid UTF-8", id)))
    }

    /// Dense id of `key`, if present.
    pub fn index_at(&self, key: &str) -> Option<u32> {
        if self.sorted {
            let mut lo = 0usize;
            let mut hi = self.count as usize;
            while lo < hi {
                let mid = lo + (hi - lo) / 2;
                let (start, end) = self.span(mid);
                match self.keys[start..end].cmp(key.as_bytes()) {
                    std::cmp::Ordering::Less => lo = mid + 1,
                    std::cmp::Ordering::Greater => hi = mid,
                    std::cmp::Ordering::Equal => return Some(mid as u32),
                }
            }
            None
        } else {
            (0..self.count as usize).find_map(|id| {
                let (start, end) = self.span(id);
                (&self.keys[start..end] == key.as_bytes()).then_some(id as u32)
            })
        }
    }

    /// Length of the longest key, in bytes.
    pub fn max_key_len(&self) -> usize {
        (0..self.count as usize)
            .map(|id| {
                let (start, end) = self.span(id);
                end - start
            })
            .max()
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<&'a str>> + '_ {
        (0..self.count as usize).map(|id| self.key_at(id))
    }
}

/// Accumulates keys in id order and serializes the lexicon.
#[derive(Debug, Default)]
pub struct LexiconBuilder {
    keys: Vec<u8>,
    offsets: Vec<u32>,
    sorted: bool,
    last_start: usize,
}

impl LexiconBuilder {
    pub fn new() -> Self {
        Self { sorted: true, ..Self::default() }
    }

    /// Append the key for the next dense id.
    pub fn push(&mut self, key: &str) {
        if !self.offsets.is_empty() && &self.keys[self.last_start..] >= key.as_bytes() {
            self.sorted = false;
        }
        self.last_start = self.keys.len();
        self.keys.extend_from_slice(key.as_bytes());
        self.offsets.push(self.keys.len() as u32);
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.offsets.len() * 4 + self.keys.len());
        out.extend_from_slice(&(self.offsets.len() as u32).to_le_bytes());
        out.push(u8::from(self.sorted));
        for &end in &self.offsets {
            out.extend_from_slice(&end.to_le_bytes());
        }
        out.extend_from_slice(&self.keys);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_lookup() {
        let mut builder = LexiconBuilder::new();
        for key in ["b", "c", "z"] {
            builder.push(key);
        }
        let bytes = builder.build();
        let lexicon = Lexicon::parse(&bytes).unwrap();
        assert!(lexicon.is_sorted());
        assert_eq!(lexicon.len(), 3);
        assert_eq!(lexicon.key_at(0).unwrap(), "b");
        assert_eq!(lexicon.key_at(2).unwrap(), "z");
        assert_eq!(lexicon.index_at("c"), Some(1));
        assert_eq!(lexicon.index_at("a"), None);
        assert_eq!(lexicon.index_at("y"), None);
    }

    #[test]
    fn unsorted_falls_back_to_scan() {
        let mut builder = LexiconBuilder::new();
        for key in ["Doc3", "Doc1", "Doc2"] {
            builder.push(key);
        }
        let bytes = builder.build();
        let lexicon = Lexicon::parse(&bytes).unwrap();
        assert!(!lexicon.is_sorted());
        assert_eq!(lexicon.index_at("Doc1"), Some(1));
        assert_eq!(lexicon.index_at("Doc4"), None);
    }

    #[test]
    fn empty_lexicon() {
        let bytes = LexiconBuilder::new().build();
        let lexicon = Lexicon::parse(&bytes).unwrap();
        assert!(lexicon.is_empty());
        assert_eq!(lexicon.index_at("x"), None);
        assert!(lexicon.key_at(0).is_err());
        assert_eq!(lexicon.max_key_len(), 0);
    }

    #[test]
    fn duplicate_keys_clear_the_sorted_flag() {
        let mut builder = LexiconBuilder::new();
        builder.push("same");
        builder.push("same");
        let bytes = builder.build();
        assert!(!Lexicon::parse(&bytes).unwrap().is_sorted());
    }

    #[test]
    fn truncated_offsets_rejected() {
        let mut builder = LexiconBuilder::new();
        builder.push("hello");
        let bytes = builder.build();
        assert!(Lexicon::parse(&bytes[..6]).is_err());
    }

    #[test]
    fn max_key_len() {
        let mut builder = LexiconBuilder::new();
        builder.push("ab");
        builder.push("zzzzz");
        let bytes = builder.build();
        assert_eq!(Lexicon::parse(&bytes).unwrap().max_key_len(), 5);
    }
}
