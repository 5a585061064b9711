//! Clio - a read-side, on-disk inverted-index engine
//!
//! The hard part of serving text queries over a static collection is the
//! encoding, layout, and traversal of compressed posting lists. This crate
//! provides:
//! - Compact tables: random-access compressed arrays for offsets, document
//!   frequencies, sizes, and per-term max scores
//! - Block-encoded posting lists with last-document skip hints
//! - A zero-copy, memory-mapped index view exposing per-term document,
//!   frequency, and quantized-score iterators
//! - A score-index builder that quantizes BM25 or query-likelihood scores
//!   into block lists for fast ranked retrieval
//!
//! The index is immutable once built: a builder writes a directory of files
//! and a view binds to it read-only for its whole life.

pub mod codec;
pub mod error;
pub mod index;
pub mod lexicon;
pub mod score;
pub mod structures;

pub use codec::{Codec, CodecKind, StreamVByte, VarByte};
pub use error::{Error, Result};
pub use index::{
    IndexBuilder, IndexData, InvertedIndexView, MmapSource, Properties, RamSource,
    ScoreBuildProgress, ScoreTuple, all_score_names, score_index,
};
pub use lexicon::{Lexicon, LexiconBuilder};
pub use score::{Bm25Scorer, QueryLikelihoodScorer, ScorerKind, TermScorer};
pub use structures::{
    BlockListBuilder, CompactTable, DocumentIterator, DocumentListView, PayloadIterator,
    PayloadListView, Posting, PostingIterator, TERMINATED, build_compact_table,
    build_offset_table,
};

/// Document identifier, dense in `[0, collection_size)`.
pub type DocId = u32;
/// Term identifier, dense in `[0, term_count)`.
pub type TermId = u32;
/// Term occurrence count within one document.
pub type TermFreq = u32;
