//! Builds a complete index directory from pre-tokenized documents.
//!
//! Postings accumulate in memory keyed by term; `write_to` assigns dense
//! term ids in lexicographic order and serializes every file of the on-disk
//! layout. Output is deterministic: identical inputs produce byte-identical
//! directories. Tokenization and stemming are the caller's concern.

use std::fs;
use std::path::Path;

use rustc_hash::FxHashMap;

use crate::codec::CodecKind;
use crate::error::Result;
use crate::index::properties::Properties;
use crate::index::{RamSource, paths};
use crate::lexicon::LexiconBuilder;
use crate::structures::{
    BlockListBuilder, DEFAULT_BLOCK_SIZE, build_compact_table, build_offset_table,
};
use crate::DocId;

/// Default postings per skip block.
pub const DEFAULT_SKIP_BLOCK_SIZE: u32 = 64;

pub struct IndexBuilder {
    skip_block_size: u32,
    codec: CodecKind,
    postings: FxHashMap<String, Vec<(DocId, u32)>>,
    document_sizes: Vec<u32>,
    titles: Vec<String>,
    occurrences: u64,
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::with_options(DEFAULT_SKIP_BLOCK_SIZE, CodecKind::VarByte)
    }

    pub fn with_options(skip_block_size: u32, codec: CodecKind) -> Self {
        assert!(skip_block_size > 0, "skip block size must be positive");
        Self {
            skip_block_size,
            codec,
            postings: FxHashMap::default(),
            document_sizes: Vec::new(),
            titles: Vec::new(),
            occurrences: 0,
        }
    }

    /// Add the next document; ids are dense in insertion order.
    pub fn add_document<I, S>(&mut self, title: &str, terms: I) -> DocId
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let document = self.titles.len() as DocId;
        let mut frequencies: FxHashMap<String, u32> = FxHashMap::default();
        let mut size = 0u32;

        for term in terms {
            *frequencies.entry(term.as_ref().to_string()).or_insert(0) += 1;
            size += 1;
        }
        for (term, tf) in frequencies {
            self.postings.entry(term).or_default().push((document, tf));
        }

        self.titles.push(title.to_string());
        self.document_sizes.push(size);
        self.occurrences += u64::from(size);
        document
    }

    pub fn document_count(&self) -> usize {
        self.titles.len()
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    fn encode(&self) -> Encoded {
        let mut vocabulary: Vec<&String> = self.postings.keys().collect();
        vocabulary.sort_unstable();

        let mut term_map = LexiconBuilder::new();
        let mut documents = Vec::new();
        let mut counts = Vec::new();
        let mut document_offsets = Vec::with_capacity(vocabulary.len());
        let mut count_offsets = Vec::with_capacity(vocabulary.len());
        let mut tdfs = Vec::with_capacity(vocabulary.len());
        let mut occurrences = Vec::with_capacity(vocabulary.len());

        for term in &vocabulary {
            term_map.push(term);
            let list = &self.postings[*term];

            let mut doc_builder =
                BlockListBuilder::documents(self.skip_block_size as usize, self.codec);
            let mut count_builder =
                BlockListBuilder::payloads(self.skip_block_size as usize, self.codec);
            for &(doc, tf) in list {
                doc_builder.add(doc);
                count_builder.add(tf);
            }

            document_offsets.push(documents.len() as u64);
            count_offsets.push(counts.len() as u64);
            documents.extend_from_slice(&doc_builder.build());
            counts.extend_from_slice(&count_builder.build());

            tdfs.push(list.len() as u64);
            occurrences.push(list.iter().map(|&(_, tf)| u64::from(tf)).sum());
        }

        let mut title_map = LexiconBuilder::new();
        for title in &self.titles {
            title_map.push(title);
        }

        let document_count = self.titles.len() as u32;
        let properties = Properties {
            documents: document_count,
            occurrences: self.occurrences,
            skip_block_size: self.skip_block_size,
            avg_document_size: if document_count == 0 {
                0.0
            } else {
                self.occurrences as f64 / f64::from(document_count)
            },
            key_maxlen: Some(vocabulary.iter().map(|t| t.len() as u32).max().unwrap_or(0)),
            codec: Some(self.codec.name().to_string()),
        };

        Encoded {
            documents,
            counts,
            document_offsets: build_offset_table(&document_offsets),
            count_offsets: build_offset_table(&count_offsets),
            document_sizes: build_compact_table(
                &self.document_sizes.iter().map(|&s| u64::from(s)).collect::<Vec<_>>(),
                false,
                DEFAULT_BLOCK_SIZE,
            ),
            term_frequencies: build_compact_table(&tdfs, false, DEFAULT_BLOCK_SIZE),
            term_occurrences: build_compact_table(&occurrences, false, DEFAULT_BLOCK_SIZE),
            term_map: term_map.build(),
            title_map: title_map.build(),
            properties,
        }
    }

    /// Serialize every index file into `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        let encoded = self.encode();
        fs::create_dir_all(dir)?;

        fs::write(paths::doc_ids(dir), &encoded.documents)?;
        fs::write(paths::doc_ids_off(dir), &encoded.document_offsets)?;
        fs::write(paths::doc_counts(dir), &encoded.counts)?;
        fs::write(paths::doc_counts_off(dir), &encoded.count_offsets)?;
        fs::write(paths::doc_sizes(dir), &encoded.document_sizes)?;
        fs::write(paths::term_doc_freq(dir), &encoded.term_frequencies)?;
        fs::write(paths::term_occurrences(dir), &encoded.term_occurrences)?;
        fs::write(paths::term_map(dir), &encoded.term_map)?;
        fs::write(paths::title_map(dir), &encoded.title_map)?;
        encoded.properties.save(&paths::properties(dir))?;

        log::info!(
            "wrote index to {}: {} documents, {} terms, {} occurrences",
            dir.display(),
            encoded.properties.documents,
            self.postings.len(),
            encoded.properties.occurrences
        );
        Ok(())
    }

    /// Assemble the index entirely in memory.
    pub fn build_ram(&self) -> Result<RamSource> {
        let encoded = self.encode();
        let properties = serde_json::to_vec(&encoded.properties)
            .map_err(|e| crate::error::Error::Malformed(e.to_string()))?;
        Ok(RamSource {
            documents: encoded.documents,
            counts: encoded.counts,
            document_offsets: encoded.document_offsets,
            count_offsets: encoded.count_offsets,
            document_sizes: encoded.document_sizes,
            term_frequencies: encoded.term_frequencies,
            term_occurrences: encoded.term_occurrences,
            term_map: encoded.term_map,
            title_map: encoded.title_map,
            properties,
            score_tuples: Vec::new(),
            default_score: None,
        })
    }
}

struct Encoded {
    documents: Vec<u8>,
    counts: Vec<u8>,
    document_offsets: Vec<u8>,
    count_offsets: Vec<u8>,
    document_sizes: Vec<u8>,
    term_frequencies: Vec<u8>,
    term_occurrences: Vec<u8>,
    term_map: Vec<u8>,
    title_map: Vec<u8>,
    properties: Properties,
}
