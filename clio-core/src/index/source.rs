//! Data sources supplying the memory regions an index view reads.
//!
//! [`MmapSource`] maps the files of an index directory; [`RamSource`] owns
//! plain buffers and backs tests and in-memory round trips. Both are
//! immutable once opened - a view borrows from its source and must not
//! outlive it.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{Error, Result};
use crate::index::paths;

/// A read-only memory region: mapped or owned.
enum Region {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Region {
    fn as_slice(&self) -> &[u8] {
        match self {
            Region::Mapped(map) => map,
            Region::Owned(bytes) => bytes,
        }
    }
}

fn map_file(path: &Path) -> Result<Region> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(path.display().to_string())
        } else {
            Error::Io(e)
        }
    })?;
    let len = file.metadata()?.len();
    if len == 0 {
        // Mapping a zero-length file fails on most platforms.
        return Ok(Region::Owned(Vec::new()));
    }
    let map = unsafe { Mmap::map(&file)? };
    Ok(Region::Mapped(map))
}

/// One named score tuple's raw regions.
pub struct ScoreRegions<'a> {
    pub name: &'a str,
    pub postings: &'a [u8],
    pub offsets: &'a [u8],
    pub max_scores: &'a [u8],
}

/// Supplies the named memory regions of one index.
pub trait IndexData {
    fn documents_view(&self) -> &[u8];
    fn counts_view(&self) -> &[u8];
    fn document_offsets_view(&self) -> &[u8];
    fn count_offsets_view(&self) -> &[u8];
    fn document_sizes_view(&self) -> &[u8];
    fn term_frequencies_view(&self) -> &[u8];
    fn term_occurrences_view(&self) -> &[u8];
    fn term_map_view(&self) -> &[u8];
    fn title_map_view(&self) -> &[u8];
    fn properties_view(&self) -> &[u8];
    fn scores(&self) -> Vec<ScoreRegions<'_>>;
    fn default_score(&self) -> Option<&str>;
}

/// Names of every `<name>.scores` tuple present in a directory, sorted.
pub fn all_score_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        if let Some(name) = file_name.to_str().and_then(|f| f.strip_suffix(".scores")) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

struct MappedScore {
    name: String,
    postings: Region,
    offsets: Region,
    max_scores: Region,
}

/// Memory-mapped index directory.
pub struct MmapSource {
    documents: Region,
    counts: Region,
    document_offsets: Region,
    count_offsets: Region,
    document_sizes: Region,
    term_frequencies: Region,
    term_occurrences: Region,
    term_map: Region,
    title_map: Region,
    properties: Region,
    score_tuples: Vec<MappedScore>,
}

impl MmapSource {
    /// Map every core file plus all `*.scores` tuples found in `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let names = all_score_names(dir)?;
        Self::open_with_scores(dir, &names)
    }

    /// Map the core files and only the named score tuples.
    pub fn open_with_scores(dir: &Path, score_names: &[String]) -> Result<Self> {
        log::debug!("mapping index directory {}", dir.display());
        let mut score_tuples = Vec::with_capacity(score_names.len());
        for name in score_names {
            score_tuples.push(MappedScore {
                name: name.clone(),
                postings: map_file(&paths::scores(dir, name))?,
                offsets: map_file(&paths::score_offsets(dir, name))?,
                max_scores: map_file(&paths::max_scores(dir, name))?,
            });
        }
        Ok(Self {
            documents: map_file(&paths::doc_ids(dir))?,
            counts: map_file(&paths::doc_counts(dir))?,
            document_offsets: map_file(&paths::doc_ids_off(dir))?,
            count_offsets: map_file(&paths::doc_counts_off(dir))?,
            document_sizes: map_file(&paths::doc_sizes(dir))?,
            term_frequencies: map_file(&paths::term_doc_freq(dir))?,
            term_occurrences: map_file(&paths::term_occurrences(dir))?,
            term_map: map_file(&paths::term_map(dir))?,
            title_map: map_file(&paths::title_map(dir))?,
            properties: map_file(&paths::properties(dir))?,
            score_tuples,
        })
    }
}

impl IndexData for MmapSource {
    fn documents_view(&self) -> &[u8] {
        self.documents.as_slice()
    }

    fn counts_view(&self) -> &[u8] {
        self.counts.as_slice()
    }

    fn document_offsets_view(&self) -> &[u8] {
        self.document_offsets.as_slice()
    }

    fn count_offsets_view(&self) -> &[u8] {
        self.count_offsets.as_slice()
    }

    fn document_sizes_view(&self) -> &[u8] {
        self.document_sizes.as_slice()
    }

    fn term_frequencies_view(&self) -> &[u8] {
        self.term_frequencies.as_slice()
    }

    fn term_occurrences_view(&self) -> &[u8] {
        self.term_occurrences.as_slice()
    }

    fn term_map_view(&self) -> &[u8] {
        self.term_map.as_slice()
    }

    fn title_map_view(&self) -> &[u8] {
        self.title_map.as_slice()
    }

    fn properties_view(&self) -> &[u8] {
        self.properties.as_slice()
    }

    fn scores(&self) -> Vec<ScoreRegions<'_>> {
        self.score_tuples
            .iter()
            .map(|s| ScoreRegions {
                name: &s.name,
                postings: s.postings.as_slice(),
                offsets: s.offsets.as_slice(),
                max_scores: s.max_scores.as_slice(),
            })
            .collect()
    }

    fn default_score(&self) -> Option<&str> {
        // bm25 wins when present; otherwise the lexicographically first tuple.
        self.score_tuples
            .iter()
            .find(|s| s.name == "bm25")
            .or_else(|| self.score_tuples.first())
            .map(|s| s.name.as_str())
    }
}

/// An index held entirely in owned buffers.
#[derive(Debug, Default)]
pub struct RamSource {
    pub documents: Vec<u8>,
    pub counts: Vec<u8>,
    pub document_offsets: Vec<u8>,
    pub count_offsets: Vec<u8>,
    pub document_sizes: Vec<u8>,
    pub term_frequencies: Vec<u8>,
    pub term_occurrences: Vec<u8>,
    pub term_map: Vec<u8>,
    pub title_map: Vec<u8>,
    pub properties: Vec<u8>,
    /// `(name, postings, offsets, max_scores)` per score tuple.
    pub score_tuples: Vec<(String, Vec<u8>, Vec<u8>, Vec<u8>)>,
    pub default_score: Option<String>,
}

impl IndexData for RamSource {
    fn documents_view(&self) -> &[u8] {
        &self.documents
    }

    fn counts_view(&self) -> &[u8] {
        &self.counts
    }

    fn document_offsets_view(&self) -> &[u8] {
        &self.document_offsets
    }

    fn count_offsets_view(&self) -> &[u8] {
        &self.count_offsets
    }

    fn document_sizes_view(&self) -> &[u8] {
        &self.document_sizes
    }

    fn term_frequencies_view(&self) -> &[u8] {
        &self.term_frequencies
    }

    fn term_occurrences_view(&self) -> &[u8] {
        &self.term_occurrences
    }

    fn term_map_view(&self) -> &[u8] {
        &self.term_map
    }

    fn title_map_view(&self) -> &[u8] {
        &self.title_map
    }

    fn properties_view(&self) -> &[u8] {
        &self.properties
    }

    fn scores(&self) -> Vec<ScoreRegions<'_>> {
        self.score_tuples
            .iter()
            .map(|(name, postings, offsets, max_scores)| ScoreRegions {
                name,
                postings,
                offsets,
                max_scores,
            })
            .collect()
    }

    fn default_score(&self) -> Option<&str> {
        self.default_score.as_deref()
    }
}
