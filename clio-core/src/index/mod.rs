//! Read-only inverted index view over mapped memory regions.
//!
//! An [`InvertedIndexView`] composes compact tables, lexicons, and posting
//! blobs supplied by an [`IndexData`] source into per-term accessors:
//! `documents`, `frequencies`, `scores`, `postings`, `scored_postings`. It
//! owns nothing mutable and borrows every region, so it must not outlive its
//! source.
//!
//! Query-time flow: term string -> lexicon -> term id -> offset table ->
//! byte slice in the posting blob -> lazy block decode.

use std::io::Write;

use rustc_hash::FxHashMap;

use crate::codec::{CodecKind, VarByte};
use crate::error::{Error, Result};
use crate::lexicon::Lexicon;
use crate::score::{Bm25Scorer, QueryLikelihoodScorer, ScorerKind, TermScorer};
use crate::structures::{CompactTable, DocumentListView, PayloadListView, PostingIterator};
use crate::{DocId, TermId};

mod builder;
mod properties;
mod score_build;
mod source;

#[cfg(test)]
mod tests;

pub use builder::IndexBuilder;
pub use properties::Properties;
pub use score_build::{ScoreBuildProgress, score_index};
pub use source::{IndexData, MmapSource, RamSource, ScoreRegions, all_score_names};

/// File names within an index directory.
pub mod paths {
    use std::path::{Path, PathBuf};

    pub fn properties(dir: &Path) -> PathBuf {
        dir.join("properties.json")
    }

    pub fn doc_ids(dir: &Path) -> PathBuf {
        dir.join("doc.id")
    }

    pub fn doc_ids_off(dir: &Path) -> PathBuf {
        dir.join("doc.idoff")
    }

    pub fn doc_counts(dir: &Path) -> PathBuf {
        dir.join("doc.count")
    }

    pub fn doc_counts_off(dir: &Path) -> PathBuf {
        dir.join("doc.countoff")
    }

    pub fn term_map(dir: &Path) -> PathBuf {
        dir.join("terms.map")
    }

    pub fn title_map(dir: &Path) -> PathBuf {
        dir.join("titles.map")
    }

    pub fn term_doc_freq(dir: &Path) -> PathBuf {
        dir.join("terms.docfreq")
    }

    pub fn term_occurrences(dir: &Path) -> PathBuf {
        dir.join("term.occurrences")
    }

    pub fn doc_sizes(dir: &Path) -> PathBuf {
        dir.join("doc.sizes")
    }

    pub fn scores(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{}.scores", name))
    }

    pub fn score_offsets(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{}.offsets", name))
    }

    pub fn max_scores(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{}.maxscore", name))
    }
}

/// One named quantized-score index: postings blob, offsets, per-term maxima.
#[derive(Debug, Clone, Copy)]
pub struct ScoreTuple<'a> {
    pub postings: &'a [u8],
    pub offsets: CompactTable<'a>,
    pub max_scores: CompactTable<'a>,
}

/// Read-only view over one index.
pub struct InvertedIndexView<'a> {
    documents_view: &'a [u8],
    counts_view: &'a [u8],
    document_offsets: CompactTable<'a>,
    count_offsets: CompactTable<'a>,
    document_sizes: CompactTable<'a>,
    term_frequencies: CompactTable<'a>,
    term_occurrences: CompactTable<'a>,
    term_map: Lexicon<'a>,
    title_map: Lexicon<'a>,
    scores: FxHashMap<String, ScoreTuple<'a>>,
    default_score: Option<String>,
    term_count: usize,
    document_count: u32,
    occurrences_count: u64,
    skip_block_size: usize,
    avg_document_size: f64,
    codec: CodecKind,
}

impl<'a> InvertedIndexView<'a> {
    pub fn new<D: IndexData>(data: &'a D) -> Result<Self> {
        let properties = Properties::parse(data.properties_view())?;
        if properties.skip_block_size == 0 {
            return Err(Error::Malformed("skip_block_size must be positive".into()));
        }

        let term_frequencies = CompactTable::parse(data.term_frequencies_view())?;
        let term_count = term_frequencies.size();

        let document_offsets = CompactTable::parse(data.document_offsets_view())?;
        let count_offsets = CompactTable::parse(data.count_offsets_view())?;
        if document_offsets.size() != term_count || count_offsets.size() != term_count {
            return Err(Error::Malformed(format!(
                "offset tables hold {}/{} entries for {} terms",
                document_offsets.size(),
                count_offsets.size(),
                term_count
            )));
        }
        let term_occurrences = CompactTable::parse(data.term_occurrences_view())?;
        if term_occurrences.size() != term_count {
            return Err(Error::Malformed("term occurrence table size mismatch".into()));
        }

        let term_map = Lexicon::parse(data.term_map_view())?;
        if term_map.len() != term_count {
            return Err(Error::Malformed(format!(
                "term lexicon holds {} keys for {} terms",
                term_map.len(),
                term_count
            )));
        }
        let title_map = Lexicon::parse(data.title_map_view())?;
        let document_sizes = CompactTable::parse(data.document_sizes_view())?;
        if document_sizes.size() != properties.documents as usize
            || title_map.len() != properties.documents as usize
        {
            return Err(Error::Malformed("document table sizes disagree with properties".into()));
        }

        let mut scores = FxHashMap::default();
        for regions in data.scores() {
            let offsets = CompactTable::parse(regions.offsets)?;
            let max_scores = CompactTable::parse(regions.max_scores)?;
            if offsets.size() != term_count || max_scores.size() != term_count {
                return Err(Error::Malformed(format!(
                    "score tables for '{}' disagree with term count",
                    regions.name
                )));
            }
            scores.insert(
                regions.name.to_string(),
                ScoreTuple { postings: regions.postings, offsets, max_scores },
            );
        }
        let default_score = data.default_score().map(str::to_string);
        if let Some(name) = &default_score
            && !scores.contains_key(name)
        {
            return Err(Error::NotFound(format!("default score '{}'", name)));
        }

        Ok(Self {
            documents_view: data.documents_view(),
            counts_view: data.counts_view(),
            document_offsets,
            count_offsets,
            document_sizes,
            term_frequencies,
            term_occurrences,
            term_map,
            title_map,
            scores,
            default_score,
            term_count,
            document_count: properties.documents,
            occurrences_count: properties.occurrences,
            skip_block_size: properties.skip_block_size as usize,
            avg_document_size: properties.avg_document_size,
            codec: properties.codec_kind()?,
        })
    }

    // ── Collection statistics ─────────────────────────────────────────────

    pub fn collection_size(&self) -> u32 {
        self.document_count
    }

    pub fn occurrences_count(&self) -> u64 {
        self.occurrences_count
    }

    pub fn term_count(&self) -> usize {
        self.term_count
    }

    pub fn skip_block_size(&self) -> usize {
        self.skip_block_size
    }

    pub fn avg_document_size(&self) -> f64 {
        self.avg_document_size
    }

    pub fn codec(&self) -> CodecKind {
        self.codec
    }

    pub fn document_size(&self, document: DocId) -> Result<u32> {
        let size = self.document_sizes.at(document as usize)?;
        Ok(size as u32)
    }

    /// Per-term document frequency for `term_id`.
    pub fn tdf(&self, term_id: TermId) -> Result<u32> {
        Ok(self.term_frequencies.at(term_id as usize)? as u32)
    }

    /// Collection-wide occurrence count for `term_id`.
    pub fn term_occurrences(&self, term_id: TermId) -> Result<u64> {
        self.term_occurrences.at(term_id as usize)
    }

    pub fn term_collection_frequencies(&self) -> &CompactTable<'a> {
        &self.term_frequencies
    }

    pub fn term_collection_occurrences(&self) -> &CompactTable<'a> {
        &self.term_occurrences
    }

    // ── Lexicons ──────────────────────────────────────────────────────────

    pub fn term_id(&self, term: &str) -> Option<TermId> {
        self.term_map.index_at(term)
    }

    pub fn term(&self, term_id: TermId) -> Result<&'a str> {
        self.term_map.key_at(term_id as usize)
    }

    pub fn terms(&self) -> &Lexicon<'a> {
        &self.term_map
    }

    pub fn titles(&self) -> &Lexicon<'a> {
        &self.title_map
    }

    // ── Posting accessors ─────────────────────────────────────────────────

    /// Lazy document-id list for `term_id`.
    pub fn documents(&self, term_id: TermId) -> Result<DocumentListView<'a>> {
        let length = self.tdf(term_id)? as usize;
        let slice = self.select(term_id, &self.document_offsets, self.documents_view)?;
        DocumentListView::parse(slice, length, self.skip_block_size, self.codec)
    }

    /// Document list for a term string; empty view when the term is absent.
    pub fn documents_for(&self, term: &str) -> Result<DocumentListView<'a>> {
        match self.term_id(term) {
            Some(id) => self.documents(id),
            None => Ok(DocumentListView::empty()),
        }
    }

    /// Lazy frequency list for `term_id`.
    pub fn frequencies(&self, term_id: TermId) -> Result<PayloadListView<'a>> {
        let length = self.tdf(term_id)? as usize;
        let slice = self.select(term_id, &self.count_offsets, self.counts_view)?;
        PayloadListView::parse(slice, length, self.skip_block_size, self.codec)
    }

    /// Frequency list for a term string; empty view when the term is absent.
    pub fn frequencies_for(&self, term: &str) -> Result<PayloadListView<'a>> {
        match self.term_id(term) {
            Some(id) => self.frequencies(id),
            None => Ok(PayloadListView::empty()),
        }
    }

    /// Lazy quantized-score list for `term_id` from the default score index.
    pub fn scores(&self, term_id: TermId) -> Result<PayloadListView<'a>> {
        let name = self.default_score_name()?;
        self.scores_named(term_id, &name)
    }

    /// Lazy quantized-score list for `term_id` from a named score index.
    pub fn scores_named(&self, term_id: TermId, name: &str) -> Result<PayloadListView<'a>> {
        let tuple = self.score_data(name)?;
        let length = self.tdf(term_id)? as usize;
        let slice = self.select(term_id, &tuple.offsets, tuple.postings)?;
        PayloadListView::parse(slice, length, self.skip_block_size, self.codec)
    }

    /// Postings `(document, frequency)` for `term_id`.
    pub fn postings(&self, term_id: TermId) -> Result<PostingIterator<'a>> {
        PostingIterator::new(&self.documents(term_id)?, &self.frequencies(term_id)?)
    }

    /// Postings for a term string; empty iterator when the term is absent.
    pub fn postings_for(&self, term: &str) -> Result<PostingIterator<'a>> {
        match self.term_id(term) {
            Some(id) => self.postings(id),
            None => Ok(PostingIterator::empty()),
        }
    }

    /// Postings `(document, quantized score)` from the default score index.
    pub fn scored_postings(&self, term_id: TermId) -> Result<PostingIterator<'a>> {
        let name = self.default_score_name()?;
        self.scored_postings_named(term_id, &name)
    }

    /// Postings `(document, quantized score)` from a named score index.
    pub fn scored_postings_named(&self, term_id: TermId, name: &str) -> Result<PostingIterator<'a>> {
        PostingIterator::new(&self.documents(term_id)?, &self.scores_named(term_id, name)?)
    }

    /// Scored postings for a term string; empty iterator when absent.
    pub fn scored_postings_for(&self, term: &str) -> Result<PostingIterator<'a>> {
        match self.term_id(term) {
            Some(id) => self.scored_postings(id),
            None => Ok(PostingIterator::empty()),
        }
    }

    // ── Scores ────────────────────────────────────────────────────────────

    pub fn score_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.scores.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn default_score_name(&self) -> Result<String> {
        self.default_score
            .clone()
            .ok_or_else(|| Error::NotFound("no score index loaded".into()))
    }

    pub fn score_data(&self, name: &str) -> Result<&ScoreTuple<'a>> {
        self.scores
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("score index '{}'", name)))
    }

    /// Scorer for `term_id` built from this index's collection statistics.
    pub fn term_scorer(&self, term_id: TermId, kind: ScorerKind) -> Result<TermScorer> {
        match kind {
            ScorerKind::Bm25 => Ok(TermScorer::Bm25(Bm25Scorer::new(
                self.tdf(term_id)?,
                self.document_count,
                self.avg_document_size,
            ))),
            ScorerKind::QueryLikelihood => Ok(TermScorer::QueryLikelihood(
                QueryLikelihoodScorer::new(self.term_occurrences(term_id)?, self.occurrences_count),
            )),
        }
    }

    // ── Raw access ────────────────────────────────────────────────────────

    /// Copy `term_id`'s encoded document list verbatim into `sink`.
    ///
    /// Returns the `size` header of the list (0 for a term with no postings).
    pub fn copy_document_list<W: Write + ?Sized>(
        &self,
        term_id: TermId,
        sink: &mut W,
    ) -> Result<u64> {
        let slice = self.select(term_id, &self.document_offsets, self.documents_view)?;
        Self::copy_list(slice, sink)
    }

    /// Copy `term_id`'s encoded frequency list verbatim into `sink`.
    pub fn copy_frequency_list<W: Write + ?Sized>(
        &self,
        term_id: TermId,
        sink: &mut W,
    ) -> Result<u64> {
        let slice = self.select(term_id, &self.count_offsets, self.counts_view)?;
        Self::copy_list(slice, sink)
    }

    fn copy_list<W: Write + ?Sized>(slice: &[u8], sink: &mut W) -> Result<u64> {
        if slice.is_empty() {
            return Ok(0);
        }
        let (size, _) = VarByte::decode_one(slice)?;
        sink.write_all(slice).map_err(Error::Io)?;
        Ok(size)
    }

    /// The raw document blob; exposed for tests and re-serialization.
    pub fn documents_blob(&self) -> &'a [u8] {
        self.documents_view
    }

    /// The raw frequency blob.
    pub fn counts_blob(&self) -> &'a [u8] {
        self.counts_view
    }

    pub fn document_offsets_table(&self) -> &CompactTable<'a> {
        &self.document_offsets
    }

    pub fn count_offsets_table(&self) -> &CompactTable<'a> {
        &self.count_offsets
    }

    // ── Internal ──────────────────────────────────────────────────────────

    /// Byte slice of one term's list within `memory`, per the offset table.
    fn select(
        &self,
        term_id: TermId,
        offsets: &CompactTable<'a>,
        memory: &'a [u8],
    ) -> Result<&'a [u8]> {
        let start = offsets.at(term_id as usize)? as usize;
        let end = if (term_id as usize) + 1 < self.term_count {
            offsets.at(term_id as usize + 1)? as usize
        } else {
            memory.len()
        };
        if start > end || end > memory.len() {
            return Err(Error::Malformed(format!(
                "list slice {}..{} outside blob of {} bytes",
                start,
                end,
                memory.len()
            )));
        }
        Ok(&memory[start..end])
    }
}
