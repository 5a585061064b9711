use tempfile::TempDir;

use crate::codec::CodecKind;
use crate::error::{Error, Result};
use crate::index::{IndexBuilder, InvertedIndexView, MmapSource, all_score_names, score_index};
use crate::lexicon::LexiconBuilder;
use crate::score::ScorerKind;
use crate::structures::{Posting, TERMINATED, build_compact_table, build_offset_table};
use crate::index::RamSource;

/// Three documents over terms b, c, z:
/// postings(b) = [(0,1),(1,2)], postings(c) = [(1,1)], postings(z) = [(0,2)].
fn three_term_index() -> IndexBuilder {
    let mut builder = IndexBuilder::new();
    builder.add_document("Doc1", ["b", "z", "z"]);
    builder.add_document("Doc2", ["b", "b", "c"]);
    builder.add_document("Doc3", Vec::<String>::new());
    builder
}

fn collect(postings: crate::structures::PostingIterator<'_>) -> Vec<(u32, u32)> {
    postings
        .collect::<Result<Vec<Posting>>>()
        .unwrap()
        .into_iter()
        .map(|p| (p.document, p.payload))
        .collect()
}

#[test]
fn three_term_index_postings() {
    let source = three_term_index().build_ram().unwrap();
    let index = InvertedIndexView::new(&source).unwrap();

    assert_eq!(index.collection_size(), 3);
    assert_eq!(index.term_count(), 3);
    assert_eq!(index.occurrences_count(), 6);

    // Term ids follow lexicographic order.
    assert_eq!(index.term_id("b"), Some(0));
    assert_eq!(index.term_id("c"), Some(1));
    assert_eq!(index.term_id("z"), Some(2));
    assert_eq!(index.term(2).unwrap(), "z");

    assert_eq!(collect(index.postings_for("b").unwrap()), vec![(0, 1), (1, 2)]);
    assert_eq!(collect(index.postings_for("c").unwrap()), vec![(1, 1)]);
    assert_eq!(collect(index.postings_for("z").unwrap()), vec![(0, 2)]);

    assert_eq!(index.tdf(0).unwrap(), 2);
    assert_eq!(index.tdf(1).unwrap(), 1);
    assert_eq!(index.tdf(2).unwrap(), 1);
    assert_eq!(index.term_occurrences(0).unwrap(), 3);
    assert_eq!(index.term_occurrences(2).unwrap(), 2);

    assert_eq!(index.document_size(0).unwrap(), 3);
    assert_eq!(index.document_size(2).unwrap(), 0);
    assert_eq!(index.titles().key_at(1).unwrap(), "Doc2");
}

#[test]
fn absent_term_is_an_empty_iterator() {
    let source = three_term_index().build_ram().unwrap();
    let index = InvertedIndexView::new(&source).unwrap();

    assert_eq!(index.term_id("absent"), None);
    let mut postings = index.postings_for("absent").unwrap();
    assert!(postings.current().is_none());
    assert!(postings.next().is_none());
}

#[test]
fn offset_tables_locate_every_slice() {
    let source = three_term_index().build_ram().unwrap();
    let index = InvertedIndexView::new(&source).unwrap();

    let offsets = index.document_offsets_table();
    assert_eq!(offsets.size(), 3);
    assert_eq!(offsets.at(0).unwrap(), 0);
    assert!(offsets.at(1).unwrap() < offsets.at(2).unwrap());
    // The last term's slice runs to the end of the blob and decodes alone.
    assert!((offsets.at(2).unwrap() as usize) < index.documents_blob().len());
    let docs: Vec<u32> = index
        .documents(2)
        .unwrap()
        .iter()
        .unwrap()
        .collect::<Result<Vec<_>>>()
        .unwrap();
    assert_eq!(docs, vec![0]);
}

#[test]
fn copy_lists_verbatim() {
    let source = three_term_index().build_ram().unwrap();
    let index = InvertedIndexView::new(&source).unwrap();

    let mut copied = Vec::new();
    let size = index.copy_document_list(0, &mut copied).unwrap();
    assert!(size > 0);

    let start = index.document_offsets_table().at(0).unwrap() as usize;
    let end = index.document_offsets_table().at(1).unwrap() as usize;
    assert_eq!(copied, &index.documents_blob()[start..end]);

    // The copy is a complete list: it re-parses to the same postings.
    let view = crate::structures::DocumentListView::parse(
        &copied,
        2,
        index.skip_block_size(),
        index.codec(),
    )
    .unwrap();
    let docs: Vec<u32> = view.iter().unwrap().collect::<Result<Vec<_>>>().unwrap();
    assert_eq!(docs, vec![0, 1]);

    let mut counts = Vec::new();
    assert!(index.copy_frequency_list(1, &mut counts).unwrap() > 0);
    assert!(!counts.is_empty());
}

#[test]
fn zero_posting_term_boundary() {
    // Hand-built index: one term "x" with tdf 0 and an empty collection.
    let mut term_map = LexiconBuilder::new();
    term_map.push("x");
    let source = RamSource {
        document_offsets: build_offset_table(&[0]),
        count_offsets: build_offset_table(&[0]),
        document_sizes: build_compact_table(&[], false, 256),
        term_frequencies: build_compact_table(&[0], false, 256),
        term_occurrences: build_compact_table(&[0], false, 256),
        term_map: term_map.build(),
        title_map: LexiconBuilder::new().build(),
        properties: br#"{"documents":0,"occurrences":0,"skip_block_size":64,"avg_document_size":0.0}"#
            .to_vec(),
        ..RamSource::default()
    };
    let index = InvertedIndexView::new(&source).unwrap();

    assert_eq!(index.tdf(0).unwrap(), 0);
    assert!(index.postings(0).unwrap().next().is_none());
    assert!(index.documents(0).unwrap().is_empty());

    let mut sink = Vec::new();
    assert_eq!(index.copy_document_list(0, &mut sink).unwrap(), 0);
    assert!(sink.is_empty());
}

#[test]
fn mmap_round_trip_matches_ram() {
    let builder = three_term_index();
    let dir = TempDir::new().unwrap();
    builder.write_to(dir.path()).unwrap();

    let mapped = MmapSource::open(dir.path()).unwrap();
    let index = InvertedIndexView::new(&mapped).unwrap();
    assert_eq!(collect(index.postings_for("b").unwrap()), vec![(0, 1), (1, 2)]);
    assert_eq!(index.collection_size(), 3);
    assert_eq!(index.titles().key_at(0).unwrap(), "Doc1");
}

#[test]
fn missing_directory_is_not_found() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        MmapSource::open_with_scores(dir.path(), &[]),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn builds_are_deterministic() {
    let a = three_term_index().build_ram().unwrap();
    let b = three_term_index().build_ram().unwrap();
    assert_eq!(a.documents, b.documents);
    assert_eq!(a.counts, b.counts);
    assert_eq!(a.document_offsets, b.document_offsets);
    assert_eq!(a.term_map, b.term_map);
    assert_eq!(a.properties, b.properties);
}

#[test]
fn seek_over_a_built_index() {
    // Doc ids [3, 10, 17, 42, 90] with two postings per skip block.
    let mut builder = IndexBuilder::with_options(2, CodecKind::VarByte);
    for doc in 0..=90u32 {
        let terms: &[&str] = if matches!(doc, 3 | 10 | 17 | 42 | 90) { &["t"] } else { &[] };
        builder.add_document(&format!("D{}", doc), terms);
    }
    let source = builder.build_ram().unwrap();
    let index = InvertedIndexView::new(&source).unwrap();

    let view = index.documents(0).unwrap();
    let mut iter = view.iter().unwrap();
    assert_eq!(iter.seek(11).unwrap(), 17);
    assert_eq!(iter.seek(42).unwrap(), 42);
    assert_eq!(iter.seek(91).unwrap(), TERMINATED);
}

#[test]
fn stream_vbyte_index_round_trip() {
    let mut builder = IndexBuilder::with_options(4, CodecKind::StreamVByte);
    builder.add_document("A", ["red", "green", "red"]);
    builder.add_document("B", ["green", "blue"]);
    let source = builder.build_ram().unwrap();
    let index = InvertedIndexView::new(&source).unwrap();

    assert_eq!(index.codec(), CodecKind::StreamVByte);
    assert_eq!(collect(index.postings_for("red").unwrap()), vec![(0, 2)]);
    assert_eq!(collect(index.postings_for("green").unwrap()), vec![(0, 1), (1, 1)]);
}

#[test]
fn tdf_matches_list_lengths() {
    let source = three_term_index().build_ram().unwrap();
    let index = InvertedIndexView::new(&source).unwrap();
    let mut total = 0u64;
    for term_id in 0..index.term_count() as u32 {
        let tdf = index.tdf(term_id).unwrap() as usize;
        assert_eq!(index.documents(term_id).unwrap().len(), tdf);
        assert_eq!(index.frequencies(term_id).unwrap().len(), tdf);
        total += tdf as u64;
    }
    assert_eq!(total, 4);
}

#[test]
fn score_build_and_read_back() {
    let dir = TempDir::new().unwrap();
    three_term_index().write_to(dir.path()).unwrap();

    let mapped = MmapSource::open(dir.path()).unwrap();
    let index = InvertedIndexView::new(&mapped).unwrap();
    assert!(index.score_names().is_empty());
    assert!(matches!(index.scores(0), Err(Error::NotFound(_))));

    let mut seen = Vec::new();
    let mut on_progress = |p: crate::index::ScoreBuildProgress| seen.push(p.term_id);
    score_index(&index, dir.path(), ScorerKind::Bm25, 8, None, Some(&mut on_progress)).unwrap();
    assert_eq!(seen, vec![0, 1, 2]);
    assert_eq!(all_score_names(dir.path()).unwrap(), vec!["bm25".to_string()]);

    let mapped = MmapSource::open(dir.path()).unwrap();
    let index = InvertedIndexView::new(&mapped).unwrap();
    assert_eq!(index.score_names(), vec!["bm25"]);
    assert_eq!(index.default_score_name().unwrap(), "bm25");

    let tuple = index.score_data("bm25").unwrap();
    for term_id in 0..index.term_count() as u32 {
        let docs: Vec<(u32, u32)> = collect(index.postings(term_id).unwrap());
        let scored: Vec<(u32, u32)> = collect(index.scored_postings(term_id).unwrap());
        assert_eq!(scored.len(), docs.len());
        let mut term_max = 0u32;
        for ((doc, _), (scored_doc, score)) in docs.iter().zip(&scored) {
            assert_eq!(doc, scored_doc);
            assert!(*score <= 255);
            term_max = term_max.max(*score);
        }
        assert_eq!(tuple.max_scores.at(term_id as usize).unwrap(), u64::from(term_max));
    }

    // The global maximum quantizes to the top of the range.
    let global_max = (0..index.term_count())
        .map(|t| tuple.max_scores.at(t).unwrap())
        .max()
        .unwrap();
    assert_eq!(global_max, 255);
}

#[test]
fn query_likelihood_scores_build() {
    let dir = TempDir::new().unwrap();
    three_term_index().write_to(dir.path()).unwrap();
    let mapped = MmapSource::open(dir.path()).unwrap();
    let index = InvertedIndexView::new(&mapped).unwrap();
    score_index(&index, dir.path(), ScorerKind::QueryLikelihood, 8, None, None).unwrap();

    let mapped = MmapSource::open(dir.path()).unwrap();
    let index = InvertedIndexView::new(&mapped).unwrap();
    assert_eq!(index.score_names(), vec!["ql"]);
    let scored = collect(index.scored_postings_named(0, "ql").unwrap());
    assert_eq!(scored.len(), 2);
}

#[test]
fn score_files_are_deterministic() {
    let build = |dir: &std::path::Path| {
        three_term_index().write_to(dir).unwrap();
        let mapped = MmapSource::open(dir).unwrap();
        let index = InvertedIndexView::new(&mapped).unwrap();
        score_index(&index, dir, ScorerKind::Bm25, 8, None, None).unwrap();
        std::fs::read(dir.join("bm25.scores")).unwrap()
    };
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    assert_eq!(build(a.path()), build(b.path()));
}
