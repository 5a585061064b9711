//! Builds a quantized score index from an opened inverted index view.
//!
//! Raw scorer outputs are mapped linearly onto `[0, 2^bits - 1]` and written
//! as block lists alongside a delta-encoded offset table and a per-term
//! max-score table. Output files are append-only, so an aborted build leaves
//! partial files for the caller to remove; nothing is retried.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::index::{InvertedIndexView, paths};
use crate::score::ScorerKind;
use crate::structures::{
    BlockListBuilder, DEFAULT_BLOCK_SIZE, build_compact_table, build_offset_table,
};
use crate::TermId;

/// Passed to the progress callback after each term is written.
#[derive(Debug, Clone, Copy)]
pub struct ScoreBuildProgress {
    pub term_id: TermId,
    pub term_count: usize,
}

#[inline]
fn quantize(scale: f64, score: f64, max_int: u64) -> Result<u32> {
    if score < 0.0 {
        return Err(Error::Invariant(format!("negative score: {}", score)));
    }
    let q = (scale * score).floor();
    if q > max_int as f64 {
        return Err(Error::Invariant(format!(
            "quantized score {} exceeds maximum {}",
            q, max_int
        )));
    }
    Ok(q as u32)
}

/// Scan every posting for the global maximum raw score.
fn max_raw_score(index: &InvertedIndexView<'_>, kind: ScorerKind) -> Result<f64> {
    let mut max_score = 0f64;
    for term_id in 0..index.term_count() as TermId {
        let scorer = index.term_scorer(term_id, kind)?;
        for posting in index.postings(term_id)? {
            let posting = posting?;
            let score = scorer.score(posting.payload, index.document_size(posting.document)?);
            if score < 0.0 {
                return Err(Error::Invariant(format!(
                    "negative score {} for term {}",
                    score, term_id
                )));
            }
            max_score = max_score.max(score);
        }
    }
    Ok(max_score)
}

/// Build `<name>.scores`, `<name>.offsets`, and `<name>.maxscore` in `dir`
/// for the given scorer, quantized to `bits` bits.
///
/// When `max_score` is given the pre-scan pass is skipped; it must dominate
/// every raw score or the build fails with [`Error::Invariant`].
pub fn score_index(
    index: &InvertedIndexView<'_>,
    dir: &Path,
    kind: ScorerKind,
    bits: u32,
    max_score: Option<f64>,
    mut progress: Option<&mut dyn FnMut(ScoreBuildProgress)>,
) -> Result<()> {
    if bits == 0 || bits > 32 {
        return Err(Error::Invariant(format!("quantization bits out of range: {}", bits)));
    }
    let name = kind.name();
    let term_count = index.term_count();

    let max_score = match max_score {
        Some(max) => {
            log::info!("max score provided: {}", max);
            max
        }
        None => {
            log::info!("calculating max score");
            let max = max_raw_score(index, kind)?;
            log::info!("max score: {}", max);
            max
        }
    };

    let max_int = (1u64 << bits) - 1;
    let scale = if max_score > 0.0 { max_int as f64 / max_score } else { 0.0 };

    let mut scores_out = BufWriter::new(File::create(paths::scores(dir, name))?);
    let mut offsets = Vec::with_capacity(term_count);
    let mut max_scores = Vec::with_capacity(term_count);
    let mut offset = 0u64;

    log::info!("scoring {} terms into {}", term_count, name);
    for term_id in 0..term_count as TermId {
        offsets.push(offset);
        let scorer = index.term_scorer(term_id, kind)?;
        let mut list_builder = BlockListBuilder::payloads(index.skip_block_size(), index.codec());
        let mut term_max = 0u32;
        for posting in index.postings(term_id)? {
            let posting = posting?;
            let score = scorer.score(posting.payload, index.document_size(posting.document)?);
            let quantized = quantize(scale, score, max_int)?;
            term_max = term_max.max(quantized);
            list_builder.add(quantized);
        }
        // A term with no postings occupies no bytes, same as in the
        // document and frequency blobs.
        if !list_builder.is_empty() {
            offset += list_builder.write_to(&mut scores_out)? as u64;
        }
        max_scores.push(u64::from(term_max));

        if let Some(callback) = progress.as_mut() {
            callback(ScoreBuildProgress { term_id, term_count });
        }
    }
    scores_out.flush()?;

    std::fs::write(paths::score_offsets(dir, name), build_offset_table(&offsets))?;
    std::fs::write(
        paths::max_scores(dir, name),
        build_compact_table(&max_scores, false, DEFAULT_BLOCK_SIZE),
    )?;
    log::info!("wrote {} score lists ({} bytes)", term_count, offset);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantization_fidelity() {
        // Smax = 2.0 at 8 bits: raw 0.0 / 1.0 / 2.0 -> 0 / 127 / 255.
        let max_int = (1u64 << 8) - 1;
        let scale = max_int as f64 / 2.0;
        assert_eq!(quantize(scale, 0.0, max_int).unwrap(), 0);
        assert_eq!(quantize(scale, 1.0, max_int).unwrap(), 127);
        assert_eq!(quantize(scale, 2.0, max_int).unwrap(), 255);
    }

    #[test]
    fn negative_score_is_invariant_violation() {
        assert!(matches!(quantize(1.0, -0.1, 255), Err(Error::Invariant(_))));
    }

    #[test]
    fn overflowing_score_is_invariant_violation() {
        // A provided max smaller than an actual score overflows the range.
        let scale = 255.0 / 2.0;
        assert!(matches!(quantize(scale, 2.1, 255), Err(Error::Invariant(_))));
    }
}
