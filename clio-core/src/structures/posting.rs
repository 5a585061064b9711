//! Posting pairs: a document cursor and a payload cursor advanced in lockstep.

use super::block_list::{DocumentIterator, DocumentListView, PayloadIterator, PayloadListView, TERMINATED};
use crate::error::{Error, Result};
use crate::DocId;

/// One posting: a document id and its payload (term frequency or quantized
/// score, depending on the list the iterator was built from).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub document: DocId,
    pub payload: u32,
}

/// Iterates a document list and a payload list in lockstep.
pub struct PostingIterator<'a> {
    documents: DocumentIterator<'a>,
    payloads: PayloadIterator<'a>,
}

impl<'a> PostingIterator<'a> {
    pub fn new(documents: &DocumentListView<'a>, payloads: &PayloadListView<'a>) -> Result<Self> {
        if documents.len() != payloads.len() {
            return Err(Error::Malformed(format!(
                "document list holds {} postings but payload list holds {}",
                documents.len(),
                payloads.len()
            )));
        }
        Ok(Self { documents: documents.iter()?, payloads: payloads.iter()? })
    }

    /// An iterator with no postings; used for absent terms.
    pub fn empty() -> Self {
        Self::new(&DocumentListView::empty(), &PayloadListView::empty())
            .expect("empty views are aligned")
    }

    /// Current posting, or `None` once exhausted.
    pub fn current(&self) -> Option<Posting> {
        let document = self.documents.doc();
        if document == TERMINATED {
            None
        } else {
            Some(Posting { document, payload: self.payloads.payload() })
        }
    }

    /// Advance both cursors; returns the new current posting.
    pub fn advance(&mut self) -> Result<Option<Posting>> {
        self.documents.advance()?;
        self.payloads.advance()?;
        Ok(self.current())
    }
}

impl Iterator for PostingIterator<'_> {
    type Item = Result<Posting>;

    fn next(&mut self) -> Option<Self::Item> {
        let posting = self.current()?;
        match self.advance() {
            Ok(_) => Some(Ok(posting)),
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecKind;
    use crate::structures::block_list::BlockListBuilder;

    fn lists(docs: &[u32], payloads: &[u32], block_size: usize) -> (Vec<u8>, Vec<u8>) {
        let mut d = BlockListBuilder::documents(block_size, CodecKind::VarByte);
        let mut p = BlockListBuilder::payloads(block_size, CodecKind::VarByte);
        for &v in docs {
            d.add(v);
        }
        for &v in payloads {
            p.add(v);
        }
        (d.build(), p.build())
    }

    #[test]
    fn lockstep_iteration() {
        let docs = [0u32, 3, 7, 19];
        let freqs = [1u32, 2, 1, 5];
        let (d, p) = lists(&docs, &freqs, 2);
        let dv = DocumentListView::parse(&d, 4, 2, CodecKind::VarByte).unwrap();
        let pv = PayloadListView::parse(&p, 4, 2, CodecKind::VarByte).unwrap();
        let postings: Vec<Posting> = PostingIterator::new(&dv, &pv)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(
            postings,
            vec![
                Posting { document: 0, payload: 1 },
                Posting { document: 3, payload: 2 },
                Posting { document: 7, payload: 1 },
                Posting { document: 19, payload: 5 },
            ]
        );
    }

    #[test]
    fn mismatched_counts_are_malformed() {
        let (d, p) = lists(&[1, 2, 3], &[1, 1], 2);
        let dv = DocumentListView::parse(&d, 3, 2, CodecKind::VarByte).unwrap();
        let pv = PayloadListView::parse(&p, 2, 2, CodecKind::VarByte).unwrap();
        assert!(matches!(PostingIterator::new(&dv, &pv), Err(Error::Malformed(_))));
    }

    #[test]
    fn empty_iterator_yields_nothing() {
        let mut iter = PostingIterator::empty();
        assert!(iter.current().is_none());
        assert!(iter.next().is_none());
    }
}
