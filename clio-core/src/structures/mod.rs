mod block_list;
mod compact_table;
mod posting;

pub use block_list::{
    BlockListBuilder, DocumentIterator, DocumentListView, PayloadIterator, PayloadListView,
    TERMINATED,
};
pub use compact_table::{
    CompactTable, DEFAULT_BLOCK_SIZE, FLAG_DELTA_ENCODING, build_compact_table,
    build_offset_table,
};
pub use posting::{Posting, PostingIterator};
