//! BigWig reading and writing.
//!
//! A BigWig file starts with a fixed header and its zoom headers, followed by
//! a chromosome B+tree, the raw data blocks with their R-tree index, and one
//! block section plus index per zoom level. [`BigWigReader`] answers interval
//! queries from the raw data or, when the requested bin size allows it, from
//! a zoom level. [`BigWigWriter`] produces the same layout from dense
//! per-sequence series.

mod block;
mod btree;
mod header;
mod query;
mod reader;
mod rtree;
mod summary;
mod writer;
mod zoom;

pub use block::{BbiRecord, BlockItems, DataBlock, DataHeader};
pub use btree::{BNode, BTree, CHROM_TREE_MAGIC};
pub use header::{BbiHeader, ZoomHeader, BIGWIG_MAGIC};
pub use query::BbiQuery;
pub use reader::BigWigReader;
pub use rtree::{InternalEntry, LeafEntry, RNode, RSpan, RTree, INDEX_MAGIC};
pub use summary::{
    bin_discrete_mean, bin_max, bin_mean, bin_min, bin_variance, BinSummaryReducer, SummaryStatistics,
};
pub use writer::{BigWigParameters, BigWigWriter, BBI_MAX_ZOOM_LEVELS, BBI_RES_INCREMENT};
pub use zoom::ZoomRecord;
