//! Blocked gzip (BGZF) container used by BAM.
//!
//! A BGZF file is a series of gzip members of at most 64 KiB each, carrying
//! their compressed size in a `BC` extra subfield, and closed by an empty
//! member. [`Reader`] and [`MultithreadedReader`] present the inflated
//! contents as one flat stream, [`Writer`] produces it.

mod block;
mod gz;
mod readahead;
mod reader;
mod util;
mod virtual_position;
mod writer;

pub use readahead::MultithreadedReader;
pub use reader::Reader;
pub use virtual_position::VirtualPosition;
pub use writer::Writer;
