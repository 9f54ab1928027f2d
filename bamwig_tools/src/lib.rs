//! This crate contains decoders for BAM alignment files and a reader and
//! writer for BigWig signal tracks.
//!
//! * [`bgzf`] reads and writes the block-gzip container BAM files live in,
//!   optionally inflating blocks on worker threads.
//! * [`bam`] decodes the BAM header and streams records, mate pairs and
//!   aligned read intervals.
//! * [`bbi`] reads and writes BigWig files, answering binned interval
//!   queries from raw data or zoom levels.
//! * [`track`] holds dense per-sequence signal that round-trips through
//!   BigWig files.
//!
//! All fallible operations return [`Result`]; the library logs through the
//! `log` facade and installs no logger itself.

pub mod bam;
pub mod bbi;
pub mod bgzf;
pub mod cursor;
mod error;
mod genome;
pub mod track;

pub use error::{BamError, BbiError, BgzfError, Error, GenomeError, Result};
pub use genome::Genome;
pub use track::SimpleTrack;
