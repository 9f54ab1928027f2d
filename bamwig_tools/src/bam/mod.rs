//! BAM alignment decoder.
//!
//! [`Reader`] reads the header on construction and then streams [`Record`]s.
//! On top of the single-end stream it offers mate pairing
//! ([`Reader::paired_records`]) and conversion to reference intervals
//! ([`Reader::reads`]).

mod cigar;
mod flags;
mod header;
mod pairs;
mod reader;
mod reads;
mod record;
mod records;
pub mod sequence;
mod tags;

pub use cigar::{Cigar, Op};
pub use flags::Flags;
pub use header::{read_header, Header, MAGIC_NUMBER};
pub use pairs::{PairedRecord, PairedRecords};
pub use reader::{import_genome, read_genome, Reader};
pub use reads::{AlignedRead, Reads, ReadsOptions};
pub use record::{reg2bin, ReaderOptions, Record};
pub use records::Records;
pub use tags::{read_aux_field, AuxArray, AuxField, AuxValue};
