use std::io::Read;

use serde::{Deserialize, Serialize};

use super::pairs::{PairedRecord, PairedRecords};
use super::record::Record;
use super::records::Records;
use super::Reader;
use crate::error::{BamError, Result};
use crate::genome::Genome;

/// How records are turned into [`AlignedRead`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadsOptions {
    /// Join properly paired mates into one fragment. Other records are dropped.
    pub join_pairs: bool,
    /// Give joined fragments the strand of their second-in-pair mate instead
    /// of `*`.
    pub paired_end_strand_specific: bool,
}

/// A mapped read, or a joined mate pair, as an interval on the reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedRead {
    pub seqname: String,
    /// 0-based start
    pub from: u64,
    /// Exclusive end
    pub to: u64,
    /// `+`, `-` or `*`
    pub strand: char,
    pub mapq: u8,
    pub duplicate: bool,
    pub paired: bool,
}

enum Source<'a, R> {
    Single(Records<'a, R>),
    Paired(PairedRecords<'a, R>),
}

/// Iterator over aligned reads, created by [`Reader::reads`].
///
/// Unmapped records are skipped here rather than in the decoder. A mapped
/// record without a valid reference is an error.
pub struct Reads<'a, R> {
    source: Source<'a, R>,
    genome: Genome,
    strand_specific: bool,
}

impl<'a, R: Read> Reads<'a, R> {
    pub(crate) fn new(reader: &'a mut Reader<R>, options: ReadsOptions) -> Self {
        let genome = reader.genome().clone();
        let source = if options.join_pairs {
            Source::Paired(reader.paired_records())
        } else {
            Source::Single(reader.records())
        };
        Self {
            source,
            genome,
            strand_specific: options.paired_end_strand_specific,
        }
    }

    /// Mates without a partner, once pairs were joined and the stream is
    /// exhausted.
    pub fn orphan_count(&self) -> Option<usize> {
        match &self.source {
            Source::Paired(pairs) => pairs.orphan_count(),
            Source::Single(_) => None,
        }
    }

    fn seqname(&self, record: &Record) -> Result<String> {
        usize::try_from(record.ref_id)
            .ok()
            .and_then(|idx| self.genome.seqname(idx))
            .map(str::to_string)
            .ok_or_else(|| {
                BamError::InvalidReferenceId {
                    ref_id: record.ref_id,
                    n_ref: self.genome.len(),
                }
                .into()
            })
    }

    fn single(&self, record: &Record) -> Result<AlignedRead> {
        let from = position(record)?;
        Ok(AlignedRead {
            seqname: self.seqname(record)?,
            from,
            to: from + record.cigar.alignment_length(),
            strand: if record.is_reverse() { '-' } else { '+' },
            mapq: record.mapq,
            duplicate: record.flags.is_duplicate(),
            paired: record.is_paired(),
        })
    }

    fn joined(&self, pair: &PairedRecord) -> Result<AlignedRead> {
        let (mate1, mate2) = (&pair.mate1, &pair.mate2);
        let strand = if !self.strand_specific {
            '*'
        } else {
            let second = if mate1.flags.is_second_in_pair() { mate1 } else { mate2 };
            if second.is_reverse() {
                '-'
            } else {
                '+'
            }
        };
        let to = position(mate2)? + mate2.cigar.alignment_length();
        Ok(AlignedRead {
            seqname: self.seqname(mate1)?,
            from: position(mate1)?,
            to,
            strand,
            mapq: mate1.mapq.min(mate2.mapq),
            duplicate: mate1.flags.is_duplicate() || mate2.flags.is_duplicate(),
            paired: true,
        })
    }
}

fn position(record: &Record) -> Result<u64> {
    u64::try_from(record.pos).map_err(|_| {
        BamError::InvalidLength {
            field: "pos",
            value: i64::from(record.pos),
        }
        .into()
    })
}

fn is_proper_mapped(record: &Record) -> bool {
    !record.is_unmapped() && record.flags.is_proper_pair()
}

impl<'a, R: Read> Iterator for Reads<'a, R> {
    type Item = Result<AlignedRead>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match &mut self.source {
                Source::Single(records) => match records.next()? {
                    Ok(record) if record.is_unmapped() => continue,
                    Ok(record) => return Some(self.single(&record)),
                    Err(e) => return Some(Err(e)),
                },
                Source::Paired(pairs) => match pairs.next()? {
                    Ok(pair) if !is_proper_mapped(&pair.mate1) || !is_proper_mapped(&pair.mate2) => {
                        continue
                    }
                    Ok(pair) => return Some(self.joined(&pair)),
                    Err(e) => return Some(Err(e)),
                },
            }
        }
    }
}
