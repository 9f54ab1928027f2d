use std::collections::HashMap;
use std::io::Read;

use super::record::Record;
use super::records::Records;
use crate::error::{BamError, Result};

/// Two mates with the same read name. `mate1` has the lower position.
#[derive(Debug, Clone, PartialEq)]
pub struct PairedRecord {
    pub mate1: Record,
    pub mate2: Record,
}

/// Matches mates by read name while streaming.
///
/// Records without the paired flag are skipped. A paired record without a
/// reference (ref id -1) is an error. A mate waits in a table until
/// its partner shows up; mates still waiting when the stream ends are never
/// emitted and are reported by [`PairedRecords::orphan_count`]. The table
/// grows with the number of unmatched names.
pub struct PairedRecords<'a, R> {
    records: Records<'a, R>,
    cache: HashMap<String, Record>,
    orphans: Option<usize>,
    n_ref: usize,
}

impl<'a, R: Read> PairedRecords<'a, R> {
    pub(crate) fn new(records: Records<'a, R>, n_ref: usize) -> Self {
        Self {
            records,
            cache: HashMap::new(),
            orphans: None,
            n_ref,
        }
    }

    /// Number of paired reads whose mate never appeared. `None` until the
    /// stream has been exhausted.
    pub fn orphan_count(&self) -> Option<usize> {
        self.orphans
    }

    /// Number of reads currently waiting for their mate
    pub fn pending(&self) -> usize {
        self.cache.len()
    }

    fn finish(&mut self) {
        if self.orphans.is_none() {
            let orphans = self.cache.len();
            if orphans > 0 {
                log::warn!("{} paired reads without a mate were dropped", orphans);
            }
            self.cache.clear();
            self.orphans = Some(orphans);
        }
    }
}

impl<'a, R: Read> Iterator for PairedRecords<'a, R> {
    type Item = Result<PairedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next() {
                Some(Ok(record)) => record,
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    self.finish();
                    return None;
                }
            };
            if !record.is_paired() {
                continue;
            }
            if record.ref_id < 0 {
                return Some(Err(BamError::InvalidReferenceId {
                    ref_id: record.ref_id,
                    n_ref: self.n_ref,
                }
                .into()));
            }
            match self.cache.remove(&record.read_name) {
                Some(first) => {
                    // Ties keep the first seen mate in front.
                    let pair = if record.pos < first.pos {
                        PairedRecord { mate1: record, mate2: first }
                    } else {
                        PairedRecord { mate1: first, mate2: record }
                    };
                    return Some(Ok(pair));
                }
                None => {
                    self.cache.insert(record.read_name.clone(), record);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::bam::record::tests::{bam_bytes, RecordBuilder};
    use crate::bam::Reader;
    use crate::error::{BamError, Error};

    fn bam(records: &[Vec<u8>]) -> Vec<u8> {
        bam_bytes(&[("chr1", 10_000)], records)
    }

    #[test]
    fn lower_position_is_mate1() {
        let data = bam(&[
            RecordBuilder { name: "p", pos: 500, flag: 0x1 | 0x80, ..Default::default() }.build(),
            RecordBuilder { name: "single", pos: 10, flag: 0, ..Default::default() }.build(),
            RecordBuilder { name: "p", pos: 200, flag: 0x1 | 0x40, ..Default::default() }.build(),
            RecordBuilder { name: "orphan", pos: 20, flag: 0x1, ..Default::default() }.build(),
        ]);
        let mut reader = Reader::new(&data[..]).unwrap();
        let mut pairs = reader.paired_records();
        let pair = pairs.next().unwrap().unwrap();
        assert_eq!(pair.mate1.pos, 200);
        assert_eq!(pair.mate2.pos, 500);
        assert_eq!(pair.mate1.read_name, "p");
        assert!(pairs.next().is_none());
        assert_eq!(pairs.orphan_count(), Some(1));
    }

    #[test]
    fn equal_positions_keep_stream_order() {
        let data = bam(&[
            RecordBuilder { name: "q", pos: 7, flag: 0x1 | 0x40, mapq: 1, ..Default::default() }.build(),
            RecordBuilder { name: "q", pos: 7, flag: 0x1 | 0x80, mapq: 2, ..Default::default() }.build(),
        ]);
        let mut reader = Reader::new(&data[..]).unwrap();
        let pairs: Vec<_> = reader.paired_records().collect::<Result<_, _>>().unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].mate1.mapq, 1);
        assert_eq!(pairs[0].mate2.mapq, 2);
    }

    #[test]
    fn unplaced_mates_are_an_error() {
        let data = bam(&[
            RecordBuilder { name: "u", ref_id: -1, pos: -1, flag: 0x1 | 0x4 | 0x8, ..Default::default() }.build(),
            RecordBuilder { name: "u", ref_id: -1, pos: -1, flag: 0x1 | 0x4 | 0x8, ..Default::default() }.build(),
            RecordBuilder { name: "unplaced_single", ref_id: -1, pos: -1, flag: 0x4, ..Default::default() }.build(),
        ]);
        let mut reader = Reader::new(&data[..]).unwrap();
        let results: Vec<_> = reader.paired_records().collect();
        assert_eq!(results.len(), 2);
        for result in results {
            assert!(matches!(
                result,
                Err(Error::Bam(BamError::InvalidReferenceId { ref_id: -1, n_ref: 1 }))
            ));
        }
    }

    #[test]
    fn name_decoding_is_forced() {
        let data = bam(&[
            RecordBuilder { name: "r", pos: 1, flag: 0x1, ..Default::default() }.build(),
            RecordBuilder { name: "r", pos: 2, flag: 0x1, ..Default::default() }.build(),
        ]);
        let mut reader = Reader::new(&data[..]).unwrap();
        reader.options_mut().read_name = false;
        assert_eq!(reader.paired_records().count(), 1);
    }
}
