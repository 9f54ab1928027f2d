use std::io::{Read, Seek};

use super::block::{uncompress, BbiRecord, DataBlock};
use super::rtree::LeafEntry;
use super::summary::SummaryStatistics;
use super::zoom;
use crate::cursor::{read_at, ReadBytesExtra};
use crate::error::Result;

/// How the blocks of a query are decoded.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockFormat {
    pub n_chrom: usize,
    /// Uncompress buffer size from the header, zero for plain blocks
    pub uncompress_buf_size: u32,
    pub zoom: bool,
}

/// Lazy iterator over the records overlapping a query interval, created by
/// [`BigWigReader::query`](super::BigWigReader::query).
///
/// Blocks are fetched one at a time as the iterator advances. Records come
/// from a zoom level when the query's bin size allowed one.
pub struct BbiQuery<'a, R> {
    reader: &'a mut R,
    format: BlockFormat,
    chrom_id: u32,
    from: u32,
    to: u32,
    blocks: std::vec::IntoIter<LeafEntry>,
    pending: std::vec::IntoIter<BbiRecord>,
    blocks_visited: usize,
}

impl<'a, R: Read + Seek> BbiQuery<'a, R> {
    pub(crate) fn new(
        reader: &'a mut R,
        format: BlockFormat,
        blocks: Vec<LeafEntry>,
        chrom_id: u32,
        from: u32,
        to: u32,
    ) -> Self {
        Self {
            reader,
            format,
            chrom_id,
            from,
            to,
            blocks: blocks.into_iter(),
            pending: Vec::new().into_iter(),
            blocks_visited: 0,
        }
    }

    /// Whether records come from a zoom level
    pub fn is_zoomed(&self) -> bool {
        self.format.zoom
    }

    /// Number of data blocks fetched so far
    pub fn blocks_visited(&self) -> usize {
        self.blocks_visited
    }

    /// Number of data blocks not fetched yet
    pub fn blocks_remaining(&self) -> usize {
        self.blocks.len()
    }

    fn fetch(&mut self, entry: &LeafEntry) -> Result<Vec<BbiRecord>> {
        let size = entry.data_size as usize;
        let bytes = read_at(&mut *self.reader, entry.data_offset, |r| Ok(r.read_bytes(size)?))?;
        let bytes = if self.format.uncompress_buf_size != 0 {
            uncompress(&bytes, self.format.uncompress_buf_size as usize)?
        } else {
            bytes
        };
        log::trace!(
            "fetched block at {} ({} bytes, {} inflated)",
            entry.data_offset,
            entry.data_size,
            bytes.len()
        );
        if self.format.zoom {
            Ok(zoom::decode_block(&bytes, self.format.n_chrom)?
                .iter()
                .map(|r| r.to_record())
                .collect())
        } else {
            Ok(DataBlock::decode(&bytes, self.format.n_chrom)?.records())
        }
    }
}

impl<'a, R: Read + Seek> Iterator for BbiQuery<'a, R> {
    type Item = Result<BbiRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.next() {
                if record.chrom_id == self.chrom_id && record.from < self.to && record.to > self.from {
                    return Some(Ok(record));
                }
                continue;
            }
            let entry = self.blocks.next()?;
            self.blocks_visited += 1;
            match self.fetch(&entry) {
                Ok(records) => self.pending = records.into_iter(),
                Err(e) => {
                    self.blocks = Vec::new().into_iter();
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Collects record statistics into fixed width bins over `[from, ...)`.
///
/// Records crossing a bin border are split by the share of their bases on
/// each side. `from` may be negative when the bins are padded for an overlap
/// window; such bins simply stay empty.
pub(crate) struct BinAccumulator {
    from: i64,
    bin_size: i64,
    bins: Vec<SummaryStatistics>,
}

impl BinAccumulator {
    pub fn new(from: i64, bin_size: u32, n_bins: usize) -> Self {
        Self {
            from,
            bin_size: i64::from(bin_size),
            bins: vec![SummaryStatistics::default(); n_bins],
        }
    }

    pub fn add(&mut self, record: &BbiRecord) {
        let (rec_from, rec_to) = (i64::from(record.from), i64::from(record.to));
        let span = rec_to - rec_from;
        let end = self.from + self.bin_size * self.bins.len() as i64;
        let (lo, hi) = (rec_from.max(self.from), rec_to.min(end));
        if span <= 0 || hi <= lo {
            return;
        }
        let first = ((lo - self.from) / self.bin_size) as usize;
        let last = ((hi - 1 - self.from) / self.bin_size) as usize;
        for k in first..=last {
            let bin_from = self.from + k as i64 * self.bin_size;
            let overlap = hi.min(bin_from + self.bin_size) - lo.max(bin_from);
            if overlap == span {
                self.bins[k].add(&record.statistics);
            } else {
                self.bins[k].add(&record.statistics.scaled(overlap as f64 / span as f64));
            }
        }
    }

    /// Output bin `i` combines accumulated bins `i ..= i + 2 * overlap`.
    /// Bins without any covered base get `init`.
    pub fn finish<F>(self, bin_overlap: usize, reducer: F, init: f64) -> Vec<f64>
    where
        F: Fn(&SummaryStatistics) -> f64,
    {
        let width = 2 * bin_overlap + 1;
        if self.bins.len() < width {
            return Vec::new();
        }
        self.bins
            .windows(width)
            .map(|window| {
                let mut s = SummaryStatistics::default();
                window.iter().for_each(|b| s.add(b));
                if s.is_empty() {
                    init
                } else {
                    reducer(&s)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbi::summary::{bin_max, bin_mean};

    fn record(from: u32, to: u32, value: f32) -> BbiRecord {
        BbiRecord::from_value(0, from, to, value)
    }

    #[test]
    fn records_are_split_across_bins() {
        let mut acc = BinAccumulator::new(0, 10, 3);
        acc.add(&record(0, 10, 1.0));
        acc.add(&record(15, 25, 3.0));
        let out = acc.finish(0, bin_mean, f64::NAN);
        assert_eq!(out[0], 1.0);
        assert_eq!(out[1], 3.0);
        assert_eq!(out[2], 3.0);
    }

    #[test]
    fn partially_covered_bin_averages_covered_bases() {
        let mut acc = BinAccumulator::new(100, 10, 2);
        acc.add(&record(100, 105, 2.0));
        acc.add(&record(105, 110, 4.0));
        acc.add(&record(50, 60, 9.0));
        let out = acc.finish(0, bin_mean, f64::NAN);
        assert_eq!(out[0], 3.0);
        assert!(out[1].is_nan());
    }

    #[test]
    fn overlap_window_with_padding() {
        let mut acc = BinAccumulator::new(-5, 5, 5);
        acc.add(&record(0, 5, 1.0));
        acc.add(&record(5, 10, 7.0));
        acc.add(&record(10, 15, 2.0));
        let out = acc.finish(1, bin_max, 0.0);
        assert_eq!(out, vec![7.0, 7.0, 7.0]);
    }
}
