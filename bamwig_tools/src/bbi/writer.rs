use byteorder::{LittleEndian, WriteBytesExt};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use super::block::{compress, BlockItems, DataBlock};
use super::btree::write_chrom_tree;
use super::header::{BbiHeader, ZoomHeader, BIGWIG_MAGIC};
use super::rtree::{write_rtree, LeafEntry, RSpan};
use super::summary::{SummaryStatistics, TOTAL_SUMMARY_SIZE};
use super::zoom::{self, ZoomRecord};
use crate::cursor::{write_u32_at, write_u64_at};
use crate::error::{BbiError, Error, Result};
use crate::genome::Genome;

/// Factor between successive automatic reduction levels
pub const BBI_RES_INCREMENT: u32 = 4;
pub const BBI_MAX_ZOOM_LEVELS: usize = 10;
const BBI_VERSION: u16 = 4;

/// Layout options of a BigWig file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BigWigParameters {
    /// Children per node of both trees
    pub block_size: u32,
    /// Items per data block
    pub items_per_slot: u32,
    /// Zoom reduction levels in bases. Empty picks them from the data.
    pub reduction_levels: Vec<u32>,
    /// zlib compress data blocks
    pub compress: bool,
    /// Write fixedStep blocks for runs of values instead of varStep blocks
    pub fixed_step: bool,
}

impl Default for BigWigParameters {
    fn default() -> Self {
        Self {
            block_size: 256,
            items_per_slot: 1024,
            reduction_levels: Vec::new(),
            compress: true,
            fixed_step: true,
        }
    }
}

struct Series {
    values: Vec<f64>,
    bin_size: u32,
}

/// Section of the file produced by one pass over the data
struct Section {
    offset: u64,
    index_offset: u64,
}

/// BigWig writer. Series are buffered per sequence by [`write`](Self::write)
/// and laid out by [`close`](Self::close).
pub struct BigWigWriter<W: Write + Seek> {
    writer: W,
    genome: Genome,
    parameters: BigWigParameters,
    series: Vec<Option<Series>>,
}

impl BigWigWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P, genome: Genome, parameters: BigWigParameters) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::from(e).with_path(path))?;
        BigWigWriter::new(BufWriter::new(file), genome, parameters).map_err(|e| e.with_path(path))
    }
}

impl<W: Write + Seek> BigWigWriter<W> {
    pub fn new(writer: W, genome: Genome, parameters: BigWigParameters) -> Result<Self> {
        if parameters.items_per_slot == 0 || parameters.items_per_slot > u32::from(u16::MAX) {
            return Err(BbiError::InvalidParameter(format!(
                "items per slot must be within 1..={}",
                u16::MAX
            ))
            .into());
        }
        if parameters.block_size < 2 {
            return Err(BbiError::InvalidParameter("block size must be at least 2".into()).into());
        }
        if let Some((name, _)) = genome.iter().find(|(_, length)| *length > u64::from(u32::MAX)) {
            return Err(BbiError::InvalidParameter(format!("sequence {} is too long", name)).into());
        }
        let series = (0..genome.len()).map(|_| None).collect();
        Ok(Self {
            writer,
            genome,
            parameters,
            series,
        })
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    /// Buffers `values` for `seqname`, value `i` covering
    /// `[i * bin_size, (i + 1) * bin_size)`. NaN marks missing data. All
    /// sequences must use the same bin size; writing a sequence again
    /// replaces its values.
    pub fn write(&mut self, seqname: &str, values: &[f64], bin_size: u32) -> Result<()> {
        let idx = self
            .genome
            .get_idx(seqname)
            .ok_or_else(|| BbiError::UnknownSequence(seqname.to_string()))?;
        if bin_size == 0 {
            return Err(BbiError::InvalidParameter("bin size must be positive".into()).into());
        }
        if let Some(other) = self.bin_size() {
            if other != bin_size {
                return Err(BbiError::InvalidParameter(format!(
                    "bin size {} differs from bin size {} used before",
                    bin_size, other
                ))
                .into());
            }
        }
        let length = self.genome.length(idx).unwrap_or(0);
        let covered = values.len() as u64 * u64::from(bin_size);
        if covered >= length + u64::from(bin_size) {
            return Err(BbiError::QueryOutOfBounds {
                seqname: seqname.to_string(),
                from: 0,
                to: covered,
                length,
            }
            .into());
        }
        self.series[idx] = Some(Series {
            values: values.to_vec(),
            bin_size,
        });
        Ok(())
    }

    fn bin_size(&self) -> Option<u32> {
        self.series.iter().flatten().map(|s| s.bin_size).next()
    }

    fn reduction_levels(&self) -> Vec<u32> {
        let bin_size = match self.bin_size() {
            Some(bin_size) => bin_size,
            None => return Vec::new(),
        };
        if !self.parameters.reduction_levels.is_empty() {
            return self
                .parameters
                .reduction_levels
                .iter()
                .copied()
                .filter(|&level| level > bin_size)
                .sorted()
                .dedup()
                .take(BBI_MAX_ZOOM_LEVELS)
                .collect();
        }
        let longest = self.genome.iter().map(|(_, length)| length).max().unwrap_or(0);
        default_reduction_levels(bin_size, longest, self.parameters.items_per_slot)
    }

    /// Writes the file and returns the underlying stream.
    pub fn close(mut self) -> Result<W> {
        let levels = self.reduction_levels();
        let mut header = BbiHeader {
            version: BBI_VERSION,
            zoom_levels: levels.len() as u16,
            zoom_headers: levels
                .iter()
                .map(|&reduction_level| ZoomHeader {
                    reduction_level,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let start = self.writer.stream_position()?;
        header.write(&mut self.writer)?;
        header.summary_offset = self.writer.stream_position()?;
        self.writer.write_all(&[0; TOTAL_SUMMARY_SIZE as usize])?;

        header.chrom_tree_offset = self.writer.stream_position()?;
        write_chrom_tree(&mut self.writer, &self.genome, self.parameters.block_size)?;

        let mut max_block = 0;
        let raw = self.write_raw_section(&mut max_block)?;
        header.data_offset = raw.offset;
        header.index_offset = raw.index_offset;

        for (i, &level) in levels.iter().enumerate() {
            let section = self.write_zoom_section(level, &mut max_block)?;
            header.zoom_headers[i].data_offset = section.offset;
            header.zoom_headers[i].index_offset = section.index_offset;
        }
        self.writer.write_u32::<LittleEndian>(BIGWIG_MAGIC)?;

        if self.parameters.compress {
            header.uncompress_buf_size = max_block as u32;
        }
        let summary = self.total_summary();
        let mut patch = Vec::with_capacity(header.size() as usize);
        header.write(&mut patch)?;
        let end = self.writer.stream_position()?;
        self.writer.seek(SeekFrom::Start(start))?;
        self.writer.write_all(&patch)?;
        self.writer.seek(SeekFrom::Start(header.summary_offset))?;
        summary.write_total(&mut self.writer)?;
        self.writer.seek(SeekFrom::Start(end))?;
        self.writer.flush()?;
        log::debug!("wrote BigWig with {} zoom levels, {} bytes", levels.len(), end - start);
        Ok(self.writer)
    }

    fn write_raw_section(&mut self, max_block: &mut usize) -> Result<Section> {
        let offset = self.writer.stream_position()?;
        self.writer.write_u64::<LittleEndian>(0)?;
        let mut leaves = Vec::new();
        for chrom_id in 0..self.series.len() {
            let blocks = match &self.series[chrom_id] {
                Some(series) => raw_blocks(
                    chrom_id as u32,
                    series,
                    self.seq_length(chrom_id),
                    &self.parameters,
                )?,
                None => continue,
            };
            for block in blocks {
                let h = block.header;
                let entry = self.write_block(block.encode()?, h.chrom_id, h.start, h.end, max_block)?;
                leaves.push(entry);
            }
        }
        write_u64_at(&mut self.writer, offset, leaves.len() as u64)?;
        let index_offset = self.writer.stream_position()?;
        write_rtree(
            &mut self.writer,
            &leaves,
            self.parameters.block_size,
            self.parameters.items_per_slot,
            index_offset,
        )?;
        log::debug!("wrote {} data blocks", leaves.len());
        Ok(Section { offset, index_offset })
    }

    fn write_zoom_section(&mut self, level: u32, max_block: &mut usize) -> Result<Section> {
        let offset = self.writer.stream_position()?;
        self.writer.write_u32::<LittleEndian>(0)?;
        let mut leaves = Vec::new();
        let mut n_records = 0;
        for chrom_id in 0..self.series.len() {
            let records = match &self.series[chrom_id] {
                Some(series) => zoom::reduce(
                    chrom_id as u32,
                    &series.values,
                    series.bin_size,
                    level,
                    self.seq_length(chrom_id),
                ),
                None => continue,
            };
            n_records += records.len();
            for chunk in records.chunks(self.parameters.items_per_slot as usize) {
                let bytes = zoom::encode_block(chunk)?;
                let (first, last) = zoom_bounds(chunk);
                let entry = self.write_block(bytes, chrom_id as u32, first, last, max_block)?;
                leaves.push(entry);
            }
        }
        write_u32_at(&mut self.writer, offset, n_records as u32)?;
        let index_offset = self.writer.stream_position()?;
        write_rtree(
            &mut self.writer,
            &leaves,
            self.parameters.block_size,
            self.parameters.items_per_slot,
            index_offset,
        )?;
        log::debug!("zoom level {}: {} records in {} blocks", level, n_records, leaves.len());
        Ok(Section { offset, index_offset })
    }

    fn write_block(&mut self, bytes: Vec<u8>, chrom_id: u32, start: u32, end: u32, max_block: &mut usize) -> Result<LeafEntry> {
        *max_block = (*max_block).max(bytes.len());
        let bytes = if self.parameters.compress {
            compress(&bytes)?
        } else {
            bytes
        };
        let data_offset = self.writer.stream_position()?;
        self.writer.write_all(&bytes)?;
        Ok(LeafEntry {
            span: RSpan {
                start_chrom: chrom_id,
                start_base: start,
                end_chrom: chrom_id,
                end_base: end,
            },
            data_offset,
            data_size: bytes.len() as u64,
        })
    }

    fn seq_length(&self, chrom_id: usize) -> u32 {
        self.genome.length(chrom_id).unwrap_or(0) as u32
    }

    fn total_summary(&self) -> SummaryStatistics {
        let mut summary = SummaryStatistics::default();
        for (chrom_id, series) in self.series.iter().enumerate() {
            if let Some(series) = series {
                let length = u64::from(self.seq_length(chrom_id));
                let bs = u64::from(series.bin_size);
                for (i, &value) in series.values.iter().enumerate() {
                    let from = i as u64 * bs;
                    let to = (from + bs).min(length);
                    summary.add_value(value, to.saturating_sub(from) as f64);
                }
            }
        }
        summary
    }
}

fn zoom_bounds(records: &[ZoomRecord]) -> (u32, u32) {
    let start = records.first().map_or(0, |r| r.start);
    let end = records.last().map_or(0, |r| r.end);
    (start, end)
}

/// Reduction levels starting at `BBI_RES_INCREMENT * bin_size`, growing by
/// that factor while the longest sequence needs more than `items_per_slot`
/// records at the current level. At least one level is returned.
pub(crate) fn default_reduction_levels(bin_size: u32, longest: u64, items_per_slot: u32) -> Vec<u32> {
    let mut levels = Vec::new();
    let mut level = u64::from(bin_size) * u64::from(BBI_RES_INCREMENT);
    while levels.len() < BBI_MAX_ZOOM_LEVELS && level <= u64::from(u32::MAX) {
        levels.push(level as u32);
        if longest / level <= u64::from(items_per_slot) {
            break;
        }
        level *= u64::from(BBI_RES_INCREMENT);
    }
    levels
}

/// Splits a series into data blocks of at most `items_per_slot` items.
/// Missing values are never written.
fn raw_blocks(chrom_id: u32, series: &Series, seq_length: u32, parameters: &BigWigParameters) -> Result<Vec<DataBlock>> {
    let bs = series.bin_size;
    let slot = parameters.items_per_slot as usize;
    let end_of = |i: usize| ((i as u64 + 1) * u64::from(bs)).min(u64::from(seq_length)) as u32;
    let present: Vec<(usize, f32)> = series
        .values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .map(|(i, &v)| (i, v as f32))
        .collect();

    let mut blocks = Vec::new();
    if parameters.fixed_step {
        // Consecutive indices share the same offset from their rank.
        let runs = present.iter().enumerate().group_by(|(rank, (i, _))| i - rank);
        for (_, run) in &runs {
            let run: Vec<(usize, f32)> = run.map(|(_, &item)| item).collect();
            for chunk in run.chunks(slot) {
                let first = chunk[0].0;
                let last = chunk[chunk.len() - 1].0;
                let items = BlockItems::FixedStep(chunk.iter().map(|&(_, v)| v).collect());
                blocks.push(DataBlock::new(chrom_id, first as u32 * bs, end_of(last), bs, bs, items)?);
            }
        }
    } else {
        for chunk in present.chunks(slot) {
            let first = chunk[0].0;
            let last = chunk[chunk.len() - 1].0;
            let items = BlockItems::VarStep(chunk.iter().map(|&(i, v)| (i as u32 * bs, v)).collect());
            blocks.push(DataBlock::new(chrom_id, first as u32 * bs, end_of(last), 0, bs, items)?);
        }
    }
    Ok(blocks)
}
