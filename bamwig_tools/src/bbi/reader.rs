use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::btree::BTree;
use super::header::BbiHeader;
use super::query::{BbiQuery, BinAccumulator, BlockFormat};
use super::rtree::RTree;
use super::summary::SummaryStatistics;
use crate::cursor::read_at;
use crate::error::{BbiError, Error, Result};
use crate::genome::Genome;

/// BigWig reader.
///
/// Construction reads the header, the chromosome tree and the R-tree of the
/// raw data. Zoom level indices are read the first time a query needs them.
/// The reader owns its stream; every tree descent and block fetch restores the
/// stream position afterwards.
pub struct BigWigReader<R> {
    reader: R,
    header: BbiHeader,
    genome: Genome,
    index: RTree,
    zoom_indices: Vec<Option<RTree>>,
    path: Option<PathBuf>,
}

impl BigWigReader<BufReader<File>> {
    /// Opens a BigWig file. Errors, including those of later queries, name
    /// the file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::from(e).with_path(path))?;
        let mut reader = BigWigReader::new(BufReader::new(file)).map_err(|e| e.with_path(path))?;
        reader.path = Some(path.to_path_buf());
        Ok(reader)
    }
}

impl<R: Read + Seek> BigWigReader<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;
        let header = BbiHeader::read(&mut reader)?;
        let genome = read_at(&mut reader, header.chrom_tree_offset, |r| BTree::read(r))?.genome()?;
        let index = read_at(&mut reader, header.index_offset, |r| RTree::read(r))?;
        let zoom_indices = vec![None; header.zoom_headers.len()];
        Ok(Self {
            reader,
            header,
            genome,
            index,
            zoom_indices,
            path: None,
        })
    }

    pub fn header(&self) -> &BbiHeader {
        &self.header
    }

    /// Sequences in chromosome id order
    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    /// Whole-file summary, when the file has one
    pub fn summary(&self) -> Option<&SummaryStatistics> {
        self.header.summary.as_ref()
    }

    /// Reduction levels of the zoom levels, in file order
    pub fn zoom_levels(&self) -> Vec<u32> {
        self.header.zoom_headers.iter().map(|z| z.reduction_level).collect()
    }

    /// Index of the raw data
    pub fn index(&self) -> &RTree {
        &self.index
    }

    /// Records overlapping `[from, to)` on `seqname`.
    ///
    /// With a non-zero `bin_size` the coarsest zoom level whose reduction
    /// level divides `bin_size` answers the query; otherwise records come
    /// from the raw data.
    pub fn query(&mut self, seqname: &str, from: u64, to: u64, bin_size: u32) -> Result<BbiQuery<'_, R>> {
        let (chrom_id, length) = self.sequence(seqname)?;
        let path = self.path.clone();
        check_bounds(seqname, from, to, length).map_err(|e| annotate(&path, e))?;
        self.query_chrom(chrom_id, from as u32, to as u32, bin_size)
            .map_err(|e| annotate(&path, e))
    }

    fn sequence(&self, seqname: &str) -> Result<(u32, u64)> {
        let chrom_id = self
            .genome
            .get_idx(seqname)
            .ok_or_else(|| annotate(&self.path, BbiError::UnknownSequence(seqname.to_string()).into()))?;
        let length = self.genome.length(chrom_id).unwrap_or(0);
        Ok((chrom_id as u32, length))
    }

    fn zoom_level_for(&self, bin_size: u32) -> Option<usize> {
        if bin_size == 0 {
            return None;
        }
        self.header
            .zoom_headers
            .iter()
            .enumerate()
            .filter(|(_, z)| z.reduction_level > 0 && z.reduction_level <= bin_size && bin_size % z.reduction_level == 0)
            .max_by_key(|(_, z)| z.reduction_level)
            .map(|(i, _)| i)
    }

    fn query_chrom(&mut self, chrom_id: u32, from: u32, to: u32, bin_size: u32) -> Result<BbiQuery<'_, R>> {
        let zoom = self.zoom_level_for(bin_size);
        let blocks = match zoom {
            Some(i) => {
                if self.zoom_indices[i].is_none() {
                    let offset = self.header.zoom_headers[i].index_offset;
                    let tree = read_at(&mut self.reader, offset, |r| RTree::read(r))?;
                    log::debug!(
                        "loaded index of zoom level {} ({} blocks)",
                        self.header.zoom_headers[i].reduction_level,
                        tree.item_count
                    );
                    self.zoom_indices[i] = Some(tree);
                }
                self.zoom_indices[i]
                    .as_ref()
                    .map(|tree| tree.search(chrom_id, from, to))
                    .unwrap_or_default()
            }
            None => self.index.search(chrom_id, from, to),
        };
        let format = BlockFormat {
            n_chrom: self.genome.len(),
            uncompress_buf_size: self.header.uncompress_buf_size,
            zoom: zoom.is_some(),
        };
        Ok(BbiQuery::new(&mut self.reader, format, blocks, chrom_id, from, to))
    }

    /// Summarises `[from, to)` on `seqname` into bins of `bin_size` bases.
    ///
    /// The interval is widened to whole bins. Each output bin combines the
    /// statistics of itself and `bin_overlap` neighbours on either side,
    /// folded by `reducer`; bins without data get `init`. A `bin_size` of
    /// zero takes the span of the first record in the interval. The interval
    /// must lie within the sequence.
    #[allow(clippy::too_many_arguments)]
    pub fn query_slice<F>(
        &mut self,
        seqname: &str,
        from: u64,
        to: u64,
        reducer: F,
        bin_size: u32,
        bin_overlap: u32,
        init: f64,
    ) -> Result<Vec<f64>>
    where
        F: Fn(&SummaryStatistics) -> f64,
    {
        let (chrom_id, length) = self.sequence(seqname)?;
        check_bounds(seqname, from, to, length).map_err(|e| annotate(&self.path, e))?;
        self.slice_chrom(chrom_id, from as u32, to as u32, reducer, bin_size, bin_overlap, init)
            .map_err(|e| annotate(&self.path, e))
    }

    /// Like [`query_slice`](Self::query_slice), but an interval reaching past
    /// the sequence end is cut to the sequence instead of rejected. The
    /// result then covers fewer bases than asked for.
    #[allow(clippy::too_many_arguments)]
    pub fn query_slice_clamped<F>(
        &mut self,
        seqname: &str,
        from: u64,
        to: u64,
        reducer: F,
        bin_size: u32,
        bin_overlap: u32,
        init: f64,
    ) -> Result<Vec<f64>>
    where
        F: Fn(&SummaryStatistics) -> f64,
    {
        let (_, length) = self.sequence(seqname)?;
        let to = to.min(length);
        let from = from.min(to);
        self.query_slice(seqname, from, to, reducer, bin_size, bin_overlap, init)
    }

    /// Bins covering the whole of `seqname`
    pub fn query_sequence<F>(
        &mut self,
        seqname: &str,
        reducer: F,
        bin_size: u32,
        bin_overlap: u32,
        init: f64,
    ) -> Result<Vec<f64>>
    where
        F: Fn(&SummaryStatistics) -> f64,
    {
        let (_, length) = self.sequence(seqname)?;
        self.query_slice(seqname, 0, length, reducer, bin_size, bin_overlap, init)
    }

    #[allow(clippy::too_many_arguments)]
    fn slice_chrom<F>(
        &mut self,
        chrom_id: u32,
        from: u32,
        to: u32,
        reducer: F,
        bin_size: u32,
        bin_overlap: u32,
        init: f64,
    ) -> Result<Vec<f64>>
    where
        F: Fn(&SummaryStatistics) -> f64,
    {
        if from == to {
            return Ok(Vec::new());
        }
        let bin_size = match bin_size {
            0 => self.infer_bin_size(chrom_id, from, to)?,
            n => n,
        };
        let bs = u64::from(bin_size);
        let from = u64::from(from) / bs * bs;
        let to = (u64::from(to) + bs - 1) / bs * bs;
        let n_bins = ((to - from) / bs) as usize;
        let pad = u64::from(bin_overlap) * bs;

        let padded_from = from as i64 - pad as i64;
        let mut bins = BinAccumulator::new(padded_from, bin_size, n_bins + 2 * bin_overlap as usize);
        let query_from = padded_from.max(0) as u32;
        let query_to = (to + pad).min(u64::from(u32::MAX)) as u32;
        for record in self.query_chrom(chrom_id, query_from, query_to, bin_size)? {
            bins.add(&record?);
        }
        Ok(bins.finish(bin_overlap as usize, reducer, init))
    }

    fn infer_bin_size(&mut self, chrom_id: u32, from: u32, to: u32) -> Result<u32> {
        match self.query_chrom(chrom_id, from, to, 0)?.next() {
            Some(record) => {
                let record = record?;
                Ok(record.to.saturating_sub(record.from).max(1))
            }
            None => Err(BbiError::InvalidParameter(format!(
                "cannot infer bin size, no data in {}-{}",
                from, to
            ))
            .into()),
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Releases the underlying stream.
    pub fn close(self) -> R {
        self.reader
    }
}

fn check_bounds(seqname: &str, from: u64, to: u64, length: u64) -> Result<()> {
    if from > to || to > length {
        return Err(BbiError::QueryOutOfBounds {
            seqname: seqname.to_string(),
            from,
            to,
            length,
        }
        .into());
    }
    Ok(())
}

fn annotate(path: &Option<PathBuf>, e: Error) -> Error {
    match path {
        Some(path) => e.with_path(path),
        None => e,
    }
}
