//! Dense per-sequence signal, the in-memory counterpart of a BigWig file.

use std::io::{Read, Seek, Write};
use std::path::Path;

use crate::bbi::{BigWigParameters, BigWigReader, BigWigWriter, SummaryStatistics};
use crate::error::{BbiError, Error, Result};
use crate::genome::Genome;

/// One value per `bin_size` bases for every sequence of a genome. Missing
/// values are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleTrack {
    name: String,
    genome: Genome,
    bin_size: u32,
    data: Vec<Vec<f64>>,
}

impl SimpleTrack {
    /// Track with every value missing
    pub fn new<S: Into<String>>(name: S, genome: Genome, bin_size: u32) -> Result<Self> {
        if bin_size == 0 {
            return Err(BbiError::InvalidParameter("bin size must be positive".into()).into());
        }
        let bs = u64::from(bin_size);
        let data = genome
            .iter()
            .map(|(_, length)| vec![f64::NAN; ((length + bs - 1) / bs) as usize])
            .collect();
        Ok(Self {
            name: name.into(),
            genome,
            bin_size,
            data,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    pub fn bin_size(&self) -> u32 {
        self.bin_size
    }

    pub fn get_sequence(&self, seqname: &str) -> Option<&[f64]> {
        self.genome.get_idx(seqname).map(|i| &self.data[i][..])
    }

    pub fn get_sequence_mut(&mut self, seqname: &str) -> Option<&mut [f64]> {
        match self.genome.get_idx(seqname) {
            Some(i) => Some(&mut self.data[i][..]),
            None => None,
        }
    }

    /// Value of the bin containing `position`
    pub fn at(&self, seqname: &str, position: u64) -> Option<f64> {
        let idx = (position / u64::from(self.bin_size)) as usize;
        self.get_sequence(seqname)?.get(idx).copied()
    }

    /// Sets the bin containing `position`.
    pub fn set(&mut self, seqname: &str, position: u64, value: f64) -> Result<()> {
        let length = self
            .genome
            .seq_length(seqname)
            .ok_or_else(|| BbiError::UnknownSequence(seqname.to_string()))?;
        let idx = (position / u64::from(self.bin_size)) as usize;
        match self.get_sequence_mut(seqname).and_then(|s| s.get_mut(idx)) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(BbiError::QueryOutOfBounds {
                seqname: seqname.to_string(),
                from: position,
                to: position + 1,
                length,
            }
            .into()),
        }
    }

    /// Writes the track as a BigWig file.
    pub fn write_bigwig<P: AsRef<Path>>(&self, path: P, parameters: BigWigParameters) -> Result<()> {
        let path = path.as_ref();
        let writer = BigWigWriter::create(path, self.genome.clone(), parameters)?;
        self.write_bigwig_to(writer).map_err(|e| e.with_path(path))?;
        Ok(())
    }

    fn write_bigwig_to<W: Write + Seek>(&self, mut writer: BigWigWriter<W>) -> Result<W> {
        for (seqname, values) in self.genome.seqnames().iter().zip(&self.data) {
            writer.write(seqname, values, self.bin_size)?;
        }
        writer.close()
    }

    /// Reads a BigWig file into a track of `bin_size` wide bins, summarising
    /// each bin with `reducer` as [`BigWigReader::query_slice`] does.
    pub fn import_bigwig<P, F>(
        path: P,
        name: &str,
        reducer: F,
        bin_size: u32,
        bin_overlap: u32,
        init: f64,
    ) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(&SummaryStatistics) -> f64,
    {
        let reader = BigWigReader::open(path)?;
        Self::read_bigwig_from(reader, name, reducer, bin_size, bin_overlap, init)
    }

    fn read_bigwig_from<R, F>(
        mut reader: BigWigReader<R>,
        name: &str,
        reducer: F,
        bin_size: u32,
        bin_overlap: u32,
        init: f64,
    ) -> Result<Self>
    where
        R: Read + Seek,
        F: Fn(&SummaryStatistics) -> f64,
    {
        let mut track = SimpleTrack::new(name, reader.genome().clone(), bin_size)?;
        for (idx, seqname) in track.genome.seqnames().iter().enumerate() {
            let values = reader.query_sequence(seqname, &reducer, bin_size, bin_overlap, init)?;
            if values.len() != track.data[idx].len() {
                return Err(Error::from(BbiError::InvalidBlock(format!(
                    "sequence {} yielded {} bins, expected {}",
                    seqname,
                    values.len(),
                    track.data[idx].len()
                ))));
            }
            track.data[idx] = values;
        }
        Ok(track)
    }
}
