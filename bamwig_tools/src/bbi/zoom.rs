use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Write;

use super::block::{check_chrom_id, BbiRecord};
use super::summary::SummaryStatistics;
use crate::error::{BbiError, Result};

pub(crate) const ZOOM_RECORD_SIZE: usize = 32;

/// Summary of `[start, end)` at one reduction level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomRecord {
    pub chrom_id: u32,
    pub start: u32,
    pub end: u32,
    pub valid: u32,
    pub min: f32,
    pub max: f32,
    pub sum: f32,
    pub sum_squares: f32,
}

impl ZoomRecord {
    fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.chrom_id)?;
        writer.write_u32::<LittleEndian>(self.start)?;
        writer.write_u32::<LittleEndian>(self.end)?;
        writer.write_u32::<LittleEndian>(self.valid)?;
        writer.write_f32::<LittleEndian>(self.min)?;
        writer.write_f32::<LittleEndian>(self.max)?;
        writer.write_f32::<LittleEndian>(self.sum)?;
        writer.write_f32::<LittleEndian>(self.sum_squares)?;
        Ok(())
    }

    pub fn to_record(&self) -> BbiRecord {
        BbiRecord {
            chrom_id: self.chrom_id,
            from: self.start,
            to: self.end,
            statistics: SummaryStatistics {
                valid: f64::from(self.valid),
                min: f64::from(self.min),
                max: f64::from(self.max),
                sum: f64::from(self.sum),
                sum_squares: f64::from(self.sum_squares),
            },
        }
    }
}

pub(crate) fn encode_block(records: &[ZoomRecord]) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(records.len() * ZOOM_RECORD_SIZE);
    for record in records {
        record.write(&mut buf)?;
    }
    Ok(buf)
}

/// Decodes an uncompressed zoom block.
pub(crate) fn decode_block(bytes: &[u8], n_chrom: usize) -> Result<Vec<ZoomRecord>> {
    if bytes.len() % ZOOM_RECORD_SIZE != 0 {
        return Err(BbiError::InvalidBlock(format!(
            "zoom block of {} bytes is not a whole number of records",
            bytes.len()
        ))
        .into());
    }
    let mut reader = bytes;
    let mut records = Vec::with_capacity(bytes.len() / ZOOM_RECORD_SIZE);
    while !reader.is_empty() {
        let record = ZoomRecord {
            chrom_id: reader.read_u32::<LittleEndian>()?,
            start: reader.read_u32::<LittleEndian>()?,
            end: reader.read_u32::<LittleEndian>()?,
            valid: reader.read_u32::<LittleEndian>()?,
            min: reader.read_f32::<LittleEndian>()?,
            max: reader.read_f32::<LittleEndian>()?,
            sum: reader.read_f32::<LittleEndian>()?,
            sum_squares: reader.read_f32::<LittleEndian>()?,
        };
        check_chrom_id(record.chrom_id, n_chrom)?;
        records.push(record);
    }
    Ok(records)
}

/// Summarises a dense series at `reduction_level` bases per record.
///
/// `values[i]` covers `[i * bin_size, (i + 1) * bin_size)`, clipped to
/// `seq_length`. Records without a single finite value are left out.
pub(crate) fn reduce(
    chrom_id: u32,
    values: &[f64],
    bin_size: u32,
    reduction_level: u32,
    seq_length: u32,
) -> Vec<ZoomRecord> {
    let bin_size = u64::from(bin_size);
    let level = u64::from(reduction_level);
    let seq_length = u64::from(seq_length);
    let total = (values.len() as u64 * bin_size).min(seq_length);

    let mut records = Vec::new();
    let mut start = 0;
    while start < total {
        let end = (start + level).min(total);
        let mut s = SummaryStatistics::default();
        let first = (start / bin_size) as usize;
        let last = ((end + bin_size - 1) / bin_size) as usize;
        for (i, &value) in values.iter().enumerate().take(last).skip(first) {
            let from = (i as u64 * bin_size).max(start);
            let to = ((i as u64 + 1) * bin_size).min(end);
            s.add_value(value, (to - from) as f64);
        }
        if !s.is_empty() {
            records.push(ZoomRecord {
                chrom_id,
                start: start as u32,
                end: end as u32,
                valid: s.valid as u32,
                min: s.min as f32,
                max: s.max as f32,
                sum: s.sum as f32,
                sum_squares: s.sum_squares as f32,
            });
        }
        start = end;
    }
    records
}
