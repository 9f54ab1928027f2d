use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use super::summary::SummaryStatistics;
use crate::error::{BbiError, Result};

pub(crate) const DATA_HEADER_SIZE: usize = 24;

pub const BLOCK_TYPE_BED_GRAPH: u8 = 1;
pub const BLOCK_TYPE_VAR_STEP: u8 = 2;
pub const BLOCK_TYPE_FIXED_STEP: u8 = 3;

/// One value (raw block item or zoom record) located on the genome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BbiRecord {
    pub chrom_id: u32,
    pub from: u32,
    pub to: u32,
    pub statistics: SummaryStatistics,
}

impl BbiRecord {
    pub(crate) fn from_value(chrom_id: u32, from: u32, to: u32, value: f32) -> Self {
        let bases = f64::from(to.saturating_sub(from));
        Self {
            chrom_id,
            from,
            to,
            statistics: SummaryStatistics::from_value(f64::from(value), bases),
        }
    }
}

/// Header in front of the items of every raw data block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHeader {
    pub chrom_id: u32,
    pub start: u32,
    pub end: u32,
    pub step: u32,
    pub span: u32,
    pub item_type: u8,
    pub item_count: u16,
}

impl DataHeader {
    fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let header = Self {
            chrom_id: reader.read_u32::<LittleEndian>()?,
            start: reader.read_u32::<LittleEndian>()?,
            end: reader.read_u32::<LittleEndian>()?,
            step: reader.read_u32::<LittleEndian>()?,
            span: reader.read_u32::<LittleEndian>()?,
            item_type: reader.read_u8()?,
            item_count: {
                reader.read_u8()?; // reserved
                reader.read_u16::<LittleEndian>()?
            },
        };
        Ok(header)
    }

    fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.chrom_id)?;
        writer.write_u32::<LittleEndian>(self.start)?;
        writer.write_u32::<LittleEndian>(self.end)?;
        writer.write_u32::<LittleEndian>(self.step)?;
        writer.write_u32::<LittleEndian>(self.span)?;
        writer.write_u8(self.item_type)?;
        writer.write_u8(0)?;
        writer.write_u16::<LittleEndian>(self.item_count)?;
        Ok(())
    }
}

/// Items of a raw data block, one variant per block type.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockItems {
    /// `(start, end, value)`
    BedGraph(Vec<(u32, u32, f32)>),
    /// `(start, value)`, every item covers the block's span
    VarStep(Vec<(u32, f32)>),
    /// Values at `step` intervals from the block start
    FixedStep(Vec<f32>),
}

impl BlockItems {
    pub fn item_type(&self) -> u8 {
        match self {
            BlockItems::BedGraph(_) => BLOCK_TYPE_BED_GRAPH,
            BlockItems::VarStep(_) => BLOCK_TYPE_VAR_STEP,
            BlockItems::FixedStep(_) => BLOCK_TYPE_FIXED_STEP,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            BlockItems::BedGraph(items) => items.len(),
            BlockItems::VarStep(items) => items.len(),
            BlockItems::FixedStep(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn item_size(item_type: u8) -> Result<usize> {
        match item_type {
            BLOCK_TYPE_BED_GRAPH => Ok(12),
            BLOCK_TYPE_VAR_STEP => Ok(8),
            BLOCK_TYPE_FIXED_STEP => Ok(4),
            other => Err(BbiError::InvalidBlockType(other).into()),
        }
    }
}

/// A decoded raw data block.
#[derive(Debug, Clone, PartialEq)]
pub struct DataBlock {
    pub header: DataHeader,
    pub items: BlockItems,
}

impl DataBlock {
    /// Builds a block, deriving type and item count from `items`.
    pub fn new(chrom_id: u32, start: u32, end: u32, step: u32, span: u32, items: BlockItems) -> Result<Self> {
        let item_count = u16::try_from(items.len()).map_err(|_| {
            BbiError::InvalidParameter(format!("{} items do not fit in one block", items.len()))
        })?;
        let header = DataHeader {
            chrom_id,
            start,
            end,
            step,
            span,
            item_type: items.item_type(),
            item_count,
        };
        Ok(Self { header, items })
    }

    /// Uncompressed block bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(DATA_HEADER_SIZE + 12 * self.items.len());
        self.header.write(&mut buf)?;
        match &self.items {
            BlockItems::BedGraph(items) => {
                for &(start, end, value) in items {
                    buf.write_u32::<LittleEndian>(start)?;
                    buf.write_u32::<LittleEndian>(end)?;
                    buf.write_f32::<LittleEndian>(value)?;
                }
            }
            BlockItems::VarStep(items) => {
                for &(start, value) in items {
                    buf.write_u32::<LittleEndian>(start)?;
                    buf.write_f32::<LittleEndian>(value)?;
                }
            }
            BlockItems::FixedStep(items) => {
                for &value in items {
                    buf.write_f32::<LittleEndian>(value)?;
                }
            }
        }
        Ok(buf)
    }

    /// Decodes uncompressed block bytes. The chromosome id must be below
    /// `n_chrom` and the payload must hold exactly the declared items.
    pub fn decode(bytes: &[u8], n_chrom: usize) -> Result<Self> {
        if bytes.len() < DATA_HEADER_SIZE {
            return Err(BbiError::InvalidBlock(format!(
                "block of {} bytes is shorter than its header",
                bytes.len()
            ))
            .into());
        }
        let mut reader = bytes;
        let header = DataHeader::read(&mut reader)?;
        check_chrom_id(header.chrom_id, n_chrom)?;

        let count = usize::from(header.item_count);
        let expected = count * BlockItems::item_size(header.item_type)?;
        if reader.len() != expected {
            return Err(BbiError::InvalidBlock(format!(
                "{} items of type {} need {} bytes, block holds {}",
                count,
                header.item_type,
                expected,
                reader.len()
            ))
            .into());
        }

        let items = match header.item_type {
            BLOCK_TYPE_BED_GRAPH => BlockItems::BedGraph(
                (0..count)
                    .map(|_| -> Result<_> {
                        Ok((
                            reader.read_u32::<LittleEndian>()?,
                            reader.read_u32::<LittleEndian>()?,
                            reader.read_f32::<LittleEndian>()?,
                        ))
                    })
                    .collect::<Result<_>>()?,
            ),
            BLOCK_TYPE_VAR_STEP => BlockItems::VarStep(
                (0..count)
                    .map(|_| -> Result<_> { Ok((reader.read_u32::<LittleEndian>()?, reader.read_f32::<LittleEndian>()?)) })
                    .collect::<Result<_>>()?,
            ),
            _ => BlockItems::FixedStep(
                (0..count)
                    .map(|_| -> Result<f32> { Ok(reader.read_f32::<LittleEndian>()?) })
                    .collect::<Result<_>>()?,
            ),
        };
        Ok(Self { header, items })
    }

    /// Every item as a record covering its bases.
    pub fn records(&self) -> Vec<BbiRecord> {
        let h = &self.header;
        match &self.items {
            BlockItems::BedGraph(items) => items
                .iter()
                .map(|&(from, to, v)| BbiRecord::from_value(h.chrom_id, from, to, v))
                .collect(),
            BlockItems::VarStep(items) => items
                .iter()
                .map(|&(from, v)| BbiRecord::from_value(h.chrom_id, from, from.saturating_add(h.span), v))
                .collect(),
            BlockItems::FixedStep(items) => items
                .iter()
                .enumerate()
                .map(|(i, &v)| {
                    let from = h.start.saturating_add((i as u32).saturating_mul(h.step));
                    BbiRecord::from_value(h.chrom_id, from, from.saturating_add(h.span), v)
                })
                .collect(),
        }
    }
}

pub(crate) fn check_chrom_id(chrom_id: u32, n_chrom: usize) -> Result<()> {
    if chrom_id as usize >= n_chrom {
        return Err(BbiError::ChromIdOutOfRange { chrom_id, n_chrom }.into());
    }
    Ok(())
}

pub(crate) fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Inflates a zlib compressed block. `size_hint` is the header's
/// uncompress buffer size.
pub(crate) fn uncompress(data: &[u8], size_hint: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(size_hint);
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| BbiError::InvalidBlock(format!("zlib: {}", e)))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn fixed_step_records() {
        let block = DataBlock::new(0, 100, 130, 10, 10, BlockItems::FixedStep(vec![1.0, 2.0, 3.0])).unwrap();
        let bytes = block.encode().unwrap();
        assert_eq!(bytes.len(), DATA_HEADER_SIZE + 12);
        let decoded = DataBlock::decode(&bytes, 1).unwrap();
        assert_eq!(decoded, block);
        let records = decoded.records();
        assert_eq!((records[2].from, records[2].to), (120, 130));
        assert_eq!(records[2].statistics.sum, 30.0);
    }

    #[test]
    fn var_step_uses_block_span() {
        let block = DataBlock::new(1, 5, 55, 0, 5, BlockItems::VarStep(vec![(5, 0.5), (50, 1.5)])).unwrap();
        let records = DataBlock::decode(&block.encode().unwrap(), 2).unwrap().records();
        assert_eq!((records[1].from, records[1].to), (50, 55));
        assert_eq!(records[1].statistics.valid, 5.0);
    }

    #[test]
    fn bed_graph_items() {
        let block = DataBlock::new(0, 0, 40, 0, 0, BlockItems::BedGraph(vec![(0, 10, 2.0), (30, 40, 4.0)])).unwrap();
        let decoded = DataBlock::decode(&block.encode().unwrap(), 1).unwrap();
        assert_eq!(decoded.header.item_type, BLOCK_TYPE_BED_GRAPH);
        assert_eq!(decoded.records()[1].statistics.max, 4.0);
    }

    #[test]
    fn chrom_id_is_validated() {
        let block = DataBlock::new(3, 0, 1, 1, 1, BlockItems::FixedStep(vec![1.0])).unwrap();
        let err = DataBlock::decode(&block.encode().unwrap(), 3).unwrap_err();
        assert!(matches!(err, Error::Bbi(BbiError::ChromIdOutOfRange { chrom_id: 3, n_chrom: 3 })));
    }

    #[test]
    fn length_and_type_are_validated() {
        let block = DataBlock::new(0, 0, 2, 1, 1, BlockItems::FixedStep(vec![1.0, 2.0])).unwrap();
        let mut bytes = block.encode().unwrap();
        bytes.pop();
        assert!(matches!(
            DataBlock::decode(&bytes, 1),
            Err(Error::Bbi(BbiError::InvalidBlock(_)))
        ));
        let mut bytes = block.encode().unwrap();
        bytes[20] = 7;
        assert!(matches!(
            DataBlock::decode(&bytes, 1),
            Err(Error::Bbi(BbiError::InvalidBlockType(7)))
        ));
    }

    #[test]
    fn zlib_round_trip() {
        let data: Vec<u8> = (0..1000u32).flat_map(|i| (i % 7).to_le_bytes()).collect();
        let packed = compress(&data).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(uncompress(&packed, data.len()).unwrap(), data);
        assert!(uncompress(&data[..16], 0).is_err());
    }
}
