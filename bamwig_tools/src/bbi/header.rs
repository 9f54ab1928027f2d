use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, Write};

use super::summary::SummaryStatistics;
use crate::cursor::read_at;
use crate::error::{BbiError, Result};

pub const BIGWIG_MAGIC: u32 = 0x888F_FC26;
pub(crate) const HEADER_SIZE: u64 = 64;
pub(crate) const ZOOM_HEADER_SIZE: u64 = 24;

/// Zoom level entry following the fixed header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZoomHeader {
    pub reduction_level: u32,
    pub data_offset: u64,
    pub index_offset: u64,
}

/// Fixed file header, its zoom headers and the whole-file summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BbiHeader {
    pub version: u16,
    pub zoom_levels: u16,
    pub chrom_tree_offset: u64,
    pub data_offset: u64,
    pub index_offset: u64,
    pub field_count: u16,
    pub defined_field_count: u16,
    pub sql_offset: u64,
    pub summary_offset: u64,
    /// Non-zero when data blocks are zlib compressed
    pub uncompress_buf_size: u32,
    pub extension_offset: u64,
    pub zoom_headers: Vec<ZoomHeader>,
    pub summary: Option<SummaryStatistics>,
}

impl BbiHeader {
    /// Reads the header from the current position, then the summary via a
    /// positioned read.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let magic = reader.read_u32::<LittleEndian>()?;
        if magic != BIGWIG_MAGIC {
            if magic.swap_bytes() == BIGWIG_MAGIC {
                return Err(BbiError::InvalidParameter(
                    "big-endian BigWig files are not supported".into(),
                )
                .into());
            }
            return Err(BbiError::InvalidMagic {
                structure: "BigWig header",
                expected: BIGWIG_MAGIC,
                found: magic,
            }
            .into());
        }
        let mut header = BbiHeader {
            version: reader.read_u16::<LittleEndian>()?,
            zoom_levels: reader.read_u16::<LittleEndian>()?,
            chrom_tree_offset: reader.read_u64::<LittleEndian>()?,
            data_offset: reader.read_u64::<LittleEndian>()?,
            index_offset: reader.read_u64::<LittleEndian>()?,
            field_count: reader.read_u16::<LittleEndian>()?,
            defined_field_count: reader.read_u16::<LittleEndian>()?,
            sql_offset: reader.read_u64::<LittleEndian>()?,
            summary_offset: reader.read_u64::<LittleEndian>()?,
            uncompress_buf_size: reader.read_u32::<LittleEndian>()?,
            extension_offset: reader.read_u64::<LittleEndian>()?,
            ..Default::default()
        };
        for _ in 0..header.zoom_levels {
            let reduction_level = reader.read_u32::<LittleEndian>()?;
            reader.read_u32::<LittleEndian>()?; // reserved
            header.zoom_headers.push(ZoomHeader {
                reduction_level,
                data_offset: reader.read_u64::<LittleEndian>()?,
                index_offset: reader.read_u64::<LittleEndian>()?,
            });
        }
        if header.summary_offset != 0 {
            header.summary = Some(read_at(reader, header.summary_offset, |r| {
                SummaryStatistics::read_total(r)
            })?);
        }
        log::debug!(
            "BigWig header: version {}, {} zoom levels, compressed: {}",
            header.version,
            header.zoom_levels,
            header.is_compressed()
        );
        Ok(header)
    }

    /// Writes the fixed header followed by the zoom headers. The summary is
    /// written separately at `summary_offset`.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(BIGWIG_MAGIC)?;
        writer.write_u16::<LittleEndian>(self.version)?;
        writer.write_u16::<LittleEndian>(self.zoom_levels)?;
        writer.write_u64::<LittleEndian>(self.chrom_tree_offset)?;
        writer.write_u64::<LittleEndian>(self.data_offset)?;
        writer.write_u64::<LittleEndian>(self.index_offset)?;
        writer.write_u16::<LittleEndian>(self.field_count)?;
        writer.write_u16::<LittleEndian>(self.defined_field_count)?;
        writer.write_u64::<LittleEndian>(self.sql_offset)?;
        writer.write_u64::<LittleEndian>(self.summary_offset)?;
        writer.write_u32::<LittleEndian>(self.uncompress_buf_size)?;
        writer.write_u64::<LittleEndian>(self.extension_offset)?;
        for zoom in &self.zoom_headers {
            writer.write_u32::<LittleEndian>(zoom.reduction_level)?;
            writer.write_u32::<LittleEndian>(0)?;
            writer.write_u64::<LittleEndian>(zoom.data_offset)?;
            writer.write_u64::<LittleEndian>(zoom.index_offset)?;
        }
        Ok(())
    }

    pub fn is_compressed(&self) -> bool {
        self.uncompress_buf_size != 0
    }

    /// Bytes taken by the fixed header and zoom headers
    pub fn size(&self) -> u64 {
        HEADER_SIZE + ZOOM_HEADER_SIZE * u64::from(self.zoom_levels)
    }
}
