use super::block::Block;
use super::gz::{
    CompressionMethod, BGZF_SI, FLAG_FEXTRA, GZIP_XLEN_SIZE, HEADER_SIZE, MAGIC_NUMBER,
    TRAILER_SIZE,
};
use crate::error::{BgzfError, Result};
use byteorder::{ByteOrder, LittleEndian};
use flate2::read::DeflateDecoder;
use std::io::{self, Read};

/// A BGZF member as read from disk, not yet inflated.
#[derive(Debug, Default)]
pub(crate) struct RawBlock {
    pub cdata: Vec<u8>,
    pub crc32: u32,
    pub isize: u32,
    // Compressed offset of the member start.
    pub position: u64,
    // Member size on disk, header and trailer included.
    pub size: u64,
}

pub(crate) fn inflate_data<R>(reader: R, writer: &mut Vec<u8>) -> io::Result<usize>
where
    R: Read,
{
    let mut decoder = DeflateDecoder::new(reader);
    decoder.read_to_end(writer)
}

/// Reads the next member starting at compressed offset `position`.
///
/// Returns `Ok(false)` when the stream ends cleanly on a member boundary.
pub(crate) fn fetch_block(
    reader: &mut dyn Read,
    position: u64,
    raw: &mut RawBlock,
) -> Result<bool> {
    let mut header = [0; HEADER_SIZE + GZIP_XLEN_SIZE];
    match read_full(reader, &mut header)? {
        0 => return Ok(false),
        n if n < header.len() => return Err(BgzfError::Truncated { offset: position }.into()),
        _ => {}
    }

    let invalid = |reason: &str| BgzfError::InvalidHeader {
        offset: position,
        reason: reason.to_string(),
    };
    if header[..2] != MAGIC_NUMBER {
        return Err(invalid("not a gzip member").into());
    }
    if header[2] != CompressionMethod::Deflate as u8 {
        return Err(invalid("compression method is not deflate").into());
    }
    if header[3] & FLAG_FEXTRA == 0 {
        return Err(invalid("FEXTRA flag not set").into());
    }

    let xlen = usize::from(LittleEndian::read_u16(&header[HEADER_SIZE..]));
    let mut extra = vec![0; xlen];
    read_exact_or_truncated(reader, &mut extra, position)?;
    let block_size = bsize(&extra).ok_or_else(|| invalid("missing BC subfield"))? + 1;

    let header_size = HEADER_SIZE + GZIP_XLEN_SIZE + xlen;
    if block_size < header_size + TRAILER_SIZE {
        return Err(invalid(&format!(
            "block size {} smaller than header and trailer",
            block_size
        ))
        .into());
    }

    raw.cdata
        .resize(block_size - header_size - TRAILER_SIZE, Default::default());
    read_exact_or_truncated(reader, &mut raw.cdata, position)?;

    let mut trailer = [0; TRAILER_SIZE];
    read_exact_or_truncated(reader, &mut trailer, position)?;
    raw.crc32 = LittleEndian::read_u32(&trailer[..4]);
    raw.isize = LittleEndian::read_u32(&trailer[4..]);
    raw.position = position;
    raw.size = block_size as u64;

    log::trace!("fetched BGZF block at {} ({} bytes)", position, block_size);
    Ok(true)
}

/// Inflates `raw` into `block` and checks the trailer.
pub(crate) fn inflate_block(raw: &RawBlock, block: &mut Block) -> Result<()> {
    block.position = raw.position;
    block.set_len(raw.size);

    let udata = block.data_mut();
    udata.set_position(0);
    let udata_buf = udata.get_mut();
    udata_buf.clear();

    let corrupt = |reason: String| BgzfError::Corrupt {
        offset: raw.position,
        reason,
    };
    inflate_data(&raw.cdata[..], udata_buf).map_err(|e| corrupt(e.to_string()))?;

    if udata_buf.len() != raw.isize as usize {
        return Err(corrupt(format!(
            "inflated {} bytes, trailer says {}",
            udata_buf.len(),
            raw.isize
        ))
        .into());
    }
    let crc = crc32fast::hash(udata_buf);
    if crc != raw.crc32 {
        return Err(corrupt(format!(
            "CRC32 mismatch: computed {:#010x}, trailer says {:#010x}",
            crc, raw.crc32
        ))
        .into());
    }
    Ok(())
}

// Scans the gzip extra field for the BC subfield and returns BSIZE.
fn bsize(mut extra: &[u8]) -> Option<usize> {
    while extra.len() >= 4 {
        let slen = usize::from(LittleEndian::read_u16(&extra[2..4]));
        let data = extra.get(4..4 + slen)?;
        if extra[..2] == BGZF_SI && slen == 2 {
            return Some(usize::from(LittleEndian::read_u16(data)));
        }
        extra = &extra[4 + slen..];
    }
    None
}

// Like `read_exact` but reports how much was read before EOF.
fn read_full(reader: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn read_exact_or_truncated(reader: &mut dyn Read, buf: &mut [u8], position: u64) -> Result<()> {
    if read_full(reader, buf)? < buf.len() {
        return Err(BgzfError::Truncated { offset: position }.into());
    }
    Ok(())
}
