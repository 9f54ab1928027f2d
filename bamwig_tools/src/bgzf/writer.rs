use super::gz::{
    CompressionMethod, OperatingSystem, BGZF_HEADER_SIZE, BGZF_SI, BGZF_XLEN, EOF_MARKER,
    FLAG_FEXTRA, MAGIC_NUMBER, MAX_BLOCK_SIZE, MAX_UNCOMPRESSED_DATA_SIZE, MTIME_NONE,
    TRAILER_SIZE,
};
use super::VirtualPosition;
use byteorder::{LittleEndian, WriteBytesExt};
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{self, Write};

/// Writes a BGZF stream. Data is cut into members of at most
/// `MAX_UNCOMPRESSED_DATA_SIZE` inflated bytes; `flush` closes the current
/// member early.
///
/// Call [`Writer::finish`] to append the EOF marker. Dropping the writer does
/// the same but swallows errors.
pub struct Writer<W: Write> {
    inner: Option<W>,
    buf: Vec<u8>,
    compression: Compression,
    // Compressed bytes written so far.
    position: u64,
}

impl<W: Write> Writer<W> {
    pub fn new(inner: W) -> Self {
        Self::with_compression(inner, Compression::default())
    }

    pub fn with_compression(inner: W, compression: Compression) -> Self {
        Self {
            inner: Some(inner),
            buf: Vec::with_capacity(MAX_UNCOMPRESSED_DATA_SIZE),
            compression,
            position: 0,
        }
    }

    /// Virtual position the next written byte will have.
    pub fn virtual_position(&self) -> VirtualPosition {
        VirtualPosition::new(self.position, self.buf.len() as u16)
    }

    /// Flushes pending data, appends the EOF marker and returns the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.write_eof()?;
        match self.inner.take() {
            Some(inner) => Ok(inner),
            None => Err(io::Error::new(io::ErrorKind::Other, "writer already finished")),
        }
    }

    fn write_eof(&mut self) -> io::Result<()> {
        self.write_block()?;
        let inner = self.inner_mut()?;
        inner.write_all(&EOF_MARKER)?;
        inner.flush()?;
        self.position += EOF_MARKER.len() as u64;
        Ok(())
    }

    fn inner_mut(&mut self) -> io::Result<&mut W> {
        self.inner
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "writer already finished"))
    }

    fn write_block(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }

        let mut encoder = DeflateEncoder::new(Vec::new(), self.compression);
        encoder.write_all(&self.buf)?;
        let cdata = encoder.finish()?;

        let block_size = BGZF_HEADER_SIZE + cdata.len() + TRAILER_SIZE;
        if block_size > MAX_BLOCK_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("compressed BGZF block of {} bytes exceeds limit", block_size),
            ));
        }
        let crc = crc32fast::hash(&self.buf);
        let isize = self.buf.len() as u32;

        let mut member = Vec::with_capacity(block_size);
        member.extend_from_slice(&MAGIC_NUMBER);
        member.write_u8(CompressionMethod::Deflate as u8)?;
        member.write_u8(FLAG_FEXTRA)?;
        member.write_u32::<LittleEndian>(MTIME_NONE)?;
        // XFL
        member.write_u8(0)?;
        member.write_u8(OperatingSystem::Unknown as u8)?;
        member.write_u16::<LittleEndian>(BGZF_XLEN as u16)?;
        member.extend_from_slice(&BGZF_SI);
        member.write_u16::<LittleEndian>(2)?;
        member.write_u16::<LittleEndian>((block_size - 1) as u16)?;
        member.extend_from_slice(&cdata);
        member.write_u32::<LittleEndian>(crc)?;
        member.write_u32::<LittleEndian>(isize)?;

        self.inner_mut()?.write_all(&member)?;
        self.position += block_size as u64;
        self.buf.clear();
        Ok(())
    }
}

impl<W: Write> Write for Writer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let amt = buf.len().min(MAX_UNCOMPRESSED_DATA_SIZE - self.buf.len());
        self.buf.extend_from_slice(&buf[..amt]);
        if self.buf.len() >= MAX_UNCOMPRESSED_DATA_SIZE {
            self.write_block()?;
        }
        Ok(amt)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.write_block()?;
        self.inner_mut()?.flush()
    }
}

impl<W: Write> Drop for Writer<W> {
    fn drop(&mut self) {
        if self.inner.is_some() {
            let _ = self.write_eof();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgzf::Reader;
    use std::io::Read;

    #[test]
    fn empty_stream_is_just_the_eof_marker() {
        let data = Writer::new(Vec::new()).finish().unwrap();
        assert_eq!(data, EOF_MARKER);
    }

    #[test]
    fn large_input_is_split_into_blocks() {
        let input: Vec<u8> = (0..200_000u32).map(|i| (i * 7 % 251) as u8).collect();
        let mut writer = Writer::new(Vec::new());
        writer.write_all(&input).unwrap();
        assert_eq!(writer.virtual_position().uncompressed() as usize, 200_000 % 0xff00);
        let data = writer.finish().unwrap();

        let mut out = Vec::new();
        Reader::new(&data[..]).read_to_end(&mut out).unwrap();
        assert_eq!(out, input);
    }
}
