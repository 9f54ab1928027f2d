//! Binary reading primitives shared by the BAM and BBI codecs.
//!
//! Fixed width little-endian reads come from `byteorder`; this module adds the
//! variable length reads both formats need and the positioned read/write
//! helpers used for tree descent.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result};

/// Variable length reads on top of [`Read`]. A short read is always an error,
/// never zero padding.
pub trait ReadBytesExtra: Read {
    /// Reads exactly `n` bytes.
    fn read_bytes(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0; n];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads a `u32` length followed by that many bytes.
    fn read_len_prefixed(&mut self) -> io::Result<Vec<u8>> {
        let len = self.read_u32::<LittleEndian>()? as usize;
        self.read_bytes(len)
    }

    /// Reads bytes up to a NUL terminator. The terminator is consumed but not
    /// returned. There is no upper bound on the length.
    fn read_cstring(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        loop {
            match self.read_u8()? {
                0 => return Ok(buf),
                b => buf.push(b),
            }
        }
    }

    /// Reads and drops `n` bytes.
    fn skip_bytes(&mut self, n: u64) -> io::Result<()> {
        let mut limited = <&mut Self as Read>::take(self, n);
        let skipped = io::copy(&mut limited, &mut io::sink())?;
        if skipped != n {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
        }
        Ok(())
    }
}

impl<R: Read + ?Sized> ReadBytesExtra for R {}

/// Runs `f` with the stream positioned at `offset` and restores the previous
/// position afterwards, on success and on failure alike.
pub fn read_at<S, T, F>(stream: &mut S, offset: u64, f: F) -> Result<T>
where
    S: Seek + ?Sized,
    F: FnOnce(&mut S) -> Result<T>,
{
    let saved = stream.stream_position()?;
    stream.seek(SeekFrom::Start(offset))?;
    let result = f(stream);
    let restored = stream.seek(SeekFrom::Start(saved));
    match (result, restored) {
        (Ok(value), Ok(_)) => Ok(value),
        (Err(e), _) => Err(e),
        (Ok(_), Err(e)) => Err(Error::from(e)),
    }
}

/// Writes `bytes` at `offset` without moving the stream position.
pub fn write_at<S: Write + Seek + ?Sized>(stream: &mut S, offset: u64, bytes: &[u8]) -> Result<()> {
    read_at(stream, offset, |s| s.write_all(bytes).map_err(Error::from))
}

/// Patches a little-endian `u64` at `offset`.
pub fn write_u64_at<S: Write + Seek + ?Sized>(stream: &mut S, offset: u64, value: u64) -> Result<()> {
    let mut buf = Vec::with_capacity(8);
    buf.write_u64::<LittleEndian>(value)?;
    write_at(stream, offset, &buf)
}

/// Patches a little-endian `u32` at `offset`.
pub fn write_u32_at<S: Write + Seek + ?Sized>(stream: &mut S, offset: u64, value: u32) -> Result<()> {
    let mut buf = Vec::with_capacity(4);
    buf.write_u32::<LittleEndian>(value)?;
    write_at(stream, offset, &buf)
}
