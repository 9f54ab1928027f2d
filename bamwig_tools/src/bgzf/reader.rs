use super::block::Block;
use super::util::{fetch_block, inflate_block, RawBlock};
use super::VirtualPosition;
use crate::error::{BgzfError, Error, Result};
use std::io::{self, BufRead, Read, Seek, SeekFrom};

/// Presents a BGZF stream as the flat stream of its inflated contents.
pub struct Reader<R> {
    inner: R,
    // Compressed offset of the next member to fetch.
    position: u64,
    raw: RawBlock,
    block: Block,
    saw_eof_marker: bool,
    done: bool,
}

impl<R: Read> Reader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            position: 0,
            raw: RawBlock::default(),
            block: Block::default(),
            saw_eof_marker: false,
            done: false,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Virtual position of the next byte `read` would return.
    pub fn virtual_position(&self) -> VirtualPosition {
        if self.block.compressed_size == 0 {
            VirtualPosition::new(self.position, 0)
        } else {
            self.block.virtual_position()
        }
    }

    // Loads the next member that has data. Empty members are skipped.
    fn read_block(&mut self) -> Result<bool> {
        loop {
            if !fetch_block(&mut self.inner, self.position, &mut self.raw)? {
                if !self.saw_eof_marker {
                    log::warn!(
                        "BGZF stream ended at offset {} without an EOF marker block",
                        self.position
                    );
                }
                return Ok(false);
            }
            inflate_block(&self.raw, &mut self.block)?;
            self.position += self.raw.size;

            if self.block.is_empty() {
                self.saw_eof_marker = true;
                continue;
            }
            self.saw_eof_marker = false;
            return Ok(true);
        }
    }
}

impl<R: Read + Seek> Reader<R> {
    /// Moves to a virtual position previously obtained from
    /// [`Reader::virtual_position`].
    pub fn seek(&mut self, pos: VirtualPosition) -> Result<VirtualPosition> {
        self.inner.seek(SeekFrom::Start(pos.compressed()))?;
        self.position = pos.compressed();
        self.block = Block::default();
        self.saw_eof_marker = false;
        self.done = false;

        let uncompressed = usize::from(pos.uncompressed());
        if !self.read_block()? {
            self.done = true;
            if uncompressed != 0 {
                return Err(BgzfError::InvalidVirtualPosition(pos.into()).into());
            }
            return Ok(pos);
        }
        if uncompressed > self.block.remaining() {
            return Err(BgzfError::InvalidVirtualPosition(pos.into()).into());
        }
        self.block.data_mut().set_position(uncompressed as u64);
        Ok(pos)
    }
}

impl<R: Read> Read for Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let src = self.fill_buf()?;
        let amt = src.len().min(buf.len());
        buf[..amt].copy_from_slice(&src[..amt]);
        self.consume(amt);
        Ok(amt)
    }
}

impl<R: Read> BufRead for Reader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.block.remaining() == 0 && !self.done {
            match self.read_block() {
                Ok(true) => {}
                Ok(false) => self.done = true,
                Err(e) => {
                    self.done = true;
                    return Err(Error::into_io(e));
                }
            }
        }
        Ok(self.block.remaining_slice())
    }

    fn consume(&mut self, amt: usize) {
        self.block.consume(amt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgzf::Writer;
    use std::io::{Cursor, Write};

    fn compress(chunks: &[&[u8]]) -> Vec<u8> {
        let mut writer = Writer::new(Vec::new());
        for chunk in chunks {
            writer.write_all(chunk).unwrap();
            writer.flush().unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn reads_across_blocks() {
        let data = compress(&[b"hello ", b"bgzf ", b"world"]);
        let mut reader = Reader::new(&data[..]);
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello bgzf world");
    }

    #[test]
    fn missing_eof_marker_is_tolerated() {
        let mut data = compress(&[b"abc"]);
        data.truncate(data.len() - 28);
        let mut out = Vec::new();
        Reader::new(&data[..]).read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn truncated_block_is_an_error() {
        let mut data = compress(&[b"abcdef"]);
        data.truncate(data.len() - 28 - 3);
        let mut out = Vec::new();
        let err = Reader::new(&data[..]).read_to_end(&mut out).unwrap_err();
        assert!(matches!(
            Error::from(err),
            Error::Bgzf(BgzfError::Truncated { offset: 0 })
        ));
    }

    #[test]
    fn seek_to_saved_virtual_position() {
        let data = compress(&[b"0123", b"4567", b"89"]);
        let mut reader = Reader::new(Cursor::new(data));

        let mut buf = [0; 5];
        reader.read_exact(&mut buf).unwrap();
        let saved = reader.virtual_position();
        assert_eq!(saved.uncompressed(), 1);

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"56789");

        reader.seek(saved).unwrap();
        rest.clear();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"56789");
    }

    #[test]
    fn seek_forgets_the_eof_marker() {
        let data = compress(&[b"0123"]);
        let end = data.len() as u64;
        let mut reader = Reader::new(Cursor::new(data));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert!(reader.saw_eof_marker);

        reader.seek(VirtualPosition::new(end, 0)).unwrap();
        assert!(!reader.saw_eof_marker);
        reader.seek(VirtualPosition::new(0, 2)).unwrap();
        out.clear();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"23");
        assert!(reader.saw_eof_marker);
    }

    #[test]
    fn seek_past_block_end_is_rejected() {
        let data = compress(&[b"0123"]);
        let mut reader = Reader::new(Cursor::new(data));
        let err = reader.seek(VirtualPosition::new(0, 9)).unwrap_err();
        assert!(matches!(
            err,
            Error::Bgzf(BgzfError::InvalidVirtualPosition(_))
        ));
    }
}
