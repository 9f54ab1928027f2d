use std::io::Cursor;

use super::VirtualPosition;

/// One inflated BGZF member together with where it came from.
#[derive(Debug, Default)]
pub(crate) struct Block {
    data: Cursor<Vec<u8>>,
    // Compressed offset of the member start.
    pub(crate) position: u64,
    // Size of the member on disk, header and trailer included.
    pub(crate) compressed_size: u64,
}

impl Block {
    pub fn data(&self) -> &Cursor<Vec<u8>> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Cursor<Vec<u8>> {
        &mut self.data
    }

    pub fn set_len(&mut self, compressed_size: u64) {
        self.compressed_size = compressed_size;
    }

    /// Number of inflated bytes not yet consumed
    pub fn remaining(&self) -> usize {
        let len = self.data.get_ref().len();
        len.saturating_sub(self.data.position() as usize)
    }

    /// Unconsumed part of the inflated data
    pub fn remaining_slice(&self) -> &[u8] {
        let pos = (self.data.position() as usize).min(self.data.get_ref().len());
        &self.data.get_ref()[pos..]
    }

    pub fn consume(&mut self, amt: usize) {
        let pos = self.data.position() + amt as u64;
        self.data.set_position(pos);
    }

    /// An inflated length of zero marks the BGZF EOF member.
    pub fn is_empty(&self) -> bool {
        self.data.get_ref().is_empty()
    }

    /// Virtual position of the next unread byte
    pub fn virtual_position(&self) -> VirtualPosition {
        if self.remaining() == 0 && self.compressed_size > 0 {
            // Reading continues at the start of the next member.
            VirtualPosition::new(self.position + self.compressed_size, 0)
        } else {
            VirtualPosition::new(self.position, self.data.position() as u16)
        }
    }
}
