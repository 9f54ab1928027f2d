use std::fmt;

/// BGZF virtual file offset: compressed offset of the block start in the upper
/// 48 bits, offset into the inflated block in the lower 16 bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualPosition(u64);

impl VirtualPosition {
    /// Builds a position from its two components. `compressed` must fit in 48 bits.
    pub fn new(compressed: u64, uncompressed: u16) -> Self {
        assert!(compressed < (1 << 48), "compressed offset exceeds 48 bits");
        Self((compressed << 16) | u64::from(uncompressed))
    }

    /// Offset of the block start in the compressed stream
    pub fn compressed(self) -> u64 {
        self.0 >> 16
    }

    /// Offset inside the inflated block
    pub fn uncompressed(self) -> u16 {
        (self.0 & 0xffff) as u16
    }
}

impl From<u64> for VirtualPosition {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<VirtualPosition> for u64 {
    fn from(pos: VirtualPosition) -> Self {
        pos.0
    }
}

impl fmt::Display for VirtualPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.compressed(), self.uncompressed())
    }
}
