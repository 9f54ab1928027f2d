// RFC 1952 § 2.3.1
pub(crate) const MAGIC_NUMBER: [u8; 2] = [0x1f, 0x8b];

pub(crate) const MTIME_NONE: u32 = 0;

// FLG.FEXTRA
pub(crate) const FLAG_FEXTRA: u8 = 0x04;

// ID1 (1) + ID2 (1) + CM (1) + FLG (1) + MTIME (4) + XLF (1) + OS (1)
pub(crate) const HEADER_SIZE: usize = 10;

// CRC32 (4) + ISIZE (4)
pub(crate) const TRAILER_SIZE: usize = 8;

// XLEN (2)
pub(crate) const GZIP_XLEN_SIZE: usize = 2;

// SI1 (1) + SI2 (1) + SLEN (2) + BSIZE (2)
pub(crate) const BGZF_XLEN: usize = 6;

pub(crate) const BGZF_HEADER_SIZE: usize = HEADER_SIZE + GZIP_XLEN_SIZE + BGZF_XLEN;

// Subfield identifier of the BSIZE extra field.
pub(crate) const BGZF_SI: [u8; 2] = [b'B', b'C'];

/// Upper bound of a BGZF member, compressed or not.
pub(crate) const MAX_BLOCK_SIZE: usize = 1 << 16;

// Leaves room for incompressible data to still fit MAX_BLOCK_SIZE once deflated.
pub(crate) const MAX_UNCOMPRESSED_DATA_SIZE: usize = 0xff00;

/// Empty member that terminates every well formed BGZF stream.
pub(crate) const EOF_MARKER: [u8; 28] = [
    0x1f, 0x8b, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x06, 0x00, 0x42, 0x43, 0x02,
    0x00, 0x1b, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

#[non_exhaustive]
pub(crate) enum CompressionMethod {
    Deflate = 8,
}

#[non_exhaustive]
pub(crate) enum OperatingSystem {
    Unknown = 255,
}
