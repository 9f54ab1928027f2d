use super::cigar::Cigar;
use super::flags::Flags;
use super::sequence;
use super::tags::{read_aux_field, AuxField, AuxValue};
use crate::cursor::ReadBytesExtra;
use crate::error::{BamError, Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// refID, pos, bin_mq_nl, flag_nc, l_seq, next_refID, next_pos, tlen
pub(crate) const FIXED_FIELDS_SIZE: usize = 32;

/// Selects the variable length fields that get decoded. Skipped fields are
/// still stepped over, so the stream stays aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    pub read_name: bool,
    pub read_cigar: bool,
    pub read_sequence: bool,
    pub read_quality: bool,
    pub read_auxiliary: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            read_name: true,
            read_cigar: true,
            read_sequence: true,
            read_quality: true,
            read_auxiliary: true,
        }
    }
}

/// Decoded BAM alignment record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    /// Reference index, -1 when unplaced
    pub ref_id: i32,
    /// 0-based leftmost position, -1 when unplaced
    pub pos: i32,
    /// Recomputed from `pos` and the CIGAR when the CIGAR is decoded,
    /// otherwise the stored value.
    pub bin: u16,
    pub mapq: u8,
    pub flags: Flags,
    pub next_ref_id: i32,
    pub next_pos: i32,
    pub tlen: i32,
    /// Read name without the NUL terminator
    pub read_name: String,
    pub cigar: Cigar,
    pub l_seq: usize,
    pub seq: String,
    pub qual: Vec<u8>,
    pub aux: Vec<AuxField>,
}

impl Record {
    /// Decodes a record from its `block_size` bytes (the length prefix
    /// excluded). Every byte must be accounted for.
    pub fn decode(buf: &[u8], options: &ReaderOptions, n_ref: usize) -> Result<Record> {
        let mut record = Record::default();
        record.decode_into(buf, options, n_ref)?;
        Ok(record)
    }

    /// Like [`Record::decode`] but reuses the allocations of `self`.
    pub fn decode_into(&mut self, buf: &[u8], options: &ReaderOptions, n_ref: usize) -> Result<()> {
        let declared = buf.len();
        let mut cursor = Cursor::new(buf);
        match self.parse(&mut cursor, options, n_ref) {
            Ok(()) => {}
            // A field ran over the declared size.
            Err(e) if e.is_eof() => return Err(BamError::FieldOverrun { declared }.into()),
            Err(e) => return Err(e),
        }
        let consumed = cursor.position() as usize;
        if consumed != declared {
            return Err(BamError::LengthMismatch { declared, consumed }.into());
        }
        Ok(())
    }

    fn parse(&mut self, cursor: &mut Cursor<&[u8]>, options: &ReaderOptions, n_ref: usize) -> Result<()> {
        self.ref_id = check_ref_id(cursor.read_i32::<LittleEndian>()?, n_ref)?;
        self.pos = cursor.read_i32::<LittleEndian>()?;
        let bin_mq_nl = cursor.read_u32::<LittleEndian>()?;
        let flag_nc = cursor.read_u32::<LittleEndian>()?;
        let l_seq = cursor.read_i32::<LittleEndian>()?;
        self.next_ref_id = check_ref_id(cursor.read_i32::<LittleEndian>()?, n_ref)?;
        self.next_pos = cursor.read_i32::<LittleEndian>()?;
        self.tlen = cursor.read_i32::<LittleEndian>()?;

        self.bin = (bin_mq_nl >> 16) as u16;
        self.mapq = ((bin_mq_nl >> 8) & 0xff) as u8;
        let l_read_name = (bin_mq_nl & 0xff) as usize;
        self.flags = Flags::from_bits_retain((flag_nc >> 16) as u16);
        let n_cigar_op = (flag_nc & 0xffff) as usize;
        self.l_seq = usize::try_from(l_seq).map_err(|_| BamError::InvalidLength {
            field: "l_seq",
            value: i64::from(l_seq),
        })?;

        self.read_name.clear();
        if options.read_name {
            let name = cursor.read_bytes(l_read_name)?;
            let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
            self.read_name = String::from_utf8(name[..end].to_vec())?;
        } else {
            cursor.skip_bytes(l_read_name as u64)?;
        }

        self.cigar.0.clear();
        if options.read_cigar {
            let mut raw = Vec::with_capacity(n_cigar_op);
            for _ in 0..n_cigar_op {
                raw.push(cursor.read_u32::<LittleEndian>()?);
            }
            self.cigar = Cigar::from_raw(raw)?;
            self.bin = reg2bin(
                i64::from(self.pos),
                i64::from(self.pos) + self.cigar.alignment_length().max(1) as i64,
            );
        } else {
            cursor.skip_bytes(4 * n_cigar_op as u64)?;
        }

        let packed_len = (self.l_seq + 1) / 2;
        self.seq.clear();
        if options.read_sequence {
            let packed = cursor.read_bytes(packed_len)?;
            self.seq = sequence::decode(&packed, self.l_seq);
        } else {
            cursor.skip_bytes(packed_len as u64)?;
        }

        self.qual.clear();
        if options.read_quality {
            self.qual = cursor.read_bytes(self.l_seq)?;
        } else {
            cursor.skip_bytes(self.l_seq as u64)?;
        }

        self.aux.clear();
        let remaining = cursor.get_ref().len() as u64 - cursor.position().min(cursor.get_ref().len() as u64);
        if options.read_auxiliary {
            while (cursor.position() as usize) < cursor.get_ref().len() {
                self.aux.push(read_aux_field(cursor)?);
            }
        } else {
            cursor.skip_bytes(remaining)?;
        }
        Ok(())
    }

    /// Value of the auxiliary field `tag`
    pub fn aux(&self, tag: &[u8; 2]) -> Option<&AuxValue> {
        self.aux.iter().find(|f| &f.tag == tag).map(|f| &f.value)
    }

    /// Exclusive end of the alignment on the reference. Requires the CIGAR.
    pub fn alignment_end(&self) -> i64 {
        i64::from(self.pos) + self.cigar.alignment_length() as i64
    }

    pub fn is_paired(&self) -> bool {
        self.flags.is_paired()
    }

    pub fn is_unmapped(&self) -> bool {
        self.flags.is_unmapped()
    }

    pub fn is_reverse(&self) -> bool {
        self.flags.is_reverse()
    }
}

fn check_ref_id(ref_id: i32, n_ref: usize) -> Result<i32> {
    if ref_id < -1 || (ref_id >= 0 && ref_id as usize >= n_ref) {
        return Err(Error::from(BamError::InvalidReferenceId { ref_id, n_ref }));
    }
    Ok(ref_id)
}

/// Computes the BAI bin of the 0-based half-open interval `[beg, end)`.
pub fn reg2bin(beg: i64, end: i64) -> u16 {
    let end = end - 1;
    let bin = if beg >> 14 == end >> 14 {
        ((1 << 15) - 1) / 7 + (beg >> 14)
    } else if beg >> 17 == end >> 17 {
        ((1 << 12) - 1) / 7 + (beg >> 17)
    } else if beg >> 20 == end >> 20 {
        ((1 << 9) - 1) / 7 + (beg >> 20)
    } else if beg >> 23 == end >> 23 {
        ((1 << 6) - 1) / 7 + (beg >> 23)
    } else if beg >> 26 == end >> 26 {
        ((1 << 3) - 1) / 7 + (beg >> 26)
    } else {
        0
    };
    bin as u16
}
