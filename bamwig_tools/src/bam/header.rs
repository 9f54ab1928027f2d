use crate::cursor::ReadBytesExtra;
use crate::error::{BamError, Result};
use crate::genome::Genome;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;

pub const MAGIC_NUMBER: &[u8; 4] = b"BAM\x01";

/// Header of a BAM file: the SAM header text and the reference list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    /// Plain SAM header text. Not parsed further.
    pub text: String,
    /// References in declaration order; record ref ids index into it.
    pub genome: Genome,
}

/// Reads magic, header text and reference list.
pub fn read_header<R: Read>(reader: &mut R) -> Result<Header> {
    let mut magic = [0; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC_NUMBER {
        return Err(BamError::InvalidMagic(magic).into());
    }

    let l_text = read_length(reader, "l_text")?;
    // § 4.2 "Plain header text in SAM; not necessarily NUL-terminated".
    let text = reader.read_bytes(l_text)?;
    let text = String::from_utf8_lossy(&text)
        .trim_end_matches('\0')
        .to_string();

    let n_ref = read_length(reader, "n_ref")?;
    let mut genome = Genome::new();
    for _ in 0..n_ref {
        let (name, length) = read_reference(reader)?;
        genome.add_sequence(name, length)?;
    }
    log::debug!(
        "read BAM header: {} bytes of text, {} references",
        l_text,
        genome.len()
    );

    Ok(Header { text, genome })
}

fn read_reference<R: Read>(reader: &mut R) -> Result<(String, u64)> {
    let l_name = read_length(reader, "l_name")?;
    let name = reader.read_bytes(l_name)?;
    let name = String::from_utf8(name)?
        .trim_end_matches(|c| c == '\0' || c == '\n')
        .to_string();
    let l_ref = read_length(reader, "l_ref")?;
    Ok((name, l_ref as u64))
}

fn read_length<R: Read>(reader: &mut R, field: &'static str) -> Result<usize> {
    let value = reader.read_i32::<LittleEndian>()?;
    usize::try_from(value).map_err(|_| {
        BamError::InvalidLength {
            field,
            value: i64::from(value),
        }
        .into()
    })
}
