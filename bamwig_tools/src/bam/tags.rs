// https://samtools.github.io/hts-specs/SAMv1.pdf § 4.2.4

use crate::cursor::ReadBytesExtra;
use crate::error::{BamError, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;

/// Value of an auxiliary field, selected by its type code.
#[derive(Debug, Clone, PartialEq)]
pub enum AuxValue {
    /// `A`
    Char(u8),
    /// `c`
    Int8(i8),
    /// `C`
    UInt8(u8),
    /// `s`
    Int16(i16),
    /// `S`
    UInt16(u16),
    /// `i`
    Int32(i32),
    /// `I`
    UInt32(u32),
    /// `f`
    Float(f32),
    /// `d`
    Double(f64),
    /// `Z`
    String(String),
    /// `H`, kept as the hex digits found in the file
    Hex(String),
    /// `B`
    Array(AuxArray),
}

/// Typed `B` array.
#[derive(Debug, Clone, PartialEq)]
pub enum AuxArray {
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Float(Vec<f32>),
    /// Not part of SAMv1 but accepted for symmetry with the scalar `d`.
    Double(Vec<f64>),
}

impl AuxArray {
    pub fn len(&self) -> usize {
        match self {
            AuxArray::Int8(v) => v.len(),
            AuxArray::UInt8(v) => v.len(),
            AuxArray::Int16(v) => v.len(),
            AuxArray::UInt16(v) => v.len(),
            AuxArray::Int32(v) => v.len(),
            AuxArray::UInt32(v) => v.len(),
            AuxArray::Float(v) => v.len(),
            AuxArray::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuxValue {
    /// Type code of the value as written in BAM.
    pub fn type_code(&self) -> char {
        match self {
            AuxValue::Char(_) => 'A',
            AuxValue::Int8(_) => 'c',
            AuxValue::UInt8(_) => 'C',
            AuxValue::Int16(_) => 's',
            AuxValue::UInt16(_) => 'S',
            AuxValue::Int32(_) => 'i',
            AuxValue::UInt32(_) => 'I',
            AuxValue::Float(_) => 'f',
            AuxValue::Double(_) => 'd',
            AuxValue::String(_) => 'Z',
            AuxValue::Hex(_) => 'H',
            AuxValue::Array(_) => 'B',
        }
    }

    /// Integer value of any of the integer types. `A` is treated as its byte
    /// value, as several aligners write small counts that way.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            AuxValue::Char(v) => Some(i64::from(v)),
            AuxValue::Int8(v) => Some(i64::from(v)),
            AuxValue::UInt8(v) => Some(i64::from(v)),
            AuxValue::Int16(v) => Some(i64::from(v)),
            AuxValue::UInt16(v) => Some(i64::from(v)),
            AuxValue::Int32(v) => Some(i64::from(v)),
            AuxValue::UInt32(v) => Some(i64::from(v)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            AuxValue::Float(v) => Some(f64::from(v)),
            AuxValue::Double(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AuxValue::String(s) | AuxValue::Hex(s) => Some(s),
            _ => None,
        }
    }
}

/// Tagged auxiliary field.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxField {
    pub tag: [u8; 2],
    pub value: AuxValue,
}

impl AuxField {
    pub fn tag_str(&self) -> String {
        String::from_utf8_lossy(&self.tag).into_owned()
    }
}

/// Reads one field: two tag bytes, a type code and the typed value.
pub fn read_aux_field<R: Read>(reader: &mut R) -> Result<AuxField> {
    let mut tag = [0; 2];
    reader.read_exact(&mut tag)?;
    let code = reader.read_u8()?;
    let value = read_aux_value(reader, &tag, code)?;
    Ok(AuxField { tag, value })
}

fn read_aux_value<R: Read>(reader: &mut R, tag: &[u8; 2], code: u8) -> Result<AuxValue> {
    let value = match code {
        b'A' => AuxValue::Char(reader.read_u8()?),
        b'c' => AuxValue::Int8(reader.read_i8()?),
        b'C' => AuxValue::UInt8(reader.read_u8()?),
        b's' => AuxValue::Int16(reader.read_i16::<LittleEndian>()?),
        b'S' => AuxValue::UInt16(reader.read_u16::<LittleEndian>()?),
        b'i' => AuxValue::Int32(reader.read_i32::<LittleEndian>()?),
        b'I' => AuxValue::UInt32(reader.read_u32::<LittleEndian>()?),
        b'f' => AuxValue::Float(reader.read_f32::<LittleEndian>()?),
        b'd' => AuxValue::Double(reader.read_f64::<LittleEndian>()?),
        b'Z' => AuxValue::String(String::from_utf8(reader.read_cstring()?)?),
        b'H' => AuxValue::Hex(String::from_utf8(reader.read_cstring()?)?),
        b'B' => AuxValue::Array(read_aux_array(reader, tag)?),
        _ => return Err(unknown_type(tag, code)),
    };
    Ok(value)
}

fn read_aux_array<R: Read>(reader: &mut R, tag: &[u8; 2]) -> Result<AuxArray> {
    let subtype = reader.read_u8()?;
    let count = reader.read_i32::<LittleEndian>()?;
    let n = usize::try_from(count).map_err(|_| BamError::InvalidLength {
        field: "aux array count",
        value: i64::from(count),
    })?;

    macro_rules! read_n {
        ($read:expr) => {{
            let mut v = Vec::with_capacity(n.min(1 << 16));
            for _ in 0..n {
                v.push($read?);
            }
            v
        }};
    }

    let array = match subtype {
        b'c' => AuxArray::Int8(read_n!(reader.read_i8())),
        b'C' => AuxArray::UInt8(reader.read_bytes(n)?),
        b's' => AuxArray::Int16(read_n!(reader.read_i16::<LittleEndian>())),
        b'S' => AuxArray::UInt16(read_n!(reader.read_u16::<LittleEndian>())),
        b'i' => AuxArray::Int32(read_n!(reader.read_i32::<LittleEndian>())),
        b'I' => AuxArray::UInt32(read_n!(reader.read_u32::<LittleEndian>())),
        b'f' => AuxArray::Float(read_n!(reader.read_f32::<LittleEndian>())),
        b'd' => AuxArray::Double(read_n!(reader.read_f64::<LittleEndian>())),
        _ => return Err(unknown_type(tag, subtype)),
    };
    Ok(array)
}

fn unknown_type(tag: &[u8; 2], code: u8) -> crate::error::Error {
    BamError::UnknownAuxType {
        tag: String::from_utf8_lossy(tag).into_owned(),
        code: code as char,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use byteorder::WriteBytesExt;

    fn field(tag: &[u8; 2], code: u8, payload: &[u8]) -> Vec<u8> {
        let mut buf = tag.to_vec();
        buf.push(code);
        buf.extend_from_slice(payload);
        buf
    }

    fn decode(bytes: &[u8]) -> (AuxValue, usize) {
        let mut slice = bytes;
        let field = read_aux_field(&mut slice).unwrap();
        (field.value, bytes.len() - slice.len())
    }

    #[test]
    fn every_scalar_type() {
        let cases: Vec<(Vec<u8>, AuxValue, usize)> = vec![
            (field(b"XA", b'A', b"Q"), AuxValue::Char(b'Q'), 4),
            (field(b"XB", b'c', &[0xfe]), AuxValue::Int8(-2), 4),
            (field(b"XC", b'C', &[200]), AuxValue::UInt8(200), 4),
            (field(b"XD", b's', &(-300i16).to_le_bytes()), AuxValue::Int16(-300), 5),
            (field(b"XE", b'S', &60000u16.to_le_bytes()), AuxValue::UInt16(60000), 5),
            (field(b"NM", b'i', &(-7i32).to_le_bytes()), AuxValue::Int32(-7), 7),
            (field(b"XF", b'I', &4_000_000_000u32.to_le_bytes()), AuxValue::UInt32(4_000_000_000), 7),
            (field(b"XG", b'f', &1.5f32.to_le_bytes()), AuxValue::Float(1.5), 7),
            (field(b"XH", b'd', &(-0.25f64).to_le_bytes()), AuxValue::Double(-0.25), 11),
            (field(b"RG", b'Z', b"grp1\0"), AuxValue::String("grp1".into()), 8),
            (field(b"XI", b'H', b"1AE3\0"), AuxValue::Hex("1AE3".into()), 8),
        ];
        for (bytes, expected, consumed) in cases {
            assert_eq!(decode(&bytes), (expected, consumed));
        }
    }

    #[test]
    fn arrays() {
        let mut payload = vec![b's'];
        payload.write_i32::<LittleEndian>(3).unwrap();
        for v in [1i16, -2, 3] {
            payload.write_i16::<LittleEndian>(v).unwrap();
        }
        let (value, consumed) = decode(&field(b"ZS", b'B', &payload));
        assert_eq!(value, AuxValue::Array(AuxArray::Int16(vec![1, -2, 3])));
        assert_eq!(consumed, 3 + 1 + 4 + 6);

        let mut payload = vec![b'd'];
        payload.write_i32::<LittleEndian>(1).unwrap();
        payload.write_f64::<LittleEndian>(2.5).unwrap();
        let (value, _) = decode(&field(b"ZD", b'B', &payload));
        assert_eq!(value, AuxValue::Array(AuxArray::Double(vec![2.5])));
    }

    #[test]
    fn unknown_type_code_is_an_error() {
        let bytes = field(b"XX", b'q', &[0, 0]);
        match read_aux_field(&mut &bytes[..]) {
            Err(Error::Bam(BamError::UnknownAuxType { tag, code })) => {
                assert_eq!(tag, "XX");
                assert_eq!(code, 'q');
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn integer_access() {
        assert_eq!(AuxValue::UInt8(3).as_i64(), Some(3));
        assert_eq!(AuxValue::Int32(-1).as_i64(), Some(-1));
        assert_eq!(AuxValue::String("x".into()).as_i64(), None);
        assert_eq!(AuxValue::Float(0.5).as_f64(), Some(0.5));
    }
}
