use std::slice::Iter;

use serde::{Deserialize, Serialize};

use crate::error::{BamError, Result};

const OP_CODES: &[u8; 9] = b"MIDNSHP=X";

/// One packed CIGAR operation: run length in the upper 28 bits, operation code
/// in the lower 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Op(u32);

impl Op {
    /// Validates the operation code of a packed value.
    pub fn new(val: u32) -> Result<Op> {
        if val & 0xF > 8 {
            return Err(BamError::InvalidCigarOp(val & 0xF).into());
        }
        Ok(Op(val))
    }

    /// Builds an operation from its character form.
    pub fn from_parts(op_type: char, length: u32) -> Result<Op> {
        let code = OP_CODES
            .iter()
            .position(|&c| c as char == op_type)
            .ok_or(BamError::InvalidCigarOp(0xF))?;
        Ok(Op((length << 4) | code as u32))
    }

    /// True if operation is one of M, =, X, D, N
    pub fn is_consuming_reference(&self) -> bool {
        matches!(self.0 & 0xF, 0 | 2 | 3 | 7 | 8)
    }

    /// Returns whether the operation kind causes the alignment to consume the read.
    pub fn consumes_read(&self) -> bool {
        matches!(self.0 & 0xF, 0 | 1 | 4 | 7 | 8)
    }

    /// Length of operator
    pub fn length(&self) -> u32 {
        self.0 >> 4
    }

    /// Type of operator itself
    pub fn op_type(&self) -> char {
        OP_CODES[(self.0 & 0xF) as usize] as char
    }

    /// Packed value as stored in BAM
    pub fn raw(&self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cigar(pub Vec<Op>);

impl Cigar {
    pub fn new(ops: Vec<Op>) -> Cigar {
        Cigar(ops)
    }

    /// Decodes `n_ops` packed operations.
    pub fn from_raw<I: IntoIterator<Item = u32>>(raw: I) -> Result<Cigar> {
        raw.into_iter().map(Op::new).collect::<Result<_>>().map(Cigar)
    }

    pub fn ops(&self) -> Iter<Op> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of reference bases covered, the sum of `M`, `D`, `N`, `=` and `X`.
    /// The sum may exceed `u32::MAX`.
    pub fn alignment_length(&self) -> u64 {
        self.ops()
            .filter(|op| op.is_consuming_reference())
            .map(|op| u64::from(op.length()))
            .sum()
    }

    /// Calculates the read length.
    ///
    /// This sums the lengths of the CIGAR operations that consume the read, i.e., alignment
    /// matches (`M`), insertions to the reference (`I`), soft clips (`S`), sequence matches (`=`),
    /// and sequence mismatches (`X`).
    pub fn read_length(&self) -> u64 {
        self.ops()
            .filter(|op| op.consumes_read())
            .map(|op| u64::from(op.length()))
            .sum()
    }
}

impl std::fmt::Display for Cigar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.ops()
            .try_for_each(|op| write!(f, "{}{}", op.length(), op.op_type()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn renders_known_ops() {
        let cigar = Cigar::from_raw([(4 << 4) | 0]).unwrap();
        assert_eq!(cigar.to_string(), "4M");

        let cigar = Cigar::from_raw([(3 << 4) | 4, (10 << 4) | 0, (2 << 4) | 2, (5 << 4) | 1]).unwrap();
        assert_eq!(cigar.to_string(), "3S10M2D5I");
        assert_eq!(cigar.alignment_length(), 12);
        assert_eq!(cigar.read_length(), 18);
    }

    #[test]
    fn empty_cigar_renders_empty() {
        assert_eq!(Cigar::default().to_string(), "");
        assert_eq!(Cigar::from_raw(Vec::new()).unwrap().alignment_length(), 0);
    }

    #[test]
    fn long_runs_do_not_overflow() {
        let max_run = (1u32 << 28) - 1;
        let cigar = Cigar::from_raw(vec![max_run << 4; 17]).unwrap();
        assert_eq!(cigar.alignment_length(), 17 * u64::from(max_run));
        assert_eq!(cigar.read_length(), 17 * u64::from(max_run));
    }

    #[test]
    fn rejects_unknown_op() {
        match Cigar::from_raw([(1 << 4) | 9]) {
            Err(Error::Bam(BamError::InvalidCigarOp(9))) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn from_parts_round_trips() {
        let op = Op::from_parts('N', 250).unwrap();
        assert_eq!(op.raw(), (250 << 4) | 3);
        assert_eq!(op.op_type(), 'N');
        assert!(Op::from_parts('Q', 1).is_err());
    }
}
