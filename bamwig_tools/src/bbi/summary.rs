use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::error::Result;

/// basesCovered, min, max, sum, sumSquares
pub(crate) const TOTAL_SUMMARY_SIZE: u64 = 40;

/// Statistics over a set of bases. Every field is weighted by the number of
/// bases a value covers, so `valid` counts bases, not items.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryStatistics {
    pub valid: f64,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub sum_squares: f64,
}

impl Default for SummaryStatistics {
    fn default() -> Self {
        Self {
            valid: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            sum_squares: 0.0,
        }
    }
}

impl SummaryStatistics {
    /// Statistics of `bases` bases that all carry `x`.
    pub fn from_value(x: f64, bases: f64) -> Self {
        let mut s = Self::default();
        s.add_value(x, bases);
        s
    }

    /// NaN values are ignored.
    pub fn add_value(&mut self, x: f64, bases: f64) {
        if x.is_nan() || bases <= 0.0 {
            return;
        }
        self.valid += bases;
        self.min = self.min.min(x);
        self.max = self.max.max(x);
        self.sum += x * bases;
        self.sum_squares += x * x * bases;
    }

    pub fn add(&mut self, other: &SummaryStatistics) {
        if other.valid <= 0.0 {
            return;
        }
        self.valid += other.valid;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.sum_squares += other.sum_squares;
    }

    /// The share of these statistics that falls on `fraction` of the bases,
    /// assuming they are spread evenly. Extremes are kept.
    pub fn scaled(&self, fraction: f64) -> Self {
        Self {
            valid: self.valid * fraction,
            min: self.min,
            max: self.max,
            sum: self.sum * fraction,
            sum_squares: self.sum_squares * fraction,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.valid <= 0.0
    }

    pub fn mean(&self) -> f64 {
        self.sum / self.valid
    }

    pub fn variance(&self) -> f64 {
        let mean = self.mean();
        self.sum_squares / self.valid - mean * mean
    }

    /// Reads the 40 byte whole-file summary.
    pub fn read_total<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            valid: reader.read_u64::<LittleEndian>()? as f64,
            min: reader.read_f64::<LittleEndian>()?,
            max: reader.read_f64::<LittleEndian>()?,
            sum: reader.read_f64::<LittleEndian>()?,
            sum_squares: reader.read_f64::<LittleEndian>()?,
        })
    }

    pub fn write_total<W: Write>(&self, writer: &mut W) -> Result<()> {
        // An empty file stores zeros rather than infinite extremes.
        let (min, max) = if self.is_empty() {
            (0.0, 0.0)
        } else {
            (self.min, self.max)
        };
        writer.write_u64::<LittleEndian>(self.valid.round() as u64)?;
        writer.write_f64::<LittleEndian>(min)?;
        writer.write_f64::<LittleEndian>(max)?;
        writer.write_f64::<LittleEndian>(self.sum)?;
        writer.write_f64::<LittleEndian>(self.sum_squares)?;
        Ok(())
    }
}

/// Folds the statistics of one output bin into a single value.
pub type BinSummaryReducer = fn(&SummaryStatistics) -> f64;

pub fn bin_mean(s: &SummaryStatistics) -> f64 {
    s.mean()
}

/// Mean rounded to the nearest integer, for count-like tracks.
pub fn bin_discrete_mean(s: &SummaryStatistics) -> f64 {
    (s.mean() + 0.5).floor()
}

pub fn bin_max(s: &SummaryStatistics) -> f64 {
    s.max
}

pub fn bin_min(s: &SummaryStatistics) -> f64 {
    s.min
}

pub fn bin_variance(s: &SummaryStatistics) -> f64 {
    s.variance()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_by_bases() {
        let mut s = SummaryStatistics::from_value(2.0, 10.0);
        s.add(&SummaryStatistics::from_value(4.0, 30.0));
        s.add_value(f64::NAN, 5.0);
        assert_eq!(s.valid, 40.0);
        assert_eq!(bin_mean(&s), 3.5);
        assert_eq!(bin_min(&s), 2.0);
        assert_eq!(bin_max(&s), 4.0);
        assert!((bin_variance(&s) - 0.75).abs() < 1e-12);
        assert_eq!(bin_discrete_mean(&s), 4.0);
    }

    #[test]
    fn scaling_keeps_the_mean() {
        let s = SummaryStatistics::from_value(1.5, 8.0).scaled(0.25);
        assert_eq!(s.valid, 2.0);
        assert_eq!(s.mean(), 1.5);
    }

    #[test]
    fn total_summary_bytes() {
        let s = SummaryStatistics::from_value(-1.0, 3.0);
        let mut buf = Vec::new();
        s.write_total(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, TOTAL_SUMMARY_SIZE);
        assert_eq!(SummaryStatistics::read_total(&mut &buf[..]).unwrap(), s);
    }
}
