use std::collections::HashMap;

use crate::error::{GenomeError, Result};

/// Ordered table of sequence names and lengths.
///
/// Indices are assigned in insertion order and never change, which lets
/// decoded records refer to their sequence by index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Genome {
    seqnames: Vec<String>,
    lengths: Vec<u64>,
    index: HashMap<String, usize>,
}

impl Genome {
    /// Empty genome
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sequence and returns its index.
    pub fn add_sequence<S: Into<String>>(&mut self, seqname: S, length: u64) -> Result<usize> {
        let seqname = seqname.into();
        if self.index.contains_key(&seqname) {
            return Err(GenomeError::DuplicateSequence(seqname).into());
        }
        let idx = self.seqnames.len();
        self.index.insert(seqname.clone(), idx);
        self.seqnames.push(seqname);
        self.lengths.push(length);
        Ok(idx)
    }

    /// Index of a sequence by name
    pub fn get_idx(&self, seqname: &str) -> Option<usize> {
        self.index.get(seqname).copied()
    }

    /// Name of the sequence at `idx`
    pub fn seqname(&self, idx: usize) -> Option<&str> {
        self.seqnames.get(idx).map(String::as_str)
    }

    /// Length of the sequence at `idx`
    pub fn length(&self, idx: usize) -> Option<u64> {
        self.lengths.get(idx).copied()
    }

    /// Length of a sequence by name
    pub fn seq_length(&self, seqname: &str) -> Option<u64> {
        self.get_idx(seqname).map(|i| self.lengths[i])
    }

    /// All sequence names in index order
    pub fn seqnames(&self) -> &[String] {
        &self.seqnames
    }

    pub fn len(&self) -> usize {
        self.seqnames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqnames.is_empty()
    }

    /// Iterates over `(name, length)` in index order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.seqnames
            .iter()
            .map(String::as_str)
            .zip(self.lengths.iter().copied())
    }
}

impl FromIterator<(String, u64)> for Genome {
    /// Later duplicates are dropped.
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut genome = Genome::new();
        for (name, length) in iter {
            let _ = genome.add_sequence(name, length);
        }
        genome
    }
}
