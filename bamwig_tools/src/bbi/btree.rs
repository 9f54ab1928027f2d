//! Chromosome B+tree mapping sequence names to ids and lengths.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use itertools::Itertools;
use std::io::{Read, Seek, Write};

use crate::cursor::{read_at, write_u64_at, ReadBytesExtra};
use crate::error::{BbiError, Result};
use crate::genome::Genome;

pub const CHROM_TREE_MAGIC: u32 = 0x78CA_8C91;
const MAX_DEPTH: usize = 64;

/// A node of the B+tree. Leaves hold `(key, value)`, internal nodes hold
/// `(key, child offset, child)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BNode {
    Leaf(Vec<(Vec<u8>, Vec<u8>)>),
    Internal(Vec<(Vec<u8>, u64, BNode)>),
}

impl BNode {
    fn first_key(&self) -> &[u8] {
        match self {
            BNode::Leaf(items) => items.first().map_or(&[][..], |(k, _)| k),
            BNode::Internal(items) => items.first().map_or(&[][..], |(k, _, _)| k),
        }
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<(&'a [u8], &'a [u8])>) {
        match self {
            BNode::Leaf(items) => out.extend(items.iter().map(|(k, v)| (&k[..], &v[..]))),
            BNode::Internal(items) => {
                for (_, _, child) in items {
                    child.collect_leaves(out);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BTree {
    pub block_size: u32,
    pub key_size: u32,
    pub value_size: u32,
    pub item_count: u64,
    pub root: BNode,
}

impl BTree {
    /// Reads the tree starting at the current position. Children are read
    /// with positioned reads, leaving the stream right after the root node.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let magic = reader.read_u32::<LittleEndian>()?;
        if magic != CHROM_TREE_MAGIC {
            return Err(BbiError::InvalidMagic {
                structure: "chromosome tree",
                expected: CHROM_TREE_MAGIC,
                found: magic,
            }
            .into());
        }
        let block_size = reader.read_u32::<LittleEndian>()?;
        let key_size = reader.read_u32::<LittleEndian>()?;
        let value_size = reader.read_u32::<LittleEndian>()?;
        let item_count = reader.read_u64::<LittleEndian>()?;
        reader.read_u64::<LittleEndian>()?; // reserved
        let root = read_node(reader, key_size as usize, value_size as usize, 0)?;
        Ok(Self {
            block_size,
            key_size,
            value_size,
            item_count,
            root,
        })
    }

    /// All `(key, value)` pairs in key order
    pub fn leaves(&self) -> Vec<(&[u8], &[u8])> {
        let mut out = Vec::new();
        self.root.collect_leaves(&mut out);
        out
    }

    /// Genome ordered by chromosome id, whatever the key order of the tree.
    pub fn genome(&self) -> Result<Genome> {
        if self.value_size < 8 {
            return Err(BbiError::InvalidBlock(format!(
                "chromosome tree values of {} bytes cannot hold id and length",
                self.value_size
            ))
            .into());
        }
        let leaves = self.leaves();
        let n_chrom = leaves.len();
        let mut slots: Vec<Option<(String, u64)>> = vec![None; n_chrom];
        for (key, mut value) in leaves {
            let chrom_id = value.read_u32::<LittleEndian>()?;
            let length = value.read_u32::<LittleEndian>()?;
            let end = key.iter().position(|&b| b == 0).unwrap_or(key.len());
            let name = String::from_utf8(key[..end].to_vec())?;
            let slot = slots
                .get_mut(chrom_id as usize)
                .ok_or(BbiError::ChromIdOutOfRange { chrom_id, n_chrom })?;
            if slot.is_some() {
                return Err(BbiError::InvalidBlock(format!("chromosome id {} used twice", chrom_id)).into());
            }
            *slot = Some((name, u64::from(length)));
        }
        let mut genome = Genome::new();
        for (name, length) in slots.into_iter().flatten() {
            genome.add_sequence(name, length)?;
        }
        log::debug!("chromosome tree: {} sequences", genome.len());
        Ok(genome)
    }
}

fn read_node<R: Read + Seek>(reader: &mut R, key_size: usize, value_size: usize, depth: usize) -> Result<BNode> {
    if depth > MAX_DEPTH {
        return Err(BbiError::InvalidBlock("chromosome tree is too deep".into()).into());
    }
    let is_leaf = reader.read_u8()? != 0;
    reader.read_u8()?; // reserved
    let count = reader.read_u16::<LittleEndian>()?;
    if is_leaf {
        let items = (0..count)
            .map(|_| -> Result<_> { Ok((reader.read_bytes(key_size)?, reader.read_bytes(value_size)?)) })
            .collect::<Result<_>>()?;
        Ok(BNode::Leaf(items))
    } else {
        let entries = (0..count)
            .map(|_| -> Result<_> { Ok((reader.read_bytes(key_size)?, reader.read_u64::<LittleEndian>()?)) })
            .collect::<Result<Vec<_>>>()?;
        let mut items = Vec::with_capacity(entries.len());
        for (key, offset) in entries {
            let child = read_at(reader, offset, |r| read_node(r, key_size, value_size, depth + 1))?;
            items.push((key, offset, child));
        }
        Ok(BNode::Internal(items))
    }
}

/// Writes the chromosome tree for `genome` at the current position. Keys are
/// the sequence names sorted bytewise and zero padded to the longest name;
/// values are the chromosome id and length.
pub(crate) fn write_chrom_tree<W: Write + Seek>(writer: &mut W, genome: &Genome, block_size: u32) -> Result<()> {
    let key_size = genome.seqnames().iter().map(String::len).max().unwrap_or(0).max(1);
    let leaves = genome
        .iter()
        .enumerate()
        .sorted_by(|(_, (a, _)), (_, (b, _))| a.as_bytes().cmp(b.as_bytes()))
        .map(|(id, (name, length))| -> Result<_> {
            let mut key = name.as_bytes().to_vec();
            key.resize(key_size, 0);
            let length = u32::try_from(length)
                .map_err(|_| BbiError::InvalidParameter(format!("sequence {} is too long", name)))?;
            let mut value = Vec::with_capacity(8);
            value.write_u32::<LittleEndian>(id as u32)?;
            value.write_u32::<LittleEndian>(length)?;
            Ok((key, value))
        })
        .collect::<Result<Vec<_>>>()?;

    let item_count = leaves.len() as u64;
    let block_size = block_size.clamp(1, u32::from(u16::MAX)).min(leaves.len().max(1) as u32);

    let mut level: Vec<BNode> = leaves
        .chunks(block_size as usize)
        .map(|chunk| BNode::Leaf(chunk.to_vec()))
        .collect();
    if level.is_empty() {
        level.push(BNode::Leaf(Vec::new()));
    }
    while level.len() > 1 {
        level = level
            .into_iter()
            .chunks(block_size as usize)
            .into_iter()
            .map(|chunk| BNode::Internal(chunk.map(|node| (node.first_key().to_vec(), 0, node)).collect()))
            .collect();
    }

    writer.write_u32::<LittleEndian>(CHROM_TREE_MAGIC)?;
    writer.write_u32::<LittleEndian>(block_size)?;
    writer.write_u32::<LittleEndian>(key_size as u32)?;
    writer.write_u32::<LittleEndian>(8)?;
    writer.write_u64::<LittleEndian>(item_count)?;
    writer.write_u64::<LittleEndian>(0)?;
    if let Some(root) = level.pop() {
        write_node(writer, &root)?;
    }
    Ok(())
}

fn write_node<W: Write + Seek>(writer: &mut W, node: &BNode) -> Result<()> {
    match node {
        BNode::Leaf(items) => {
            writer.write_u8(1)?;
            writer.write_u8(0)?;
            writer.write_u16::<LittleEndian>(items.len() as u16)?;
            for (key, value) in items {
                writer.write_all(key)?;
                writer.write_all(value)?;
            }
        }
        BNode::Internal(items) => {
            writer.write_u8(0)?;
            writer.write_u8(0)?;
            writer.write_u16::<LittleEndian>(items.len() as u16)?;
            let mut slots = Vec::with_capacity(items.len());
            for (key, _, _) in items {
                writer.write_all(key)?;
                slots.push(writer.stream_position()?);
                writer.write_u64::<LittleEndian>(0)?;
            }
            for ((_, _, child), slot) in items.iter().zip(slots) {
                let offset = writer.stream_position()?;
                write_u64_at(writer, slot, offset)?;
                write_node(writer, child)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, SeekFrom};

    fn genome(names: &[(&str, u64)]) -> Genome {
        names.iter().map(|&(n, l)| (n.to_string(), l)).collect()
    }

    #[test]
    fn single_leaf() {
        let g = genome(&[("chr2", 200), ("chr1", 100)]);
        let mut cursor = Cursor::new(Vec::new());
        write_chrom_tree(&mut cursor, &g, 256).unwrap();
        cursor.seek(SeekFrom::Start(0)).unwrap();
        let tree = BTree::read(&mut cursor).unwrap();
        assert_eq!(tree.key_size, 4);
        assert_eq!(tree.item_count, 2);
        // Keys are sorted, the genome keeps id order.
        assert_eq!(tree.leaves()[0].0, b"chr1");
        assert_eq!(tree.genome().unwrap(), g);
    }

    #[test]
    fn multi_level_tree() {
        let g: Genome = (0..10).map(|i| (format!("s{}", 9 - i), 1000 + i as u64)).collect();
        let mut cursor = Cursor::new(vec![0xaa; 7]);
        cursor.seek(SeekFrom::End(0)).unwrap();
        write_chrom_tree(&mut cursor, &g, 3).unwrap();
        cursor.seek(SeekFrom::Start(7)).unwrap();
        let tree = BTree::read(&mut cursor).unwrap();
        match &tree.root {
            BNode::Internal(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(items[0].2, BNode::Internal(_)));
            }
            BNode::Leaf(_) => panic!("expected an internal root"),
        }
        let keys: Vec<_> = tree.leaves().iter().map(|(k, _)| k.to_vec()).collect();
        assert_eq!(keys.len(), 10);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(tree.genome().unwrap(), g);
    }

    #[test]
    fn keys_are_zero_padded() {
        let g = genome(&[("chrX", 5), ("chr10", 6)]);
        let mut cursor = Cursor::new(Vec::new());
        write_chrom_tree(&mut cursor, &g, 4).unwrap();
        cursor.set_position(0);
        let tree = BTree::read(&mut cursor).unwrap();
        assert_eq!(tree.leaves()[1].0, b"chrX\0");
        assert_eq!(tree.genome().unwrap().seqnames(), &["chrX".to_string(), "chr10".to_string()]);
    }

    #[test]
    fn bad_magic() {
        let mut cursor = Cursor::new(vec![0u8; 32]);
        assert!(BTree::read(&mut cursor).is_err());
    }
}
