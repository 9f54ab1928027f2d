//! R-tree index over `(chromosome id, base)` locating data blocks.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use itertools::Itertools;
use std::io::{Read, Seek, Write};

use crate::cursor::{read_at, write_u64_at};
use crate::error::{BbiError, Result};

pub const INDEX_MAGIC: u32 = 0x2468_ACE0;
pub(crate) const RTREE_HEADER_SIZE: u64 = 48;
const MAX_DEPTH: usize = 64;

/// Region from `(start_chrom, start_base)` up to, excluding,
/// `(end_chrom, end_base)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RSpan {
    pub start_chrom: u32,
    pub start_base: u32,
    pub end_chrom: u32,
    pub end_base: u32,
}

impl RSpan {
    pub fn overlaps(&self, chrom_id: u32, from: u32, to: u32) -> bool {
        (chrom_id, from) < (self.end_chrom, self.end_base) && (self.start_chrom, self.start_base) < (chrom_id, to)
    }

    fn union(&self, other: &RSpan) -> RSpan {
        let start = (self.start_chrom, self.start_base).min((other.start_chrom, other.start_base));
        let end = (self.end_chrom, self.end_base).max((other.end_chrom, other.end_base));
        RSpan {
            start_chrom: start.0,
            start_base: start.1,
            end_chrom: end.0,
            end_base: end.1,
        }
    }

    fn read<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            start_chrom: reader.read_u32::<LittleEndian>()?,
            start_base: reader.read_u32::<LittleEndian>()?,
            end_chrom: reader.read_u32::<LittleEndian>()?,
            end_base: reader.read_u32::<LittleEndian>()?,
        })
    }

    fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.start_chrom)?;
        writer.write_u32::<LittleEndian>(self.start_base)?;
        writer.write_u32::<LittleEndian>(self.end_chrom)?;
        writer.write_u32::<LittleEndian>(self.end_base)?;
        Ok(())
    }
}

/// Location of one data block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafEntry {
    pub span: RSpan,
    pub data_offset: u64,
    pub data_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalEntry {
    pub span: RSpan,
    pub child_offset: u64,
    pub child: RNode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RNode {
    Leaf(Vec<LeafEntry>),
    Internal(Vec<InternalEntry>),
}

impl RNode {
    fn span(&self) -> RSpan {
        let spans: Vec<RSpan> = match self {
            RNode::Leaf(items) => items.iter().map(|e| e.span).collect(),
            RNode::Internal(items) => items.iter().map(|e| e.span).collect(),
        };
        spans.iter().skip(1).fold(spans.first().copied().unwrap_or_default(), |acc, s| acc.union(s))
    }

    fn search(&self, chrom_id: u32, from: u32, to: u32, out: &mut Vec<LeafEntry>) {
        match self {
            RNode::Leaf(items) => out.extend(items.iter().filter(|e| e.span.overlaps(chrom_id, from, to)).copied()),
            RNode::Internal(items) => {
                for entry in items.iter().filter(|e| e.span.overlaps(chrom_id, from, to)) {
                    entry.child.search(chrom_id, from, to, out);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RTree {
    pub block_size: u32,
    pub item_count: u64,
    pub span: RSpan,
    /// End of the data section the tree indexes
    pub end_file_offset: u64,
    pub items_per_slot: u32,
    pub root: RNode,
}

impl RTree {
    /// Reads the whole index starting at the current position.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let magic = reader.read_u32::<LittleEndian>()?;
        if magic != INDEX_MAGIC {
            return Err(BbiError::InvalidMagic {
                structure: "R-tree index",
                expected: INDEX_MAGIC,
                found: magic,
            }
            .into());
        }
        let block_size = reader.read_u32::<LittleEndian>()?;
        let item_count = reader.read_u64::<LittleEndian>()?;
        let span = RSpan::read(reader)?;
        let end_file_offset = reader.read_u64::<LittleEndian>()?;
        let items_per_slot = reader.read_u32::<LittleEndian>()?;
        reader.read_u32::<LittleEndian>()?; // reserved
        let root = read_node(reader, 0)?;
        log::debug!("R-tree index: {} blocks", item_count);
        Ok(Self {
            block_size,
            item_count,
            span,
            end_file_offset,
            items_per_slot,
            root,
        })
    }

    /// Leaf entries overlapping `[from, to)` on `chrom_id`, in file order.
    /// Subtrees whose span misses the interval are not descended.
    pub fn search(&self, chrom_id: u32, from: u32, to: u32) -> Vec<LeafEntry> {
        let mut out = Vec::new();
        if from < to {
            self.root.search(chrom_id, from, to, &mut out);
        }
        out
    }
}

fn read_node<R: Read + Seek>(reader: &mut R, depth: usize) -> Result<RNode> {
    if depth > MAX_DEPTH {
        return Err(BbiError::InvalidBlock("R-tree is too deep".into()).into());
    }
    let is_leaf = reader.read_u8()? != 0;
    reader.read_u8()?; // reserved
    let count = reader.read_u16::<LittleEndian>()?;
    if is_leaf {
        let items = (0..count)
            .map(|_| -> Result<_> {
                Ok(LeafEntry {
                    span: RSpan::read(reader)?,
                    data_offset: reader.read_u64::<LittleEndian>()?,
                    data_size: reader.read_u64::<LittleEndian>()?,
                })
            })
            .collect::<Result<_>>()?;
        Ok(RNode::Leaf(items))
    } else {
        let entries = (0..count)
            .map(|_| -> Result<_> { Ok((RSpan::read(reader)?, reader.read_u64::<LittleEndian>()?)) })
            .collect::<Result<Vec<_>>>()?;
        let mut items = Vec::with_capacity(entries.len());
        for (span, child_offset) in entries {
            let child = read_at(reader, child_offset, |r| read_node(r, depth + 1))?;
            items.push(InternalEntry {
                span,
                child_offset,
                child,
            });
        }
        Ok(RNode::Internal(items))
    }
}

/// Writes an index over `leaves`, which must be sorted by position, at the
/// current position. Nodes hold up to `block_size` children.
pub(crate) fn write_rtree<W: Write + Seek>(
    writer: &mut W,
    leaves: &[LeafEntry],
    block_size: u32,
    items_per_slot: u32,
    end_file_offset: u64,
) -> Result<()> {
    let block_size = block_size.clamp(2, u32::from(u16::MAX));
    let mut level: Vec<RNode> = leaves
        .chunks(block_size as usize)
        .map(|chunk| RNode::Leaf(chunk.to_vec()))
        .collect();
    if level.is_empty() {
        level.push(RNode::Leaf(Vec::new()));
    }
    while level.len() > 1 {
        level = level
            .into_iter()
            .chunks(block_size as usize)
            .into_iter()
            .map(|chunk| {
                RNode::Internal(
                    chunk
                        .map(|child| InternalEntry {
                            span: child.span(),
                            child_offset: 0,
                            child,
                        })
                        .collect(),
                )
            })
            .collect();
    }
    let root = level.pop().unwrap_or(RNode::Leaf(Vec::new()));

    writer.write_u32::<LittleEndian>(INDEX_MAGIC)?;
    writer.write_u32::<LittleEndian>(block_size)?;
    writer.write_u64::<LittleEndian>(leaves.len() as u64)?;
    root.span().write(writer)?;
    writer.write_u64::<LittleEndian>(end_file_offset)?;
    writer.write_u32::<LittleEndian>(items_per_slot)?;
    writer.write_u32::<LittleEndian>(0)?;
    write_node(writer, &root)
}

fn write_node<W: Write + Seek>(writer: &mut W, node: &RNode) -> Result<()> {
    match node {
        RNode::Leaf(items) => {
            writer.write_u8(1)?;
            writer.write_u8(0)?;
            writer.write_u16::<LittleEndian>(items.len() as u16)?;
            for entry in items {
                entry.span.write(writer)?;
                writer.write_u64::<LittleEndian>(entry.data_offset)?;
                writer.write_u64::<LittleEndian>(entry.data_size)?;
            }
        }
        RNode::Internal(items) => {
            writer.write_u8(0)?;
            writer.write_u8(0)?;
            writer.write_u16::<LittleEndian>(items.len() as u16)?;
            let mut slots = Vec::with_capacity(items.len());
            for entry in items {
                entry.span.write(writer)?;
                slots.push(writer.stream_position()?);
                writer.write_u64::<LittleEndian>(0)?;
            }
            for (entry, slot) in items.iter().zip(slots) {
                let offset = writer.stream_position()?;
                write_u64_at(writer, slot, offset)?;
                write_node(writer, &entry.child)?;
            }
        }
    }
    Ok(())
}
