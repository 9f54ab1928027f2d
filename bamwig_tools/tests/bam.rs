use bamwig_tools::bam::{self, AuxValue, ReadsOptions, Reader, Record};
use bamwig_tools::bgzf;
use bamwig_tools::{BamError, Error};
use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const PAIRED: u16 = 0x1;
const PROPER: u16 = 0x2;
const REVERSE: u16 = 0x10;
const READ1: u16 = 0x40;
const READ2: u16 = 0x80;

struct Alignment {
    ref_id: i32,
    pos: i32,
    flag: u16,
    name: String,
    cigar: Vec<u32>,
    seq: &'static str,
}

impl Alignment {
    fn new(name: &str, ref_id: i32, pos: i32, flag: u16) -> Self {
        Self {
            ref_id,
            pos,
            flag,
            name: name.to_string(),
            cigar: vec![(50 << 4) | 0],
            seq: "ACGTNACGTA",
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_i32::<LittleEndian>(self.ref_id).unwrap();
        buf.write_i32::<LittleEndian>(self.pos).unwrap();
        buf.write_u8(self.name.len() as u8 + 1).unwrap();
        buf.write_u8(42).unwrap();
        buf.write_u16::<LittleEndian>(bam::reg2bin(i64::from(self.pos), i64::from(self.pos) + 50)).unwrap();
        buf.write_u16::<LittleEndian>(self.cigar.len() as u16).unwrap();
        buf.write_u16::<LittleEndian>(self.flag).unwrap();
        buf.write_i32::<LittleEndian>(self.seq.len() as i32).unwrap();
        buf.write_i32::<LittleEndian>(-1).unwrap();
        buf.write_i32::<LittleEndian>(-1).unwrap();
        buf.write_i32::<LittleEndian>(0).unwrap();
        buf.extend_from_slice(self.name.as_bytes());
        buf.push(0);
        for op in &self.cigar {
            buf.write_u32::<LittleEndian>(*op).unwrap();
        }
        buf.extend_from_slice(&bam::sequence::encode(self.seq));
        buf.extend(std::iter::repeat(20).take(self.seq.len()));
        buf.extend_from_slice(b"NMC\x03");
        buf
    }
}

fn write_bam(path: &Path, refs: &[(&str, i32)], alignments: &[Alignment]) {
    let mut raw = b"BAM\x01".to_vec();
    let text = "@HD\tVN:1.6\tSO:unsorted\n";
    raw.write_i32::<LittleEndian>(text.len() as i32).unwrap();
    raw.extend_from_slice(text.as_bytes());
    raw.write_i32::<LittleEndian>(refs.len() as i32).unwrap();
    for (name, length) in refs {
        raw.write_i32::<LittleEndian>(name.len() as i32 + 1).unwrap();
        raw.extend_from_slice(name.as_bytes());
        raw.push(0);
        raw.write_i32::<LittleEndian>(*length).unwrap();
    }
    for alignment in alignments {
        let record = alignment.encode();
        raw.write_i32::<LittleEndian>(record.len() as i32).unwrap();
        raw.extend_from_slice(&record);
    }
    let mut writer = bgzf::Writer::new(File::create(path).unwrap());
    // Several flushes give several BGZF blocks.
    for chunk in raw.chunks(300) {
        writer.write_all(chunk).unwrap();
        writer.flush().unwrap();
    }
    writer.finish().unwrap();
}

fn alignments() -> Vec<Alignment> {
    let mut out = Vec::new();
    for i in 0..200 {
        let name = format!("frag{}", i);
        let ref_id = i % 2;
        out.push(Alignment::new(&name, ref_id, 1_000 + i * 10, PAIRED | PROPER | READ1));
        out.push(Alignment::new(&name, ref_id, 1_200 + i * 10, PAIRED | PROPER | READ2 | REVERSE));
    }
    out.push(Alignment::new("single", 1, 5, 0));
    out.push(Alignment::new("lonely", 0, 7, PAIRED | PROPER | READ1));
    out
}

#[test]
fn records_through_bgzf() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reads.bam");
    write_bam(&path, &[("chr1", 100_000), ("chr2", 50_000)], &alignments());

    let mut reader = Reader::open(&path).unwrap();
    assert!(reader.text().starts_with("@HD"));
    assert_eq!(reader.genome().seqnames(), &["chr1".to_string(), "chr2".to_string()]);

    let records: Vec<Record> = reader.records().collect::<Result<_, _>>().unwrap();
    assert_eq!(records.len(), 402);
    assert_eq!(records[3].read_name, "frag1");
    assert_eq!(records[3].ref_id, 1);
    assert_eq!(records[3].cigar.to_string(), "50M");
    assert_eq!(records[3].seq, "ACGTNACGTA");
    assert_eq!(records[3].aux(b"NM"), Some(&AuxValue::UInt8(3)));
    assert_eq!(records[3].alignment_end(), 1_260);
}

#[test]
fn readahead_matches_single_threaded_reader() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reads.bam");
    write_bam(&path, &[("chr1", 100_000), ("chr2", 50_000)], &alignments());

    let mut plain = Reader::open(&path).unwrap();
    let expected: Vec<Record> = plain.records().collect::<Result<_, _>>().unwrap();

    let mut threaded = Reader::with_readahead(File::open(&path).unwrap(), 4).unwrap();
    let found: Vec<Record> = threaded.records().collect::<Result<_, _>>().unwrap();
    assert_eq!(found, expected);
}

#[test]
fn joined_pairs_and_orphans() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pairs.bam");
    write_bam(&path, &[("chr1", 100_000), ("chr2", 50_000)], &alignments());

    let mut reader = Reader::open(&path).unwrap();
    let options = ReadsOptions {
        join_pairs: true,
        paired_end_strand_specific: true,
    };
    let mut reads = reader.reads(options);
    let fragments: Vec<_> = reads.by_ref().collect::<Result<_, _>>().unwrap();
    assert_eq!(fragments.len(), 200);
    assert_eq!(reads.orphan_count(), Some(1));
    let f = &fragments[7];
    assert_eq!(f.seqname, "chr2");
    assert_eq!((f.from, f.to), (1_070, 1_320));
    assert_eq!(f.strand, '-');

    let mut reader = Reader::open(&path).unwrap();
    let singles = reader.reads(ReadsOptions::default()).count();
    assert_eq!(singles, 402);
}

#[test]
fn genome_import_and_errors_name_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("genome.bam");
    write_bam(&path, &[("chrM", 16_569)], &[]);
    let genome = bam::import_genome(&path).unwrap();
    assert_eq!(genome.seq_length("chrM"), Some(16_569));

    let bad = dir.path().join("bad.bam");
    let mut writer = bgzf::Writer::new(File::create(&bad).unwrap());
    writer.write_all(b"BAI\x01").unwrap();
    writer.finish().unwrap();
    let err = Reader::open(&bad).err().unwrap();
    assert!(err.to_string().contains("bad.bam"));
    match err {
        Error::File { source, .. } => assert!(matches!(*source, Error::Bam(BamError::InvalidMagic(_)))),
        other => panic!("unexpected error {:?}", other),
    }
}
