use super::header::{read_header, Header};
use super::pairs::PairedRecords;
use super::reads::{Reads, ReadsOptions};
use super::record::{ReaderOptions, Record, FIXED_FIELDS_SIZE};
use super::records::Records;
use crate::bgzf;
use crate::error::{BamError, Error, Result};
use crate::genome::Genome;
use byteorder::{ByteOrder, LittleEndian};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// BAM reader. Construction reads the header; records are then streamed in
/// file order and cannot be rewound.
pub struct Reader<R> {
    inner: R,
    header: Header,
    options: ReaderOptions,
    buf: Vec<u8>,
    path: Option<PathBuf>,
}

impl<R: Read> Reader<bgzf::Reader<R>> {
    /// Reads a BGZF compressed BAM stream.
    pub fn new(inner: R) -> Result<Self> {
        Reader::from_decompressed(bgzf::Reader::new(inner))
    }
}

impl Reader<bgzf::MultithreadedReader> {
    /// Reads a BGZF compressed BAM stream, inflating blocks on `thread_num`
    /// worker threads ahead of the decoder.
    pub fn with_readahead<R: Read + Send + 'static>(inner: R, thread_num: usize) -> Result<Self> {
        let thread_num = thread_num.min(num_cpus::get());
        Reader::from_decompressed(bgzf::MultithreadedReader::with_threads(thread_num, inner)?)
    }
}

impl Reader<bgzf::Reader<BufReader<File>>> {
    /// Opens a BAM file. Errors, including those of later reads, name the file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::from(e).with_path(path))?;
        let mut reader = Reader::new(BufReader::new(file)).map_err(|e| e.with_path(path))?;
        reader.path = Some(path.to_path_buf());
        Ok(reader)
    }
}

impl<R: Read> Reader<R> {
    /// Reads an already inflated BAM stream.
    pub fn from_decompressed(mut inner: R) -> Result<Self> {
        let header = read_header(&mut inner)?;
        Ok(Self {
            inner,
            header,
            options: ReaderOptions::default(),
            buf: Vec::new(),
            path: None,
        })
    }

    pub fn with_options(mut self, options: ReaderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut ReaderOptions {
        &mut self.options
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// References declared in the header, in declaration order
    pub fn genome(&self) -> &Genome {
        &self.header.genome
    }

    /// Plain SAM header text
    pub fn text(&self) -> &str {
        &self.header.text
    }

    /// Reads the next record into `record`. Returns `Ok(false)` at the end
    /// of the stream.
    pub fn read_record(&mut self, record: &mut Record) -> Result<bool> {
        self.read_record_inner(record).map_err(|e| match &self.path {
            Some(path) => e.with_path(path),
            None => e,
        })
    }

    fn read_record_inner(&mut self, record: &mut Record) -> Result<bool> {
        let block_size = match self.read_block_size()? {
            Some(bs) => bs,
            None => return Ok(false),
        };
        self.buf.resize(block_size, 0);
        self.inner.read_exact(&mut self.buf)?;
        record.decode_into(&self.buf, &self.options, self.header.genome.len())?;
        Ok(true)
    }

    // `None` at a clean end of stream. A partial length is an error.
    fn read_block_size(&mut self) -> Result<Option<usize>> {
        let mut bytes = [0; 4];
        let mut filled = 0;
        while filled < bytes.len() {
            match self.inner.read(&mut bytes[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        let block_size = LittleEndian::read_i32(&bytes);
        if block_size < FIXED_FIELDS_SIZE as i32 {
            return Err(BamError::InvalidLength {
                field: "block_size",
                value: i64::from(block_size),
            }
            .into());
        }
        Ok(Some(block_size as usize))
    }

    /// Lazily decoded single-end records
    pub fn records(&mut self) -> Records<'_, R> {
        Records::new(self)
    }

    /// Mate pairs matched by read name. Forces read name decoding on. Paired
    /// records without a reference are errors.
    pub fn paired_records(&mut self) -> PairedRecords<'_, R> {
        self.options.read_name = true;
        let n_ref = self.header.genome.len();
        PairedRecords::new(self.records(), n_ref)
    }

    /// Aligned fragments on the reference, see [`ReadsOptions`].
    pub fn reads(&mut self, options: ReadsOptions) -> Reads<'_, R> {
        self.options.read_cigar = true;
        Reads::new(self, options)
    }

    /// Consumes the reader, releasing the underlying stream.
    pub fn close(self) {}
}

/// Reads only the header of a BAM stream and returns its references.
pub fn read_genome<R: Read>(reader: R) -> Result<Genome> {
    Ok(Reader::new(reader)?.header.genome)
}

/// Reads the references of a BAM file.
pub fn import_genome<P: AsRef<Path>>(path: P) -> Result<Genome> {
    Ok(Reader::open(path)?.header.genome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bam::record::tests::{bam_bytes, RecordBuilder};

    #[test]
    fn reuses_record_buffer() {
        let records = vec![
            RecordBuilder { name: "a", pos: 5, ..Default::default() }.build(),
            RecordBuilder { name: "b", pos: 9, ..Default::default() }.build(),
        ];
        let data = bam_bytes(&[("chr1", 1000)], &records);
        let mut reader = Reader::new(&data[..]).unwrap();
        let mut record = Record::default();
        assert!(reader.read_record(&mut record).unwrap());
        assert_eq!(record.read_name, "a");
        assert!(reader.read_record(&mut record).unwrap());
        assert_eq!((record.read_name.as_str(), record.pos), ("b", 9));
        assert!(!reader.read_record(&mut record).unwrap());
    }

    #[test]
    fn tiny_block_size_is_rejected() {
        let data = bam_bytes(&[("chr1", 1000)], &[vec![0; 8]]);
        let mut reader = Reader::new(&data[..]).unwrap();
        assert!(matches!(
            reader.read_record(&mut Record::default()),
            Err(Error::Bam(BamError::InvalidLength { field: "block_size", value: 8 }))
        ));
    }

    #[test]
    fn open_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.bam");
        std::fs::write(&path, bgzf::Writer::new(Vec::new()).finish().unwrap()).unwrap();
        let err = Reader::open(&path).err().unwrap();
        assert!(err.to_string().contains("broken.bam"));
        assert!(err.is_eof());
    }

    #[test]
    fn genome_only() {
        let data = bam_bytes(&[("chr1", 10), ("chr2", 20)], &[]);
        let genome = read_genome(&data[..]).unwrap();
        assert_eq!(genome.len(), 2);
        assert_eq!(genome.seq_length("chr2"), Some(20));
    }
}
