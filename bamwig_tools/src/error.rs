use std::io;
use std::path::PathBuf;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top level error type. Format and bounds problems get their own variants so
/// callers can tell a malformed file apart from a failing disk.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Errors raised by the block-gzip container layer
    #[error("BGZF error: {0}")]
    Bgzf(#[from] BgzfError),

    /// Errors raised while decoding BAM headers and records
    #[error("BAM error: {0}")]
    Bam(#[from] BamError),

    /// Errors raised by the BigWig/BBI codec
    #[error("BBI error: {0}")]
    Bbi(#[from] BbiError),

    /// Errors related to the genome table
    #[error("Genome error: {0}")]
    Genome(#[from] GenomeError),

    /// Short reads, failed seeks and everything else coming from the OS
    #[error("I/O error: {0}")]
    Io(io::Error),

    /// Text fields that are not valid UTF-8
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Any of the above, annotated with the file it happened in
    #[error("{}: {source}", path.display())]
    File {
        /// Path of the file being processed
        path: PathBuf,
        /// Underlying error
        source: Box<Error>,
    },
}

impl Error {
    /// Attaches the file name to an error. Errors that already carry a path are
    /// returned unchanged.
    pub fn with_path<P: Into<PathBuf>>(self, path: P) -> Self {
        match self {
            Error::File { .. } => self,
            other => Error::File {
                path: path.into(),
                source: Box::new(other),
            },
        }
    }

    /// Wraps the error so it can travel through `std::io::Read`.
    pub(crate) fn into_io(self) -> io::Error {
        match self {
            Error::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }

    /// Returns true if the error was caused by reaching the end of the input.
    pub fn is_eof(&self) -> bool {
        match self {
            Error::Io(e) => e.kind() == io::ErrorKind::UnexpectedEof,
            Error::File { source, .. } => source.is_eof(),
            _ => false,
        }
    }
}

// Typed errors tunnelled through `io::Error` (see `Error::into_io`) are
// unwrapped again here.
impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        if e.get_ref().map_or(false, |inner| inner.is::<Error>()) {
            match e.into_inner().map(|inner| inner.downcast::<Error>()) {
                Some(Ok(inner)) => *inner,
                Some(Err(inner)) => Error::Io(io::Error::new(io::ErrorKind::InvalidData, inner)),
                None => Error::Io(io::Error::from(io::ErrorKind::InvalidData)),
            }
        } else {
            Error::Io(e)
        }
    }
}

/// Errors of the block-gzip container
#[derive(thiserror::Error, Debug)]
pub enum BgzfError {
    /// Gzip member header is not a BGZF header
    #[error("invalid BGZF header at offset {offset}: {reason}")]
    InvalidHeader {
        /// Compressed offset of the block
        offset: u64,
        /// What was wrong
        reason: String,
    },

    /// The stream ended inside a block
    #[error("BGZF stream truncated in block starting at offset {offset}")]
    Truncated {
        /// Compressed offset of the incomplete block
        offset: u64,
    },

    /// Inflated size or CRC32 does not match the block trailer
    #[error("BGZF block at offset {offset} is corrupt: {reason}")]
    Corrupt {
        /// Compressed offset of the block
        offset: u64,
        /// What was wrong
        reason: String,
    },

    /// Seek to a virtual position whose uncompressed offset lies past the block end
    #[error("virtual position {0:#x} points past the end of its block")]
    InvalidVirtualPosition(u64),
}

/// Errors specific to BAM decoding
#[derive(thiserror::Error, Debug)]
pub enum BamError {
    /// The first four bytes are not `BAM\1`
    #[error("invalid BAM magic number: {0:?}")]
    InvalidMagic([u8; 4]),

    /// Negative length in a header or record field
    #[error("invalid length {value} for field {field}")]
    InvalidLength {
        /// Field name
        field: &'static str,
        /// Value found
        value: i64,
    },

    /// The record parser consumed a different number of bytes than declared
    #[error("record declared {declared} bytes but {consumed} were consumed")]
    LengthMismatch {
        /// `block_size` of the record
        declared: usize,
        /// Bytes actually parsed
        consumed: usize,
    },

    /// A record field runs past the end of the record
    #[error("record field runs past the declared block size of {declared} bytes")]
    FieldOverrun {
        /// `block_size` of the record
        declared: usize,
    },

    /// CIGAR operation code outside `MIDNSHP=X`
    #[error("invalid CIGAR operation code {0}")]
    InvalidCigarOp(u32),

    /// Auxiliary field type code that is not part of the SAM specification
    #[error("unknown type code '{code}' for auxiliary tag {tag}")]
    UnknownAuxType {
        /// Two character tag
        tag: String,
        /// Offending type code
        code: char,
    },

    /// Reference id outside `-1..n_ref`, or `-1` where a mapped reference is required
    #[error("reference id {ref_id} out of range (n_ref = {n_ref})")]
    InvalidReferenceId {
        /// Reference id found in the record
        ref_id: i32,
        /// Number of references declared in the header
        n_ref: usize,
    },
}

/// Errors specific to the BBI container
#[derive(thiserror::Error, Debug)]
pub enum BbiError {
    /// One of the BBI magic numbers did not match
    #[error("invalid {structure} magic number: expected {expected:#010x}, found {found:#010x}")]
    InvalidMagic {
        /// Which structure was being read
        structure: &'static str,
        /// Magic the format requires
        expected: u32,
        /// Magic found in the file
        found: u32,
    },

    /// Data block type byte outside bedGraph/varStep/fixedStep
    #[error("unsupported data block type {0}")]
    InvalidBlockType(u8),

    /// Block payload does not match its header
    #[error("invalid data block: {0}")]
    InvalidBlock(String),

    /// Chromosome id found in a block or tree is not in the genome
    #[error("chromosome id {chrom_id} out of range (genome has {n_chrom} sequences)")]
    ChromIdOutOfRange {
        /// Offending id
        chrom_id: u32,
        /// Number of sequences in the genome
        n_chrom: usize,
    },

    /// Query names a sequence that is not in the file
    #[error("sequence {0} not found")]
    UnknownSequence(String),

    /// Query interval does not fit the sequence
    #[error("query {seqname}:{from}-{to} outside of sequence of length {length}")]
    QueryOutOfBounds {
        /// Sequence name
        seqname: String,
        /// Query start
        from: u64,
        /// Query end
        to: u64,
        /// Sequence length
        length: u64,
    },

    /// Writer was configured or fed inconsistently
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Errors of the genome table
#[derive(thiserror::Error, Debug)]
pub enum GenomeError {
    /// Sequence names must be unique
    #[error("sequence {0} already present in genome")]
    DuplicateSequence(String),
}
