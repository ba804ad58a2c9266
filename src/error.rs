/// Custom Result type for sffkit operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the sffkit library, encompassing all possible error cases
/// that can occur while decoding, classifying and writing flowgram files.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Errors related to common header processing
    HeaderError(#[from] HeaderError),
    /// Errors that occur while decoding read records
    ReadError(#[from] ReadError),
    /// Errors that occur while writing records
    WriteError(#[from] WriteError),
    /// Errors raised while loading an oligos file
    OligoError(#[from] OligoError),
    /// Errors raised while loading a group assignment file
    GroupError(#[from] GroupError),
    /// Errors raised while parsing a text dump
    TxtError(#[from] TxtError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
}
impl Error {
    /// Whether this error means the input is not a usable flowgram file at all
    #[must_use]
    pub fn is_fatal_format(&self) -> bool {
        matches!(self, Self::HeaderError(_))
    }
}

/// Errors specific to processing and validating the common file header
#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    /// The magic number in the header does not match the expected value
    ///
    /// # Arguments
    /// * `u32` - The invalid magic number that was found
    #[error("Magic number is not correct ({0}), not a valid .sff file")]
    InvalidMagicNumber(u32),

    /// The format version in the header is not supported
    ///
    /// # Arguments
    /// * `String` - The unsupported version code that was found
    #[error("Version {0} is not supported, only version 0001 is")]
    InvalidFormatVersion(String),

    /// Not enough bytes were available to hold the header
    ///
    /// # Arguments
    /// * First `usize` - The actual number of bytes provided
    /// * Second `usize` - The number of bytes the header requires
    #[error("Invalid number of bytes provided: {0}. Expected: {1}")]
    InvalidSize(usize, usize),
}

/// Errors that can occur while decoding read records
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// The file being read is not a regular file (e.g., it might be a directory or special file)
    #[error("File is not regular")]
    IncompatibleFile,

    /// The stream ended in the middle of a record
    #[error("Record at byte {offset} is truncated: needs {expected} bytes, found {available}")]
    TruncatedRecord {
        offset: usize,
        expected: usize,
        available: usize,
    },

    /// The input ended cleanly before the read count declared in the common header
    #[error("Input ended after {found} of {declared} reads")]
    MissingReads { declared: u32, found: u32 },

    /// A clip boundary points past the decoded bases or quality scores
    #[error("Your sff file may be corrupted! Sequence: {name}: {detail}")]
    ClipOutOfBounds { name: String, detail: String },
}

/// Errors that can occur while writing records
#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    /// No header was provided to a writer that must emit one
    #[error("Missing header in writer builder")]
    MissingHeader,

    /// A record does not carry one flow value per flow of the file
    ///
    /// # Arguments
    /// * First `usize` - The number of flow values in the record
    /// * Second `u16` - The number of flows declared by the header
    #[error("Record has {0} flow values but the file declares {1} flows")]
    FlowCountMismatch(usize, u16),
}

/// Errors raised while loading an oligos file
#[derive(thiserror::Error, Debug)]
pub enum OligoError {
    /// Paired barcodes or primers are listed, which splitting does not support
    #[error("Line {0}: paired barcodes and primers are not supported")]
    PairedUnsupported(usize),

    /// A directive is missing its sequence
    #[error("Line {0}: missing sequence for {1}")]
    MissingSequence(usize, String),

    /// The sequence contains characters that are not nucleotide codes
    #[error("Line {0}: invalid oligo sequence {1}")]
    InvalidSequence(usize, String),
}

/// Errors raised while loading a group assignment file
#[derive(thiserror::Error, Debug)]
pub enum GroupError {
    /// A line does not have both a read name and a group name
    #[error("Line {0}: expected a read name and a group name")]
    MalformedLine(usize),

    /// The same read is assigned twice
    #[error("Read {0} is assigned to more than one group")]
    DuplicateName(String),
}

/// Errors raised while parsing a text dump back into records
#[derive(thiserror::Error, Debug)]
pub enum TxtError {
    /// A `Key: value` line was expected but not found
    #[error("Line {0}: expected field {1}")]
    MissingField(usize, &'static str),

    /// A field value could not be parsed
    #[error("Line {0}: invalid value for {1}: {2}")]
    InvalidValue(usize, &'static str, String),

    /// The dump ended before the declared number of reads
    #[error("Expected {0} reads but reached end of file at read {1}")]
    UnexpectedEof(u32, u32),
}
