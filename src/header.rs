//! Common header module for flowgram files
//!
//! Every flowgram file starts with a single common header describing the run: how many
//! reads follow, how many flows each read carries, the nucleotide flowed at each position
//! and the key sequence prefixed to every read. The header is variable length (the flow
//! characters and key are stored inline) and is padded with zeros to an 8-byte boundary.
//!
//! All multi-byte integers are big-endian.

use byteorder::{BigEndian, ByteOrder};
use std::io::{Read, Write};

use crate::error::{HeaderError, Result};
use crate::utils::{padded, write_padding};

/// Magic number: ".sff" in ASCII (in big-endian byte order)
///
/// This is used to identify flowgram files and verify file integrity.
#[allow(clippy::unreadable_literal)]
pub const MAGIC: u32 = 0x2E736666;

/// The only supported format version, stored as four raw digit bytes
pub const VERSION: [u8; 4] = [0, 0, 0, 1];

/// Flowgram format code written by instruments (unsigned 16-bit intensities)
pub const FLOWGRAM_FORMAT: u8 = 1;

/// Size of the fixed portion of the common header in bytes
///
/// The flow characters and key sequence follow directly after these bytes.
pub const SIZE_FIXED: usize = 31;

/// Common header of a flowgram file
///
/// The index fields are opaque and passed through untouched, except when a header is
/// synthesized for a split output file (see [`CommonHeader::for_split`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonHeader {
    /// Magic number to identify the file format
    ///
    /// 4 bytes
    pub magic: u32,

    /// Version of the file format
    ///
    /// 4 bytes
    pub version: [u8; 4],

    /// Offset of the optional index section
    ///
    /// 8 bytes
    pub index_offset: u64,

    /// Length of the optional index section
    ///
    /// 4 bytes
    pub index_length: u32,

    /// Number of reads stored in the file
    ///
    /// 4 bytes
    pub num_reads: u32,

    /// Length of the header including padding, as recorded in the file
    ///
    /// 2 bytes
    pub header_length: u16,

    /// Length of the key sequence
    ///
    /// 2 bytes
    pub key_length: u16,

    /// Number of flow values per read
    ///
    /// 2 bytes
    pub num_flows: u16,

    /// Flowgram format code
    ///
    /// 1 byte
    pub flowgram_format: u8,

    /// Nucleotide flowed at each position
    ///
    /// `num_flows` bytes
    pub flow_chars: Vec<u8>,

    /// Key sequence prefixed to every read
    ///
    /// `key_length` bytes
    pub key_sequence: Vec<u8>,
}
impl CommonHeader {
    /// Creates a header for a new file with zero reads and no index
    ///
    /// # Arguments
    ///
    /// * `flow_chars` - The nucleotide flowed at each flow position
    /// * `key_sequence` - The key sequence prefixed to every read
    #[must_use]
    pub fn new(flow_chars: &[u8], key_sequence: &[u8]) -> Self {
        let mut header = Self {
            magic: MAGIC,
            version: VERSION,
            index_offset: 0,
            index_length: 0,
            num_reads: 0,
            header_length: 0,
            key_length: key_sequence.len() as u16,
            num_flows: flow_chars.len() as u16,
            flowgram_format: FLOWGRAM_FORMAT,
            flow_chars: flow_chars.to_vec(),
            key_sequence: key_sequence.to_vec(),
        };
        header.header_length = header.size() as u16;
        header
    }

    /// Number of bytes the header occupies on disk, padding included
    ///
    /// Records begin at this offset.
    #[must_use]
    pub fn size(&self) -> usize {
        padded(SIZE_FIXED + self.num_flows as usize + self.key_length as usize)
    }

    /// Version rendered the way it is shown to users (`"0001"`)
    #[must_use]
    pub fn version_string(&self) -> String {
        self.version.iter().map(u8::to_string).collect()
    }

    /// Sets the number of reads recorded in the header
    pub fn set_num_reads(&mut self, num_reads: u32) {
        self.num_reads = num_reads;
    }

    /// Synthesizes the header of a split output file holding `count` reads
    ///
    /// The flow and key metadata are copied verbatim, the index is dropped since it does
    /// not describe the split file, and the read count is replaced.
    #[must_use]
    pub fn for_split(&self, count: u32) -> Self {
        Self {
            index_offset: 0,
            index_length: 0,
            num_reads: count,
            ..self.clone()
        }
    }

    /// Validates the magic number and version of the fixed header portion
    fn validate(buffer: &[u8]) -> Result<()> {
        let magic = BigEndian::read_u32(&buffer[0..4]);
        if magic != MAGIC {
            return Err(HeaderError::InvalidMagicNumber(magic).into());
        }
        if buffer[4..8] != VERSION {
            let version: String = buffer[4..8].iter().map(u8::to_string).collect();
            return Err(HeaderError::InvalidFormatVersion(version).into());
        }
        Ok(())
    }

    /// Parses a header from the start of a buffer
    ///
    /// The buffer may be larger than the header, as is the case for a memory-mapped
    /// file. Use [`CommonHeader::size`] to locate the first record.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The buffer is too small to hold the header
    /// * The magic number is incorrect
    /// * The format version is unsupported
    pub fn from_buffer(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < SIZE_FIXED {
            return Err(HeaderError::InvalidSize(buffer.len(), SIZE_FIXED).into());
        }
        Self::validate(buffer)?;
        let mut header = Self::from_fixed(buffer);
        let num_flows = header.num_flows as usize;
        let key_length = header.key_length as usize;
        let required = SIZE_FIXED + num_flows + key_length;
        if buffer.len() < required {
            return Err(HeaderError::InvalidSize(buffer.len(), required).into());
        }
        header.flow_chars = buffer[SIZE_FIXED..SIZE_FIXED + num_flows].to_vec();
        header.key_sequence = buffer[SIZE_FIXED + num_flows..required].to_vec();
        Ok(header)
    }

    /// Reads a header from a forward-only reader, consuming its trailing padding
    ///
    /// After this call the reader is positioned at the first record.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or if the header data is invalid
    /// (see [`CommonHeader::from_buffer`]).
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut fixed = [0u8; SIZE_FIXED];
        reader.read_exact(&mut fixed)?;
        Self::validate(&fixed)?;
        let mut header = Self::from_fixed(&fixed);

        let mut rest = vec![0u8; header.size() - SIZE_FIXED];
        reader.read_exact(&mut rest)?;
        let num_flows = header.num_flows as usize;
        let key_length = header.key_length as usize;
        header.flow_chars = rest[..num_flows].to_vec();
        header.key_sequence = rest[num_flows..num_flows + key_length].to_vec();
        Ok(header)
    }

    /// Decodes the fixed fields, leaving the variable fields empty
    fn from_fixed(buffer: &[u8]) -> Self {
        let mut version = [0u8; 4];
        version.copy_from_slice(&buffer[4..8]);
        Self {
            magic: BigEndian::read_u32(&buffer[0..4]),
            version,
            index_offset: BigEndian::read_u64(&buffer[8..16]),
            index_length: BigEndian::read_u32(&buffer[16..20]),
            num_reads: BigEndian::read_u32(&buffer[20..24]),
            header_length: BigEndian::read_u16(&buffer[24..26]),
            key_length: BigEndian::read_u16(&buffer[26..28]),
            num_flows: BigEndian::read_u16(&buffer[28..30]),
            flowgram_format: buffer[30],
            flow_chars: Vec::new(),
            key_sequence: Vec::new(),
        }
    }

    /// Writes the header, followed by its zero padding, to a writer
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the writer fails (typically an I/O error).
    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut buffer = [0u8; SIZE_FIXED];
        BigEndian::write_u32(&mut buffer[0..4], self.magic);
        buffer[4..8].copy_from_slice(&self.version);
        BigEndian::write_u64(&mut buffer[8..16], self.index_offset);
        BigEndian::write_u32(&mut buffer[16..20], self.index_length);
        BigEndian::write_u32(&mut buffer[20..24], self.num_reads);
        BigEndian::write_u16(&mut buffer[24..26], self.header_length);
        BigEndian::write_u16(&mut buffer[26..28], self.key_length);
        BigEndian::write_u16(&mut buffer[28..30], self.num_flows);
        buffer[30] = self.flowgram_format;
        writer.write_all(&buffer)?;
        writer.write_all(&self.flow_chars)?;
        writer.write_all(&self.key_sequence)?;
        write_padding(
            writer,
            SIZE_FIXED + self.flow_chars.len() + self.key_sequence.len(),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::Error;
    use std::io::Cursor;

    fn example() -> CommonHeader {
        CommonHeader::new(&b"TACG".repeat(100), b"TCAG")
    }

    #[test]
    fn test_header_size() {
        let header = example();
        assert_eq!(header.size(), 440);
        assert_eq!(header.header_length, 440);
        assert_eq!(header.version_string(), "0001");
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let mut header = example();
        header.index_offset = 123_456;
        header.index_length = 789;
        header.set_num_reads(42);

        let mut buf = Vec::new();
        header.write_bytes(&mut buf)?;
        assert_eq!(buf.len(), header.size());

        let from_buffer = CommonHeader::from_buffer(&buf)?;
        let from_reader = CommonHeader::from_reader(&mut Cursor::new(&buf))?;
        assert_eq!(from_buffer, header);
        assert_eq!(from_reader, header);
        Ok(())
    }

    #[test]
    fn test_reader_stops_at_first_record() -> Result<()> {
        let header = CommonHeader::new(b"TACGT", b"TCAG");
        let mut buf = Vec::new();
        header.write_bytes(&mut buf)?;
        buf.extend_from_slice(b"record");

        let mut cursor = Cursor::new(&buf);
        CommonHeader::from_reader(&mut cursor)?;
        assert_eq!(cursor.position() as usize, header.size());
        Ok(())
    }

    #[test]
    fn test_bad_magic() -> Result<()> {
        let mut buf = Vec::new();
        example().write_bytes(&mut buf)?;
        buf[0..4].copy_from_slice(&[0; 4]);
        match CommonHeader::from_buffer(&buf) {
            Err(Error::HeaderError(HeaderError::InvalidMagicNumber(0))) => Ok(()),
            other => panic!("expected bad magic, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_version() -> Result<()> {
        let mut buf = Vec::new();
        example().write_bytes(&mut buf)?;
        buf[4..8].copy_from_slice(&[0, 0, 0, 2]);
        match CommonHeader::from_reader(&mut Cursor::new(&buf)) {
            Err(Error::HeaderError(HeaderError::InvalidFormatVersion(v))) => {
                assert_eq!(v, "0002");
                Ok(())
            }
            other => panic!("expected bad version, got {other:?}"),
        }
    }

    #[test]
    fn test_short_buffer() {
        assert!(CommonHeader::from_buffer(&[0x2E, 0x73]).is_err());
    }

    #[test]
    fn test_for_split() {
        let mut header = example();
        header.index_offset = 10;
        header.index_length = 20;
        header.num_reads = 100;
        let split = header.for_split(7);
        assert_eq!(split.num_reads, 7);
        assert_eq!(split.index_offset, 0);
        assert_eq!(split.index_length, 0);
        assert_eq!(split.flow_chars, header.flow_chars);
        assert_eq!(split.key_sequence, header.key_sequence);
        assert_eq!(split.header_length, header.header_length);
    }
}
