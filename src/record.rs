//! Read records of a flowgram file
//!
//! Each record is a read header (fixed 16-byte prefix plus the read name) followed by a
//! payload holding the flowgram, flow indexes, bases and quality scores. Both groups are
//! padded with zeros to an 8-byte boundary.

use std::borrow::Cow;
use std::io::Write;

use byteorder::{BigEndian, ByteOrder};

use crate::error::{ReadError, Result};
use crate::name::NameInfo;
use crate::utils::{padded, write_padding};

/// Size of the fixed portion of a read header in bytes
pub const SIZE_READ_PREFIX: usize = 16;

/// Sizes of the two padded groups of a record, derived from its header prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    /// Read header bytes, padding included
    pub header: usize,
    /// Payload bytes, padding included
    pub payload: usize,
}
impl RecordLayout {
    /// Computes the layout of a record from its first [`SIZE_READ_PREFIX`] bytes
    ///
    /// # Arguments
    ///
    /// * `prefix` - At least the fixed read header prefix
    /// * `num_flows` - The flow count from the common header
    #[must_use]
    pub fn from_prefix(prefix: &[u8], num_flows: u16) -> Self {
        let name_length = BigEndian::read_u16(&prefix[2..4]) as usize;
        let num_bases = BigEndian::read_u32(&prefix[4..8]) as usize;
        Self {
            header: padded(SIZE_READ_PREFIX + name_length),
            payload: payload_size(num_flows, num_bases),
        }
    }

    /// Total number of bytes the record occupies
    #[must_use]
    pub fn total(&self) -> usize {
        self.header + self.payload
    }
}

fn payload_size(num_flows: u16, num_bases: usize) -> usize {
    padded(num_flows as usize * 2 + num_bases * 3)
}

/// Per-read header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadHeader {
    /// Length of the read header as recorded in the file
    ///
    /// 2 bytes
    pub header_length: u16,

    /// Length of the read name
    ///
    /// 2 bytes
    pub name_length: u16,

    /// Number of bases in the read
    ///
    /// 4 bytes
    pub num_bases: u32,

    /// 1-based first base of the high quality window
    ///
    /// 2 bytes
    pub clip_qual_left: u16,

    /// Last base of the high quality window, 0 when unset
    ///
    /// 2 bytes
    pub clip_qual_right: u16,

    /// 1-based first base after the adapter
    ///
    /// 2 bytes
    pub clip_adapter_left: u16,

    /// Last base before the adapter, 0 when unset
    ///
    /// 2 bytes
    pub clip_adapter_right: u16,

    /// Read name
    ///
    /// `name_length` bytes
    pub name: Vec<u8>,
}

/// Per-read payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadData {
    /// Flow intensities in hundredths, one per flow
    pub flowgram: Vec<u16>,
    /// Flows elapsed since the previous base, one per base
    pub flow_index: Vec<u8>,
    /// Called bases
    pub bases: Vec<u8>,
    /// Phred quality scores, one per base
    pub quality: Vec<u8>,
}

/// A fully decoded read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SffRecord {
    pub header: ReadHeader,
    pub data: ReadData,
}
impl SffRecord {
    /// Builds a record from its parts, deriving the length fields
    ///
    /// Clip values are set to cover the whole read.
    #[must_use]
    pub fn new(
        name: &[u8],
        flowgram: Vec<u16>,
        flow_index: Vec<u8>,
        bases: &[u8],
        quality: Vec<u8>,
    ) -> Self {
        let header = ReadHeader {
            header_length: padded(SIZE_READ_PREFIX + name.len()) as u16,
            name_length: name.len() as u16,
            num_bases: bases.len() as u32,
            clip_qual_left: 1,
            clip_qual_right: bases.len() as u16,
            clip_adapter_left: 0,
            clip_adapter_right: 0,
            name: name.to_vec(),
        };
        Self {
            header,
            data: ReadData {
                flowgram,
                flow_index,
                bases: bases.to_vec(),
                quality,
            },
        }
    }

    /// Decodes a record from a buffer holding at least the full record
    ///
    /// # Arguments
    ///
    /// * `buffer` - Bytes starting at the record's header
    /// * `num_flows` - The flow count from the common header
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::TruncatedRecord`] if the buffer is shorter than the record.
    pub fn from_bytes(buffer: &[u8], num_flows: u16) -> Result<Self> {
        if buffer.len() < SIZE_READ_PREFIX {
            return Err(truncated(SIZE_READ_PREFIX, buffer.len()));
        }
        let layout = RecordLayout::from_prefix(buffer, num_flows);
        if buffer.len() < layout.total() {
            return Err(truncated(layout.total(), buffer.len()));
        }

        let name_length = BigEndian::read_u16(&buffer[2..4]);
        let num_bases = BigEndian::read_u32(&buffer[4..8]);
        let name_end = SIZE_READ_PREFIX + name_length as usize;
        let header = ReadHeader {
            header_length: BigEndian::read_u16(&buffer[0..2]),
            name_length,
            num_bases,
            clip_qual_left: BigEndian::read_u16(&buffer[8..10]),
            clip_qual_right: BigEndian::read_u16(&buffer[10..12]),
            clip_adapter_left: BigEndian::read_u16(&buffer[12..14]),
            clip_adapter_right: BigEndian::read_u16(&buffer[14..16]),
            name: buffer[SIZE_READ_PREFIX..name_end].to_vec(),
        };

        let nb = num_bases as usize;
        let mut pos = layout.header;
        let mut flowgram = vec![0u16; num_flows as usize];
        BigEndian::read_u16_into(&buffer[pos..pos + flowgram.len() * 2], &mut flowgram);
        pos += flowgram.len() * 2;
        let flow_index = buffer[pos..pos + nb].to_vec();
        pos += nb;
        let bases = buffer[pos..pos + nb].to_vec();
        pos += nb;
        let quality = buffer[pos..pos + nb].to_vec();

        Ok(Self {
            header,
            data: ReadData {
                flowgram,
                flow_index,
                bases,
                quality,
            },
        })
    }

    /// Writes the record in its on-disk layout, padding included
    ///
    /// The recorded header length is written as stored so that a decoded record
    /// re-encodes to the exact bytes it was read from.
    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut prefix = [0u8; SIZE_READ_PREFIX];
        BigEndian::write_u16(&mut prefix[0..2], self.header.header_length);
        BigEndian::write_u16(&mut prefix[2..4], self.header.name_length);
        BigEndian::write_u32(&mut prefix[4..8], self.header.num_bases);
        BigEndian::write_u16(&mut prefix[8..10], self.header.clip_qual_left);
        BigEndian::write_u16(&mut prefix[10..12], self.header.clip_qual_right);
        BigEndian::write_u16(&mut prefix[12..14], self.header.clip_adapter_left);
        BigEndian::write_u16(&mut prefix[14..16], self.header.clip_adapter_right);
        writer.write_all(&prefix)?;
        writer.write_all(&self.header.name)?;
        write_padding(writer, SIZE_READ_PREFIX + self.header.name.len())?;

        let mut flowgram = vec![0u8; self.data.flowgram.len() * 2];
        BigEndian::write_u16_into(&self.data.flowgram, &mut flowgram);
        writer.write_all(&flowgram)?;
        writer.write_all(&self.data.flow_index)?;
        writer.write_all(&self.data.bases)?;
        writer.write_all(&self.data.quality)?;
        let payload = flowgram.len()
            + self.data.flow_index.len()
            + self.data.bases.len()
            + self.data.quality.len();
        write_padding(writer, payload)?;
        Ok(())
    }

    /// Number of bytes the record occupies on disk
    #[must_use]
    pub fn size(&self) -> usize {
        padded(SIZE_READ_PREFIX + self.header.name.len())
            + padded(self.data.flowgram.len() * 2 + self.data.bases.len() * 3)
    }

    /// Read name, with invalid UTF-8 replaced
    #[must_use]
    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.header.name)
    }

    /// Decodes the timestamp, region and XY location from the read name
    #[must_use]
    pub fn name_info(&self) -> NameInfo {
        NameInfo::decode(&self.name())
    }

    /// Verifies that the quality clip points fall inside the decoded read
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::ClipOutOfBounds`] describing every violated bound; this is
    /// the signal that the file is corrupted from this record on.
    pub fn check_clips(&self) -> Result<()> {
        let left = self.header.clip_qual_left as usize;
        let right = self.header.clip_qual_right as usize;
        let mut problems = Vec::new();
        for (label, value) in [("Clip Qual Left", left), ("Clip Qual Right", right)] {
            if value > self.data.bases.len() {
                problems.push(format!(
                    "{label} = {value}, but we only read {} bases",
                    self.data.bases.len()
                ));
            }
            if value > self.data.quality.len() {
                problems.push(format!(
                    "{label} = {value}, but we only read {} quality scores",
                    self.data.quality.len()
                ));
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ReadError::ClipOutOfBounds {
                name: self.name().into_owned(),
                detail: problems.join("; "),
            }
            .into())
        }
    }
}

fn truncated(expected: usize, available: usize) -> crate::Error {
    ReadError::TruncatedRecord {
        offset: 0,
        expected,
        available,
    }
    .into()
}
