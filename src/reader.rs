//! Record readers for flowgram files
//!
//! Two readers are provided behind the [`RecordSource`] trait:
//!
//! * [`MmapReader`] maps the whole file and decodes records in place. The raw bytes of the
//!   last record are a slice of the mapping, so split output can copy them without
//!   reopening the file.
//! * [`StreamReader`] decodes from any forward-only [`Read`] and keeps the raw bytes of the
//!   last record in an owned buffer.
//!
//! Both stop after the number of reads declared in the common header, since an index
//! section may follow the last read.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;

use crate::error::{ReadError, Result};
use crate::header::CommonHeader;
use crate::record::{RecordLayout, SffRecord, SIZE_READ_PREFIX};

/// A forward-only source of decoded records
pub trait RecordSource {
    /// The common header of the file
    fn header(&self) -> &CommonHeader;

    /// Decodes the next record
    ///
    /// Returns `None` once the declared number of reads has been produced or after an error
    /// has been returned. Input ending before the declared count is an error.
    fn next_record(&mut self) -> Option<Result<SffRecord>>;

    /// Raw bytes of the record most recently returned by [`RecordSource::next_record`],
    /// padding included
    fn raw(&self) -> &[u8];

    /// Number of records decoded so far
    fn records_read(&self) -> u32;
}

/// A memory-mapped reader for flowgram files
pub struct MmapReader {
    /// Memory mapped file contents
    mmap: Arc<Mmap>,

    /// Common header of the file
    header: CommonHeader,

    /// Offset of the next record
    pos: usize,

    /// Span of the most recent record
    last: Range<usize>,

    /// Number of records decoded so far
    count: u32,

    /// Set once an error was returned
    done: bool,
}
impl MmapReader {
    /// Creates a new memory-mapped reader
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The file cannot be opened
    /// * The file is not a regular file
    /// * The common header is invalid
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        // Verify input file is a file before attempting to map
        let file = File::open(path)?;
        if !file.metadata()?.is_file() {
            return Err(ReadError::IncompatibleFile.into());
        }

        // Safety: the file is open and won't be modified while mapped
        let mmap = unsafe { Mmap::map(&file)? };

        let header = CommonHeader::from_buffer(&mmap)?;
        let pos = header.size();
        Ok(Self {
            mmap: Arc::new(mmap),
            header,
            pos,
            last: pos..pos,
            count: 0,
            done: false,
        })
    }

    fn fail(&mut self, expected: usize) -> Option<Result<SffRecord>> {
        self.done = true;
        Some(Err(ReadError::TruncatedRecord {
            offset: self.pos,
            expected,
            available: self.mmap.len().saturating_sub(self.pos),
        }
        .into()))
    }
}
impl RecordSource for MmapReader {
    fn header(&self) -> &CommonHeader {
        &self.header
    }

    fn next_record(&mut self) -> Option<Result<SffRecord>> {
        if self.done || self.count >= self.header.num_reads {
            return None;
        }
        if self.pos >= self.mmap.len() {
            self.done = true;
            return Some(Err(missing_reads(&self.header, self.count)));
        }
        let available = self.mmap.len() - self.pos;
        if available < SIZE_READ_PREFIX {
            return self.fail(SIZE_READ_PREFIX);
        }
        let layout = RecordLayout::from_prefix(&self.mmap[self.pos..], self.header.num_flows);
        if available < layout.total() {
            return self.fail(layout.total());
        }

        let span = self.pos..self.pos + layout.total();
        match SffRecord::from_bytes(&self.mmap[span.clone()], self.header.num_flows) {
            Ok(record) => {
                self.pos = span.end;
                self.last = span;
                self.count += 1;
                Some(Ok(record))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }

    fn raw(&self) -> &[u8] {
        &self.mmap[self.last.clone()]
    }

    fn records_read(&self) -> u32 {
        self.count
    }
}

/// A streaming reader for flowgram data from any source implementing [`Read`]
pub struct StreamReader<R: Read> {
    /// The source reader, positioned after the common header
    reader: R,

    /// Common header of the stream
    header: CommonHeader,

    /// Raw bytes of the most recent record
    raw: Vec<u8>,

    /// Bytes consumed so far, header included
    offset: usize,

    /// Number of records decoded so far
    count: u32,

    /// Set once an error was returned
    done: bool,
}
impl<R: Read> StreamReader<R> {
    /// Reads and validates the common header, leaving the reader at the first record
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the header is invalid.
    pub fn new(mut reader: R) -> Result<Self> {
        let header = CommonHeader::from_reader(&mut reader)?;
        let offset = header.size();
        Ok(Self {
            reader,
            header,
            raw: Vec::new(),
            offset,
            count: 0,
            done: false,
        })
    }

    /// Consumes the stream reader and returns the underlying reader
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn read_record(&mut self) -> Result<Option<SffRecord>> {
        self.raw.resize(SIZE_READ_PREFIX, 0);
        let filled = fill(&mut self.reader, &mut self.raw)?;
        if filled == 0 {
            return Ok(None);
        }
        if filled < SIZE_READ_PREFIX {
            return Err(self.truncated(SIZE_READ_PREFIX, filled));
        }

        let layout = RecordLayout::from_prefix(&self.raw, self.header.num_flows);
        self.raw.resize(layout.total(), 0);
        let filled = SIZE_READ_PREFIX + fill(&mut self.reader, &mut self.raw[SIZE_READ_PREFIX..])?;
        if filled < layout.total() {
            return Err(self.truncated(layout.total(), filled));
        }

        let record = SffRecord::from_bytes(&self.raw, self.header.num_flows)?;
        self.offset += layout.total();
        self.count += 1;
        Ok(Some(record))
    }

    fn truncated(&self, expected: usize, available: usize) -> crate::Error {
        ReadError::TruncatedRecord {
            offset: self.offset,
            expected,
            available,
        }
        .into()
    }
}
impl<R: Read> RecordSource for StreamReader<R> {
    fn header(&self) -> &CommonHeader {
        &self.header
    }

    fn next_record(&mut self) -> Option<Result<SffRecord>> {
        if self.done || self.count >= self.header.num_reads {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                Some(Err(missing_reads(&self.header, self.count)))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }

    fn raw(&self) -> &[u8] {
        &self.raw
    }

    fn records_read(&self) -> u32 {
        self.count
    }
}

fn missing_reads(header: &CommonHeader, found: u32) -> crate::Error {
    ReadError::MissingReads {
        declared: header.num_reads,
        found,
    }
    .into()
}

/// Reads until `buf` is full or the reader is exhausted, returning the bytes read
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::fixtures;
    use crate::Error;
    use std::io::Cursor;

    #[test]
    fn test_mmap_reader() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let records = vec![
            fixtures::record("GLMX3WA01AAAAB", b"TCAGACGTACGT"),
            fixtures::record("GLMX3WA01AAAAC", b"TCAGGGG"),
        ];
        let path = fixtures::write_sff(dir.path(), "reads.sff", &records);
        let bytes = std::fs::read(&path)?;

        let mut reader = MmapReader::new(&path)?;
        assert_eq!(reader.header().num_reads, 2);

        let mut offset = reader.header().size();
        for expected in &records {
            let record = reader.next_record().expect("record")?;
            assert_eq!(&record, expected);
            assert_eq!(reader.raw(), &bytes[offset..offset + record.size()]);
            offset += record.size();
        }
        assert!(reader.next_record().is_none());
        assert_eq!(reader.records_read(), 2);
        Ok(())
    }

    #[test]
    fn test_stops_at_declared_count() -> Result<()> {
        let records = vec![fixtures::record("READ000001", b"ACGT")];
        let mut bytes = fixtures::encode(&fixtures::header(), &records);
        // trailing index section
        bytes.extend_from_slice(&[0xAB; 24]);

        let mut reader = StreamReader::new(Cursor::new(bytes))?;
        assert!(reader.next_record().is_some());
        assert!(reader.next_record().is_none());
        Ok(())
    }

    #[test]
    fn test_stream_matches_mmap() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let records: Vec<_> = (0..5)
            .map(|i| fixtures::record(&format!("READ{i:06}"), &b"ACGTTGCA"[..=i]))
            .collect();
        let path = fixtures::write_sff(dir.path(), "reads.sff", &records);

        let mut mapped = MmapReader::new(&path)?;
        let mut stream = StreamReader::new(File::open(&path)?)?;
        while let Some(record) = mapped.next_record() {
            let other = stream.next_record().expect("stream record")?;
            assert_eq!(record?, other);
            assert_eq!(mapped.raw(), stream.raw());
        }
        assert!(stream.next_record().is_none());
        Ok(())
    }

    #[test]
    fn test_truncated_record() -> Result<()> {
        let records = vec![
            fixtures::record("READ000001", b"ACGT"),
            fixtures::record("READ000002", b"ACGT"),
        ];
        let mut bytes = fixtures::encode(&fixtures::header(), &records);
        bytes.truncate(bytes.len() - 3);

        let mut reader = StreamReader::new(Cursor::new(bytes))?;
        assert!(reader.next_record().expect("first").is_ok());
        match reader.next_record() {
            Some(Err(Error::ReadError(ReadError::TruncatedRecord { .. }))) => {}
            other => panic!("expected truncation, got {other:?}"),
        }
        assert!(reader.next_record().is_none());
        Ok(())
    }

    #[test]
    fn test_missing_reads() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let records = vec![
            fixtures::record("READ000001", b"ACGT"),
            fixtures::record("READ000002", b"ACGT"),
        ];
        let mut header = fixtures::header();
        header.set_num_reads(5);
        let mut bytes = Vec::new();
        header.write_bytes(&mut bytes)?;
        for record in &records {
            record.write_bytes(&mut bytes)?;
        }
        let path = dir.path().join("short.sff");
        std::fs::write(&path, &bytes)?;

        let mut mapped = MmapReader::new(&path)?;
        let mut stream = StreamReader::new(Cursor::new(bytes))?;
        for _ in 0..2 {
            assert!(mapped.next_record().expect("mapped")?.size() > 0);
            assert!(stream.next_record().expect("stream")?.size() > 0);
        }
        for next in [mapped.next_record(), stream.next_record()] {
            match next {
                Some(Err(Error::ReadError(ReadError::MissingReads {
                    declared: 5,
                    found: 2,
                }))) => {}
                other => panic!("expected missing reads, got {other:?}"),
            }
        }
        assert!(mapped.next_record().is_none());
        assert!(stream.next_record().is_none());
        Ok(())
    }

    #[test]
    fn test_bad_magic_is_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bad.sff");
        std::fs::write(&path, [0u8; 64])?;
        assert!(matches!(
            MmapReader::new(&path),
            Err(Error::HeaderError(_))
        ));
        Ok(())
    }

    #[test]
    fn test_directory_is_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(MmapReader::new(dir.path()).is_err());
        Ok(())
    }
}
