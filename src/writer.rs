//! Flowgram file writer
//!
//! Writes a common header followed by records, either re-encoded from decoded
//! [`SffRecord`]s or copied verbatim from raw record bytes. In headless mode the header is
//! skipped so that a body can be accumulated before its final read count is known.

use std::io::Write;

use crate::error::{Result, WriteError};
use crate::header::CommonHeader;
use crate::record::SffRecord;

/// Builder for [`SffWriter`]
#[derive(Default)]
pub struct SffWriterBuilder {
    /// Header defining the flow layout of the file
    header: Option<CommonHeader>,
    /// Optional headless mode for writing record bodies only
    headless: Option<bool>,
}
impl SffWriterBuilder {
    #[must_use]
    pub fn header(mut self, header: CommonHeader) -> Self {
        self.header = Some(header);
        self
    }

    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = Some(headless);
        self
    }

    pub fn build<W: Write>(self, inner: W) -> Result<SffWriter<W>> {
        let Some(header) = self.header else {
            return Err(WriteError::MissingHeader.into());
        };
        SffWriter::new(inner, header, self.headless.unwrap_or(false))
    }
}

/// Writer for flowgram files
///
/// The header is written as given: callers that know the final read count up front set
/// it on the header before building the writer.
pub struct SffWriter<W: Write> {
    /// The underlying writer for output
    inner: W,

    /// Header of the file being written
    header: CommonHeader,

    /// Records written so far
    records_written: u32,
}
impl<W: Write> SffWriter<W> {
    /// Creates a new writer, emitting the header unless `headless` is set
    pub fn new(mut inner: W, header: CommonHeader, headless: bool) -> Result<Self> {
        if !headless {
            header.write_bytes(&mut inner)?;
        }
        Ok(Self {
            inner,
            header,
            records_written: 0,
        })
    }

    /// Encodes and writes a decoded record
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::FlowCountMismatch`] if the record's flowgram does not match the
    /// header's flow count, or an I/O error.
    pub fn write_record(&mut self, record: &SffRecord) -> Result<()> {
        if record.data.flowgram.len() != self.header.num_flows as usize {
            return Err(WriteError::FlowCountMismatch(
                record.data.flowgram.len(),
                self.header.num_flows,
            )
            .into());
        }
        record.write_bytes(&mut self.inner)?;
        self.records_written += 1;
        Ok(())
    }

    /// Writes the raw bytes of one record exactly as they were read
    pub fn write_raw(&mut self, raw: &[u8]) -> Result<()> {
        self.inner.write_all(raw)?;
        self.records_written += 1;
        Ok(())
    }

    /// Number of records written so far
    #[must_use]
    pub fn records_written(&self) -> u32 {
        self.records_written
    }

    /// Consumes the writer and returns the underlying writer
    pub fn into_inner(self) -> W {
        self.inner
    }
}
