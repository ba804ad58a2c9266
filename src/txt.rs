//! Parser for the text dump written by [`crate::emit::write_sfftxt`]
//!
//! A dump holds a `Common Header:` block followed by one block per read. Every field is a
//! `Key: value` line; lines with keys that carry nothing recoverable (run name, full path)
//! are skipped. Flow values are read back as hundredths and the cumulative flow indexes
//! are turned back into per-base deltas, so records decode to what the binary file held,
//! apart from the case of the bases.

use std::io::BufRead;
use std::str::FromStr;

use crate::error::{Error, HeaderError, Result, TxtError};
use crate::header::{CommonHeader, MAGIC, VERSION};
use crate::reader::RecordSource;
use crate::record::{ReadData, ReadHeader, SffRecord};

/// Key/value lines of one block
struct Fields {
    /// Line number of the first line of the block
    line: usize,
    entries: Vec<(String, String)>,
}
impl Fields {
    fn get(&self, key: &'static str) -> Result<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| Error::from(TxtError::MissingField(self.line, key)))
    }

    fn parse<T: FromStr>(&self, key: &'static str) -> Result<T> {
        let value = self.get(key)?;
        value
            .parse()
            .map_err(|_| Error::from(TxtError::InvalidValue(self.line, key, value.to_string())))
    }

    fn parse_all<T: FromStr>(&self, key: &'static str) -> Result<Vec<T>> {
        self.get(key)?
            .split_whitespace()
            .map(|v| {
                v.parse()
                    .map_err(|_| Error::from(TxtError::InvalidValue(self.line, key, v.to_string())))
            })
            .collect()
    }
}

/// Reads records back out of a text dump
pub struct TxtReader<R: BufRead> {
    reader: R,
    header: CommonHeader,
    /// Last line read but not yet consumed
    line: String,
    line_number: usize,
    /// Re-encoded bytes of the most recent record
    raw: Vec<u8>,
    count: u32,
    done: bool,
}
impl<R: BufRead> TxtReader<R> {
    /// Parses the common header block
    ///
    /// # Errors
    ///
    /// Returns a [`TxtError`] if a header field is missing or malformed, or a
    /// [`HeaderError`] if the magic number or version is not supported.
    pub fn new(reader: R) -> Result<Self> {
        let mut txt = Self {
            reader,
            header: CommonHeader::new(b"", b""),
            line: String::new(),
            line_number: 0,
            raw: Vec::new(),
            count: 0,
            done: false,
        };
        let fields = txt.block("Key Sequence")?;
        txt.header = Self::common_header(&fields)?;
        Ok(txt)
    }

    fn common_header(fields: &Fields) -> Result<CommonHeader> {
        let magic: u32 = fields.parse("Magic Number")?;
        if magic != MAGIC {
            return Err(HeaderError::InvalidMagicNumber(magic).into());
        }
        let version_text = fields.get("Version")?;
        let mut version = [0u8; 4];
        if version_text.len() != 4 || !version_text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(HeaderError::InvalidFormatVersion(version_text.to_string()).into());
        }
        for (slot, digit) in version.iter_mut().zip(version_text.bytes()) {
            *slot = digit - b'0';
        }
        if version != VERSION {
            return Err(HeaderError::InvalidFormatVersion(version_text.to_string()).into());
        }

        let flow_chars = fields.get("Flow Chars")?.as_bytes().to_vec();
        let key_sequence = fields.get("Key Sequence")?.as_bytes().to_vec();
        Ok(CommonHeader {
            magic,
            version,
            index_offset: fields.parse("Index Offset")?,
            index_length: fields.parse("Index Length")?,
            num_reads: fields.parse("Number of Reads")?,
            header_length: fields.parse("Header Length")?,
            key_length: fields.parse("Key Length")?,
            num_flows: fields.parse("Number of Flows")?,
            flowgram_format: fields.parse("Format Code")?,
            flow_chars,
            key_sequence,
        })
    }

    /// Reads the next line into `self.line`, returning `false` at end of input
    fn advance(&mut self) -> Result<bool> {
        self.line.clear();
        let n = self.reader.read_line(&mut self.line)?;
        self.line_number += 1;
        Ok(n > 0)
    }

    /// Collects `Key: value` lines up to and including the line with key `last`
    ///
    /// Returns an empty block when the input ends before any line is read.
    fn block(&mut self, last: &'static str) -> Result<Fields> {
        let mut fields = Fields {
            line: self.line_number + 1,
            entries: Vec::new(),
        };
        while self.advance()? {
            let line = self.line.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() && fields.entries.is_empty() {
                fields.line = self.line_number + 1;
                continue;
            }
            if let Some(name) = line.strip_prefix('>') {
                fields.entries.push((">".to_string(), name.trim().to_string()));
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            let is_last = key == last;
            fields.entries.push((key.to_string(), value.trim().to_string()));
            if is_last {
                return Ok(fields);
            }
        }
        if fields.entries.is_empty() {
            Ok(fields)
        } else {
            Err(TxtError::MissingField(self.line_number, last).into())
        }
    }

    fn read_record(&mut self) -> Result<Option<SffRecord>> {
        let fields = self.block("Quality Scores")?;
        if fields.entries.is_empty() {
            return Ok(None);
        }
        let num_flows = self.header.num_flows as usize;

        let flowgram = fields
            .parse_all::<f64>("Flowgram")?
            .into_iter()
            .map(|v| (v * 100.0).round() as u16)
            .collect::<Vec<_>>();
        if flowgram.len() != num_flows {
            return Err(TxtError::InvalidValue(
                fields.line,
                "Flowgram",
                format!("{} values for {num_flows} flows", flowgram.len()),
            )
            .into());
        }

        let mut previous = 0u32;
        let mut flow_index = Vec::new();
        for cumulative in fields.parse_all::<u32>("Flow Indexes")? {
            let delta = cumulative
                .checked_sub(previous)
                .and_then(|d| u8::try_from(d).ok())
                .ok_or_else(|| {
                    TxtError::InvalidValue(fields.line, "Flow Indexes", cumulative.to_string())
                })?;
            flow_index.push(delta);
            previous = cumulative;
        }

        let name = fields.get(">")?.as_bytes().to_vec();
        let header = ReadHeader {
            header_length: fields.parse("Read Header Len")?,
            name_length: fields.parse("Name Length")?,
            num_bases: fields.parse("# of Bases")?,
            clip_qual_left: fields.parse("Clip Qual Left")?,
            clip_qual_right: fields.parse("Clip Qual Right")?,
            clip_adapter_left: fields.parse("Clip Adap Left")?,
            clip_adapter_right: fields.parse("Clip Adap Right")?,
            name,
        };
        let data = ReadData {
            flowgram,
            flow_index,
            bases: fields.get("Bases")?.as_bytes().to_vec(),
            quality: fields.parse_all("Quality Scores")?,
        };
        Ok(Some(SffRecord { header, data }))
    }
}
impl<R: BufRead> RecordSource for TxtReader<R> {
    fn header(&self) -> &CommonHeader {
        &self.header
    }

    fn next_record(&mut self) -> Option<Result<SffRecord>> {
        if self.done || self.count >= self.header.num_reads {
            return None;
        }
        let result = match self.read_record() {
            Ok(Some(record)) => {
                self.raw.clear();
                record.write_bytes(&mut self.raw).map(|()| record)
            }
            Ok(None) => Err(TxtError::UnexpectedEof(self.header.num_reads, self.count + 1).into()),
            Err(e) => Err(e),
        };
        match result {
            Ok(record) => {
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
        &self.raw
    }

    fn records_read(&self) -> u32 {
        self.count
    }
}
