//! Text renderings of decoded reads
//!
//! * fasta: `>name xy=X_Y` followed by the bases
//! * quality: `>name xy=X_Y length=N` followed by space separated scores
//! * flow: the flow count on the first line, then `name flowsUsed v1 v2 ...` per read
//! * text dump: every common header and read field as `Key: value` lines
//!
//! Bases and qualities follow the active [`ClipPolicy`]. Flow values are hundredths and
//! are printed with two decimals.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use log::debug;

use crate::context::OutputNames;
use crate::error::Result;
use crate::header::CommonHeader;
use crate::name::NameInfo;
use crate::policy::{ClipPolicy, ClipWindow};
use crate::record::SffRecord;

/// Which text outputs to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextFormats {
    pub fasta: bool,
    pub qual: bool,
    pub flow: bool,
    pub sfftxt: bool,
}
impl Default for TextFormats {
    fn default() -> Self {
        Self {
            fasta: true,
            qual: true,
            flow: true,
            sfftxt: false,
        }
    }
}
impl TextFormats {
    #[must_use]
    pub fn any(&self) -> bool {
        self.fasta || self.qual || self.flow || self.sfftxt
    }
}

/// Writes a flow value given in hundredths with two decimals
fn write_hundredths<W: Write>(out: &mut W, value: u16, ibuf: &mut itoa::Buffer) -> Result<()> {
    out.write_all(ibuf.format(value / 100).as_bytes())?;
    let frac = value % 100;
    out.write_all(if frac < 10 { b".0" } else { b"." })?;
    out.write_all(ibuf.format(frac).as_bytes())?;
    Ok(())
}

/// Writes one fasta entry
pub fn write_fasta<W: Write>(out: &mut W, name: &str, xy: &str, bases: &[u8]) -> Result<()> {
    writeln!(out, ">{name} xy={xy}")?;
    out.write_all(bases)?;
    out.write_all(b"\n")?;
    Ok(())
}

/// Writes one quality entry; the length field is the number of scores written
pub fn write_quality<W: Write>(out: &mut W, name: &str, xy: &str, quality: &[u8]) -> Result<()> {
    writeln!(out, ">{name} xy={xy} length={}", quality.len())?;
    let mut ibuf = itoa::Buffer::new();
    for (i, q) in quality.iter().enumerate() {
        if i > 0 {
            out.write_all(b" ")?;
        }
        out.write_all(ibuf.format(*q).as_bytes())?;
    }
    out.write_all(b"\n")?;
    Ok(())
}

/// Writes the first line of a flow file
pub fn write_flow_header<W: Write>(out: &mut W, header: &CommonHeader) -> Result<()> {
    writeln!(out, "{}", header.num_flows)?;
    Ok(())
}

/// Writes one flow line, or nothing when the read has no usable bases
///
/// The flows-used count is the sum of the flow index deltas up to the right clip, or up
/// to the last base when there is no right clip.
pub fn write_flow<W: Write>(out: &mut W, record: &SffRecord) -> Result<bool> {
    let left = record.header.clip_qual_left as usize;
    let end = match record.header.clip_qual_right {
        0 => record.data.flow_index.len(),
        right => right as usize,
    };
    if end <= left {
        return Ok(false);
    }
    let used: u32 = record.data.flow_index[..end.min(record.data.flow_index.len())]
        .iter()
        .map(|&d| u32::from(d))
        .sum();

    let mut ibuf = itoa::Buffer::new();
    out.write_all(&record.header.name)?;
    out.write_all(b" ")?;
    out.write_all(ibuf.format(used).as_bytes())?;
    for &value in &record.data.flowgram {
        out.write_all(b" ")?;
        write_hundredths(out, value, &mut ibuf)?;
    }
    out.write_all(b"\n")?;
    Ok(true)
}

/// Writes the common header block of a text dump
pub fn write_common_header<W: Write>(out: &mut W, header: &CommonHeader) -> Result<()> {
    writeln!(out, "Common Header:")?;
    writeln!(out, "Magic Number: {}", header.magic)?;
    writeln!(out, "Version: {}", header.version_string())?;
    writeln!(out, "Index Offset: {}", header.index_offset)?;
    writeln!(out, "Index Length: {}", header.index_length)?;
    writeln!(out, "Number of Reads: {}", header.num_reads)?;
    writeln!(out, "Header Length: {}", header.header_length)?;
    writeln!(out, "Key Length: {}", header.key_length)?;
    writeln!(out, "Number of Flows: {}", header.num_flows)?;
    writeln!(out, "Format Code: {}", header.flowgram_format)?;
    writeln!(out, "Flow Chars: {}", String::from_utf8_lossy(&header.flow_chars))?;
    writeln!(out, "Key Sequence: {}", String::from_utf8_lossy(&header.key_sequence))?;
    writeln!(out)?;
    Ok(())
}

/// Writes the block of one read in a text dump
///
/// Flow indexes are written cumulatively and bases are always case folded to their
/// clip window.
pub fn write_sfftxt<W: Write>(out: &mut W, record: &SffRecord, info: &NameInfo) -> Result<()> {
    let h = &record.header;
    let d = &record.data;
    writeln!(out, ">{}", record.name())?;
    writeln!(out, "Run Prefix: {}", info.timestamp.as_deref().unwrap_or_default())?;
    writeln!(out, "Region #:  {}", info.region.as_deref().unwrap_or_default())?;
    writeln!(out, "XY Location: {}", info.xy())?;
    writeln!(out)?;
    writeln!(out, "Run Name:  ")?;
    writeln!(out, "Analysis Name:  ")?;
    writeln!(out, "Full Path: ")?;
    writeln!(out)?;
    writeln!(out, "Read Header Len: {}", h.header_length)?;
    writeln!(out, "Name Length: {}", h.name_length)?;
    writeln!(out, "# of Bases: {}", h.num_bases)?;
    writeln!(out, "Clip Qual Left: {}", h.clip_qual_left)?;
    writeln!(out, "Clip Qual Right: {}", h.clip_qual_right)?;
    writeln!(out, "Clip Adap Left: {}", h.clip_adapter_left)?;
    writeln!(out, "Clip Adap Right: {}", h.clip_adapter_right)?;
    writeln!(out)?;

    let mut ibuf = itoa::Buffer::new();
    out.write_all(b"Flowgram: ")?;
    for &value in &d.flowgram {
        write_hundredths(out, value, &mut ibuf)?;
        out.write_all(b"\t")?;
    }
    out.write_all(b"\nFlow Indexes: ")?;
    let mut sum = 0u32;
    for &delta in &d.flow_index {
        sum += u32::from(delta);
        out.write_all(ibuf.format(sum).as_bytes())?;
        out.write_all(b"\t")?;
    }
    let mut folded = Vec::with_capacity(d.bases.len());
    ClipWindow::of(record).case_fold(&d.bases, &mut folded);
    out.write_all(b"\nBases: ")?;
    out.write_all(&folded)?;
    out.write_all(b"\nQuality Scores: ")?;
    for &q in &d.quality {
        out.write_all(ibuf.format(q).as_bytes())?;
        out.write_all(b"\t")?;
    }
    out.write_all(b"\n\n")?;
    Ok(())
}

struct Output {
    path: PathBuf,
    writer: BufWriter<File>,
}
impl Output {
    fn create(path: PathBuf) -> Result<Self> {
        let writer = BufWriter::new(File::create(&path)?);
        Ok(Self { path, writer })
    }
}

/// The open text outputs of one input file
pub struct TextOutputs {
    policy: ClipPolicy,
    fasta: Option<Output>,
    qual: Option<Output>,
    flow: Option<Output>,
    sfftxt: Option<Output>,
    /// Scratch buffer for rendered bases
    bases: Vec<u8>,
}
impl TextOutputs {
    /// Creates the selected outputs and writes their file headers
    pub fn create(
        formats: TextFormats,
        policy: ClipPolicy,
        names: &OutputNames,
        header: &CommonHeader,
    ) -> Result<Self> {
        let trim = policy.is_trim();
        let open =
            |selected: bool, path: PathBuf| selected.then(|| Output::create(path)).transpose();
        let mut outputs = Self {
            policy,
            sfftxt: open(formats.sfftxt, names.sfftxt())?,
            fasta: open(formats.fasta, names.fasta(trim))?,
            qual: open(formats.qual, names.quality(trim))?,
            flow: open(formats.flow, names.flow())?,
            bases: Vec::new(),
        };
        if let Some(out) = outputs.sfftxt.as_mut() {
            write_common_header(&mut out.writer, header)?;
        }
        if let Some(out) = outputs.flow.as_mut() {
            write_flow_header(&mut out.writer, header)?;
        }
        Ok(outputs)
    }

    /// Renders one read into every open output
    pub fn emit(&mut self, record: &SffRecord) -> Result<()> {
        let info = record.name_info();
        let name = record.name();
        if let Some(out) = self.sfftxt.as_mut() {
            write_sfftxt(&mut out.writer, record, &info)?;
        }
        if let Some(out) = self.fasta.as_mut() {
            self.policy.bases_into(record, &mut self.bases);
            write_fasta(&mut out.writer, &name, info.xy(), &self.bases)?;
        }
        if let Some(out) = self.qual.as_mut() {
            write_quality(&mut out.writer, &name, info.xy(), self.policy.quality(record))?;
        }
        if let Some(out) = self.flow.as_mut() {
            write_flow(&mut out.writer, record)?;
        }
        Ok(())
    }

    fn outputs(self) -> impl Iterator<Item = Output> {
        [self.sfftxt, self.fasta, self.qual, self.flow]
            .into_iter()
            .flatten()
    }

    /// Flushes every output and returns the paths written
    pub fn finish(self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for mut out in self.outputs() {
            out.writer.flush()?;
            paths.push(out.path);
        }
        Ok(paths)
    }

    /// Closes and deletes every output
    pub fn remove(self) {
        for out in self.outputs() {
            drop(out.writer);
            if let Err(e) = fs::remove_file(&out.path) {
                debug!("Could not remove {}: {e}", out.path.display());
            }
        }
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::context::RunContext;
    use crate::fixtures;

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> Result<()>,
    {
        let mut out = Vec::new();
        f(&mut out).expect("render");
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn test_fasta() {
        let text = render(|out| write_fasta(out, "GLMX3WA01AAAAB", "1_2", b"ACGT"));
        assert_eq!(text, ">GLMX3WA01AAAAB xy=1_2\nACGT\n");
    }

    #[test]
    fn test_quality() {
        let text = render(|out| write_quality(out, "r1", "", &[30, 31, 5]));
        assert_eq!(text, ">r1 xy= length=3\n30 31 5\n");
    }

    #[test]
    fn test_hundredths() {
        let text = render(|out| {
            let mut ibuf = itoa::Buffer::new();
            for v in [0, 5, 105, 1230] {
                write_hundredths(out, v, &mut ibuf)?;
                out.push(b' ');
            }
            Ok(())
        });
        assert_eq!(text, "0.00 0.05 1.05 12.30 ");
    }

    #[test]
    fn test_flow_line() {
        let mut record = fixtures::record("r1", b"ACGTACGT");
        record.data.flow_index = vec![1, 2, 0, 1, 3, 0, 1, 1];
        record.header.clip_qual_left = 1;
        record.header.clip_qual_right = 4;
        let text = render(|out| write_flow(out, &record).map(|_| ()));
        assert_eq!(text, "r1 4 1.00 1.05 1.10 1.15 1.20 1.25 1.30 1.35\n");

        record.header.clip_qual_right = 0;
        let text = render(|out| write_flow(out, &record).map(|_| ()));
        assert!(text.starts_with("r1 9 "));
    }

    #[test]
    fn test_flow_skips_empty_window() -> Result<()> {
        let mut record = fixtures::record("r1", b"ACGT");
        record.header.clip_qual_left = 4;
        record.header.clip_qual_right = 4;
        let mut out = Vec::new();
        assert!(!write_flow(&mut out, &record)?);
        assert!(out.is_empty());
        Ok(())
    }

    #[test]
    fn test_sfftxt_block() {
        let mut record = fixtures::record("GLMX3WA01AAAAB", b"acgtAC");
        record.data.flow_index = vec![1, 0, 2, 1, 1, 1];
        record.header.clip_qual_left = 2;
        record.header.clip_qual_right = 4;
        let info = record.name_info();
        let text = render(|out| write_sfftxt(out, &record, &info));
        assert!(text.starts_with(">GLMX3WA01AAAAB\nRun Prefix: "));
        assert!(text.contains("Region #:  01\n"));
        assert!(text.contains("Clip Qual Right: 4\n"));
        assert!(text.contains("Flow Indexes: 1\t1\t3\t4\t5\t6\t\n"));
        assert!(text.contains("Bases: aCGtac\n"));
        assert!(text.ends_with("\n\n"));
    }

    #[test]
    fn test_outputs_written_and_removed() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let names = RunContext::new().outputs_for(&dir.path().join("run.sff"), 1);
        let formats = TextFormats {
            sfftxt: true,
            ..TextFormats::default()
        };
        let header = fixtures::header();
        let mut outputs = TextOutputs::create(formats, ClipPolicy::default(), &names, &header)?;
        let mut record = fixtures::record("r1", b"ACGTACGT");
        record.header.clip_qual_left = 3;
        outputs.emit(&record)?;
        let paths = outputs.finish()?;
        assert_eq!(paths.len(), 4);

        let fasta = fs::read_to_string(names.fasta(true))?;
        assert_eq!(fasta, ">r1 xy=\nGTACG\n");
        let flow = fs::read_to_string(names.flow())?;
        assert!(flow.starts_with("8\nr1 8 "));
        let dump = fs::read_to_string(names.sfftxt())?;
        assert!(dump.starts_with("Common Header:\nMagic Number: 779314790\nVersion: 0001\n"));

        let outputs = TextOutputs::create(formats, ClipPolicy::default(), &names, &header)?;
        outputs.remove();
        assert!(!names.fasta(true).exists());
        assert!(!names.sfftxt().exists());
        Ok(())
    }
}
