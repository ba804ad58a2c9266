//! Per-destination split output
//!
//! The read count of a split file is only known once the whole input has been consumed, so
//! each destination first accumulates raw record bytes in a [`PendingBody`]: an in-memory
//! buffer that spills to an anonymous temporary file once it grows past a limit. At the
//! end of the input [`SplitSet::finalize`] writes each file as a synthesized header followed
//! by its body. Destinations that received no reads never produce a file.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::classify::Destination;
use crate::context::{OutputNames, RunContext};
use crate::error::Result;
use crate::groups::GroupMap;
use crate::header::CommonHeader;
use crate::oligo::OligoSet;
use crate::writer::SffWriter;

/// Bytes a body may hold in memory before it spills to disk
pub const DEFAULT_SPOOL_LIMIT: usize = 64 << 20;

/// Size of the chunks copied between cancellation checks while sealing
const COPY_CHUNK: usize = 1 << 16;

enum Store {
    Memory(Vec<u8>),
    Spool(BufWriter<File>),
}

/// Record bytes of one destination awaiting their header
pub struct PendingBody {
    spool_dir: PathBuf,
    limit: usize,
    store: Store,
    len: u64,
}
impl PendingBody {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(spool_dir: P, limit: usize) -> Self {
        Self {
            spool_dir: spool_dir.into(),
            limit,
            store: Store::Memory(Vec::new()),
            len: 0,
        }
    }

    /// Number of bytes written so far
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn is_spooled(&self) -> bool {
        matches!(self.store, Store::Spool(_))
    }

    fn spill(&mut self) -> io::Result<()> {
        if let Store::Memory(buffer) = &self.store {
            let mut spool = BufWriter::new(tempfile::tempfile_in(&self.spool_dir)?);
            spool.write_all(buffer)?;
            debug!("Spooling {} buffered bytes to disk", buffer.len());
            self.store = Store::Spool(spool);
        }
        Ok(())
    }

    /// Rewinds the body for reading
    pub fn into_reader(self) -> Result<Box<dyn Read>> {
        match self.store {
            Store::Memory(buffer) => Ok(Box::new(Cursor::new(buffer))),
            Store::Spool(spool) => {
                let mut file = spool.into_inner().map_err(io::IntoInnerError::into_error)?;
                file.seek(SeekFrom::Start(0))?;
                Ok(Box::new(file))
            }
        }
    }
}
impl Write for PendingBody {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Store::Memory(buffer) = &self.store {
            if buffer.len() + buf.len() > self.limit {
                self.spill()?;
            }
        }
        let written = match &mut self.store {
            Store::Memory(buffer) => {
                buffer.extend_from_slice(buf);
                buf.len()
            }
            Store::Spool(spool) => spool.write(buf)?,
        };
        self.len += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.store {
            Store::Memory(_) => Ok(()),
            Store::Spool(spool) => spool.flush(),
        }
    }
}

/// One output file under construction
struct SplitFile {
    label: String,
    path: PathBuf,
    body: SffWriter<PendingBody>,
}
impl SplitFile {
    fn new(
        label: String,
        path: PathBuf,
        header: &CommonHeader,
        spool_dir: &Path,
        limit: usize,
    ) -> Result<Self> {
        let body = SffWriter::new(PendingBody::new(spool_dir, limit), header.clone(), true)?;
        Ok(Self { label, path, body })
    }
}

/// A finished split file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOutput {
    pub label: String,
    pub path: PathBuf,
    /// Reads in the file, as recorded in its header
    pub count: u32,
}

/// Result of sealing every split file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sealed {
    /// Files written, in destination order with scrap last
    Files(Vec<SplitOutput>),
    /// Cancellation was observed; nothing was left on disk
    Cancelled,
}

/// Every split file of one input, plus the scrap file
pub struct SplitSet {
    header: CommonHeader,
    files: Vec<SplitFile>,
    routes: HashMap<Destination, usize>,
    scrap: SplitFile,
}
impl SplitSet {
    /// Destinations for every named barcode and primer pair
    ///
    /// Pairs that share a label share a file; pairs without a label get none, since the
    /// classifier never accepts reads into them.
    pub fn for_oligos(set: &OligoSet, header: &CommonHeader, names: &OutputNames) -> Result<Self> {
        Self::for_oligos_with_limit(set, header, names, DEFAULT_SPOOL_LIMIT)
    }

    pub fn for_oligos_with_limit(
        set: &OligoSet,
        header: &CommonHeader,
        names: &OutputNames,
        limit: usize,
    ) -> Result<Self> {
        let mut split = Self::empty(header, names, limit)?;
        let mut by_label: HashMap<String, usize> = HashMap::new();
        for barcode in 0..set.barcode_slots() {
            for primer in 0..set.primer_slots() {
                let Some(label) = set.destination_label(barcode, primer) else {
                    continue;
                };
                let index = match by_label.get(&label) {
                    Some(&index) => index,
                    None => {
                        let index = split.add_file(label.clone(), names, limit)?;
                        by_label.insert(label, index);
                        index
                    }
                };
                split
                    .routes
                    .insert(Destination::Pair { barcode, primer }, index);
            }
        }
        Ok(split)
    }

    /// Destinations for every group of a group map
    pub fn for_groups(
        groups: &GroupMap,
        header: &CommonHeader,
        names: &OutputNames,
    ) -> Result<Self> {
        let mut split = Self::empty(header, names, DEFAULT_SPOOL_LIMIT)?;
        for (group, label) in groups.groups().iter().enumerate() {
            let index = split.add_file(label.clone(), names, DEFAULT_SPOOL_LIMIT)?;
            split.routes.insert(Destination::Group(group), index);
        }
        Ok(split)
    }

    fn empty(header: &CommonHeader, names: &OutputNames, limit: usize) -> Result<Self> {
        Ok(Self {
            header: header.clone(),
            files: Vec::new(),
            routes: HashMap::new(),
            scrap: SplitFile::new("scrap".to_string(), names.scrap(), header, names.dir(), limit)?,
        })
    }

    fn add_file(&mut self, label: String, names: &OutputNames, limit: usize) -> Result<usize> {
        let path = names.split(&label);
        self.files
            .push(SplitFile::new(label, path, &self.header, names.dir(), limit)?);
        Ok(self.files.len() - 1)
    }

    /// Number of destinations, scrap excluded
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Appends the raw bytes of one record
    ///
    /// `None`, or a destination without a file, routes the record to scrap.
    pub fn append(&mut self, destination: Option<Destination>, raw: &[u8]) -> Result<()> {
        let file = match destination.and_then(|d| self.routes.get(&d)) {
            Some(&index) => &mut self.files[index],
            None => &mut self.scrap,
        };
        file.body.write_raw(raw)
    }

    /// Reads accepted into destinations so far
    #[must_use]
    pub fn accepted(&self) -> u32 {
        self.files.iter().map(|f| f.body.records_written()).sum()
    }

    /// Reads routed to scrap so far
    #[must_use]
    pub fn scrapped(&self) -> u32 {
        self.scrap.body.records_written()
    }

    /// Writes every non-empty destination as header plus body
    ///
    /// Cancellation is polled between chunks; when observed, or when an error occurs,
    /// every file created by this call is removed.
    pub fn finalize(self, ctx: &RunContext) -> Result<Sealed> {
        let header = self.header;
        let mut created: Vec<PathBuf> = Vec::new();
        let mut outputs = Vec::new();
        for file in self.files.into_iter().chain(std::iter::once(self.scrap)) {
            let count = file.body.records_written();
            if count == 0 {
                continue;
            }
            created.push(file.path.clone());
            match seal(file.body.into_inner(), &header.for_split(count), &file.path, ctx) {
                Ok(true) => outputs.push(SplitOutput {
                    label: file.label,
                    path: file.path,
                    count,
                }),
                Ok(false) => {
                    remove_all(&created);
                    return Ok(Sealed::Cancelled);
                }
                Err(e) => {
                    remove_all(&created);
                    return Err(e);
                }
            }
        }
        Ok(Sealed::Files(outputs))
    }
}

/// Writes one file; returns `false` if cancelled part way
fn seal(body: PendingBody, header: &CommonHeader, path: &Path, ctx: &RunContext) -> Result<bool> {
    let mut reader = body.into_reader()?;
    let mut out = BufWriter::new(File::create(path)?);
    header.write_bytes(&mut out)?;
    let mut chunk = vec![0u8; COPY_CHUNK];
    loop {
        if ctx.is_cancelled() {
            return Ok(false);
        }
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        out.write_all(&chunk[..n])?;
    }
    out.flush()?;
    Ok(true)
}

fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = fs::remove_file(path) {
            debug!("Could not remove {}: {e}", path.display());
        }
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::fixtures;
    use crate::oligo::Oligo;
    use crate::reader::{MmapReader, RecordSource};

    fn oligo(seq: &[u8], name: &str) -> Oligo {
        Oligo {
            seq: seq.to_vec(),
            name: name.to_string(),
        }
    }

    fn raw(name: &str) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        fixtures::record(name, b"ACGTACGTAC").write_bytes(&mut bytes)?;
        Ok(bytes)
    }

    #[test]
    fn test_pending_body_spills() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut body = PendingBody::new(dir.path(), 16);
        body.write_all(&[1; 10])?;
        assert!(!body.is_spooled());
        body.write_all(&[2; 10])?;
        assert!(body.is_spooled());
        assert_eq!(body.len(), 20);

        let mut read_back = Vec::new();
        body.into_reader()?.read_to_end(&mut read_back)?;
        assert_eq!(read_back, [[1u8; 10], [2u8; 10]].concat());
        Ok(())
    }

    #[test]
    fn test_finalize_writes_counts() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let ctx = RunContext::new();
        let names = ctx.outputs_for(&dir.path().join("run.sff"), 1);
        let set = OligoSet {
            barcodes: vec![oligo(b"ACAC", "s1"), oligo(b"TGTG", "s2"), oligo(b"GGAT", "s3")],
            ..OligoSet::default()
        };
        let mut header = fixtures::header();
        header.index_offset = 999;
        header.index_length = 12;
        header.set_num_reads(4);

        // tiny limit so one destination spools
        let mut split = SplitSet::for_oligos_with_limit(&set, &header, &names, 100)?;
        assert_eq!(split.len(), 3);
        let s1 = Destination::Pair { barcode: 0, primer: 0 };
        split.append(Some(s1), &raw("READ000001")?)?;
        split.append(Some(s1), &raw("READ000002")?)?;
        split.append(Some(Destination::Pair { barcode: 1, primer: 0 }), &raw("READ000003")?)?;
        split.append(None, &raw("READ000004")?)?;
        assert_eq!(split.accepted() + split.scrapped(), 4);

        let Sealed::Files(outputs) = split.finalize(&ctx)? else {
            panic!("not cancelled");
        };
        let labels: Vec<_> = outputs.iter().map(|o| (o.label.as_str(), o.count)).collect();
        assert_eq!(labels, [("s1", 2), ("s2", 1), ("scrap", 1)]);
        assert!(!names.split("s3").exists());

        let mut reader = MmapReader::new(names.split("s1"))?;
        assert_eq!(reader.header().num_reads, 2);
        assert_eq!(reader.header().index_offset, 0);
        assert_eq!(reader.header().index_length, 0);
        assert_eq!(reader.header().flow_chars, header.flow_chars);
        assert_eq!(reader.next_record().expect("first")?.name(), "READ000001");
        assert_eq!(reader.next_record().expect("second")?.name(), "READ000002");
        assert!(reader.next_record().is_none());
        Ok(())
    }

    #[test]
    fn test_shared_labels_share_a_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let names = RunContext::new().outputs_for(&dir.path().join("run.sff"), 1);
        let set = OligoSet {
            barcodes: vec![oligo(b"ACAC", "s1"), oligo(b"TGTG", "s1")],
            primers: vec![oligo(b"CCGG", "")],
            ..OligoSet::default()
        };
        let split = SplitSet::for_oligos(&set, &fixtures::header(), &names)?;
        assert_eq!(split.len(), 1);
        Ok(())
    }

    #[test]
    fn test_cancelled_finalize_removes_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let ctx = RunContext::new();
        let names = ctx.outputs_for(&dir.path().join("run.sff"), 1);
        let groups = GroupMap::from_reader(Cursor::new("r1 soil\n"))?;
        let mut split = SplitSet::for_groups(&groups, &fixtures::header(), &names)?;
        split.append(Some(Destination::Group(0)), &raw("r1")?)?;
        ctx.cancel();
        assert_eq!(split.finalize(&ctx)?, Sealed::Cancelled);
        assert!(!names.split("soil").exists());
        assert_eq!(fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }
}
