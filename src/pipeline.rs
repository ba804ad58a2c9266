//! Per-file extraction pipeline
//!
//! One call of [`extract_file`] decodes a flowgram file once, front to back. Every record
//! is rendered into the selected text outputs and, in split mode, classified and copied
//! verbatim into its destination. Split files are sealed once the input is exhausted.
//!
//! Failure handling:
//!
//! * A bad common header fails the file before any output exists.
//! * A record with clip points outside the read, a truncated record, or an input ending
//!   before its declared read count is logged and ends the file early. Everything
//!   produced up to that point is kept.
//! * Cancellation removes every output of the file and yields [`Outcome::Cancelled`].

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::accnos::NameSet;
use crate::classify::{Classifier, GroupClassifier, OligoClassifier};
use crate::context::{OutputNames, RunContext};
use crate::emit::{TextFormats, TextOutputs};
use crate::error::Result;
use crate::groups::GroupMap;
use crate::header::CommonHeader;
use crate::oligo::{Budgets, OligoSet};
use crate::policy::ClipPolicy;
use crate::progress::ProgressTracker;
use crate::reader::{MmapReader, RecordSource};
use crate::split::{Sealed, SplitOutput, SplitSet};
use crate::txt::TxtReader;

/// Settings shared by every input of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    pub formats: TextFormats,
    pub clip: ClipPolicy,
    pub budgets: Budgets,
    /// Retry failed reads in reverse complement orientation
    pub reorient: bool,
}

/// How accepted reads are split into files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SplitMode {
    #[default]
    None,
    /// Split by barcode and primer, from an oligos file
    Oligos(PathBuf),
    /// Split by read name, from a group file
    Groups(PathBuf),
}

/// One input file and its per-file settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileJob {
    pub input: PathBuf,
    pub split: SplitMode,
    /// Restricts text output to the listed read names
    pub accnos: Option<PathBuf>,
}
impl FileJob {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(input: P) -> Self {
        Self {
            input: input.into(),
            split: SplitMode::None,
            accnos: None,
        }
    }
}

/// Summary of a completed file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub input: PathBuf,
    /// Reads decoded and processed
    pub reads: u32,
    /// Reads accepted into split destinations
    pub accepted: u32,
    /// Reads routed to the scrap file
    pub scrap: u32,
    /// Set when decoding stopped early; the number of reads processed before the stop
    pub corrupted_at: Option<u32>,
    /// Every file written, text outputs first
    pub outputs: Vec<PathBuf>,
    pub split: Vec<SplitOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed(ExtractReport),
    Cancelled,
}

/// Classifier and destination files of a split run
pub struct Splitter {
    pub classifier: Classifier,
    pub files: SplitSet,
}
impl Splitter {
    /// Loads the split inputs of a job, or `None` when the job does not split
    pub fn load(
        mode: &SplitMode,
        opts: &ExtractOptions,
        header: &CommonHeader,
        names: &OutputNames,
    ) -> Result<Option<Self>> {
        match mode {
            SplitMode::None => Ok(None),
            SplitMode::Oligos(path) => {
                let set = OligoSet::from_path(path)?;
                if !set.has_group_names() {
                    warn!(
                        "{} names no barcodes or primers, reads will not be split",
                        path.display()
                    );
                    return Ok(None);
                }
                let classifier = OligoClassifier::new(&set, opts.budgets, opts.reorient);
                Ok(Some(Self {
                    classifier: Classifier::Oligos(classifier),
                    files: SplitSet::for_oligos(&set, header, names)?,
                }))
            }
            SplitMode::Groups(path) => {
                let groups = GroupMap::from_path(path)?;
                let files = SplitSet::for_groups(&groups, header, names)?;
                Ok(Some(Self {
                    classifier: Classifier::Groups(GroupClassifier::new(groups)),
                    files,
                }))
            }
        }
    }
}

/// Decodes, renders and splits one flowgram file
///
/// # Errors
///
/// Returns an error if the input header is invalid, a split or name file cannot be
/// loaded, or an output cannot be written. Outputs created before an I/O error are removed.
pub fn extract_file(job: &FileJob, opts: &ExtractOptions, ctx: &RunContext) -> Result<Outcome> {
    info!("Extracting {}", job.input.display());
    let filter = job.accnos.as_ref().map(NameSet::from_path).transpose()?;
    let mut reader = MmapReader::new(&job.input)?;
    let names = ctx.outputs_for(&job.input, 1);
    let splitter = Splitter::load(&job.split, opts, reader.header(), &names)?;
    let outcome = run(&mut reader, &names, opts, splitter, filter.as_ref(), ctx)?;
    Ok(match outcome {
        Outcome::Completed(report) => Outcome::Completed(ExtractReport {
            input: job.input.clone(),
            ..report
        }),
        Outcome::Cancelled => Outcome::Cancelled,
    })
}

/// Re-emits a text dump as fasta, quality and flow files
pub fn convert_txt(
    input: &Path,
    accnos: Option<&Path>,
    opts: &ExtractOptions,
    ctx: &RunContext,
) -> Result<Outcome> {
    info!("Converting {}", input.display());
    let filter = accnos.map(NameSet::from_path).transpose()?;
    let mut reader = TxtReader::new(BufReader::new(File::open(input)?))?;
    let names = ctx.outputs_for(input, 2);
    let opts = ExtractOptions {
        formats: TextFormats {
            sfftxt: false,
            ..opts.formats
        },
        ..*opts
    };
    let outcome = run(&mut reader, &names, &opts, None, filter.as_ref(), ctx)?;
    Ok(match outcome {
        Outcome::Completed(report) => Outcome::Completed(ExtractReport {
            input: input.to_path_buf(),
            ..report
        }),
        Outcome::Cancelled => Outcome::Cancelled,
    })
}

/// How the record loop ended
enum Stop {
    Exhausted { reads: u32, corrupted_at: Option<u32> },
    Cancelled,
}

/// Runs the record loop over any source and seals the outputs
pub fn run<S: RecordSource>(
    source: &mut S,
    names: &OutputNames,
    opts: &ExtractOptions,
    splitter: Option<Splitter>,
    filter: Option<&NameSet>,
    ctx: &RunContext,
) -> Result<Outcome> {
    let header = source.header().clone();
    let mut text = TextOutputs::create(opts.formats, opts.clip, names, &header)?;
    let mut splitter = splitter;

    let mut progress = ProgressTracker::new(names.stem());
    let stopped = process(
        source,
        opts,
        &mut text,
        splitter.as_mut(),
        filter,
        &mut progress,
        ctx,
    );
    let stop = match stopped {
        Ok(stop) => stop,
        Err(e) => {
            text.remove();
            return Err(e);
        }
    };
    let (reads, corrupted_at) = match stop {
        Stop::Exhausted { reads, corrupted_at } => (reads, corrupted_at),
        Stop::Cancelled => {
            text.remove();
            ctx.log("Cancelled, removed partial outputs");
            return Ok(Outcome::Cancelled);
        }
    };

    let mut outputs = text.finish()?;
    let mut report = ExtractReport {
        reads,
        corrupted_at,
        ..ExtractReport::default()
    };
    if let Some(splitter) = splitter {
        report.accepted = splitter.files.accepted();
        report.scrap = splitter.files.scrapped();
        match splitter.files.finalize(ctx) {
            Ok(Sealed::Files(split)) => {
                outputs.extend(split.iter().map(|s| s.path.clone()));
                report.split = split;
            }
            Ok(Sealed::Cancelled) => {
                remove_paths(&outputs);
                return Ok(Outcome::Cancelled);
            }
            Err(e) => {
                remove_paths(&outputs);
                return Err(e);
            }
        }
    }
    report.outputs = outputs;
    info!(
        "{} reads processed, {} accepted, {} scrapped",
        report.reads, report.accepted, report.scrap
    );
    Ok(Outcome::Completed(report))
}

fn process<S: RecordSource>(
    source: &mut S,
    opts: &ExtractOptions,
    text: &mut TextOutputs,
    mut splitter: Option<&mut Splitter>,
    filter: Option<&NameSet>,
    progress: &mut ProgressTracker,
    ctx: &RunContext,
) -> Result<Stop> {
    let mut bases = Vec::new();
    let corrupted_at = loop {
        if ctx.is_cancelled() {
            return Ok(Stop::Cancelled);
        }
        let mut record = match source.next_record() {
            None => break None,
            Some(Ok(record)) => record,
            Some(Err(e)) => {
                warn!("{e}");
                break Some(progress.count());
            }
        };
        opts.clip.adjust(&mut record);
        if let Err(e) = record.check_clips() {
            warn!("{e}");
            break Some(progress.count());
        }

        let name = record.name();
        if filter.is_none_or(|f| f.contains(&name)) {
            text.emit(&record)?;
        }
        if let Some(splitter) = splitter.as_deref_mut() {
            opts.clip.bases_into(&record, &mut bases);
            let verdict = splitter
                .classifier
                .classify(&name, &bases, opts.clip.quality(&record));
            if !verdict.is_accepted() {
                debug!("{name}: {}", verdict.trash);
            }
            splitter.files.append(verdict.route(), source.raw())?;
        }
        progress.tick();
    };
    let reads = progress.finish();
    Ok(Stop::Exhausted { reads, corrupted_at })
}

fn remove_paths(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = fs::remove_file(path) {
            debug!("Could not remove {}: {e}", path.display());
        }
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::dna::reverse_complement;
    use crate::fixtures;
    use crate::policy::ClipMode;
    use crate::record::SffRecord;
    use anyhow::Context;

    const INSERT: &[u8] = b"GATTACAGATTACAGG";
    const OLIGOS: &str = "\
# samples
barcode ACACACAC s1
barcode TGTGTGTG s2
forward CCGTCAATTC
";

    fn read(name: &str, barcode: &[u8]) -> SffRecord {
        fixtures::record(name, &[barcode, b"CCGTCAATTC", INSERT].concat())
    }

    fn records() -> Vec<SffRecord> {
        vec![
            read("READ000001", b"ACACACAC"),
            read("READ000002", b"TGTGTGTG"),
            read("READ000003", b"GGGGGGGG"),
            read("READ000004", b"ACACACAC"),
        ]
    }

    fn completed(outcome: Outcome) -> anyhow::Result<ExtractReport> {
        match outcome {
            Outcome::Completed(report) => Ok(report),
            Outcome::Cancelled => anyhow::bail!("unexpected cancellation"),
        }
    }

    #[test]
    fn test_extract_and_split() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let input = fixtures::write_sff(dir.path(), "run.sff", &records());
        let oligos = dir.path().join("run.oligos");
        fs::write(&oligos, OLIGOS)?;
        let job = FileJob {
            split: SplitMode::Oligos(oligos),
            ..FileJob::new(&input)
        };
        let ctx = RunContext::new();
        let report = completed(extract_file(&job, &ExtractOptions::default(), &ctx)?)?;

        assert_eq!(report.reads, 4);
        assert_eq!(report.accepted, 3);
        assert_eq!(report.scrap, 1);
        assert_eq!(report.accepted + report.scrap, report.reads);
        assert_eq!(report.corrupted_at, None);

        let counts: Vec<_> = report
            .split
            .iter()
            .map(|s| (s.label.as_str(), s.count))
            .collect();
        assert_eq!(counts, [("s1", 2), ("s2", 1), ("scrap", 1)]);

        let names = ctx.outputs_for(&input, 1);
        let mut s1 = MmapReader::new(names.split("s1"))?;
        assert_eq!(s1.header().num_reads, 2);
        let first = s1.next_record().context("first s1 read")??;
        assert_eq!(first, records()[0]);

        let fasta = fs::read_to_string(names.fasta(true))?;
        assert_eq!(fasta.matches('>').count(), 4);
        assert!(report.outputs.contains(&names.flow()));
        assert!(report.outputs.contains(&names.scrap()));
        Ok(())
    }

    #[test]
    fn test_reoriented_read_is_split() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let bases = reverse_complement(&[&b"ACACACAC"[..], b"CCGTCAATTC", INSERT].concat());
        let mut flipped = fixtures::record("READ000009", &bases);
        // the last bases of the barcode fall outside the quality window
        flipped.header.clip_qual_right = bases.len() as u16 - 2;
        let input = fixtures::write_sff(
            dir.path(),
            "run.sff",
            &[flipped.clone(), read("READ000002", b"TGTGTGTG")],
        );
        let oligos = dir.path().join("run.oligos");
        fs::write(&oligos, OLIGOS)?;
        let job = FileJob {
            split: SplitMode::Oligos(oligos),
            ..FileJob::new(&input)
        };
        let ctx = RunContext::new();
        let names = ctx.outputs_for(&input, 1);

        let opts = ExtractOptions {
            clip: ClipPolicy::new(ClipMode::CaseFold, None),
            reorient: true,
            ..ExtractOptions::default()
        };
        let report = completed(extract_file(&job, &opts, &ctx)?)?;
        let counts: Vec<_> = report
            .split
            .iter()
            .map(|s| (s.label.as_str(), s.count))
            .collect();
        assert_eq!(counts, [("s1", 1), ("s2", 1)]);
        let mut s1 = MmapReader::new(names.split("s1"))?;
        assert_eq!(s1.next_record().context("s1 read")??, flipped);

        let fasta = fs::read_to_string(names.fasta(false))?;
        let tail = String::from_utf8(bases[bases.len() - 3..].to_ascii_lowercase())?;
        assert!(fasta.contains(&format!("{tail}\n")));

        // trimming cuts into the barcode, so the read is scrapped
        let trimmed = ExtractOptions {
            reorient: true,
            ..ExtractOptions::default()
        };
        let report = completed(extract_file(&job, &trimmed, &ctx)?)?;
        assert_eq!((report.accepted, report.scrap), (1, 1));
        Ok(())
    }

    #[test]
    fn test_bad_magic_creates_nothing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("bad.sff");
        let mut bytes = fixtures::encode(&fixtures::header(), &records());
        bytes[0..4].copy_from_slice(&[0; 4]);
        fs::write(&input, bytes)?;

        let result = extract_file(
            &FileJob::new(&input),
            &ExtractOptions::default(),
            &RunContext::new(),
        );
        assert!(result.is_err_and(|e| e.is_fatal_format()));
        assert_eq!(fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn test_corruption_stops_early() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut records = records();
        records[2].header.clip_qual_right = 200;
        let input = fixtures::write_sff(dir.path(), "run.sff", &records);

        let ctx = RunContext::new();
        let outcome = extract_file(&FileJob::new(&input), &ExtractOptions::default(), &ctx)?;
        let report = completed(outcome)?;
        assert_eq!(report.reads, 2);
        assert_eq!(report.corrupted_at, Some(2));
        let fasta = fs::read_to_string(ctx.outputs_for(&input, 1).fasta(true))?;
        assert_eq!(fasta.matches('>').count(), 2);
        Ok(())
    }

    #[test]
    fn test_missing_reads_are_reported() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut header = fixtures::header();
        header.set_num_reads(5);
        let mut bytes = Vec::new();
        header.write_bytes(&mut bytes)?;
        for record in &records()[..2] {
            record.write_bytes(&mut bytes)?;
        }
        let input = dir.path().join("short.sff");
        fs::write(&input, bytes)?;

        let ctx = RunContext::new();
        let report = completed(extract_file(
            &FileJob::new(&input),
            &ExtractOptions::default(),
            &ctx,
        )?)?;
        assert_eq!(report.reads, 2);
        assert_eq!(report.corrupted_at, Some(2));
        Ok(())
    }

    #[test]
    fn test_cancel_removes_outputs() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let input = fixtures::write_sff(dir.path(), "run.sff", &records());
        let ctx = RunContext::new();
        ctx.cancel();
        let outcome = extract_file(&FileJob::new(&input), &ExtractOptions::default(), &ctx)?;
        assert_eq!(outcome, Outcome::Cancelled);
        assert_eq!(fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn test_group_split_and_accnos() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let input = fixtures::write_sff(dir.path(), "run.sff", &records());
        let groups = dir.path().join("run.groups");
        fs::write(&groups, "READ000001 soil\nREAD000002 forest\nREAD000004 soil\n")?;
        let accnos = dir.path().join("keep.accnos");
        fs::write(&accnos, "READ000002\n")?;

        let job = FileJob {
            input: input.clone(),
            split: SplitMode::Groups(groups),
            accnos: Some(accnos),
        };
        let ctx = RunContext::new().with_output_dir(dir.path().join("out"));
        fs::create_dir(dir.path().join("out"))?;
        let report = completed(extract_file(&job, &ExtractOptions::default(), &ctx)?)?;
        let counts: Vec<_> = report
            .split
            .iter()
            .map(|s| (s.label.as_str(), s.count))
            .collect();
        assert_eq!(counts, [("forest", 1), ("soil", 2), ("scrap", 1)]);

        let fasta = fs::read_to_string(ctx.outputs_for(&input, 1).fasta(true))?;
        assert_eq!(fasta.matches('>').count(), 1);
        assert!(fasta.starts_with(">READ000002 "));
        Ok(())
    }

    #[test]
    fn test_convert_txt() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let input = fixtures::write_sff(dir.path(), "run.sff", &records());
        let ctx = RunContext::new();
        let opts = ExtractOptions {
            formats: TextFormats {
                sfftxt: true,
                ..TextFormats::default()
            },
            ..ExtractOptions::default()
        };
        completed(extract_file(&FileJob::new(&input), &opts, &ctx)?)?;
        let names = ctx.outputs_for(&input, 1);
        let fasta = fs::read_to_string(names.fasta(true))?;
        let flow = fs::read_to_string(names.flow())?;
        fs::remove_file(names.fasta(true))?;
        fs::remove_file(names.flow())?;

        let report = completed(convert_txt(&names.sfftxt(), None, &opts, &ctx)?)?;
        assert_eq!(report.reads, 4);
        assert_eq!(fs::read_to_string(names.fasta(true))?, fasta);
        assert_eq!(fs::read_to_string(names.flow())?, flow);
        Ok(())
    }
}
