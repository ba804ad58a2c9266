//! # sffkit
//!
//! Decoding, demultiplexing and conversion of SFF flowgram files.
//!
//! An SFF file is a common header followed by one record per read. Every record holds
//! the read name, its quality and adapter clip points, the flow intensities of the run,
//! and the called bases with their quality scores. All integers are big-endian and every
//! variable length section is zero padded to 8 bytes.
//!
//! The crate provides:
//!
//! * a codec for the common header and read records ([`CommonHeader`], [`SffRecord`])
//! * readers over memory-mapped files, plain streams and text dumps ([`RecordSource`])
//! * a barcode/primer classifier with per-stage edit budgets and reorientation
//!   ([`OligoClassifier`])
//! * split output that writes each destination's header once its read count is known
//!   ([`SplitSet`])
//! * fasta, quality, flow and text dump emitters ([`TextOutputs`])
//! * the per-file pipeline tying these together ([`extract_file`]) and a driver running
//!   several files concurrently ([`extract_all`])

pub mod accnos;
pub mod classify;
pub mod context;
pub mod dna;
pub mod emit;
pub mod error;
pub mod groups;
pub mod header;
pub mod name;
pub mod oligo;
pub mod parallel;
pub mod pipeline;
pub mod policy;
pub mod progress;
pub mod reader;
pub mod record;
pub mod split;
pub mod txt;
pub mod utils;
pub mod writer;

pub use accnos::NameSet;
pub use classify::{Classifier, Destination, GroupClassifier, OligoClassifier, TrashCode, Verdict};
pub use context::{OutputNames, RunContext};
pub use emit::{TextFormats, TextOutputs};
pub use error::{Error, Result};
pub use groups::GroupMap;
pub use header::CommonHeader;
pub use name::NameInfo;
pub use oligo::{Budgets, Matcher, OligoSet, WorkingRead};
pub use parallel::{extract_all, JobResult};
pub use pipeline::{
    convert_txt, extract_file, ExtractOptions, ExtractReport, FileJob, Outcome, SplitMode,
};
pub use policy::{ClipMode, ClipPolicy, ClipWindow};
pub use reader::{MmapReader, RecordSource, StreamReader};
pub use record::SffRecord;
pub use split::{Sealed, SplitOutput, SplitSet};
pub use txt::TxtReader;
pub use writer::{SffWriter, SffWriterBuilder};
