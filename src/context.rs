//! Shared run state handed to every pipeline component
//!
//! A [`RunContext`] replaces process-wide globals: it carries the cooperative cancellation
//! flag, the output directory and a logging hook. Clones share the same flag, so one
//! context can be handed to several pipelines running in parallel.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::info;

#[derive(Debug, Clone, Default)]
pub struct RunContext {
    /// Set to request that every pipeline stops at its next checkpoint
    cancel: Arc<AtomicBool>,

    /// Directory for outputs; the input's own directory when unset
    output_dir: Option<PathBuf>,
}
impl RunContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Requests cancellation
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// The shared cancellation flag, e.g. for a signal handler
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn log(&self, message: &str) {
        info!("{message}");
    }

    #[must_use]
    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    /// Output names for an input file
    ///
    /// # Arguments
    ///
    /// * `input` - The input file
    /// * `extensions` - How many trailing extensions to drop from its name
    #[must_use]
    pub fn outputs_for(&self, input: &Path, extensions: usize) -> OutputNames {
        let dir = match &self.output_dir {
            Some(dir) => dir.clone(),
            None => input
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
        };
        let mut stem = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        for _ in 0..extensions {
            if let Some(dot) = stem.rfind('.') {
                stem.truncate(dot);
            }
        }
        OutputNames { dir, stem }
    }
}

/// Paths of every output derived from one input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNames {
    dir: PathBuf,
    stem: String,
}
impl OutputNames {
    fn path(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}.{suffix}", self.stem))
    }

    /// Directory all outputs are written to
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Common file name prefix of the outputs
    #[must_use]
    pub fn stem(&self) -> &str {
        &self.stem
    }

    #[must_use]
    pub fn fasta(&self, trim: bool) -> PathBuf {
        self.path(if trim { "fasta" } else { "raw.fasta" })
    }

    #[must_use]
    pub fn quality(&self, trim: bool) -> PathBuf {
        self.path(if trim { "qual" } else { "raw.qual" })
    }

    #[must_use]
    pub fn flow(&self) -> PathBuf {
        self.path("flow")
    }

    #[must_use]
    pub fn sfftxt(&self) -> PathBuf {
        self.path("sff.txt")
    }

    /// Split file of one destination
    #[must_use]
    pub fn split(&self, label: &str) -> PathBuf {
        self.path(&format!("{label}.sff"))
    }

    #[must_use]
    pub fn scrap(&self) -> PathBuf {
        self.split("scrap")
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_cancel_is_shared() {
        let ctx = RunContext::new();
        let clone = ctx.clone();
        assert!(!clone.is_cancelled());
        ctx.cancel();
        assert!(clone.is_cancelled());
        assert!(ctx.cancel_flag().load(Ordering::Relaxed));
    }

    #[test]
    fn test_output_names() {
        let ctx = RunContext::new();
        let names = ctx.outputs_for(Path::new("/data/run1/reads.sff"), 1);
        assert_eq!(names.fasta(true), PathBuf::from("/data/run1/reads.fasta"));
        assert_eq!(names.fasta(false), PathBuf::from("/data/run1/reads.raw.fasta"));
        assert_eq!(names.quality(true), PathBuf::from("/data/run1/reads.qual"));
        assert_eq!(names.flow(), PathBuf::from("/data/run1/reads.flow"));
        assert_eq!(names.sfftxt(), PathBuf::from("/data/run1/reads.sff.txt"));
        assert_eq!(names.split("A.V5"), PathBuf::from("/data/run1/reads.A.V5.sff"));
        assert_eq!(names.scrap(), PathBuf::from("/data/run1/reads.scrap.sff"));
    }

    #[test]
    fn test_output_dir_and_double_extension() {
        let ctx = RunContext::new().with_output_dir("/out");
        let names = ctx.outputs_for(Path::new("/data/reads.sff.txt"), 2);
        assert_eq!(names.fasta(true), PathBuf::from("/out/reads.fasta"));
        assert_eq!(names.dir(), Path::new("/out"));
    }
}
