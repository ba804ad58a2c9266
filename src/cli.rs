use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{ArgAction, Args, Parser, Subcommand};

use sffkit::{
    Budgets, ClipMode, ClipPolicy, ExtractOptions, FileJob, RunContext, SplitMode, TextFormats,
};

#[derive(Parser)]
#[command(version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract reads from flowgram files, optionally splitting them by sample
    Extract(ExtractArgs),

    /// Convert a text dump back into fasta, quality and flow files
    Txt(TxtArgs),
}

#[derive(Args)]
pub struct ExtractArgs {
    /// Input flowgram file(s)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Oligos file(s) to split by barcode and primer, one per input
    #[arg(long, num_args = 1.., conflicts_with = "groups")]
    pub oligos: Vec<PathBuf>,

    /// Group file(s) to split by read name, one per input
    #[arg(long = "group", num_args = 1..)]
    pub groups: Vec<PathBuf>,

    /// Read name list(s) restricting text output, one per input
    #[arg(long, num_args = 1..)]
    pub accnos: Vec<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub no_fasta: bool,

    #[arg(long, default_value_t = false)]
    pub no_qual: bool,

    #[arg(long, default_value_t = false)]
    pub no_flow: bool,

    /// Also write a text dump of every field
    #[arg(long, default_value_t = false)]
    pub sfftxt: bool,

    /// Keep whole reads, marking clipped bases in lower case
    #[arg(long, default_value_t = false)]
    pub no_trim: bool,

    /// Allowed barcode differences
    #[arg(long, default_value_t = 0)]
    pub bdiffs: u32,

    /// Allowed primer differences
    #[arg(long, default_value_t = 0)]
    pub pdiffs: u32,

    /// Allowed linker differences
    #[arg(long, default_value_t = 0)]
    pub ldiffs: u32,

    /// Allowed spacer differences
    #[arg(long, default_value_t = 0)]
    pub sdiffs: u32,

    /// Allowed total differences; 0 means the sum of the others
    #[arg(long, default_value_t = 0)]
    pub tdiffs: u32,

    /// Retry unmatched reads in reverse complement
    #[arg(long, default_value_t = false)]
    pub checkorient: bool,

    /// Replace the left quality clip of every read
    #[arg(long)]
    pub clip_left: Option<u16>,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args)]
pub struct TxtArgs {
    /// Input text dump
    pub input: PathBuf,

    /// Read name list restricting output
    #[arg(long)]
    pub accnos: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub no_fasta: bool,

    #[arg(long, default_value_t = false)]
    pub no_qual: bool,

    #[arg(long, default_value_t = false)]
    pub no_flow: bool,

    #[arg(long, default_value_t = false)]
    pub no_trim: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args)]
pub struct CommonArgs {
    /// Directory for outputs, the input's directory by default
    #[arg(long = "outputdir")]
    pub output_dir: Option<PathBuf>,

    /// Worker threads; 0 uses every core
    #[arg(short = 't', long, default_value_t = 1)]
    pub threads: usize,

    /// Repeat for more log output
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}
impl CommonArgs {
    pub fn context(&self) -> RunContext {
        match &self.output_dir {
            Some(dir) => RunContext::new().with_output_dir(dir),
            None => RunContext::new(),
        }
    }
}

fn clip_mode(no_trim: bool) -> ClipMode {
    if no_trim {
        ClipMode::CaseFold
    } else {
        ClipMode::Trim
    }
}

/// Matches an optional per-input list against the inputs
fn per_input(flag: &str, files: &[PathBuf], inputs: usize) -> Result<Vec<Option<PathBuf>>> {
    match files.len() {
        0 => Ok(vec![None; inputs]),
        n if n == inputs => Ok(files.iter().cloned().map(Some).collect()),
        n => bail!("--{flag} lists {n} files for {inputs} inputs"),
    }
}

impl ExtractArgs {
    pub fn options(&self) -> ExtractOptions {
        ExtractOptions {
            formats: TextFormats {
                fasta: !self.no_fasta,
                qual: !self.no_qual,
                flow: !self.no_flow,
                sfftxt: self.sfftxt,
            },
            clip: ClipPolicy::new(clip_mode(self.no_trim), self.clip_left),
            budgets: Budgets {
                barcode: self.bdiffs,
                primer: self.pdiffs,
                linker: self.ldiffs,
                spacer: self.sdiffs,
                total: self.tdiffs,
            },
            reorient: self.checkorient,
        }
    }

    pub fn jobs(&self) -> Result<Vec<FileJob>> {
        let n = self.inputs.len();
        let oligos = per_input("oligos", &self.oligos, n)?;
        let groups = per_input("group", &self.groups, n)?;
        let accnos = per_input("accnos", &self.accnos, n)?;
        if !self.options().formats.any() && oligos.iter().chain(&groups).all(Option::is_none) {
            bail!("Nothing to do: every output is disabled and no split file was given");
        }
        Ok(self
            .inputs
            .iter()
            .zip(oligos.into_iter().zip(groups))
            .zip(accnos)
            .map(|((input, (oligos, groups)), accnos)| FileJob {
                input: input.clone(),
                split: match (oligos, groups) {
                    (Some(path), _) => SplitMode::Oligos(path),
                    (None, Some(path)) => SplitMode::Groups(path),
                    (None, None) => SplitMode::None,
                },
                accnos,
            })
            .collect())
    }
}

impl TxtArgs {
    pub fn options(&self) -> ExtractOptions {
        ExtractOptions {
            formats: TextFormats {
                fasta: !self.no_fasta,
                qual: !self.no_qual,
                flow: !self.no_flow,
                sfftxt: false,
            },
            clip: ClipPolicy::new(clip_mode(self.no_trim), None),
            ..ExtractOptions::default()
        }
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    fn extract(args: &[&str]) -> ExtractArgs {
        let cli = Cli::try_parse_from(["sffkit", "extract"].iter().chain(args)).expect("parse");
        match cli.command {
            Commands::Extract(args) => args,
            Commands::Txt(_) => panic!("expected extract"),
        }
    }

    #[test]
    fn test_options() {
        let args = extract(&[
            "a.sff",
            "--bdiffs",
            "1",
            "--no-trim",
            "--clip-left",
            "5",
            "--checkorient",
        ]);
        let opts = args.options();
        assert_eq!(opts.budgets.barcode, 1);
        assert_eq!(opts.budgets.total_limit(), 1);
        assert_eq!(opts.clip.mode, ClipMode::CaseFold);
        assert_eq!(opts.clip.left_override, Some(5));
        assert!(opts.reorient);
        assert!(opts.formats.fasta && !opts.formats.sfftxt);
    }

    #[test]
    fn test_jobs_pair_files_with_inputs() -> Result<()> {
        let args = extract(&["a.sff", "b.sff", "--oligos", "a.oligos", "b.oligos"]);
        let jobs = args.jobs()?;
        assert_eq!(jobs[1].split, SplitMode::Oligos(PathBuf::from("b.oligos")));
        assert_eq!(jobs[1].accnos, None);

        let args = extract(&["a.sff", "b.sff", "--accnos", "one.accnos"]);
        assert!(args.jobs().is_err());
        Ok(())
    }

    #[test]
    fn test_oligos_and_groups_conflict() {
        let parsed = Cli::try_parse_from([
            "sffkit", "extract", "a.sff", "--oligos", "x", "--group", "y",
        ]);
        assert!(parsed.is_err());
    }
}
