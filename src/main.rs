use anyhow::{bail, Result};
use clap::Parser;
use log::{info, warn};

use sffkit::{convert_txt, extract_all, Outcome};

mod cli;
use cli::{Cli, Commands};

/// Initializes the logger; 0 shows warnings and progress, each extra level adds detail
fn init_log(verbose: u8) -> Result<()> {
    stderrlog::new()
        .module("sffkit")
        .quiet(false)
        .verbosity(2 + usize::from(verbose))
        .timestamp(stderrlog::Timestamp::Off)
        .init()?;
    Ok(())
}

fn print_outputs(outcome: &Outcome) {
    match outcome {
        Outcome::Completed(report) => {
            if let Some(at) = report.corrupted_at {
                warn!(
                    "{}: stopped after {at} reads, the file may be corrupted",
                    report.input.display()
                );
            }
            println!("Output File Names:");
            for path in &report.outputs {
                println!("{}", path.display());
            }
        }
        Outcome::Cancelled => info!("Cancelled"),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Extract(args) => {
            init_log(args.common.verbose)?;
            let jobs = args.jobs()?;
            let ctx = args.common.context();
            let results = extract_all(&jobs, &args.options(), &ctx, args.common.threads);
            let failed = results.iter().filter(|r| r.outcome.is_err()).count();
            for result in &results {
                if let Ok(outcome) = &result.outcome {
                    print_outputs(outcome);
                }
            }
            if failed == results.len() {
                bail!("None of the {} input file(s) could be processed", results.len());
            }
        }
        Commands::Txt(args) => {
            init_log(args.common.verbose)?;
            let ctx = args.common.context();
            let outcome = convert_txt(&args.input, args.accnos.as_deref(), &args.options(), &ctx)?;
            print_outputs(&outcome);
        }
    }
    Ok(())
}
