//! Concurrent processing of several input files
//!
//! Each file runs through its own independent [`extract_file`] pipeline. Workers pull the
//! next job from a shared counter and share nothing else beyond the run context, whose
//! cancellation flag stops every worker at its next record.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use log::{debug, error};

use crate::context::RunContext;
use crate::error::Result;
use crate::pipeline::{extract_file, ExtractOptions, FileJob, Outcome};

/// Result of one job, in submission order
pub struct JobResult {
    pub input: PathBuf,
    pub outcome: Result<Outcome>,
}

/// Runs every job, `num_threads` at a time
///
/// A thread count of 0 uses every available core; larger counts are capped at the number
/// of cores. A failing file is logged and does not stop the others.
#[must_use]
pub fn extract_all(
    jobs: &[FileJob],
    opts: &ExtractOptions,
    ctx: &RunContext,
    num_threads: usize,
) -> Vec<JobResult> {
    // Calculate the number of threads to use
    let num_threads = if num_threads == 0 {
        num_cpus::get()
    } else {
        num_threads.min(num_cpus::get())
    }
    .clamp(1, jobs.len().max(1));
    debug!("Processing {} files on {num_threads} threads", jobs.len());

    let next = AtomicUsize::new(0);
    let mut results: Vec<(usize, JobResult)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..num_threads)
            .map(|_| {
                scope.spawn(|| {
                    let mut done = Vec::new();
                    loop {
                        let idx = next.fetch_add(1, Ordering::Relaxed);
                        let Some(job) = jobs.get(idx) else {
                            break;
                        };
                        let outcome = extract_file(job, opts, ctx);
                        if let Err(e) = &outcome {
                            error!("{}: {e}", job.input.display());
                        }
                        done.push((
                            idx,
                            JobResult {
                                input: job.input.clone(),
                                outcome,
                            },
                        ));
                    }
                    done
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| handle.join().expect("Error joining worker thread"))
            .collect()
    });
    results.sort_by_key(|(idx, _)| *idx);
    results.into_iter().map(|(_, result)| result).collect()
}
