//! Per-file progress logging

use log::info;

/// Reads between two progress lines
pub const INTERVAL: u32 = 10_000;

/// Counts the reads of one input, logging every [`INTERVAL`] reads
#[derive(Debug)]
pub struct ProgressTracker {
    label: String,
    count: u32,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            count: 0,
        }
    }

    /// Counts one read; returns whether a progress line was logged
    pub fn tick(&mut self) -> bool {
        self.count += 1;
        let due = self.count % INTERVAL == 0;
        if due {
            info!("{}: {} reads", self.label, self.count);
        }
        due
    }

    /// Logs the total unless the last tick already did, and returns it
    pub fn finish(&self) -> u32 {
        if self.count % INTERVAL != 0 {
            info!("{}: {} reads (done)", self.label, self.count);
        }
        self.count
    }

    /// Reads counted so far
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }
}
