//! Oligo tables and the bounded edit-distance matcher used to classify reads
//!
//! An oligos file lists the barcodes, primers, linkers and spacers expected at the start
//! of each read. [`OligoSet`] holds the parsed tables and the group labels derived from
//! barcode and primer names; [`Matcher`] strips them from reads.

mod matcher;
mod set;

pub use matcher::{Budgets, Matcher, OligoMatch, WorkingRead};
pub use set::{Oligo, OligoSet, IGNORE_LABEL};
