use crate::dna::{bases_match, complement, reverse_complement_in_place};

use super::OligoSet;

/// Per-category edit-distance budgets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Budgets {
    pub barcode: u32,
    pub primer: u32,
    pub linker: u32,
    pub spacer: u32,
    /// Budget for the sum of all stages; 0 means the sum of the four budgets above
    pub total: u32,
}
impl Budgets {
    /// The effective budget for the sum of all stages
    #[must_use]
    pub fn total_limit(&self) -> u32 {
        if self.total == 0 {
            self.barcode + self.primer + self.linker + self.spacer
        } else {
            self.total
        }
    }
}

/// A successful match of one candidate oligo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OligoMatch {
    /// Position of the candidate in file order
    pub index: usize,
    /// Edit distance between the candidate and the matched read region
    pub diffs: u32,
}

/// Sequence and quality scores of a read being classified
///
/// Every successful strip removes the matched region from the read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingRead {
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}
impl WorkingRead {
    #[must_use]
    pub fn new(seq: &[u8], qual: &[u8]) -> Self {
        Self {
            seq: seq.to_vec(),
            qual: qual.to_vec(),
        }
    }

    /// Flips a read stripped by a mirrored matcher back to forward orientation
    pub fn reorient(&mut self) {
        reverse_complement_in_place(&mut self.seq);
        self.qual.reverse();
    }

    fn remove_front(&mut self, n: usize) {
        self.seq.drain(..n.min(self.seq.len()));
        self.qual.drain(..n.min(self.qual.len()));
    }

    fn remove_back(&mut self, n: usize) {
        self.seq.truncate(self.seq.len().saturating_sub(n));
        self.qual.truncate(self.qual.len().saturating_sub(n));
    }

    fn truncate(&mut self, len: usize) {
        self.seq.truncate(len);
        self.qual.truncate(len);
    }
}

/// Which oligo table a strip operates on
#[derive(Debug, Clone, Copy)]
enum Category {
    Barcode,
    Primer,
    Linker,
    Spacer,
}

/// Finds and strips oligos at one end of a read
///
/// A forward matcher aligns oligos against the start of the read. A mirrored matcher holds
/// the reverse complement of every oligo and aligns them against the end of the read, so
/// that a read sequenced in the opposite orientation can be recognised without copying it.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    /// Candidates in alignment order (complemented for a mirrored matcher)
    barcodes: Vec<Vec<u8>>,
    primers: Vec<Vec<u8>>,
    linkers: Vec<Vec<u8>>,
    spacers: Vec<Vec<u8>>,
    /// Reverse complemented reverse primers
    reverse_primers: Vec<Vec<u8>>,

    /// Whether oligos are matched at the end of the read
    mirrored: bool,

    /// Reversed read for mirrored alignment
    scratch: Vec<u8>,
    /// Dynamic programming rows
    prev: Vec<u32>,
    curr: Vec<u32>,
}
impl Matcher {
    /// Creates a matcher over the oligos of a set, aligned at the start of reads
    #[must_use]
    pub fn new(set: &OligoSet) -> Self {
        Self {
            barcodes: set.barcodes.iter().map(|o| o.seq.clone()).collect(),
            primers: set.primers.iter().map(|o| o.seq.clone()).collect(),
            linkers: set.linkers.clone(),
            spacers: set.spacers.clone(),
            reverse_primers: set.reverse_primers.clone(),
            ..Self::default()
        }
    }

    /// Creates a matcher over the reverse complemented barcodes and primers of a set,
    /// aligned at the end of reads
    ///
    /// Read from its end, the reverse complement of an oligo is the complement of the
    /// oligo read forward, which is what is stored.
    #[must_use]
    pub fn mirrored(set: &OligoSet) -> Self {
        let complemented = |seq: &[u8]| seq.iter().map(|&b| complement(b)).collect::<Vec<u8>>();
        Self {
            barcodes: set.barcodes.iter().map(|o| complemented(&o.seq)).collect(),
            primers: set.primers.iter().map(|o| complemented(&o.seq)).collect(),
            mirrored: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn has_barcodes(&self) -> bool {
        !self.barcodes.is_empty()
    }

    #[must_use]
    pub fn has_primers(&self) -> bool {
        !self.primers.is_empty()
    }

    #[must_use]
    pub fn has_linkers(&self) -> bool {
        !self.linkers.is_empty()
    }

    #[must_use]
    pub fn has_spacers(&self) -> bool {
        !self.spacers.is_empty()
    }

    #[must_use]
    pub fn has_reverse_primers(&self) -> bool {
        !self.reverse_primers.is_empty()
    }

    /// Strips the best matching barcode within `max_diffs` edits
    pub fn strip_barcode(&mut self, read: &mut WorkingRead, max_diffs: u32) -> Option<OligoMatch> {
        self.strip(Category::Barcode, read, max_diffs)
    }

    /// Strips the best matching forward primer within `max_diffs` edits
    pub fn strip_primer(&mut self, read: &mut WorkingRead, max_diffs: u32) -> Option<OligoMatch> {
        self.strip(Category::Primer, read, max_diffs)
    }

    /// Strips the best matching linker within `max_diffs` edits
    pub fn strip_linker(&mut self, read: &mut WorkingRead, max_diffs: u32) -> Option<OligoMatch> {
        self.strip(Category::Linker, read, max_diffs)
    }

    /// Strips the best matching spacer within `max_diffs` edits
    pub fn strip_spacer(&mut self, read: &mut WorkingRead, max_diffs: u32) -> Option<OligoMatch> {
        self.strip(Category::Spacer, read, max_diffs)
    }

    /// Searches for a reverse primer from the end of the read and truncates the read at
    /// the last hit
    ///
    /// Only exact (ambiguity-aware) hits count. Returns whether a primer was found.
    pub fn strip_reverse_primer(&mut self, read: &mut WorkingRead) -> bool {
        for primer in &self.reverse_primers {
            if primer.len() > read.seq.len() {
                continue;
            }
            let hit = (0..=read.seq.len() - primer.len()).rev().find(|&start| {
                primer
                    .iter()
                    .zip(&read.seq[start..])
                    .all(|(&o, &r)| bases_match(o, r))
            });
            if let Some(start) = hit {
                read.truncate(start);
                return true;
            }
        }
        false
    }

    fn strip(
        &mut self,
        category: Category,
        read: &mut WorkingRead,
        max_diffs: u32,
    ) -> Option<OligoMatch> {
        let Self {
            barcodes,
            primers,
            linkers,
            spacers,
            mirrored,
            scratch,
            prev,
            curr,
            ..
        } = self;
        let candidates = match category {
            Category::Barcode => barcodes,
            Category::Primer => primers,
            Category::Linker => linkers,
            Category::Spacer => spacers,
        };

        let target: &[u8] = if *mirrored {
            scratch.clear();
            scratch.extend(read.seq.iter().rev());
            scratch
        } else {
            &read.seq
        };

        let hit = best_match(candidates, target, max_diffs, prev, curr)?;
        if *mirrored {
            read.remove_back(hit.consumed);
        } else {
            read.remove_front(hit.consumed);
        }
        Some(OligoMatch {
            index: hit.index,
            diffs: hit.diffs,
        })
    }
}

/// Best alignment of one candidate against a read prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Hit {
    index: usize,
    diffs: u32,
    consumed: usize,
}

/// Picks the candidate with the fewest edits against the read prefix
///
/// Exact matches resolve to the first candidate in file order. A fuzzy best score shared
/// by two different sequences is ambiguous and yields no match.
fn best_match(
    candidates: &[Vec<u8>],
    read: &[u8],
    max_diffs: u32,
    prev: &mut Vec<u32>,
    curr: &mut Vec<u32>,
) -> Option<Hit> {
    let mut best: Option<Hit> = None;
    let mut ambiguous = false;
    for (index, oligo) in candidates.iter().enumerate() {
        let Some((diffs, consumed)) = prefix_distance(oligo, read, max_diffs, prev, curr) else {
            continue;
        };
        match best {
            Some(b) if diffs > b.diffs => {}
            Some(b) if diffs == b.diffs => {
                if diffs > 0 && candidates[b.index] != *oligo {
                    ambiguous = true;
                }
            }
            _ => {
                best = Some(Hit {
                    index,
                    diffs,
                    consumed,
                });
                ambiguous = false;
            }
        }
    }
    if ambiguous {
        None
    } else {
        best
    }
}

/// Edit distance between `oligo` and the best-aligning prefix of `read`
///
/// The whole oligo must align; the read prefix length is free. Returns the distance and
/// the number of read bases consumed, preferring the prefix length closest to the oligo
/// length among equally good alignments, or `None` when every alignment exceeds
/// `max_diffs`.
fn prefix_distance(
    oligo: &[u8],
    read: &[u8],
    max_diffs: u32,
    prev: &mut Vec<u32>,
    curr: &mut Vec<u32>,
) -> Option<(u32, usize)> {
    let m = oligo.len();
    let n = read.len().min(m + max_diffs as usize);

    prev.clear();
    prev.extend(0..=n as u32);
    curr.clear();
    curr.resize(n + 1, 0);

    for i in 1..=m {
        curr[0] = i as u32;
        let mut row_min = curr[0];
        for j in 1..=n {
            let cost = u32::from(!bases_match(oligo[i - 1], read[j - 1]));
            curr[j] = (prev[j - 1] + cost).min(prev[j] + 1).min(curr[j - 1] + 1);
            row_min = row_min.min(curr[j]);
        }
        // row minima never decrease
        if row_min > max_diffs {
            return None;
        }
        std::mem::swap(prev, curr);
    }

    (0..=n)
        .map(|j| (prev[j], j.abs_diff(m), j))
        .min()
        .filter(|&(diffs, _, _)| diffs <= max_diffs)
        .map(|(diffs, _, j)| (diffs, j))
}
