//! Read classification
//!
//! Every read is assigned a [`Destination`] and a [`TrashCode`]. Reads with an empty
//! trash code are accepted into their destination; the rest go to the scrap file.
//!
//! In oligo mode the stages run in a fixed order, each appending its tag on failure:
//!
//! | tag | stage                                                  |
//! |-----|--------------------------------------------------------|
//! | `k` | linker                                                 |
//! | `b` | barcode                                                |
//! | `s` | spacer                                                 |
//! | `f` | forward primer                                         |
//! | `t` | sum of the edits above exceeds the total budget        |
//! | `r` | reverse primer absent                                  |
//! | `i` | destination is ignored (checked after reorientation)   |
//!
//! In group mode the only tag is `g`, for reads without a group assignment.

use std::fmt;

use crate::groups::GroupMap;
use crate::oligo::{Budgets, Matcher, OligoSet, WorkingRead};

/// Stage tags recorded for a read that failed classification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrashCode(String);
impl TrashCode {
    pub fn push(&mut self, tag: char) {
        self.0.push(tag);
    }

    /// Records the tags of a failed reoriented attempt, in parentheses
    pub fn push_reoriented(&mut self, other: &TrashCode) {
        self.0.push('(');
        self.0.push_str(&other.0);
        self.0.push(')');
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl fmt::Display for TrashCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Logical output target of a read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Barcode and primer slots of an oligo set
    Pair { barcode: usize, primer: usize },
    /// Group index of a group map
    Group(usize),
}

/// Outcome of classifying one read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Destination resolved for the read; meaningful only when accepted
    pub destination: Destination,
    pub trash: TrashCode,
    /// Read with every matched oligo removed, in forward orientation
    pub read: WorkingRead,
    /// Whether the reverse complement attempt produced this verdict
    pub reoriented: bool,
}
impl Verdict {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.trash.is_empty()
    }

    /// Destination of an accepted read, `None` for scrap
    #[must_use]
    pub fn route(&self) -> Option<Destination> {
        self.is_accepted().then_some(self.destination)
    }
}

/// Classifies reads by the oligos at their start
pub struct OligoClassifier {
    forward: Matcher,
    /// Present when reorientation is enabled
    mirrored: Option<Matcher>,
    budgets: Budgets,
    /// Whether reads of each barcode and primer pair are kept
    kept: Vec<Vec<bool>>,
}
impl OligoClassifier {
    #[must_use]
    pub fn new(set: &OligoSet, budgets: Budgets, reorient: bool) -> Self {
        let kept = (0..set.barcode_slots())
            .map(|b| {
                (0..set.primer_slots())
                    .map(|p| set.destination_label(b, p).is_some())
                    .collect()
            })
            .collect();
        Self {
            forward: Matcher::new(set),
            mirrored: reorient.then(|| Matcher::mirrored(set)),
            budgets,
            kept,
        }
    }

    /// Runs every stage on a read
    ///
    /// # Arguments
    ///
    /// * `bases` - The read as emitted under the active clip policy
    /// * `quality` - Quality scores aligned with `bases`
    pub fn classify(&mut self, bases: &[u8], quality: &[u8]) -> Verdict {
        let budgets = self.budgets;
        let forward = &mut self.forward;
        let mut read = WorkingRead::new(bases, quality);
        let mut trash = TrashCode::default();
        let mut diffs = 0;
        let mut barcode = 0;
        let mut primer = 0;

        if forward.has_linkers() {
            match forward.strip_linker(&mut read, budgets.linker) {
                Some(m) => diffs += m.diffs,
                None => trash.push('k'),
            }
        }
        if forward.has_barcodes() {
            match forward.strip_barcode(&mut read, budgets.barcode) {
                Some(m) => {
                    diffs += m.diffs;
                    barcode = m.index;
                }
                None => trash.push('b'),
            }
        }
        if forward.has_spacers() {
            match forward.strip_spacer(&mut read, budgets.spacer) {
                Some(m) => diffs += m.diffs,
                None => trash.push('s'),
            }
        }
        if forward.has_primers() {
            match forward.strip_primer(&mut read, budgets.primer) {
                Some(m) => {
                    diffs += m.diffs;
                    primer = m.index;
                }
                None => trash.push('f'),
            }
        }
        if diffs > budgets.total_limit() {
            trash.push('t');
        }
        if forward.has_reverse_primers() && !forward.strip_reverse_primer(&mut read) {
            trash.push('r');
        }

        let mut reoriented = false;
        if !trash.is_empty() {
            if let Some(mirrored) = self.mirrored.as_mut() {
                let retry = Self::classify_mirrored(mirrored, budgets, bases, quality);
                match retry {
                    Ok((b, p, mut retried)) => {
                        retried.reorient();
                        barcode = b;
                        primer = p;
                        read = retried;
                        trash = TrashCode::default();
                        reoriented = true;
                    }
                    Err(code) => trash.push_reoriented(&code),
                }
            }
        }

        if trash.is_empty() && !self.kept[barcode][primer] {
            trash.push('i');
        }

        Verdict {
            destination: Destination::Pair { barcode, primer },
            trash,
            read,
            reoriented,
        }
    }

    /// Barcode, primer and total stages against the end of the untrimmed read
    fn classify_mirrored(
        mirrored: &mut Matcher,
        budgets: Budgets,
        bases: &[u8],
        quality: &[u8],
    ) -> Result<(usize, usize, WorkingRead), TrashCode> {
        let mut read = WorkingRead::new(bases, quality);
        let mut trash = TrashCode::default();
        let mut diffs = 0;
        let mut barcode = 0;
        let mut primer = 0;

        if mirrored.has_barcodes() {
            match mirrored.strip_barcode(&mut read, budgets.barcode) {
                Some(m) => {
                    diffs += m.diffs;
                    barcode = m.index;
                }
                None => trash.push('b'),
            }
        }
        if mirrored.has_primers() {
            match mirrored.strip_primer(&mut read, budgets.primer) {
                Some(m) => {
                    diffs += m.diffs;
                    primer = m.index;
                }
                None => trash.push('f'),
            }
        }
        if diffs > budgets.total_limit() {
            trash.push('t');
        }

        if trash.is_empty() {
            Ok((barcode, primer, read))
        } else {
            Err(trash)
        }
    }
}

/// Classifies reads by a read-name to group lookup
pub struct GroupClassifier {
    groups: GroupMap,
}
impl GroupClassifier {
    #[must_use]
    pub fn new(groups: GroupMap) -> Self {
        Self { groups }
    }

    #[must_use]
    pub fn classify(&self, name: &str, bases: &[u8], quality: &[u8]) -> Verdict {
        let mut trash = TrashCode::default();
        let group = self.groups.group_of(name).unwrap_or_else(|| {
            trash.push('g');
            0
        });
        Verdict {
            destination: Destination::Group(group),
            trash,
            read: WorkingRead::new(bases, quality),
            reoriented: false,
        }
    }

    #[must_use]
    pub fn groups(&self) -> &GroupMap {
        &self.groups
    }
}

/// Classifier for either split mode
pub enum Classifier {
    Oligos(OligoClassifier),
    Groups(GroupClassifier),
}
impl Classifier {
    pub fn classify(&mut self, name: &str, bases: &[u8], quality: &[u8]) -> Verdict {
        match self {
            Self::Oligos(classifier) => classifier.classify(bases, quality),
            Self::Groups(classifier) => classifier.classify(name, bases, quality),
        }
    }
}
