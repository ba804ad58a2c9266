use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::warn;

use crate::dna::{is_iupac, reverse_complement};
use crate::error::{OligoError, Result};

/// Group label marking destinations whose reads are discarded
pub const IGNORE_LABEL: &str = "ignore";

/// A named oligo sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Oligo {
    /// Upper-case sequence with `U` replaced by `T`
    pub seq: Vec<u8>,
    /// Name, empty when none was given
    pub name: String,
}

/// Oligos listed in an oligos file
///
/// Barcodes and forward primers are named; reverse primers are stored reverse
/// complemented so they can be searched for directly in a read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OligoSet {
    pub barcodes: Vec<Oligo>,
    pub primers: Vec<Oligo>,
    pub reverse_primers: Vec<Vec<u8>>,
    pub linkers: Vec<Vec<u8>>,
    pub spacers: Vec<Vec<u8>>,
}
impl OligoSet {
    /// Loads an oligos file from disk
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parses an oligos file
    ///
    /// Each line holds a directive followed by a sequence and, for barcodes and forward
    /// primers, an optional name. Text after `#` is a comment. Unknown directives are
    /// skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an [`OligoError`] if a line lists paired barcodes or primers, is missing its
    /// sequence, or holds a sequence with non-nucleotide characters.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut set = Self::default();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line_number = idx + 1;
            let content = line.split('#').next().unwrap_or_default();
            let tokens: Vec<&str> = content.split_whitespace().collect();
            let Some(directive) = tokens.first() else {
                continue;
            };
            let directive = directive.to_ascii_lowercase();
            let sequence = |position: usize| -> Result<Vec<u8>> {
                let Some(raw) = tokens.get(position) else {
                    return Err(OligoError::MissingSequence(line_number, directive.clone()).into());
                };
                normalize(raw, line_number)
            };
            let name = |position: usize| {
                tokens
                    .get(position)
                    .map(|s| (*s).to_string())
                    .unwrap_or_default()
            };

            match directive.as_str() {
                "forward" => set.primers.push(Oligo {
                    seq: sequence(1)?,
                    name: name(2),
                }),
                "reverse" => set.reverse_primers.push(reverse_complement(&sequence(1)?)),
                "barcode" => {
                    // barcode FORWARD REVERSE NAME
                    if tokens.len() > 3 {
                        return Err(OligoError::PairedUnsupported(line_number).into());
                    }
                    set.barcodes.push(Oligo {
                        seq: sequence(1)?,
                        name: name(2),
                    });
                }
                "primer" => return Err(OligoError::PairedUnsupported(line_number).into()),
                "linker" => set.linkers.push(sequence(1)?),
                "spacer" => set.spacers.push(sequence(1)?),
                other => warn!("Line {line_number}: unknown oligo type {other}, skipping"),
            }
        }
        Ok(set)
    }

    /// Number of barcode slots; one unnamed slot when no barcodes are listed
    #[must_use]
    pub fn barcode_slots(&self) -> usize {
        self.barcodes.len().max(1)
    }

    /// Number of primer slots; one unnamed slot when no forward primers are listed
    #[must_use]
    pub fn primer_slots(&self) -> usize {
        self.primers.len().max(1)
    }

    /// Name of the barcode in slot `index`
    #[must_use]
    pub fn barcode_name(&self, index: usize) -> &str {
        self.barcodes.get(index).map_or("", |o| o.name.as_str())
    }

    /// Name of the primer in slot `index`
    #[must_use]
    pub fn primer_name(&self, index: usize) -> &str {
        self.primers.get(index).map_or("", |o| o.name.as_str())
    }

    /// Group label of a barcode and primer pair: `B.P`, or whichever name is present
    #[must_use]
    pub fn group_name(&self, barcode: usize, primer: usize) -> String {
        let b = self.barcode_name(barcode);
        let p = self.primer_name(primer);
        match (b.is_empty(), p.is_empty()) {
            (true, _) => p.to_string(),
            (false, true) => b.to_string(),
            (false, false) => format!("{b}.{p}"),
        }
    }

    /// Label of the output file for a pair, or `None` when its reads are not kept
    ///
    /// Pairs whose label contains `ignore`, or whose names are both empty, have no output.
    #[must_use]
    pub fn destination_label(&self, barcode: usize, primer: usize) -> Option<String> {
        let label = self.group_name(barcode, primer);
        if label.is_empty() || label.contains(IGNORE_LABEL) {
            return None;
        }
        Some(label)
    }

    /// Whether any barcode or primer carries a name
    #[must_use]
    pub fn has_group_names(&self) -> bool {
        self.barcodes.iter().chain(&self.primers).any(|o| !o.name.is_empty())
    }
}

/// Upper-cases a sequence, maps `U` to `T` and validates it
fn normalize(raw: &str, line_number: usize) -> Result<Vec<u8>> {
    let seq: Vec<u8> = raw
        .bytes()
        .map(|b| match b.to_ascii_uppercase() {
            b'U' => b'T',
            other => other,
        })
        .collect();
    if seq.iter().all(|&b| is_iupac(b)) {
        Ok(seq)
    } else {
        Err(OligoError::InvalidSequence(line_number, raw.to_string()).into())
    }
}
