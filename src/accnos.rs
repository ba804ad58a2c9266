//! Read name filter loaded from an accession list

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::Result;

/// Set of read names to keep in text output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameSet {
    names: HashSet<String>,
}
impl NameSet {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Reads whitespace separated names
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut names = HashSet::new();
        for line in reader.lines() {
            names.extend(line?.split_whitespace().map(str::to_string));
        }
        Ok(Self { names })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
