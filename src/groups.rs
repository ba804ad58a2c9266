//! Read-to-group assignments loaded from a two column group file

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{GroupError, Result};

/// Lookup from read name to group
///
/// Groups are indexed in sorted order of their names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupMap {
    groups: Vec<String>,
    assignments: HashMap<String, usize>,
}
impl GroupMap {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parses `readName groupName` lines; blank lines are skipped
    ///
    /// # Errors
    ///
    /// Returns a [`GroupError`] if a line has fewer than two columns or a read is listed
    /// twice.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut pairs = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let mut tokens = line.split_whitespace();
            let Some(read) = tokens.next() else {
                continue;
            };
            let Some(group) = tokens.next() else {
                return Err(GroupError::MalformedLine(idx + 1).into());
            };
            pairs.push((read.to_string(), group.to_string()));
        }

        let groups: Vec<String> = pairs
            .iter()
            .map(|(_, g)| g.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut assignments = HashMap::with_capacity(pairs.len());
        for (read, group) in pairs {
            let index = groups.binary_search(&group).unwrap_or_default();
            if assignments.insert(read.clone(), index).is_some() {
                return Err(GroupError::DuplicateName(read).into());
            }
        }
        Ok(Self {
            groups,
            assignments,
        })
    }

    /// Index of the group a read is assigned to
    #[must_use]
    pub fn group_of(&self, read: &str) -> Option<usize> {
        self.assignments.get(read).copied()
    }

    /// Group names in index order
    #[must_use]
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Number of reads with an assignment
    #[must_use]
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::Error;
    use std::io::Cursor;

    #[test]
    fn test_parse() -> Result<()> {
        let map = GroupMap::from_reader(Cursor::new("r1\tsoil\nr2 forest\n\nr3\tsoil\n"))?;
        assert_eq!(map.groups(), ["forest", "soil"]);
        assert_eq!(map.group_of("r1"), Some(1));
        assert_eq!(map.group_of("r2"), Some(0));
        assert_eq!(map.group_of("missing"), None);
        assert_eq!(map.len(), 3);
        Ok(())
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            GroupMap::from_reader(Cursor::new("r1 a\nr2\n")),
            Err(Error::GroupError(GroupError::MalformedLine(2)))
        ));
    }

    #[test]
    fn test_duplicate() {
        assert!(matches!(
            GroupMap::from_reader(Cursor::new("r1 a\nr1 b\n")),
            Err(Error::GroupError(GroupError::DuplicateName(_)))
        ));
    }
}
