use indexmap::map::{Entry, IndexMap};
use log::{info, warn};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::PolyFreqError;
use crate::file::InputFile;

/// The integer type for 1-based residue positions.
pub type Position = u64;

/// Peptide fragments keyed by name, in the row order of the peptide map.
pub type PeptideMap = IndexMap<String, PeptideFragment>;

/// The columns a peptide map must carry; any others are ignored.
pub const PEPTIDE_COLUMNS: [&str; 4] = ["Name", "Sequence", "StartAA", "EndAA"];

/// What to do when a fragment name appears twice in the peptide map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Abort with [`PolyFreqError::DuplicateKey`].
    #[default]
    Fail,
    /// Keep the later row's data at the earlier row's place in the order.
    LastWriteWins,
}

/// A peptide fragment, the residue interval it covers, and the alleles
/// accumulated for it from the sample tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeptideFragment {
    pub name: String,
    pub sequence: String,
    /// First residue position covered (1-based, inclusive).
    pub start: Position,
    /// Last residue position covered (inclusive).
    pub end: Position,
    /// Genotype characters seen at each polymorphic position, in sample order.
    pub observed_alleles: BTreeMap<Position, String>,
    /// `(residue, position)` pairs taken from this fragment's own sequence.
    pub reference_alleles: BTreeSet<(char, Position)>,
}

impl PeptideFragment {
    pub fn new(name: &str, sequence: &str, start: Position, end: Position) -> Self {
        Self {
            name: name.to_string(),
            sequence: sequence.to_string(),
            start,
            end,
            ..Default::default()
        }
    }

    /// Whether `position` falls in `[start, end]`.
    pub fn covers(&self, position: Position) -> bool {
        self.start <= position && position <= self.end
    }

    /// The residue of this fragment's sequence at `position`, if the
    /// sequence is long enough to reach it.
    pub fn residue_at(&self, position: Position) -> Option<char> {
        let offset = position.checked_sub(self.start)?;
        let offset = usize::try_from(offset).ok()?;
        self.sequence.chars().nth(offset)
    }

    /// The recorded reference allele at `position`.
    pub fn reference_allele(&self, position: Position) -> Option<char> {
        self.reference_alleles
            .iter()
            .find(|(_, pos)| *pos == position)
            .map(|(residue, _)| *residue)
    }
}

#[derive(Debug, Deserialize)]
struct PeptideRecord {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Sequence")]
    sequence: String,
    #[serde(rename = "StartAA")]
    start: Position,
    #[serde(rename = "EndAA")]
    end: Position,
}

/// Read a comma-separated peptide map with `Name`, `Sequence`, `StartAA`
/// and `EndAA` columns (looked up by header, extra columns ignored).
///
/// The returned map preserves the row order of the file. Plaintext and
/// gzip-compressed input are both supported.
pub fn read_peptide_map(
    filepath: &str,
    duplicates: DuplicatePolicy,
) -> Result<PeptideMap, PolyFreqError> {
    let mut rdr = InputFile::new(filepath).csv_reader()?;

    let headers = rdr
        .headers()
        .map_err(|e| PolyFreqError::from_csv(filepath, e))?
        .clone();
    for column in PEPTIDE_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(PolyFreqError::malformed(
                filepath,
                format!("missing required column '{}'", column),
            ));
        }
    }

    let mut peptides = PeptideMap::new();
    for result in rdr.deserialize() {
        let record: PeptideRecord = result.map_err(|e| PolyFreqError::from_csv(filepath, e))?;
        let fragment = PeptideFragment::new(&record.name, &record.sequence, record.start, record.end);

        match peptides.entry(record.name) {
            Entry::Vacant(slot) => {
                slot.insert(fragment);
            }
            Entry::Occupied(mut slot) => match duplicates {
                DuplicatePolicy::Fail => {
                    return Err(PolyFreqError::DuplicateKey {
                        path: filepath.to_string(),
                        name: slot.key().clone(),
                    });
                }
                DuplicatePolicy::LastWriteWins => {
                    warn!("peptide fragment '{}' redefined, keeping the later row", slot.key());
                    slot.insert(fragment);
                }
            },
        }
    }

    info!("loaded {} peptide fragments from '{}'", peptides.len(), filepath);
    Ok(peptides)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_table(contents: &str) -> (tempfile::TempDir, String) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("peptides.csv");
        std::fs::write(&path, contents).unwrap();
        let path = path.to_str().unwrap().to_string();
        (dir, path)
    }

    #[test]
    fn test_read_peptide_map_fixture() {
        let peptides = read_peptide_map("tests/data/peptide_map.csv", DuplicatePolicy::Fail).unwrap();
        let names: Vec<&String> = peptides.keys().collect();
        assert_eq!(names, vec!["Frag1", "Frag2", "Frag3"]);

        let frag1 = &peptides["Frag1"];
        assert_eq!(frag1.sequence, "MKVLA");
        assert_eq!((frag1.start, frag1.end), (10, 14));
        assert!(frag1.observed_alleles.is_empty());
        assert!(frag1.reference_alleles.is_empty());
    }

    #[test]
    fn test_extra_columns_and_order() {
        let (_dir, path) = write_table("Notes,EndAA,Name,StartAA,Sequence\nx,5,B,1,MKVLA\ny,9,A,5,AGGTW\n");
        let peptides = read_peptide_map(&path, DuplicatePolicy::Fail).unwrap();
        assert_eq!(peptides.keys().collect::<Vec<_>>(), vec!["B", "A"]);
        assert_eq!(peptides["A"].start, 5);
    }

    #[test]
    fn test_missing_column() {
        let (_dir, path) = write_table("Name,Sequence,StartAA\nFrag1,MKVLA,10\n");
        let err = read_peptide_map(&path, DuplicatePolicy::Fail).unwrap_err();
        match err {
            PolyFreqError::MalformedInput { message, .. } => assert!(message.contains("EndAA")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_coordinate() {
        let (_dir, path) = write_table("Name,Sequence,StartAA,EndAA\nFrag1,MKVLA,ten,14\n");
        let err = read_peptide_map(&path, DuplicatePolicy::Fail).unwrap_err();
        assert!(matches!(err, PolyFreqError::MalformedInput { .. }));
    }

    #[test]
    fn test_duplicate_names() {
        let table = "Name,Sequence,StartAA,EndAA\nA,MKV,1,3\nB,LLL,4,6\nA,QQQ,7,9\n";
        let (_dir, path) = write_table(table);

        let err = read_peptide_map(&path, DuplicatePolicy::Fail).unwrap_err();
        assert!(matches!(err, PolyFreqError::DuplicateKey { ref name, .. } if name == "A"));

        let peptides = read_peptide_map(&path, DuplicatePolicy::LastWriteWins).unwrap();
        assert_eq!(peptides.keys().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(peptides["A"].sequence, "QQQ");
        assert_eq!(peptides["A"].start, 7);
    }

    #[test]
    fn test_residue_at() {
        let frag = PeptideFragment::new("Frag1", "MKVLA", 10, 14);
        assert_eq!(frag.residue_at(10), Some('M'));
        assert_eq!(frag.residue_at(12), Some('V'));
        assert_eq!(frag.residue_at(14), Some('A'));
        assert_eq!(frag.residue_at(9), None);
        assert_eq!(frag.residue_at(15), None);
        assert!(frag.covers(10) && frag.covers(14) && !frag.covers(15));
    }
}
