//! Accumulation of observed alleles onto peptide fragments.
//!
//! The [`Aggregator`] owns the peptide map for the whole run. Each sample
//! table is folded into it with [`Aggregator::add_sample`]: for every row,
//! every fragment whose interval covers one of the table's positions gets the
//! row's genotype appended at that position, and the fragment's own residue
//! at that position is recorded as the reference allele.

use log::{debug, info};
use std::collections::HashSet;

use crate::error::PolyFreqError;
use crate::peptide::{read_peptide_map, DuplicatePolicy, PeptideFragment, PeptideMap};
use crate::report::{Report, ReportMode};
use crate::sample::{read_sample_tables, SampleTable};

#[derive(Debug, Default)]
pub struct Aggregator {
    peptides: PeptideMap,
    /// Names of fragments covering a position of at least one sample table.
    relevant: HashSet<String>,
}

impl Aggregator {
    pub fn new(peptides: PeptideMap) -> Self {
        Self {
            peptides,
            relevant: HashSet::new(),
        }
    }

    /// Load the peptide map, then fold in every sample table in the order given.
    ///
    /// Sample tables are parsed in parallel; accumulation is sequential so
    /// the allele order within each position is the same on every run.
    pub fn from_files<S: AsRef<str> + Sync>(
        peptide_map: &str,
        sample_maps: &[S],
        duplicates: DuplicatePolicy,
    ) -> Result<Aggregator, PolyFreqError> {
        let peptides = read_peptide_map(peptide_map, duplicates)?;
        let tables = read_sample_tables(sample_maps)?;
        let mut aggregator = Aggregator::new(peptides);
        for table in &tables {
            aggregator.add_sample(table)?;
        }
        Ok(aggregator)
    }

    /// Fold one sample table into the accumulated alleles.
    ///
    /// Returns the number of fragments the table was relevant to. A table
    /// with no rows records nothing, not even reference alleles.
    pub fn add_sample(&mut self, table: &SampleTable) -> Result<usize, PolyFreqError> {
        // fragment index and the range of table positions inside its interval
        let mut targets = Vec::new();
        for (idx, fragment) in self.peptides.values().enumerate() {
            let range = table.positions_within(fragment.start, fragment.end);
            if range.is_empty() {
                continue;
            }
            debug!(
                "'{}' covers {} position(s) of '{}'",
                fragment.name,
                range.len(),
                table.path
            );
            self.relevant.insert(fragment.name.clone());
            targets.push((idx, range));
        }

        for row in &table.rows {
            for (idx, range) in &targets {
                let Some((_, fragment)) = self.peptides.get_index_mut(*idx) else {
                    continue;
                };
                for i in range.clone() {
                    let position = table.positions[i];
                    let residue = fragment.residue_at(position).ok_or_else(|| {
                        PolyFreqError::malformed(
                            &table.path,
                            format!(
                                "position {} is beyond the sequence of fragment '{}' ({}..={}, {} residues)",
                                position,
                                fragment.name,
                                fragment.start,
                                fragment.end,
                                fragment.sequence.chars().count()
                            ),
                        )
                    })?;
                    fragment.reference_alleles.insert((residue, position));
                    fragment
                        .observed_alleles
                        .entry(position)
                        .or_default()
                        .push_str(row.genotype(i));
                }
            }
        }

        info!(
            "'{}': {} rows across {} relevant fragment(s)",
            table.path,
            table.rows.len(),
            targets.len()
        );
        Ok(targets.len())
    }

    /// Iterate over the fragments in peptide-map order.
    pub fn fragments(&self) -> impl Iterator<Item = &PeptideFragment> {
        self.peptides.values()
    }

    pub fn get(&self, name: &str) -> Option<&PeptideFragment> {
        self.peptides.get(name)
    }

    /// Whether the named fragment covered a position of any sample table so far.
    pub fn is_relevant(&self, name: &str) -> bool {
        self.relevant.contains(name)
    }

    /// Return the number of peptide fragments.
    pub fn len(&self) -> usize {
        self.peptides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build the frequency report for the accumulated alleles.
    pub fn report(&self, mode: ReportMode) -> Report {
        Report::build(self, mode)
    }

    pub fn into_peptides(self) -> PeptideMap {
        self.peptides
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::GenotypeRow;

    fn peptides(fragments: &[(&str, &str, u64, u64)]) -> PeptideMap {
        fragments
            .iter()
            .map(|&(name, seq, start, end)| {
                (name.to_string(), PeptideFragment::new(name, seq, start, end))
            })
            .collect()
    }

    fn table(path: &str, positions: &[u64], rows: &[&[&str]]) -> SampleTable {
        SampleTable {
            path: path.to_string(),
            positions: positions.to_vec(),
            rows: rows
                .iter()
                .map(|cells| GenotypeRow {
                    genotypes: cells.iter().map(|c| c.to_string()).collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_add_sample_accumulates() {
        let mut agg = Aggregator::new(peptides(&[("Frag1", "MKVLA", 10, 14)]));
        let sample = table("a.csv", &[12], &[&["K"], &["K"], &["V"], &["K"]]);

        assert_eq!(agg.add_sample(&sample).unwrap(), 1);

        let frag = agg.get("Frag1").unwrap();
        assert_eq!(frag.observed_alleles[&12], "KKVK");
        assert_eq!(frag.reference_allele(12), Some('V'));
        assert_eq!(frag.reference_alleles.len(), 1);
        assert!(agg.is_relevant("Frag1"));
    }

    #[test]
    fn test_positions_outside_interval_ignored() {
        let mut agg = Aggregator::new(peptides(&[
            ("Frag1", "MKVLA", 10, 14),
            ("Frag2", "QRSTV", 12, 16),
            ("Frag3", "WWYYH", 20, 24),
        ]));
        let sample = table("a.csv", &[9, 14, 15], &[&["A", "L", "T"], &["A", "I", "A"]]);

        assert_eq!(agg.add_sample(&sample).unwrap(), 2);

        let frag1 = agg.get("Frag1").unwrap();
        assert_eq!(frag1.observed_alleles.keys().collect::<Vec<_>>(), vec![&14]);
        assert_eq!(frag1.observed_alleles[&14], "LI");

        let frag2 = agg.get("Frag2").unwrap();
        assert_eq!(frag2.observed_alleles.keys().collect::<Vec<_>>(), vec![&14, &15]);
        assert_eq!(frag2.reference_allele(14), Some('S'));
        assert_eq!(frag2.reference_allele(15), Some('T'));

        assert!(!agg.is_relevant("Frag3"));
        assert!(agg.get("Frag3").unwrap().observed_alleles.is_empty());

        for frag in agg.fragments() {
            for position in frag.observed_alleles.keys() {
                assert!(frag.covers(*position));
                assert!(frag.reference_allele(*position).is_some());
            }
        }
    }

    #[test]
    fn test_accumulation_is_additive_across_tables() {
        let mut agg = Aggregator::new(peptides(&[("Frag1", "MKVLA", 10, 14)]));
        agg.add_sample(&table("a.csv", &[12], &[&["K"], &["V"]])).unwrap();
        agg.add_sample(&table("b.csv", &[20], &[&["W"]])).unwrap();
        agg.add_sample(&table("c.csv", &[11, 12], &[&["K", "V"]])).unwrap();

        let frag = agg.get("Frag1").unwrap();
        assert_eq!(frag.observed_alleles[&12], "KVV");
        assert_eq!(frag.observed_alleles[&11], "K");
        assert_eq!(frag.reference_allele(11), Some('K'));
    }

    #[test]
    fn test_empty_genotype_cell() {
        let mut agg = Aggregator::new(peptides(&[("Frag1", "MKVLA", 10, 14)]));
        agg.add_sample(&table("a.csv", &[12], &[&["K"], &[""], &["V"]])).unwrap();
        assert_eq!(agg.get("Frag1").unwrap().observed_alleles[&12], "KV");
    }

    #[test]
    fn test_table_without_rows_records_nothing() {
        let mut agg = Aggregator::new(peptides(&[("Frag1", "MKVLA", 10, 14)]));
        assert_eq!(agg.add_sample(&table("a.csv", &[12], &[])).unwrap(), 1);
        let frag = agg.get("Frag1").unwrap();
        assert!(frag.observed_alleles.is_empty());
        assert!(frag.reference_alleles.is_empty());
        assert!(agg.is_relevant("Frag1"));
    }

    #[test]
    fn test_sequence_shorter_than_interval() {
        let mut agg = Aggregator::new(peptides(&[("Short", "MK", 10, 14)]));
        let err = agg.add_sample(&table("a.csv", &[13], &[&["K"]])).unwrap_err();
        assert!(matches!(err, PolyFreqError::MalformedInput { .. }));
    }
}
