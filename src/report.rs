use indexmap::IndexMap;
use log::info;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;

use crate::aggregate::Aggregator;
use crate::error::PolyFreqError;
use crate::file::OutputFile;
use crate::peptide::Position;

/// Decimal places of each allele proportion in the output.
pub const PROPORTION_PRECISION: usize = 3;

/// Which of the two report layouts to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportMode {
    /// One row per position, taken from the first fragment covering it.
    #[default]
    Reference,
    /// One row per fragment and position, fragments kept distinct.
    NonReference,
}

/// Allele counts at one position, most common first.
///
/// Characters with equal counts stay in the order they were first counted.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    pub counts: Vec<(char, usize)>,
    pub total: usize,
}

impl Distribution {
    /// `(allele, proportion)` pairs in output order.
    pub fn proportions(&self) -> impl Iterator<Item = (char, f64)> + '_ {
        let total = self.total as f64;
        self.counts
            .iter()
            .map(move |&(allele, count)| (allele, count as f64 / total))
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (allele, proportion)) in self.proportions().enumerate() {
            if i > 0 {
                write!(f, "\t")?;
            }
            write!(f, "{}:{:.*}", allele, PROPORTION_PRECISION, proportion)?;
        }
        Ok(())
    }
}

/// Count each character of the accumulated alleles.
///
/// Returns `None` when nothing was observed.
pub fn frequency_distribution(alleles: &str) -> Option<Distribution> {
    let mut counts: IndexMap<char, usize> = IndexMap::new();
    for allele in alleles.chars() {
        *counts.entry(allele).or_insert(0) += 1;
    }
    if counts.is_empty() {
        return None;
    }
    let total = counts.values().sum();
    let mut counts: Vec<(char, usize)> = counts.into_iter().collect();
    // stable, so ties keep first-counted order
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    Some(Distribution { counts, total })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceRow {
    pub reference_allele: Option<char>,
    pub position: Position,
    pub distribution: Distribution,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NonReferenceRow {
    pub fragment: String,
    pub reference_allele: Option<char>,
    pub position: Position,
    pub distribution: Distribution,
}

fn allele_field(allele: Option<char>) -> String {
    allele.map(String::from).unwrap_or_default()
}

impl fmt::Display for ReferenceRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}",
            allele_field(self.reference_allele),
            self.position,
            self.distribution
        )
    }
}

impl fmt::Display for NonReferenceRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}",
            self.fragment,
            allele_field(self.reference_allele),
            self.position,
            self.distribution
        )
    }
}

/// Polymorphism frequencies, in one of the two output layouts.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    /// Rows sorted by position; where fragments overlap, the first fragment
    /// in peptide-map order with observations at a position supplies its row.
    Reference(Vec<ReferenceRow>),
    /// Rows grouped by fragment in peptide-map order, sorted by position
    /// within each fragment.
    NonReference(Vec<NonReferenceRow>),
}

impl Report {
    pub fn build(aggregator: &Aggregator, mode: ReportMode) -> Report {
        match mode {
            ReportMode::Reference => {
                let mut rows: BTreeMap<Position, ReferenceRow> = BTreeMap::new();
                for fragment in aggregator.fragments() {
                    for (&position, alleles) in &fragment.observed_alleles {
                        if rows.contains_key(&position) {
                            continue;
                        }
                        let Some(distribution) = frequency_distribution(alleles) else {
                            continue;
                        };
                        rows.insert(
                            position,
                            ReferenceRow {
                                reference_allele: fragment.reference_allele(position),
                                position,
                                distribution,
                            },
                        );
                    }
                }
                Report::Reference(rows.into_values().collect())
            }
            ReportMode::NonReference => {
                let mut rows = Vec::new();
                for fragment in aggregator.fragments() {
                    if !aggregator.is_relevant(&fragment.name) {
                        continue;
                    }
                    for (&position, alleles) in &fragment.observed_alleles {
                        let Some(distribution) = frequency_distribution(alleles) else {
                            continue;
                        };
                        rows.push(NonReferenceRow {
                            fragment: fragment.name.clone(),
                            reference_allele: fragment.reference_allele(position),
                            position,
                            distribution,
                        });
                    }
                }
                Report::NonReference(rows)
            }
        }
    }

    pub fn mode(&self) -> ReportMode {
        match self {
            Report::Reference(_) => ReportMode::Reference,
            Report::NonReference(_) => ReportMode::NonReference,
        }
    }

    /// Return the number of rows in the report.
    pub fn len(&self) -> usize {
        match self {
            Report::Reference(rows) => rows.len(),
            Report::NonReference(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Column names for the optional header line. The distribution spans a
    /// variable number of tab-separated fields, so it gets a single name.
    pub fn header(&self) -> Vec<String> {
        let columns: &[&str] = match self {
            Report::Reference(_) => &["reference_allele", "position", "distribution"],
            Report::NonReference(_) => {
                &["fragment", "reference_allele", "position", "distribution"]
            }
        };
        columns.iter().map(|c| c.to_string()).collect()
    }

    /// Write the report rows, one per line, without a header.
    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), PolyFreqError> {
        match self {
            Report::Reference(rows) => {
                for row in rows {
                    writeln!(writer, "{}", row)?;
                }
            }
            Report::NonReference(rows) => {
                for row in rows {
                    writeln!(writer, "{}", row)?;
                }
            }
        }
        Ok(())
    }

    /// Write the report to a tab-separated file.
    ///
    /// # Arguments
    ///  * `filepath`: the output path. If it has a `.gz` extension, the
    ///  output will be gzip compressed.
    ///  * `header`: whether to write a column-name line first.
    pub fn write_tsv(&self, filepath: &str, header: bool) -> Result<(), PolyFreqError> {
        let header = header.then(|| self.header());
        let mut writer = OutputFile::new(filepath, header).writer()?;
        self.write(&mut writer)?;
        writer.flush()?;
        info!("wrote {} rows to '{}'", self.len(), filepath);
        Ok(())
    }
}
