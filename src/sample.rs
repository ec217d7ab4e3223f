//! Typed parsing of per-sample genotype tables.
//!
//! A sample table is a comma-separated file whose header names zero or more
//! polymorphic positions as `AA<position>` columns, alongside any number of
//! other columns (subject, timepoint, ...). Each data row is one sample
//! observation. Parsing keeps only the genotype cells, aligned with the
//! position columns sorted in ascending order.

use log::{info, warn};
use rayon::prelude::*;
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

use crate::error::PolyFreqError;
use crate::file::InputFile;
use crate::peptide::{PeptideFragment, Position};

static POSITION_COLUMN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^AA(\d+)$").unwrap());

/// The genotype cells of one sample row, in the order of [`SampleTable::positions`].
#[derive(Debug, Clone, PartialEq)]
pub struct GenotypeRow {
    pub genotypes: Vec<String>,
}

impl GenotypeRow {
    /// The genotype at the `index`-th position column.
    pub fn genotype(&self, index: usize) -> &str {
        &self.genotypes[index]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampleTable {
    pub path: String,
    /// Positions reported by this table, ascending and unique.
    pub positions: Vec<Position>,
    pub rows: Vec<GenotypeRow>,
}

impl SampleTable {
    /// Index range into [`SampleTable::positions`] (and each row's
    /// genotypes) of the positions within `[start, end]`.
    pub fn positions_within(&self, start: Position, end: Position) -> Range<usize> {
        let lo = self.positions.partition_point(|&p| p < start);
        let hi = self.positions.partition_point(|&p| p <= end);
        lo..hi.max(lo)
    }

    /// Whether any reported position falls inside the fragment's interval.
    pub fn is_relevant_to(&self, fragment: &PeptideFragment) -> bool {
        !self.positions_within(fragment.start, fragment.end).is_empty()
    }
}

/// Extract the position from an `AA<position>` column name.
///
/// Returns `Ok(None)` for columns that are not position columns, and an
/// error if the digits do not fit a [`Position`].
pub fn parse_position_column(path: &str, column: &str) -> Result<Option<Position>, PolyFreqError> {
    let Some(caps) = POSITION_COLUMN.captures(column) else {
        return Ok(None);
    };
    let digits = &caps[1];
    let position = digits.parse::<Position>().map_err(|_| {
        PolyFreqError::malformed(path, format!("position in column '{}' is out of range", column))
    })?;
    Ok(Some(position))
}

/// Read one sample table (plaintext or gzip-compressed).
pub fn read_sample_table(filepath: &str) -> Result<SampleTable, PolyFreqError> {
    let mut rdr = InputFile::new(filepath).csv_reader()?;
    let headers = rdr
        .headers()
        .map_err(|e| PolyFreqError::from_csv(filepath, e))?
        .clone();

    // (position, column index) pairs, sorted by position
    let mut columns: Vec<(Position, usize)> = Vec::new();
    for (idx, column) in headers.iter().enumerate() {
        if let Some(position) = parse_position_column(filepath, column)? {
            columns.push((position, idx));
        }
    }
    columns.sort_unstable();
    if let Some(pair) = columns.windows(2).find(|pair| pair[0].0 == pair[1].0) {
        return Err(PolyFreqError::malformed(
            filepath,
            format!("position {} is reported by more than one column", pair[0].0),
        ));
    }

    if columns.is_empty() {
        warn!("sample table '{}' has no AA<position> columns", filepath);
    }

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| PolyFreqError::from_csv(filepath, e))?;
        let genotypes = columns
            .iter()
            .map(|&(position, idx)| {
                record.get(idx).map(str::to_string).ok_or_else(|| {
                    PolyFreqError::malformed(
                        filepath,
                        format!("row is missing the AA{} column", position),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(GenotypeRow { genotypes });
    }

    info!(
        "sample table '{}': {} positions, {} rows",
        filepath,
        columns.len(),
        rows.len()
    );

    Ok(SampleTable {
        path: filepath.to_string(),
        positions: columns.into_iter().map(|(position, _)| position).collect(),
        rows,
    })
}

/// Read several independent sample tables in parallel.
///
/// The tables are returned in the order of `filepaths`; the first error
/// encountered aborts the whole read.
pub fn read_sample_tables<S: AsRef<str> + Sync>(
    filepaths: &[S],
) -> Result<Vec<SampleTable>, PolyFreqError> {
    filepaths
        .par_iter()
        .map(|path| read_sample_table(path.as_ref()))
        .collect()
}
