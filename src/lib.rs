//! Per-position amino-acid polymorphism frequencies across peptide fragments.
//!
//! A *peptide map* lists fragments of a protein by name, sequence and the
//! residue interval `[StartAA, EndAA]` they cover. One or more *sample maps*
//! report, per subject, the residue observed at polymorphic positions (the
//! `AA<position>` columns). For every fragment covering a polymorphic position,
//! the observed residues are accumulated and turned into a frequency
//! distribution, labelled with the fragment's own (reference) residue.
//!
//! ```no_run
//! use polyfreq::prelude::*;
//!
//! let samples = ["week0.csv", "week4.csv"];
//! let aggregator = Aggregator::from_files("peptide_map.csv", &samples[..], DuplicatePolicy::Fail)
//!                      .expect("could not read input tables");
//!
//! let report = aggregator.report(ReportMode::Reference);
//! report.write_tsv("poly_freqs.tsv", false).expect("could not write report");
//! ```
//!
//! With [`ReportMode::NonReference`] fragments that overlap the same positions
//! are reported separately, one row per fragment and position, instead of the
//! first covering fragment standing in for the position.

pub mod aggregate;
pub mod error;
pub mod file;
pub mod peptide;
pub mod report;
pub mod sample;

pub use aggregate::Aggregator;
pub use error::PolyFreqError;
pub use peptide::{read_peptide_map, DuplicatePolicy, PeptideFragment, PeptideMap, Position};
pub use report::{frequency_distribution, Distribution, Report, ReportMode};
pub use sample::{read_sample_table, read_sample_tables, SampleTable};

pub mod prelude {
    pub use crate::aggregate::Aggregator;
    pub use crate::error::PolyFreqError;
    pub use crate::peptide::{read_peptide_map, DuplicatePolicy, PeptideFragment, Position};
    pub use crate::report::{Report, ReportMode};
    pub use crate::sample::{read_sample_table, read_sample_tables, SampleTable};
}
