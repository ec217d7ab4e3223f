use std::io;
use thiserror::Error;

use crate::file::FileError;

#[derive(Error, Debug)]
pub enum PolyFreqError {
    #[error("IO error: {0}")]
    IOError(#[from] io::Error),
    #[error("File reading error: {0}")]
    FileError(#[from] FileError),
    #[error("Malformed input in '{path}': {message}")]
    MalformedInput { path: String, message: String },
    #[error("Duplicate peptide fragment name '{name}' in '{path}'")]
    DuplicateKey { path: String, name: String },
}

impl PolyFreqError {
    pub fn malformed(path: &str, message: impl Into<String>) -> Self {
        PolyFreqError::MalformedInput {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Classify a CSV error: I/O failures stay I/O errors, everything else
    /// (missing columns, ragged rows, unparsable numbers) is malformed input.
    pub fn from_csv(path: &str, err: csv::Error) -> Self {
        if err.is_io_error() {
            match err.into_kind() {
                csv::ErrorKind::Io(e) => PolyFreqError::IOError(e),
                other => PolyFreqError::malformed(path, format!("{:?}", other)),
            }
        } else {
            PolyFreqError::malformed(path, err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ragged_row_is_malformed() {
        let data = "Name,StartAA\nFrag1,10,extra\n";
        let mut rdr = csv::Reader::from_reader(data.as_bytes());
        let err = rdr.records().next().unwrap().unwrap_err();
        let err = PolyFreqError::from_csv("peptides.csv", err);
        assert!(matches!(err, PolyFreqError::MalformedInput { ref path, .. } if path == "peptides.csv"));
    }
}
