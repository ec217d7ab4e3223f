//! Encapsulates plaintext and gzip-compressed file input and output.
//!
//! The [`InputFile`] and [`OutputFile`] abstractions are for reading the
//! comma-separated peptide and sample tables, and writing the tab-separated
//! frequency report, any of which may be gzip-compressed.
//!
use csv::{ReaderBuilder, Trim};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::Write;
use std::io::{self, BufWriter};
use std::io::{BufReader, Read};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("IO error on '{0}': {1}")]
    IOError(String, #[source] io::Error),
}

/// Check if a file is gzipped by looking for the magic numbers.
///
/// Files shorter than the two magic bytes are treated as plaintext.
fn is_gzipped_file(file_path: &str) -> io::Result<bool> {
    let file = File::open(file_path)?;
    let mut buffer = Vec::with_capacity(2);
    file.take(2).read_to_end(&mut buffer)?;
    Ok(buffer == [0x1f, 0x8b])
}

/// Represents an input table.
///
/// Plaintext and gzip-compressed input are read through a common interface;
/// compression is detected from the file contents, not the extension.
pub struct InputFile {
    pub filepath: String,
}

impl InputFile {
    /// Constructs a new `InputFile`.
    pub fn new(filepath: &str) -> Self {
        Self {
            filepath: filepath.to_string(),
        }
    }

    /// Opens the file and returns a buffered reader, decompressing if needed.
    pub fn reader(&self) -> Result<BufReader<Box<dyn Read>>, FileError> {
        let wrap = |e| FileError::IOError(self.filepath.clone(), e);
        let file = File::open(&self.filepath).map_err(wrap)?;
        let is_gzipped = is_gzipped_file(&self.filepath).map_err(wrap)?;
        let reader: Box<dyn Read> = if is_gzipped {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(BufReader::new(reader))
    }

    /// Opens the file as a header-driven, comma-separated table.
    ///
    /// Cells and header names are whitespace-trimmed, and every row must
    /// have as many fields as the header.
    pub fn csv_reader(&self) -> Result<csv::Reader<BufReader<Box<dyn Read>>>, FileError> {
        let reader = self.reader()?;
        Ok(ReaderBuilder::new()
            .delimiter(b',')
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader))
    }
}

/// Represents an output file.
///
/// This struct is used to handle operations on an output file, such as writing to the file.
/// This abstracts writing both plaintext and gzip-compressed files.
pub struct OutputFile {
    pub filepath: String,
    pub header: Option<Vec<String>>,
}

impl OutputFile {
    /// Constructs a new `OutputFile`.
    ///
    /// # Arguments
    ///
    /// * `filepath` - A string slice that holds the path to the file. If the file extension is
    /// `.gz`, `OutputFile` will automatically write gzip-compressed output.
    /// * `header` - Optional column names, written tab-separated as the first line.
    pub fn new(filepath: &str, header: Option<Vec<String>>) -> Self {
        Self {
            filepath: filepath.to_string(),
            header,
        }
    }

    /// Creates the file and returns a buffered writer, with the header
    /// already written if one is set.
    pub fn writer(&self) -> Result<Box<dyn Write>, FileError> {
        let outfile = &self.filepath;
        let wrap = |e| FileError::IOError(outfile.clone(), e);
        let file = File::create(outfile).map_err(wrap)?;
        let mut writer: Box<dyn Write> = if outfile.ends_with(".gz") {
            Box::new(BufWriter::new(GzEncoder::new(file, Compression::default())))
        } else {
            Box::new(BufWriter::new(file))
        };
        if let Some(columns) = &self.header {
            writeln!(writer, "{}", columns.join("\t")).map_err(wrap)?;
        }
        Ok(writer)
    }
}
