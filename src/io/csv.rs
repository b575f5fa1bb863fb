//! Tabular (comma-delimited) I/O for the partition and reassembly paths.
//!
//! This module provides:
//! - **Source reading**: [`CsvSource`] opens a file, parses the header and yields
//!   rows one at a time so the partitioner never has to hold the whole file
//! - **Row-block encoding**: [`encode_rows`] / [`decode_rows`] give the canonical,
//!   reversible byte form of a group's rows that is fed through a codec
//! - **Output**: [`GroupFileWriter`] appends whole groups to the output file
//!
//! # Design notes
//! - Rows are plain `Vec<String>`; no schema is inferred or validated.
//! - Every data row must have as many fields as the header (the `csv` reader
//!   rejects ragged rows).
//! - A row block is itself CSV text without a header, so quoting and embedded
//!   commas or newlines survive the round trip.

use crate::error::{Error, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One data row: an ordered sequence of string fields.
pub type Row = Vec<String>;

/// Column names of a source and their zero-based positions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl Header {
    /// Build a header from its column names.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateColumn`] if a name occurs twice.
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut index = HashMap::with_capacity(columns.len());
        for (pos, name) in columns.iter().enumerate() {
            if index.insert(name.clone(), pos).is_some() {
                return Err(Error::DuplicateColumn(name.clone()));
            }
        }
        Ok(Self { columns, index })
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The header as a single CSV line (no trailing newline).
    ///
    /// # Errors
    /// Propagates CSV encoding failures.
    pub fn to_csv_line(&self) -> Result<String> {
        let bytes = encode_rows(std::slice::from_ref(&self.columns))?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(text.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Inverse of [`Header::to_csv_line`].
    ///
    /// # Errors
    /// Fails on malformed CSV or duplicate names.
    pub fn from_csv_line(line: &str) -> Result<Self> {
        let first = decode_rows(line.as_bytes())?.into_iter().next().unwrap_or_default();
        Self::new(first)
    }
}

/// Streaming reader over a comma-delimited file whose first row is the header.
pub struct CsvSource {
    path: PathBuf,
    reader: csv::Reader<File>,
    header: Header,
    record: StringRecord,
    rows_read: u64,
}

impl CsvSource {
    /// Open `path` and parse its header row.
    ///
    /// # Errors
    /// Returns [`Error::InputNotFound`] if `path` is not a regular file, and
    /// CSV or duplicate-column errors for a bad header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(Error::InputNotFound(path));
        }
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_path(&path)?;
        let header = Header::new(reader.headers()?.iter())?;
        log::debug!(
            "opened {} with {} columns",
            path.display(),
            header.len()
        );
        Ok(Self {
            path,
            reader,
            header,
            record: StringRecord::new(),
            rows_read: 0,
        })
    }

    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Data rows consumed so far (header excluded).
    #[must_use]
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// Read the next data row, or `None` at end of stream.
    ///
    /// # Errors
    /// Propagates CSV errors, including rows whose field count differs from
    /// the header.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        if !self.reader.read_record(&mut self.record)? {
            return Ok(None);
        }
        self.rows_read += 1;
        Ok(Some(self.record.iter().map(String::from).collect()))
    }
}

/// Serialize a block of rows into headerless CSV bytes.
///
/// # Errors
/// Propagates CSV write failures.
pub fn encode_rows(rows: &[Row]) -> Result<Vec<u8>> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(Vec::with_capacity(rows.len().saturating_mul(32)));
    for row in rows {
        wtr.write_record(row)?;
    }
    wtr.into_inner().map_err(|e| Error::Io(e.into_error()))
}

/// Parse a headerless CSV block back into rows.
///
/// # Errors
/// Propagates CSV parse failures.
pub fn decode_rows(bytes: &[u8]) -> Result<Vec<Row>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    let mut out = Vec::new();
    for rec in rdr.records() {
        out.push(rec?.iter().map(String::from).collect());
    }
    Ok(out)
}

/// Output file that receives whole groups, one physical write per group.
pub struct GroupFileWriter {
    path: PathBuf,
    file: File,
    groups: usize,
    rows: u64,
}

impl GroupFileWriter {
    /// Create (or truncate) the output file, creating parent directories.
    ///
    /// # Errors
    /// Returns an I/O error if the file or its directories cannot be created.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        Ok(Self {
            path,
            file,
            groups: 0,
            rows: 0,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the header row.
    ///
    /// # Errors
    /// Propagates encoding and I/O failures.
    pub fn write_header(&mut self, header: &Header) -> Result<()> {
        let buf = encode_rows(std::slice::from_ref(&header.columns))?;
        self.file.write_all(&buf)?;
        Ok(())
    }

    /// Append one group's rows.
    ///
    /// # Errors
    /// Propagates encoding and I/O failures.
    pub fn write_group(&mut self, rows: &[Row]) -> Result<()> {
        let buf = encode_rows(rows)?;
        self.file.write_all(&buf)?;
        self.groups += 1;
        self.rows += rows.len() as u64;
        Ok(())
    }

    /// Flush and report `(groups, rows)` written.
    ///
    /// # Errors
    /// Propagates I/O failures.
    pub fn finish(mut self) -> Result<(usize, u64)> {
        self.file.flush()?;
        Ok((self.groups, self.rows))
    }
}
