//! Test helpers: temporary files, CSV fixtures and row assertions.
//!
//! ```
//! use shardstash::testing::*;
//!
//! # fn main() -> std::io::Result<()> {
//! let (header, rows) = sample_sales();
//! let input = mock_csv_file(&header, &rows)?;
//! let (read_header, read_rows) = read_csv_output(input.path())?;
//! assert_eq!(read_header, header);
//! assert_rows_unordered_equal(read_rows, rows);
//! # Ok(())
//! # }
//! ```

use crate::io::csv::Row;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};

/// A temporary file that is deleted when dropped.
pub struct TempFilePath {
    #[allow(dead_code)]
    temp_file: NamedTempFile,
    path: PathBuf,
}

impl TempFilePath {
    /// # Errors
    /// Returns an error if the temporary file cannot be created.
    pub fn with_extension(extension: &str) -> std::io::Result<Self> {
        let temp_file = tempfile::Builder::new()
            .suffix(&format!(".{extension}"))
            .tempfile()?;
        let path = temp_file.path().to_path_buf();
        Ok(Self { temp_file, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A temporary directory that is deleted, with its contents, when dropped.
pub struct TempDirPath {
    #[allow(dead_code)]
    temp_dir: TempDir,
    path: PathBuf,
}

impl TempDirPath {
    /// # Errors
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().to_path_buf();
        Ok(Self { temp_dir, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.path.join(filename)
    }
}

/// Write `header` and `rows` to a fresh temporary CSV file.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn mock_csv_file(header: &[String], rows: &[Row]) -> std::io::Result<TempFilePath> {
    let temp = TempFilePath::with_extension("csv")?;
    write_csv_file(temp.path(), header, rows)?;
    Ok(temp)
}

/// Write `header` and `rows` to `path`, replacing any existing file.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn write_csv_file(path: &Path, header: &[String], rows: &[Row]) -> std::io::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()
}

/// Read a CSV file written by the decompression stage: header row plus data rows.
///
/// # Errors
/// Returns an error if the file is missing or not valid CSV.
pub fn read_csv_output(path: &Path) -> std::io::Result<(Vec<String>, Vec<Row>)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    let header = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok((header, rows))
}

/// Read a CSV file that has no header row.
///
/// # Errors
/// Returns an error if the file is missing or not valid CSV.
pub fn read_headerless_output(path: &Path) -> std::io::Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Build a row from string slices.
#[must_use]
pub fn row(values: &[&str]) -> Row {
    values.iter().map(|v| (*v).to_string()).collect()
}

/// Small sales table keyed naturally on `region` and `year`.
#[must_use]
pub fn sample_sales() -> (Vec<String>, Vec<Row>) {
    let header = row(&["id", "region", "year", "amount"]);
    let rows = vec![
        row(&["1", "east", "2020", "10"]),
        row(&["2", "west", "2020", "20"]),
        row(&["3", "east", "2021", "30"]),
        row(&["4", "east", "2020", "40"]),
        row(&["5", "west", "2021", "50"]),
        row(&["6", "north", "2020", "60, with comma"]),
    ];
    (header, rows)
}

/// `count` rows cycling through `tags` distinct values of the `tag` column.
#[must_use]
pub fn generated_rows(count: usize, tags: usize) -> (Vec<String>, Vec<Row>) {
    let header = row(&["seq", "tag", "payload"]);
    let rows = (0..count)
        .map(|i| {
            vec![
                i.to_string(),
                format!("t{}", i % tags.max(1)),
                format!("value-{}", i * 7),
            ]
        })
        .collect();
    (header, rows)
}

/// Assert that two row sets hold the same rows, ignoring order.
///
/// # Panics
/// Panics if the multisets differ.
pub fn assert_rows_unordered_equal(actual: Vec<Row>, expected: Vec<Row>) {
    let mut actual = actual;
    let mut expected = expected;
    actual.sort();
    expected.sort();
    assert_eq!(actual, expected, "row multisets differ");
}

/// Assert that the rows of each group appear as one contiguous run in `rows`.
///
/// `tag_of` extracts the group key of a row.
///
/// # Panics
/// Panics if some key's rows are split by rows of another key.
pub fn assert_groups_contiguous<K, F>(rows: &[Row], tag_of: F)
where
    K: PartialEq + std::fmt::Debug,
    F: Fn(&Row) -> K,
{
    let mut closed: Vec<K> = Vec::new();
    let mut current: Option<K> = None;
    for r in rows {
        let key = tag_of(r);
        if current.as_ref() == Some(&key) {
            continue;
        }
        assert!(!closed.contains(&key), "group {key:?} is not contiguous");
        if let Some(prev) = current.take() {
            closed.push(prev);
        }
        current = Some(key);
    }
}
