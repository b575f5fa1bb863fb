//! Run reports for the compression and decompression stages.
//!
//! Each [`Runner`](crate::runner::Runner) call returns a report that can be
//! printed to stdout or saved as pretty JSON.
//!
//! ```no_run
//! use shardstash::*;
//! # fn main() -> shardstash::Result<()> {
//! let store = MemoryGroupStore::new(Namespace::new("sales", "by_region")?);
//! let report = Runner::new(Algorithm::Xz).compress_file("sales.csv", &["region".to_string()], &store)?;
//! report.print();
//! report.save_to_file("compress-report.json")?;
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use crate::io::compression::Algorithm;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Totals of one compression run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompressReport {
    pub algorithm: Algorithm,
    /// `bulk` or `bounded(N)`.
    pub mode: String,
    pub groups: usize,
    pub rows: u64,
    /// Serialized CSV bytes before compression.
    pub raw_bytes: u64,
    pub compressed_bytes: u64,
    pub elapsed_ms: u64,
}

impl CompressReport {
    /// Compressed size as a fraction of the serialized size (0 when nothing was read).
    #[must_use]
    pub fn ratio(&self) -> f64 {
        if self.raw_bytes == 0 {
            0.0
        } else {
            self.compressed_bytes as f64 / self.raw_bytes as f64
        }
    }

    pub fn print(&self) {
        println!("\n========== Compression Report ==========");
        println!("Algorithm: {}", self.algorithm);
        println!("Mode: {}", self.mode);
        println!("Execution Time: {} ms", self.elapsed_ms);
        println!("----------------------------------------");
        println!("groups_stored: {}", self.groups);
        println!("rows: {}", self.rows);
        println!("raw_bytes: {}", self.raw_bytes);
        println!("compressed_bytes: {} ({:.1}%)", self.compressed_bytes, self.ratio() * 100.0);
        println!("========================================\n");
    }

    /// # Errors
    /// Returns an I/O or configuration error if the file cannot be written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        save_json(self, path.as_ref())
    }
}

/// Totals of one decompression run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DecompressReport {
    pub algorithm: Algorithm,
    pub groups: usize,
    pub rows: u64,
    pub elapsed_ms: u64,
}

impl DecompressReport {
    pub fn print(&self) {
        println!("\n========= Decompression Report =========");
        println!("Algorithm: {}", self.algorithm);
        println!("Execution Time: {} ms", self.elapsed_ms);
        println!("----------------------------------------");
        println!("groups_written: {}", self.groups);
        println!("rows: {}", self.rows);
        println!("========================================\n");
    }

    /// # Errors
    /// Returns an I/O or configuration error if the file cannot be written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        save_json(self, path.as_ref())
    }
}

fn save_json<T: Serialize>(report: &T, path: &Path) -> Result<()> {
    let formatted = serde_json::to_string_pretty(report)
        .map_err(|e| Error::Config(format!("cannot serialize report: {e}")))?;
    let mut file = File::create(path)?;
    file.write_all(formatted.as_bytes())?;
    file.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_of_empty_run_is_zero() {
        let report = CompressReport {
            algorithm: Algorithm::Gzip,
            mode: "bulk".into(),
            groups: 0,
            rows: 0,
            raw_bytes: 0,
            compressed_bytes: 0,
            elapsed_ms: 0,
        };
        assert!(report.ratio().abs() < f64::EPSILON);
    }
}
