//! # Shardstash
//!
//! A **partition-and-compress pipeline** for CSV data. Shardstash splits a CSV
//! file into groups of rows sharing the same values in chosen key columns,
//! compresses every group independently and stores it as one document in a
//! group store. The inverse path fetches the groups matching a partial key,
//! decompresses them in parallel and reassembles their rows into one CSV file.
//!
//! ## Key Features
//!
//! - **Key-column partitioning** - in one pass, either fully in memory or
//!   with a per-group row cap that bounds memory
//! - **Independent group compression** - gzip, zlib, bzip2 or xz, one codec per run
//! - **Fixed worker pool** - CPU count + 1 threads by default
//! - **Pluggable stores** - an in-memory store for tests and a directory store for the CLI
//! - **Single writer** - decompressed groups are appended by one thread, so
//!   rows of a group are never interleaved with another group's rows
//!
//! ## Quick Start
//!
//! ```no_run
//! use shardstash::*;
//!
//! # fn main() -> shardstash::Result<()> {
//! let keys = check_valid_field_names(&["\"region\"", "\"year\""])?;
//! let store = MemoryGroupStore::new(Namespace::new("sales", "by_region_year")?);
//!
//! // CSV -> groups -> compressed documents
//! let runner = Runner::new(Algorithm::Bzip2);
//! let report = runner.compress_file("sales.csv", &keys, &store)?;
//! report.print();
//!
//! // Every 2020 group, back into a single CSV file
//! let query = parse_query(&["year=2020"])?;
//! let out = check_valid_output_file_name("\"sales_2020.csv\"")?;
//! runner.decompress_to_file(&query, &store, out)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Tags and groups
//!
//! A [`Tag`] is the ordered tuple of a row's values in the key columns. All rows
//! sharing a tag form a [`Group`]. In bulk mode each tag yields exactly one
//! group; in bounded mode ([`Grouping::Bounded`]) a tag may be flushed several
//! times, each flush becoming its own stored document.
//!
//! ### Stored documents
//!
//! A [`StoredDocument`] holds one field per key column, the private `_header`
//! field recording the source header, and the compressed group payload. The
//! algorithm is not stored: the same [`Algorithm`] must be given when reading.
//!
//! ### Queries
//!
//! A [`Query`] is a set of `NAME=VALUE` terms. A document matches when every
//! term equals the corresponding key field; columns not named are free.
//!
//! ## Feature Flags
//!
//! - `compression-gzip`, `compression-zlib` - gzip and zlib via `flate2`
//! - `compression-bzip2` - bzip2 via `bzip2`
//! - `compression-xz` - xz via `xz2`
//!
//! All four are enabled by default. Selecting a disabled codec is a
//! [`Error::CodecError`] at run time.

pub mod compress;
pub mod config;
pub mod decompress;
pub mod error;
pub mod io;
pub mod metrics;
pub mod partition;
pub mod runner;
pub mod store;
pub mod tag;
pub mod testing;
pub mod validation;

// Re-exports for convenience
pub use config::{OutputOrder, RunConfig, StoreConfig};
pub use error::{Error, Result};
pub use io::compression::{compress, decompress, Algorithm};
pub use io::csv::{CsvSource, Header, Row};
pub use metrics::{CompressReport, DecompressReport};
pub use partition::{BoundedGroups, Group, Partitioner};
pub use runner::{default_workers, Grouping, Runner, WorkItem};
pub use store::{
    check_connectivity, DirGroupStore, GroupStore, MemoryGroupStore, Namespace, StoredDocument,
};
pub use tag::{parse_query, tag_label, KeyColumns, Query, Tag};
pub use validation::{check_valid_field_names, check_valid_output_file_name, unwrap_quoted};
