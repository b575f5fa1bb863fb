//! Execution entry points and the work items passed between stages.
//!
//! A [`Runner`] owns everything a run needs besides its inputs: the codec, the
//! worker count, the grouping strategy and the output policy. Each call builds
//! a dedicated rayon pool of `workers` threads, so concurrent runs never share
//! (or resize) the global pool.
//!
//! ```no_run
//! use shardstash::*;
//! # fn main() -> shardstash::Result<()> {
//! let store = MemoryGroupStore::new(Namespace::new("sales", "by_region")?);
//! let runner = Runner::new(Algorithm::Gzip).with_grouping(Grouping::Bounded { cap: 10_000 });
//! runner.compress_file("sales.csv", &["region".to_string()], &store)?;
//!
//! let query = parse_query(&["region=east"])?;
//! runner.decompress_to_file(&query, &store, "east.csv")?;
//! # Ok(())
//! # }
//! ```

use crate::compress::{compress_groups, compress_stream, CompressStage};
use crate::config::{OutputOrder, RunConfig};
use crate::decompress::{decompress_documents, DecodedGroup};
use crate::error::{Error, Result};
use crate::io::compression::{self, Algorithm};
use crate::io::csv::{decode_rows, encode_rows, Header, Row};
use crate::metrics::{CompressReport, DecompressReport};
use crate::partition::Partitioner;
use crate::store::{GroupStore, StoredDocument};
use crate::tag::{KeyColumns, Query, Tag};
use std::path::Path;
use std::time::Instant;

/// Worker count used when none is configured: one per CPU plus one, so a
/// worker blocked on store I/O does not leave a core idle.
#[must_use]
pub fn default_workers() -> usize {
    num_cpus::get() + 1
}

/// How the partitioner hands groups to the compression stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Grouping {
    /// Read the whole source, then compress every group.
    Bulk,
    /// Emit a group as soon as it holds `cap` rows; compress while reading.
    Bounded { cap: usize },
}

impl std::fmt::Display for Grouping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Grouping::Bulk => f.write_str("bulk"),
            Grouping::Bounded { cap } => write!(f, "bounded({cap})"),
        }
    }
}

/// Compress one group and persist it.
pub struct CompressJob<'s> {
    pub tag: Tag,
    pub rows: Vec<Row>,
    pub algorithm: Algorithm,
    pub keys: &'s KeyColumns,
    pub header: &'s Header,
    pub store: &'s dyn GroupStore,
}

impl CompressJob<'_> {
    /// Serialize, compress and write, strictly in that order.
    ///
    /// # Errors
    /// Codec, CSV and store errors are returned unchanged.
    pub fn run(self) -> Result<StoredGroup> {
        let raw = encode_rows(&self.rows)?;
        let packed = compression::compress(&raw, self.algorithm)?;
        let compressed_bytes = packed.len() as u64;
        let document =
            StoredDocument::new(self.keys.fields(&self.tag), packed).with_header(self.header)?;
        let id = self.store.write(document)?;
        log::info!(
            "segment written to store: {} ({} rows, {} -> {} bytes)",
            self.tag,
            self.rows.len(),
            raw.len(),
            compressed_bytes
        );
        Ok(StoredGroup {
            id,
            rows: self.rows.len() as u64,
            raw_bytes: raw.len() as u64,
            compressed_bytes,
        })
    }
}

/// Decompress one stored group.
pub struct DecompressJob {
    /// Position of the document in the query result.
    pub seq: usize,
    pub document: StoredDocument,
    pub algorithm: Algorithm,
}

impl DecompressJob {
    /// # Errors
    /// Codec errors carry the segment label in their message; CSV errors are
    /// returned unchanged.
    pub fn run(self) -> Result<DecodedGroup> {
        let label = self.document.label();
        let raw = compression::decompress(&self.document.payload, self.algorithm).map_err(
            |e| match e {
                Error::CodecError { algorithm, message } => Error::CodecError {
                    algorithm,
                    message: format!("segment {label}: {message}"),
                },
                other => other,
            },
        )?;
        let rows = decode_rows(&raw)?;
        let header = self.document.header()?;
        Ok(DecodedGroup {
            seq: self.seq,
            label,
            rows,
            header,
        })
    }
}

/// A unit of work handed to exactly one worker.
pub enum WorkItem<'s> {
    Compress(CompressJob<'s>),
    Decompress(DecompressJob),
}

/// What a finished [`WorkItem`] produced.
#[derive(Debug)]
pub enum WorkOutput {
    Stored(StoredGroup),
    Decoded(DecodedGroup),
}

/// Sizes of one persisted group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoredGroup {
    pub id: String,
    pub rows: u64,
    pub raw_bytes: u64,
    pub compressed_bytes: u64,
}

impl WorkItem<'_> {
    /// Run the item to completion on the calling thread.
    ///
    /// # Errors
    /// Whatever the wrapped job returns.
    pub fn run(self) -> Result<WorkOutput> {
        match self {
            WorkItem::Compress(job) => job.run().map(WorkOutput::Stored),
            WorkItem::Decompress(job) => job.run().map(WorkOutput::Decoded),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Runner {
    pub algorithm: Algorithm,
    pub workers: usize,
    pub grouping: Grouping,
    pub output_order: OutputOrder,
    pub write_header: bool,
}

impl Runner {
    #[must_use]
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            workers: default_workers(),
            grouping: Grouping::Bulk,
            output_order: OutputOrder::Completion,
            write_header: true,
        }
    }

    #[must_use]
    pub fn from_config(algorithm: Algorithm, config: &RunConfig) -> Self {
        Self {
            algorithm,
            workers: config.worker_count(),
            grouping: config.grouping(),
            output_order: config.output_order,
            write_header: config.write_header,
        }
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    #[must_use]
    pub fn with_grouping(mut self, grouping: Grouping) -> Self {
        self.grouping = grouping;
        self
    }

    #[must_use]
    pub fn with_output_order(mut self, order: OutputOrder) -> Self {
        self.output_order = order;
        self
    }

    #[must_use]
    pub fn with_header(mut self, write_header: bool) -> Self {
        self.write_header = write_header;
        self
    }

    fn pool(&self, stage: &str) -> Result<rayon::ThreadPool> {
        let stage = stage.to_string();
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers.max(1))
            .thread_name(move |i| format!("{stage}-{i}"))
            .build()?)
    }

    /// Partition `input` on `key_names`, compress every group and write it to `store`.
    ///
    /// Column resolution happens before any worker starts. Once workers run, the
    /// first failure aborts the run; groups already written stay in the store.
    ///
    /// # Errors
    /// `InputNotFound`, `ColumnNotFound`, `DuplicateColumn`, CSV, codec or store errors.
    pub fn compress_file<S>(
        &self,
        input: impl AsRef<Path>,
        key_names: &[String],
        store: &S,
    ) -> Result<CompressReport>
    where
        S: GroupStore,
    {
        let started = Instant::now();
        let partitioner = Partitioner::open(input.as_ref(), key_names)?;
        let header = partitioner.header().clone();
        let keys = partitioner.keys().clone();
        let pool = self.pool("compress")?;
        log::info!(
            "compressing {} on {:?} with {} ({} mode, {} workers) into {}",
            input.as_ref().display(),
            keys.names(),
            self.algorithm,
            self.grouping,
            self.workers,
            store.namespace()
        );

        let stage = CompressStage {
            algorithm: self.algorithm,
            keys: &keys,
            header: &header,
            store,
        };
        let totals = match self.grouping {
            Grouping::Bulk => {
                let groups = partitioner.partition_all()?;
                compress_groups(&pool, groups, &stage)?
            }
            Grouping::Bounded { cap } => compress_stream(&pool, partitioner.bounded(cap), &stage)?,
        };

        Ok(CompressReport {
            algorithm: self.algorithm,
            mode: self.grouping.to_string(),
            groups: totals.groups,
            rows: totals.rows,
            raw_bytes: totals.raw_bytes,
            compressed_bytes: totals.compressed_bytes,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Fetch every group matching `query`, decompress them in parallel and
    /// write their rows to `output` from a single writer thread.
    ///
    /// # Errors
    /// `EmptyQueryResult` when nothing matches; codec, CSV, store or I/O errors.
    pub fn decompress_to_file<S>(
        &self,
        query: &Query,
        store: &S,
        output: impl AsRef<Path>,
    ) -> Result<DecompressReport>
    where
        S: GroupStore,
    {
        let started = Instant::now();
        let documents = store.query(query)?;
        if documents.is_empty() {
            return Err(Error::EmptyQueryResult(query.to_string()));
        }
        log::info!(
            "retrieved {} segments matching {query} from {}",
            documents.len(),
            store.namespace()
        );

        let pool = self.pool("decompress")?;
        let (groups, rows) = decompress_documents(
            &pool,
            documents,
            self.algorithm,
            output.as_ref(),
            self.output_order,
            self.write_header,
        )?;

        Ok(DecompressReport {
            algorithm: self.algorithm,
            groups,
            rows,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryGroupStore, Namespace};

    fn row(values: &[&str]) -> Row {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn work_items_store_then_decode_a_group() -> Result<()> {
        let header = Header::new(["id", "region"])?;
        let keys = KeyColumns::resolve(&header, &["region".to_string()])?;
        let store = MemoryGroupStore::new(Namespace::new("unit", "items")?);
        let rows = vec![row(&["1", "east"]), row(&["3", "east"])];

        let item = WorkItem::Compress(CompressJob {
            tag: keys.extract_tag(&rows[0]),
            rows: rows.clone(),
            algorithm: Algorithm::Gzip,
            keys: &keys,
            header: &header,
            store: &store,
        });
        let WorkOutput::Stored(stored) = item.run()? else {
            panic!("compress item did not report a stored group");
        };
        assert_eq!(stored.rows, 2);

        let document = store.query(&Query::default())?.remove(0);
        assert_eq!(document.key_fields(), vec![("region".to_string(), "east".to_string())]);
        let item = WorkItem::Decompress(DecompressJob {
            seq: 7,
            document,
            algorithm: Algorithm::Gzip,
        });
        let WorkOutput::Decoded(group) = item.run()? else {
            panic!("decompress item did not report a decoded group");
        };
        assert_eq!(group.seq, 7);
        assert_eq!(group.label, "[region: east]");
        assert_eq!(group.rows, rows);
        assert_eq!(group.header, Some(header));
        Ok(())
    }
}
