//! Compression fan-out: completed groups spread over a fixed worker pool.
//!
//! Each group is moved into exactly one worker, which serializes, compresses
//! and stores it. Groups finish in no particular order.
//!
//! Bulk mode hands the pool a fully built `Vec<Group>`. Bounded mode bridges
//! the partitioner's iterator into the pool with `par_bridge`, so workers pull
//! groups as the source is read and only groups already taken by a worker
//! are held outside the partitioner.

use crate::error::Result;
use crate::io::compression::Algorithm;
use crate::io::csv::Header;
use crate::partition::Group;
use crate::runner::{CompressJob, StoredGroup};
use crate::store::GroupStore;
use crate::tag::KeyColumns;
use rayon::iter::{IntoParallelIterator, ParallelBridge, ParallelIterator};
use rayon::ThreadPool;

/// Everything a compression worker shares with its siblings.
pub struct CompressStage<'a> {
    pub algorithm: Algorithm,
    pub keys: &'a KeyColumns,
    pub header: &'a Header,
    pub store: &'a dyn GroupStore,
}

impl CompressStage<'_> {
    fn run(&self, group: Group) -> Result<StoredGroup> {
        CompressJob {
            tag: group.tag,
            rows: group.rows,
            algorithm: self.algorithm,
            keys: self.keys,
            header: self.header,
            store: self.store,
        }
        .run()
    }
}

/// Running totals over stored groups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompressTotals {
    pub groups: usize,
    pub rows: u64,
    pub raw_bytes: u64,
    pub compressed_bytes: u64,
}

impl CompressTotals {
    fn of(stored: &StoredGroup) -> Self {
        Self {
            groups: 1,
            rows: stored.rows,
            raw_bytes: stored.raw_bytes,
            compressed_bytes: stored.compressed_bytes,
        }
    }

    fn merge(self, other: Self) -> Self {
        Self {
            groups: self.groups + other.groups,
            rows: self.rows + other.rows,
            raw_bytes: self.raw_bytes + other.raw_bytes,
            compressed_bytes: self.compressed_bytes + other.compressed_bytes,
        }
    }
}

/// Compress a fully materialized set of groups.
///
/// # Errors
/// The first codec or store error; other in-flight groups still finish.
pub fn compress_groups(
    pool: &ThreadPool,
    groups: Vec<Group>,
    stage: &CompressStage<'_>,
) -> Result<CompressTotals> {
    pool.install(|| {
        groups
            .into_par_iter()
            .map(|group| stage.run(group).map(|s| CompressTotals::of(&s)))
            .try_reduce(CompressTotals::default, |a, b| Ok(a.merge(b)))
    })
}

/// Compress groups while they are still being produced.
///
/// # Errors
/// The first partitioning, codec or store error.
pub fn compress_stream<I>(
    pool: &ThreadPool,
    groups: I,
    stage: &CompressStage<'_>,
) -> Result<CompressTotals>
where
    I: Iterator<Item = Result<Group>> + Send,
{
    pool.install(|| {
        groups
            .par_bridge()
            .map(|group| stage.run(group?).map(|s| CompressTotals::of(&s)))
            .try_reduce(CompressTotals::default, |a, b| Ok(a.merge(b)))
    })
}
