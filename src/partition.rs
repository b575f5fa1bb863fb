//! Streaming partitioner: groups source rows by their key-column tag.
//!
//! Two strategies are offered:
//! - **Bulk** ([`Partitioner::partition_all`]) reads the whole source and returns
//!   every group at once, in the order each tag was first seen.
//! - **Bounded** ([`Partitioner::bounded`]) returns an iterator that emits a
//!   group the moment it reaches `cap` rows and forgets it, so memory is
//!   bounded by `cap` rows per live tag. Groups that never reach the cap are
//!   emitted after the source is exhausted, again in first-seen order.
//!
//! A tag that is flushed and then seen again starts a fresh group, so in
//! bounded mode the same tag can be emitted several times.

use crate::error::Result;
use crate::io::csv::{CsvSource, Header, Row};
use crate::tag::{KeyColumns, Tag};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;

/// Rows sharing one tag, in source order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    pub tag: Tag,
    pub rows: Vec<Row>,
}

impl Group {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A source with its key columns already resolved against the header.
pub struct Partitioner {
    source: CsvSource,
    keys: KeyColumns,
}

impl Partitioner {
    /// Open `path` and resolve `key_names` against its header.
    ///
    /// # Errors
    /// `InputNotFound`, `ColumnNotFound`, `DuplicateColumn`, or a CSV error.
    pub fn open(path: impl AsRef<Path>, key_names: &[String]) -> Result<Self> {
        let source = CsvSource::open(path)?;
        let keys = KeyColumns::resolve(source.header(), key_names)?;
        Ok(Self { source, keys })
    }

    #[must_use]
    pub fn header(&self) -> &Header {
        self.source.header()
    }

    #[must_use]
    pub fn keys(&self) -> &KeyColumns {
        &self.keys
    }

    /// Read every row and return all groups in first-seen tag order.
    ///
    /// # Errors
    /// Propagates CSV errors from the source.
    pub fn partition_all(mut self) -> Result<Vec<Group>> {
        let mut slots: HashMap<Tag, usize> = HashMap::new();
        let mut groups: Vec<Group> = Vec::new();
        while let Some(row) = self.source.next_row()? {
            let tag = self.keys.extract_tag(&row);
            match slots.entry(tag) {
                Entry::Occupied(e) => groups[*e.get()].rows.push(row),
                Entry::Vacant(e) => {
                    groups.push(Group {
                        tag: e.key().clone(),
                        rows: vec![row],
                    });
                    e.insert(groups.len() - 1);
                }
            }
        }
        log::debug!(
            "partitioned {} rows into {} groups",
            self.source.rows_read(),
            groups.len()
        );
        Ok(groups)
    }

    /// Switch to bounded mode with a per-group row cap (values below 1 act as 1).
    #[must_use]
    pub fn bounded(self, cap: usize) -> BoundedGroups {
        BoundedGroups {
            source: self.source,
            keys: self.keys,
            cap: cap.max(1),
            pending: HashMap::new(),
            next_seq: 0,
            tail: None,
            failed: false,
        }
    }
}

/// Iterator of groups produced in bounded-memory mode.
///
/// Each `next` call reads rows until some group reaches the cap; that group is
/// removed from the pending map and handed to the caller by value.
pub struct BoundedGroups {
    source: CsvSource,
    keys: KeyColumns,
    cap: usize,
    // tag -> (first-seen sequence, rows)
    pending: HashMap<Tag, (u64, Vec<Row>)>,
    next_seq: u64,
    tail: Option<std::vec::IntoIter<Group>>,
    failed: bool,
}

impl BoundedGroups {
    #[must_use]
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Groups currently held in memory.
    #[must_use]
    pub fn pending_groups(&self) -> usize {
        self.pending.len()
    }

    fn push(&mut self, row: Row) -> Option<Group> {
        let tag = self.keys.extract_tag(&row);
        match self.pending.entry(tag) {
            Entry::Occupied(mut e) => {
                e.get_mut().1.push(row);
                if e.get().1.len() >= self.cap {
                    let (tag, (_, rows)) = e.remove_entry();
                    Some(Group { tag, rows })
                } else {
                    None
                }
            }
            Entry::Vacant(e) => {
                if self.cap == 1 {
                    Some(Group {
                        tag: e.into_key(),
                        rows: vec![row],
                    })
                } else {
                    e.insert((self.next_seq, vec![row]));
                    self.next_seq += 1;
                    None
                }
            }
        }
    }

    fn drain_pending(&mut self) -> std::vec::IntoIter<Group> {
        let mut rest: Vec<(u64, Group)> = self
            .pending
            .drain()
            .map(|(tag, (seq, rows))| (seq, Group { tag, rows }))
            .collect();
        rest.sort_by_key(|(seq, _)| *seq);
        log::debug!(
            "end of input after {} rows, flushing {} partial groups",
            self.source.rows_read(),
            rest.len()
        );
        rest.into_iter()
            .map(|(_, g)| g)
            .collect::<Vec<_>>()
            .into_iter()
    }
}

impl Iterator for BoundedGroups {
    type Item = Result<Group>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Some(tail) = self.tail.as_mut() {
            return tail.next().map(Ok);
        }
        loop {
            match self.source.next_row() {
                Ok(Some(row)) => {
                    if let Some(full) = self.push(row) {
                        return Some(Ok(full));
                    }
                }
                Ok(None) => {
                    let rest = self.drain_pending();
                    return self.tail.insert(rest).next().map(Ok);
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
