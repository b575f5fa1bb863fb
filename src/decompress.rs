//! Decompression fan-in and the single output writer.
//!
//! Workers decompress stored groups in parallel and push each result onto one
//! shared completion queue. A dedicated writer thread blocks on that queue and
//! appends every group to the output file as it arrives. After the last worker
//! returns, a [`Completion::Done`] marker is queued; the writer stops when it
//! sees it and never writes it.
//!
//! With [`OutputOrder::Submission`] the writer holds early arrivals in a
//! buffer keyed by query position and releases them in that order.
//!
//! All groups of one output file must share a source header. A group whose
//! header differs from the first one written fails the run.

use crate::config::OutputOrder;
use crate::error::{Error, Result};
use crate::io::compression::Algorithm;
use crate::io::csv::{GroupFileWriter, Header, Row};
use crate::runner::DecompressJob;
use crate::store::StoredDocument;
use crossbeam_channel::{Receiver, Sender};
use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
use rayon::ThreadPool;
use std::collections::BTreeMap;
use std::path::Path;

/// A decompressed group ready for the writer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedGroup {
    pub seq: usize,
    pub label: String,
    pub rows: Vec<Row>,
    pub header: Option<Header>,
}

/// Items on the completion queue.
#[derive(Debug)]
pub enum Completion {
    Group(DecodedGroup),
    /// Every worker has finished; nothing follows.
    Done,
}

/// Drains the completion queue into a [`GroupFileWriter`].
pub struct OrderedWriter {
    out: GroupFileWriter,
    order: OutputOrder,
    header_pending: bool,
    /// Header of the first group written; every later group must match it.
    header: Option<Header>,
    held: BTreeMap<usize, DecodedGroup>,
    next_seq: usize,
}

impl OrderedWriter {
    #[must_use]
    pub fn new(out: GroupFileWriter, order: OutputOrder, write_header: bool) -> Self {
        Self {
            out,
            order,
            header_pending: write_header,
            header: None,
            held: BTreeMap::new(),
            next_seq: 0,
        }
    }

    fn check_header(&mut self, group: &DecodedGroup) -> Result<()> {
        let Some(header) = &group.header else {
            return Ok(());
        };
        match &self.header {
            None => self.header = Some(header.clone()),
            Some(first) if first != header => {
                return Err(Error::Worker(format!(
                    "segment {} has columns [{}] but the output started with [{}]",
                    group.label,
                    header.columns().join(", "),
                    first.columns().join(", ")
                )));
            }
            Some(_) => {}
        }
        Ok(())
    }

    fn emit(&mut self, group: DecodedGroup) -> Result<()> {
        self.check_header(&group)?;
        if self.header_pending {
            if let Some(header) = &self.header {
                self.out.write_header(header)?;
            }
            self.header_pending = false;
        }
        log::info!(
            "writing segment {} to file '{}'",
            group.label,
            self.out.path().display()
        );
        self.out.write_group(&group.rows)
    }

    fn accept(&mut self, group: DecodedGroup) -> Result<()> {
        match self.order {
            OutputOrder::Completion => self.emit(group),
            OutputOrder::Submission => {
                self.held.insert(group.seq, group);
                while let Some(ready) = self.held.remove(&self.next_seq) {
                    self.emit(ready)?;
                    self.next_seq += 1;
                }
                Ok(())
            }
        }
    }

    /// Block on `rx` until [`Completion::Done`], writing every group received.
    ///
    /// Returns `(groups, rows)` written.
    ///
    /// # Errors
    /// I/O errors, a queue that closes without the end marker, or groups still
    /// held back when the marker arrives.
    pub fn drain(mut self, rx: &Receiver<Completion>) -> Result<(usize, u64)> {
        loop {
            match rx.recv() {
                Ok(Completion::Group(group)) => self.accept(group)?,
                Ok(Completion::Done) => break,
                Err(_) => {
                    return Err(Error::Worker(
                        "completion queue closed before the end marker".into(),
                    ));
                }
            }
        }
        if !self.held.is_empty() {
            return Err(Error::Worker(format!(
                "{} segments still waiting for segment #{}",
                self.held.len(),
                self.next_seq
            )));
        }
        self.out.finish()
    }
}

/// Decompress `documents` on `pool` and write them to `output`.
///
/// Returns `(groups, rows)` written. Every document is written exactly once.
///
/// # Errors
/// The first codec or CSV error from a worker, or a writer failure. Groups
/// already written before a failure remain in the output file.
pub fn decompress_documents(
    pool: &ThreadPool,
    documents: Vec<StoredDocument>,
    algorithm: Algorithm,
    output: &Path,
    order: OutputOrder,
    write_header: bool,
) -> Result<(usize, u64)> {
    let expected = documents.len();
    let out = GroupFileWriter::create(output)?;
    log::info!(
        "decompressing {expected} segments with '{algorithm}', writing to '{}' in parallel",
        output.display()
    );

    let (tx, rx) = crossbeam_channel::unbounded::<Completion>();
    let writer = std::thread::Builder::new()
        .name("group-writer".into())
        .spawn(move || OrderedWriter::new(out, order, write_header).drain(&rx))?;

    let decoded = pool.install(|| {
        documents
            .into_par_iter()
            .enumerate()
            .try_for_each_with(tx.clone(), |tx: &mut Sender<Completion>, (seq, document)| {
                let group = DecompressJob {
                    seq,
                    document,
                    algorithm,
                }
                .run()?;
                tx.send(Completion::Group(group))
                    .map_err(|_| Error::Worker("output writer stopped early".into()))
            })
    });

    // The writer exits on this marker whether or not the workers succeeded.
    let _ = tx.send(Completion::Done);
    drop(tx);
    let written = writer
        .join()
        .map_err(|_| Error::Worker("output writer thread panicked".into()))?;

    let (groups, rows) = match (decoded, written) {
        // a closed queue on the worker side means the writer failed first
        (Err(Error::Worker(_)), Err(writer_err)) => return Err(writer_err),
        (Err(e), _) => return Err(e),
        (Ok(()), written) => written?,
    };
    if groups != expected {
        return Err(Error::Worker(format!(
            "wrote {groups} of {expected} segments"
        )));
    }
    Ok((groups, rows))
}
