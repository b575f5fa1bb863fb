//! Group store adapter: where compressed groups are persisted and found again.
//!
//! The pipeline only needs three things from a store:
//! - [`GroupStore::write`] one document per compressed group
//! - [`GroupStore::query`] every document whose fields match a partial key
//! - [`GroupStore::ping`] a cheap liveness probe, wrapped by [`check_connectivity`]
//!   with a bounded timeout
//!
//! A store handle is built from an already validated [`Namespace`], so nothing
//! downstream ever has to assemble a namespace from raw user input.
//!
//! ## Implementations
//! - [`MemoryGroupStore`] keeps documents in process memory (tests, dry runs)
//! - [`DirGroupStore`] keeps one metadata file and one payload file per document
//!   under `<root>/<database>/<collection>/`

pub mod dir;
pub mod memory;

pub use dir::DirGroupStore;
pub use memory::MemoryGroupStore;

use crate::error::{Error, Result};
use crate::io::csv::Header;
use crate::tag::{tag_label, Query};
use crate::validation::{PRIVATE_PREFIX, RESERVED_PREFIX};
use std::fmt;
use std::time::Duration;

/// Name of the binary payload field of a stored document.
pub const PAYLOAD_FIELD: &str = "compressed_payload";
/// Store-assigned document identifier (private).
pub const ID_FIELD: &str = "_id";
/// CSV-encoded header of the source the group came from (private).
pub const HEADER_FIELD: &str = "_header";

const MAX_DATABASE_LEN: usize = 63;
const MAX_NAMESPACE_LEN: usize = 119;
const FORBIDDEN_DATABASE_CHARS: [char; 6] = ['/', '\\', '.', ' ', '"', '$'];

/// One persisted group: key fields, private fields, and the compressed rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredDocument {
    /// Assigned by the store on write; `None` before that.
    pub id: Option<String>,
    /// Key-column name/value pairs followed by any private (`_`-prefixed) fields.
    pub fields: Vec<(String, String)>,
    pub payload: Vec<u8>,
}

impl StoredDocument {
    #[must_use]
    pub fn new(fields: Vec<(String, String)>, payload: Vec<u8>) -> Self {
        Self {
            id: None,
            fields,
            payload,
        }
    }

    /// Record the source header alongside the key fields.
    ///
    /// # Errors
    /// Propagates CSV encoding failures.
    pub fn with_header(mut self, header: &Header) -> Result<Self> {
        self.fields
            .push((HEADER_FIELD.to_string(), header.to_csv_line()?));
        Ok(self)
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Key fields only, private fields removed.
    #[must_use]
    pub fn key_fields(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .filter(|(k, _)| !k.starts_with(PRIVATE_PREFIX))
            .cloned()
            .collect()
    }

    /// `[region: east, year: 2020]`
    #[must_use]
    pub fn label(&self) -> String {
        tag_label(&self.key_fields())
    }

    /// The stored source header, if one was recorded.
    ///
    /// # Errors
    /// Fails if the recorded header is not valid CSV.
    pub fn header(&self) -> Result<Option<Header>> {
        self.field(HEADER_FIELD)
            .map(Header::from_csv_line)
            .transpose()
    }
}

/// Validated `(database, collection)` pair a store handle is bound to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Namespace {
    database: String,
    collection: String,
}

impl Namespace {
    /// # Errors
    /// Returns [`Error::InvalidNamespace`] describing the first broken rule.
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Result<Self> {
        let (database, collection) = (database.into(), collection.into());
        let invalid = |msg: String| Err(Error::InvalidNamespace(msg));

        if database.is_empty() {
            return invalid("database name cannot be empty".into());
        }
        if collection.is_empty() {
            return invalid("collection name cannot be empty".into());
        }
        if database.chars().count() > MAX_DATABASE_LEN {
            return invalid(format!(
                "database name '{database}' is over {MAX_DATABASE_LEN} characters"
            ));
        }
        if let Some(c) = database.chars().find(|c| FORBIDDEN_DATABASE_CHARS.contains(c)) {
            return invalid(format!("invalid char '{c}' in database name '{database}'"));
        }
        if database.contains('\0') || collection.contains('\0') {
            return invalid("names cannot contain the NULL character".into());
        }
        if collection.contains(RESERVED_PREFIX) {
            return invalid(format!(
                "invalid char '{RESERVED_PREFIX}' in collection name '{collection}'"
            ));
        }
        if collection.starts_with("system.") {
            return invalid(format!("collection name '{collection}' cannot start with 'system.'"));
        }
        if database.chars().count() + collection.chars().count() > MAX_NAMESPACE_LEN {
            return invalid(format!(
                "namespace '{database}.{collection}' is over {} bytes",
                MAX_NAMESPACE_LEN + 1
            ));
        }
        Ok(Self {
            database,
            collection,
        })
    }

    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Persistence contract used by the compression and decompression stages.
///
/// # Thread Safety
/// Handles are shared by every worker of a run, so implementations must be
/// `Send + Sync` and accept concurrent `write` calls.
pub trait GroupStore: Send + Sync {
    /// Connection descriptor, for messages.
    fn endpoint(&self) -> &str;

    fn namespace(&self) -> &Namespace;

    /// Persist one document and return the id assigned to it.
    ///
    /// # Errors
    /// Returns [`Error::Store`] (or an I/O error) if the document was not stored.
    fn write(&self, document: StoredDocument) -> Result<String>;

    /// All documents whose fields contain every term of `query`.
    ///
    /// # Errors
    /// Returns [`Error::Store`] (or an I/O error) on read failures.
    fn query(&self, query: &Query) -> Result<Vec<StoredDocument>>;

    /// Cheap liveness probe.
    ///
    /// # Errors
    /// Returns an error when the store cannot be reached.
    fn ping(&self) -> Result<()>;
}

/// Probe `store` on a helper thread and give up after `timeout`.
///
/// # Errors
/// Returns [`Error::ConnectionTimeout`] if the probe fails or does not answer in time.
pub fn check_connectivity<S>(store: &S, timeout: Duration) -> Result<()>
where
    S: GroupStore + Clone + 'static,
{
    let probe = store.clone();
    let (tx, rx) = crossbeam_channel::bounded(1);
    std::thread::Builder::new()
        .name("store-probe".into())
        .spawn(move || {
            let _ = tx.send(probe.ping());
        })?;

    let timed_out = || Error::ConnectionTimeout {
        endpoint: store.endpoint().to_string(),
        timeout,
    };
    match rx.recv_timeout(timeout) {
        Ok(Ok(())) => {
            log::info!("established connection to store at '{}'", store.endpoint());
            Ok(())
        }
        Ok(Err(e)) => {
            log::warn!("store probe failed: {e}");
            Err(timed_out())
        }
        Err(_) => Err(timed_out()),
    }
}
