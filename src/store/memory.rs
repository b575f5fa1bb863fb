//! In-memory group store.
//!
//! All handles cloned from one store share the same documents, so a test can
//! write through one handle and query through another.

use crate::error::{Error, Result};
use crate::store::{GroupStore, Namespace, StoredDocument};
use crate::tag::Query;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type NamespaceStorage = Arc<Mutex<HashMap<Namespace, Vec<StoredDocument>>>>;

#[derive(Clone)]
pub struct MemoryGroupStore {
    namespace: Namespace,
    documents: NamespaceStorage,
    next_id: Arc<AtomicU64>,
    reachable: Arc<AtomicBool>,
    ping_delay: Arc<Mutex<Option<Duration>>>,
}

impl MemoryGroupStore {
    #[must_use]
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            documents: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            reachable: Arc::new(AtomicBool::new(true)),
            ping_delay: Arc::new(Mutex::new(None)),
        }
    }

    /// A handle on another namespace backed by the same storage.
    #[must_use]
    pub fn with_namespace(&self, namespace: Namespace) -> Self {
        Self {
            namespace,
            ..self.clone()
        }
    }

    /// Make every operation fail as if the server were down.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Delay `ping` answers, to exercise connectivity timeouts.
    pub fn set_ping_delay(&self, delay: Option<Duration>) {
        *self.ping_delay.lock().expect("ping delay mutex poisoned") = delay;
    }

    /// Number of documents in this handle's namespace.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents
            .lock()
            .expect("documents mutex poisoned")
            .get(&self.namespace)
            .map_or(0, Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of this namespace's documents in write order.
    #[must_use]
    pub fn documents(&self) -> Vec<StoredDocument> {
        self.documents
            .lock()
            .expect("documents mutex poisoned")
            .get(&self.namespace)
            .cloned()
            .unwrap_or_default()
    }

    fn ensure_reachable(&self) -> Result<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::Store(format!("store for {} is unreachable", self.namespace)))
        }
    }
}

impl GroupStore for MemoryGroupStore {
    fn endpoint(&self) -> &str {
        "memory"
    }

    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    fn write(&self, mut document: StoredDocument) -> Result<String> {
        self.ensure_reachable()?;
        let id = format!("{:08}", self.next_id.fetch_add(1, Ordering::SeqCst));
        document.id = Some(id.clone());
        let mut documents = self.documents.lock().expect("documents mutex poisoned");
        documents
            .entry(self.namespace.clone())
            .or_default()
            .push(document);
        drop(documents);
        Ok(id)
    }

    fn query(&self, query: &Query) -> Result<Vec<StoredDocument>> {
        self.ensure_reachable()?;
        let documents = self.documents.lock().expect("documents mutex poisoned");
        let results = documents
            .get(&self.namespace)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| query.matches(&doc.fields))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(documents);
        Ok(results)
    }

    fn ping(&self) -> Result<()> {
        let delay = *self.ping_delay.lock().expect("ping delay mutex poisoned");
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.ensure_reachable()
    }
}
