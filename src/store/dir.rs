//! Directory-backed group store.
//!
//! Layout: `<root>/<database>/<collection>/<id>.bin` holds the compressed payload
//! and `<id>.json` the fields. The metadata file is renamed into place after the
//! payload is written, so a query never sees a half-written document.

use crate::error::{Error, Result};
use crate::store::{GroupStore, Namespace, StoredDocument};
use crate::tag::Query;
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Serialize, Deserialize)]
struct DocumentMeta {
    #[serde(rename = "_id")]
    id: String,
    fields: Vec<(String, String)>,
    payload_len: u64,
}

#[derive(Clone)]
pub struct DirGroupStore {
    root: PathBuf,
    endpoint: String,
    namespace: Namespace,
    next_seq: Arc<AtomicU64>,
}

impl DirGroupStore {
    /// Bind to an existing store root. Reachability is checked by `ping`.
    #[must_use]
    pub fn open(root: impl AsRef<Path>, namespace: Namespace) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            endpoint: root.display().to_string(),
            root,
            namespace,
            next_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Like [`DirGroupStore::open`], creating the root directory if needed.
    ///
    /// # Errors
    /// Returns an I/O error if the directory cannot be created.
    pub fn create(root: impl AsRef<Path>, namespace: Namespace) -> Result<Self> {
        create_dir_all(root.as_ref())?;
        Ok(Self::open(root, namespace))
    }

    /// Directory holding this namespace's documents.
    #[must_use]
    pub fn collection_dir(&self) -> PathBuf {
        self.root
            .join(self.namespace.database())
            .join(self.namespace.collection())
    }

    fn next_id(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis());
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        format!("{millis:013}-{:08x}-{seq:06}", std::process::id())
    }

    fn read_meta(meta_path: &Path) -> Result<DocumentMeta> {
        let text = fs::read_to_string(meta_path)?;
        serde_json::from_str(&text).map_err(|e| {
            Error::Store(format!("corrupt metadata {}: {e}", meta_path.display()))
        })
    }

    fn load(meta: DocumentMeta, meta_path: &Path) -> Result<StoredDocument> {
        let payload = fs::read(meta_path.with_extension("bin"))?;
        if payload.len() as u64 != meta.payload_len {
            return Err(Error::Store(format!(
                "payload of document {} is {} bytes, expected {}",
                meta.id,
                payload.len(),
                meta.payload_len
            )));
        }
        Ok(StoredDocument {
            id: Some(meta.id),
            fields: meta.fields,
            payload,
        })
    }
}

impl GroupStore for DirGroupStore {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    fn write(&self, document: StoredDocument) -> Result<String> {
        let dir = self.collection_dir();
        create_dir_all(&dir)?;
        let id = self.next_id();
        let meta = DocumentMeta {
            id: id.clone(),
            fields: document.fields,
            payload_len: document.payload.len() as u64,
        };
        fs::write(dir.join(format!("{id}.bin")), &document.payload)?;
        let text = serde_json::to_string(&meta)
            .map_err(|e| Error::Store(format!("encode metadata for {id}: {e}")))?;
        let tmp = dir.join(format!("{id}.json.tmp"));
        fs::write(&tmp, text)?;
        fs::rename(&tmp, dir.join(format!("{id}.json")))?;
        Ok(id)
    }

    fn query(&self, query: &Query) -> Result<Vec<StoredDocument>> {
        let dir = self.collection_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut metas: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        metas.sort();

        let mut out = Vec::new();
        for meta_path in metas {
            let meta = Self::read_meta(&meta_path)?;
            if query.matches(&meta.fields) {
                out.push(Self::load(meta, &meta_path)?);
            }
        }
        Ok(out)
    }

    fn ping(&self) -> Result<()> {
        if !self.root.is_dir() {
            return Err(Error::Store(format!(
                "store root {} is not a directory",
                self.root.display()
            )));
        }
        fs::read_dir(&self.root)?;
        Ok(())
    }
}
