use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, info};

use crate::domain::{Record, TopicStore};
use crate::error::ResearchError;
use crate::topic::TopicKey;

/// Topic-partitioned JSON persistence under one root directory.
///
/// Each topic lives in `<root>/<topic_key>/<document_name>`. Writes go
/// through a temporary file in the topic directory that is renamed over the
/// document, so readers see either the previous or the new content. Merges
/// for the same key are serialized inside the process; separate processes
/// writing the same topic are not coordinated.
#[derive(Debug)]
pub struct RecordStore {
    root: Utf8PathBuf,
    document_name: String,
    locks: Mutex<HashMap<TopicKey, Arc<Mutex<()>>>>,
}

impl RecordStore {
    pub fn new(root: impl Into<Utf8PathBuf>, document_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            document_name: document_name.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn document_name(&self) -> &str {
        &self.document_name
    }

    pub fn topic_dir(&self, key: &TopicKey) -> Utf8PathBuf {
        self.root.join(key.as_str())
    }

    pub fn document_path(&self, key: &TopicKey) -> Utf8PathBuf {
        self.topic_dir(key).join(&self.document_name)
    }

    pub fn exists(&self, key: &TopicKey) -> bool {
        self.document_path(key).as_std_path().is_file()
    }

    /// Loads the store for `key`; a topic with no document yet is empty.
    pub fn load(&self, key: &TopicKey) -> Result<TopicStore, ResearchError> {
        read_document(&self.document_path(key))
    }

    /// Overlays `records` onto the stored topic and atomically replaces the
    /// document. Existing identifiers are kept; colliding ones take the new
    /// value. Returns the merged store.
    pub fn merge_and_save(
        &self,
        key: &TopicKey,
        records: Vec<Record>,
    ) -> Result<TopicStore, ResearchError> {
        let lock = self.key_lock(key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let path = self.document_path(key);
        let mut store = read_document(&path)?;
        let previous = store.len();
        let incoming = records.len();
        for record in records {
            let attributes = record.attributes()?;
            store.insert(record.id, attributes);
        }

        StagedDocument::stage(&path, &store)?.commit()?;
        info!(
            topic = key.as_str(),
            path = path.as_str(),
            incoming,
            previous,
            total = store.len(),
            "topic store saved"
        );
        Ok(store)
    }

    /// Topic keys under the root that hold a store document, sorted.
    pub fn topics(&self) -> Result<Vec<TopicKey>, ResearchError> {
        if !self.root.as_std_path().is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(self.root.as_std_path())
            .map_err(|err| ResearchError::Filesystem(format!("read {}: {err}", self.root)))?;
        let mut topics = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| ResearchError::Filesystem(err.to_string()))?;
            if !entry.path().join(&self.document_name).is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            match TopicKey::normalize(&name) {
                Ok(key) if key.as_str() == name => topics.push(key),
                _ => debug!(dir = name.as_str(), "skipping non-topic directory"),
            }
        }
        topics.sort();
        Ok(topics)
    }

    fn key_lock(&self, key: &TopicKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// A fully written, fsynced temporary copy of a document that has not yet
/// replaced the target. Dropping it without [`commit`](Self::commit)
/// removes the temporary file and leaves the target untouched.
#[derive(Debug)]
pub struct StagedDocument {
    temp: NamedTempFile,
    target: Utf8PathBuf,
}

impl StagedDocument {
    pub fn stage(target: &Utf8Path, store: &TopicStore) -> Result<Self, ResearchError> {
        let parent = target.parent().ok_or_else(|| {
            ResearchError::Filesystem(format!("invalid document path: {target}"))
        })?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| ResearchError::Filesystem(format!("create {parent}: {err}")))?;

        let prefix = format!(".{}", target.file_name().unwrap_or("document"));
        let mut temp = Builder::new()
            .prefix(&prefix)
            .suffix(".tmp")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| ResearchError::Filesystem(format!("create temp in {parent}: {err}")))?;

        let content = serde_json::to_vec_pretty(store)
            .map_err(|err| ResearchError::Filesystem(err.to_string()))?;
        write_synced(temp.as_file_mut(), &content)
            .map_err(|err| ResearchError::Filesystem(format!("write temp for {target}: {err}")))?;
        debug!(
            document = target.as_str(),
            temp = %temp.path().display(),
            bytes = content.len(),
            "document staged"
        );

        Ok(Self {
            temp,
            target: target.to_path_buf(),
        })
    }

    pub fn temp_path(&self) -> &std::path::Path {
        self.temp.path()
    }

    pub fn target(&self) -> &Utf8Path {
        &self.target
    }

    /// Renames the staged file over the target in one step.
    pub fn commit(self) -> Result<(), ResearchError> {
        let target = self.target;
        self.temp
            .persist(target.as_std_path())
            .map_err(|err| ResearchError::Filesystem(format!("replace {target}: {}", err.error)))?;
        Ok(())
    }
}

fn read_document(path: &Utf8Path) -> Result<TopicStore, ResearchError> {
    let content = match fs::read(path.as_std_path()) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = path.as_str(), "no document yet");
            return Ok(TopicStore::new());
        }
        Err(err) => return Err(ResearchError::Filesystem(format!("read {path}: {err}"))),
    };
    serde_json::from_slice::<TopicStore>(&content).map_err(|err| ResearchError::CorruptStore {
        path: path.to_string(),
        message: err.to_string(),
    })
}

fn write_synced(file: &mut fs::File, content: &[u8]) -> io::Result<()> {
    file.write_all(content)?;
    file.write_all(b"\n")?;
    file.flush()?;
    file.sync_all()
}
