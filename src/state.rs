//! Persisted per-task build records and content hashing.

use crate::artifact::{write_atomically, ReplacePolicy};
use crate::error::{BuildError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the state file inside the output directory
pub const STATE_FILE_NAME: &str = ".doc-build-state.toml";

const STATE_FORMAT_VERSION: u32 = 1;

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hash the content of `path`; `None` if it does not exist
pub fn hash_file(path: &Path) -> Result<Option<String>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(sha256_hex(&bytes))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// What a task looked like before its last successful redo
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Command line and parameters of the task
    pub fingerprint: String,
    /// Content hashes of explicit and discovered inputs
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    /// Content hashes of state files that existed
    #[serde(default)]
    pub state: BTreeMap<String, String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateDocument {
    version: u32,
    #[serde(default)]
    tasks: BTreeMap<String, TaskRecord>,
}

/// All task records of one output directory
#[derive(Debug)]
pub struct BuildState {
    path: PathBuf,
    root: PathBuf,
    tasks: BTreeMap<String, TaskRecord>,
}

impl BuildState {
    /// Load the records stored at `path`; paths in records are relative to `root`.
    ///
    /// A missing file yields an empty state. A file written by another format
    /// version is discarded.
    pub fn load(path: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let root = root.into();

        let tasks = match fs::read_to_string(&path) {
            Ok(text) => {
                let doc: StateDocument = toml::from_str(&text)
                    .map_err(|e| BuildError::state(&path, e.to_string()))?;
                if doc.version == STATE_FORMAT_VERSION {
                    doc.tasks
                } else {
                    debug!(found = doc.version, "discarding build state of other format");
                    BTreeMap::new()
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(BuildState { path, root, tasks })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&TaskRecord> {
        self.tasks.get(key)
    }

    /// Replace the record of `key` and write the state file
    pub fn update(&mut self, key: String, record: TaskRecord) -> Result<()> {
        self.tasks.insert(key, record);
        self.save()
    }

    pub fn save(&self) -> Result<()> {
        let doc = StateDocument {
            version: STATE_FORMAT_VERSION,
            tasks: self.tasks.clone(),
        };
        let text = toml::to_string(&doc).map_err(|e| BuildError::state(&self.path, e.to_string()))?;
        write_atomically(&self.path, text.as_bytes(), ReplacePolicy::KeepIfUnchanged)?;
        Ok(())
    }

    /// Key under which `path` is stored: relative to the root when inside it
    pub fn path_key(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// Inverse of [BuildState::path_key]
    pub fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}
