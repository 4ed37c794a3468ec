//! The content-addressed dataset store.
//!
//! Maps the fingerprint of every submitted sequence to its compressed
//! form. Appends are idempotent: re-submitting a sequence whose
//! fingerprint is already stored keeps the existing entry and never
//! recompresses, so an entry cannot end up referencing itself.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;
use crate::compress::{self, Compression, Pool};
use crate::error::{Result, StoreError};
use crate::fingerprint;
use crate::persist;

/// Serialised shape of the dataset file: one top-level mapping with the
/// compressed sequences and the strategy that produced them. The legacy
/// key `indexes` is accepted on read; `chunks` is always emitted.
#[derive(Deserialize)]
struct DatasetFile {
    #[serde(alias = "indexes")]
    chunks: Pool,
    #[serde(default)]
    compression: Compression,
}

#[derive(Serialize)]
struct DatasetFileRef<'a> {
    chunks: &'a Pool,
    compression: Compression,
}

/// Mapping from fingerprint to compressed chunk sequence, kept in
/// append order so compression scans bias references toward
/// earlier-stored collections. The order survives a reload because the
/// file's key order is the map's insertion order.
#[derive(Debug)]
pub struct DatasetStore {
    path: PathBuf,
    compression: Compression,
    chunks: Pool,
}

impl DatasetStore {
    /// Empty store persisting to `path` under the given strategy.
    pub fn create(path: impl Into<PathBuf>, compression: Compression) -> Self {
        DatasetStore {
            path: path.into(),
            compression,
            chunks: IndexMap::new(),
        }
    }

    /// Load a previously saved store; the strategy recorded in the file
    /// wins over whatever the store was created with.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file: DatasetFile = persist::load_json(&path)?;
        Ok(DatasetStore {
            path,
            compression: file.compression,
            chunks: file.chunks,
        })
    }

    /// Store `sequence` under its content fingerprint and save the
    /// dataset file. Returns the fingerprint.
    ///
    /// The sequence is compressed against everything already stored; a
    /// fingerprint hit short-circuits and leaves the existing entry as
    /// is, which makes `append` idempotent.
    pub fn append(&mut self, sequence: Vec<Chunk>) -> Result<String> {
        let id = fingerprint::fingerprint(&sequence);
        if !self.chunks.contains_key(&id) {
            let compressed = compress::compress(self.compression, &self.chunks, sequence);
            self.chunks.insert(id.clone(), compressed);
        }
        self.save()?;
        Ok(id)
    }

    /// Fetch and fully decompress the sequence stored under `id`.
    pub fn get(&self, id: &str) -> Result<Vec<Chunk>> {
        let stored = self
            .chunks
            .get(id)
            .ok_or_else(|| StoreError::KeyNotFound(id.to_string()))?;
        compress::decompress(&self.chunks, stored)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.chunks.contains_key(id)
    }

    /// Number of stored indices.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist the mapping to the dataset file atomically. The
    /// companion test-case file is untouched.
    pub fn save(&self) -> Result<()> {
        persist::save_json(
            &self.path,
            &DatasetFileRef {
                chunks: &self.chunks,
                compression: self.compression,
            },
        )
    }
}
