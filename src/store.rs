//! The store façade: one dataset store and one test-case store behind a
//! single lock.
//!
//! Construction is cheap and non-blocking. When both store files already
//! exist on disk their loads start immediately on background blocking
//! tasks; the first operation that needs a sub-store awaits the handle
//! and installs the result. Every public operation acquires the lock,
//! does all of its work, including the synchronous file saves, inside
//! the critical section, and releases it, so concurrent callers are
//! linearised by lock acquisition order and [`RagStore::ensure_saved`]
//! reduces to taking the lock once.
//!
//! Nested reads (an append consulting the recorded questions before
//! writing) happen directly on the held guard rather than through a
//! second lock acquisition, so a single non-reentrant async mutex is
//! enough.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio::sync::Mutex;
use tokio::task::{self, JoinHandle};
use tracing::{debug, info};

use crate::chunk::Chunk;
use crate::compress::Compression;
use crate::config::Config;
use crate::dataset::DatasetStore;
use crate::error::{Result, StoreError};
use crate::testcase::{Case, TestcaseStore};

/// A sub-store slot: either the in-flight background load or the loaded
/// store. A failed load poisons the slot; the failure resurfaces on this
/// and every later operation instead of silently starting empty.
enum Slot<T> {
    Pending(JoinHandle<Result<T>>),
    Ready(T),
    Failed(String),
}

impl<T> Slot<T> {
    /// Resolve a pending load (consuming the handle exactly once) and
    /// hand out the store.
    async fn ensure(&mut self, path: &Path) -> Result<&mut T> {
        let resolved = match self {
            Slot::Pending(handle) => Some(match handle.await {
                Ok(Ok(store)) => {
                    debug!(path = %path.display(), "background load complete");
                    Slot::Ready(store)
                }
                Ok(Err(err)) => Slot::Failed(err.to_string()),
                Err(join_err) => Slot::Failed(join_err.to_string()),
            }),
            _ => None,
        };
        if let Some(slot) = resolved {
            *self = slot;
        }
        match self {
            Slot::Ready(store) => Ok(store),
            Slot::Failed(message) => Err(StoreError::Load {
                path: path.to_path_buf(),
                message: message.clone(),
            }),
            Slot::Pending(_) => unreachable!("pending slot resolved above"),
        }
    }
}

struct Inner {
    dataset: Slot<DatasetStore>,
    cases: Slot<TestcaseStore>,
}

/// Counts reported by [`RagStore::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    /// Stored indices in the dataset store.
    pub indices: usize,
    /// Recorded cases across all indices.
    pub cases: usize,
    /// On-disk size of the dataset file (0 when not yet saved).
    pub dataset_bytes: u64,
    /// On-disk size of the test-case file (0 when not yet saved).
    pub testcase_bytes: u64,
    /// Active compression strategy.
    pub compression: Compression,
}

/// Persistent store for RAG datasets and the queries recorded against
/// them.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`append`](RagStore::append) | Store a chunk sequence and record a case against it |
/// | [`get_index`](RagStore::get_index) | Fetch a fully decompressed sequence by fingerprint |
/// | [`get_questions`](RagStore::get_questions) | Cases recorded against a fingerprint |
/// | [`update_last`](RagStore::update_last) | Replace the most recent case for a fingerprint |
/// | [`ensure_saved`](RagStore::ensure_saved) | Wait for in-flight writes |
/// | [`stats`](RagStore::stats) | Index/case counts and file sizes |
///
/// When a `RagStore` is embedded in a caller's own serialised structures
/// only `{name, cache_dir, compression}` is written; the sub-stores own
/// their files and are reconstructed from them on deserialisation.
pub struct RagStore {
    name: String,
    cache_dir: PathBuf,
    dataset_path: PathBuf,
    testcase_path: PathBuf,
    compression: Compression,
    inner: Mutex<Inner>,
}

impl RagStore {
    /// Open (or initialise) the store `<name>` under `cache_dir` with
    /// the default compression strategy.
    ///
    /// Must be called within a Tokio runtime: when both store files
    /// exist their loads are spawned here.
    pub fn new(name: &str, cache_dir: impl Into<PathBuf>) -> Self {
        Self::with_compression(name, cache_dir, Compression::default())
    }

    /// Open (or initialise) the store with an explicit compression
    /// strategy. The strategy applies to a freshly initialised dataset;
    /// a dataset loaded from disk keeps the strategy recorded in its
    /// file.
    pub fn with_compression(
        name: &str,
        cache_dir: impl Into<PathBuf>,
        compression: Compression,
    ) -> Self {
        let cache_dir = cache_dir.into();
        let dataset_path = cache_dir.join(format!("{name}_dataset.json"));
        let testcase_path = cache_dir.join(format!("{name}_testcase.json"));

        let inner = if dataset_path.exists() && testcase_path.exists() {
            debug!(name, "store files present, loading in the background");
            let dp = dataset_path.clone();
            let tp = testcase_path.clone();
            Inner {
                dataset: Slot::Pending(task::spawn_blocking(move || DatasetStore::load(dp))),
                cases: Slot::Pending(task::spawn_blocking(move || TestcaseStore::load(tp))),
            }
        } else {
            Inner {
                dataset: Slot::Ready(DatasetStore::create(dataset_path.clone(), compression)),
                cases: Slot::Ready(TestcaseStore::create(testcase_path.clone())),
            }
        };

        RagStore {
            name: name.to_string(),
            cache_dir,
            dataset_path,
            testcase_path,
            compression,
            inner: Mutex::new(inner),
        }
    }

    /// Construct from a validated [`Config`].
    pub fn from_config(config: &Config) -> Self {
        Self::with_compression(
            &config.store.name,
            config.store.cache_dir.clone(),
            config.store.compression,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn dataset_path(&self) -> &Path {
        &self.dataset_path
    }

    pub fn testcase_path(&self) -> &Path {
        &self.testcase_path
    }

    /// Store `sequence` and record `case` against it. Returns the
    /// sequence's fingerprint.
    ///
    /// The case gets a `timestamp` of now when it carries none. When an
    /// already-recorded case for this index has an equal `question` the
    /// new case is dropped (logged at info level); the fingerprint is
    /// still returned and the dataset write still happened.
    pub async fn append(&self, sequence: Vec<Chunk>, mut case: Case) -> Result<String> {
        let mut inner = self.inner.lock().await;
        let (dataset, cases) = Self::ensure_loaded(
            &mut inner,
            &self.dataset_path,
            &self.testcase_path,
        )
        .await?;

        let id = dataset.append(sequence)?;

        if case.timestamp().is_none() {
            case.set_timestamp(Utc::now().timestamp());
        }

        let duplicate = cases
            .get(&id)
            .iter()
            .any(|existing| existing.question() == case.question());
        if duplicate {
            info!(
                index = %id,
                question = case.question().unwrap_or(""),
                "question already recorded for this index, skipping"
            );
        } else {
            cases.append(&id, case)?;
        }

        Ok(id)
    }

    /// Fetch the fully decompressed sequence stored under `id`.
    pub async fn get_index(&self, id: &str) -> Result<Vec<Chunk>> {
        let mut inner = self.inner.lock().await;
        let (dataset, _) = Self::ensure_loaded(
            &mut inner,
            &self.dataset_path,
            &self.testcase_path,
        )
        .await?;
        dataset.get(id)
    }

    /// Cases recorded against `id`; empty when the id is unknown.
    pub async fn get_questions(&self, id: &str) -> Result<Vec<Case>> {
        let mut inner = self.inner.lock().await;
        let (_, cases) = Self::ensure_loaded(
            &mut inner,
            &self.dataset_path,
            &self.testcase_path,
        )
        .await?;
        Ok(cases.get(id).to_vec())
    }

    /// Replace the most recent case recorded against `id` (front-ends
    /// use this to fill in the answer after the fact). No-op when the
    /// id has no cases.
    pub async fn update_last(&self, id: &str, case: Case) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let (_, cases) = Self::ensure_loaded(
            &mut inner,
            &self.dataset_path,
            &self.testcase_path,
        )
        .await?;
        cases.update_last(id, case)
    }

    /// Wait for any in-flight write to finish. All persistence happens
    /// synchronously inside the critical section, so acquiring and
    /// releasing the lock is the whole wait.
    pub async fn ensure_saved(&self) {
        let _inner = self.inner.lock().await;
    }

    /// Flattened clone of the test-case mapping, in fingerprint order.
    pub async fn snapshot_cases(&self) -> Result<Vec<(String, Vec<Case>)>> {
        let mut inner = self.inner.lock().await;
        let (_, cases) = Self::ensure_loaded(
            &mut inner,
            &self.dataset_path,
            &self.testcase_path,
        )
        .await?;
        Ok(cases
            .iter()
            .map(|(id, list)| (id.clone(), list.clone()))
            .collect())
    }

    /// Index/case counts and on-disk sizes.
    pub async fn stats(&self) -> Result<StoreStats> {
        let mut inner = self.inner.lock().await;
        let (dataset, cases) = Self::ensure_loaded(
            &mut inner,
            &self.dataset_path,
            &self.testcase_path,
        )
        .await?;
        Ok(StoreStats {
            indices: dataset.len(),
            cases: cases.len(),
            dataset_bytes: file_size(dataset.path()),
            testcase_bytes: file_size(cases.path()),
            compression: dataset.compression(),
        })
    }

    /// Resolve both slots, awaiting pending background loads exactly
    /// once. Called with the lock held.
    async fn ensure_loaded<'a>(
        inner: &'a mut Inner,
        dataset_path: &Path,
        testcase_path: &Path,
    ) -> Result<(&'a mut DatasetStore, &'a mut TestcaseStore)> {
        let Inner { dataset, cases } = inner;
        let dataset = dataset.ensure(dataset_path).await?;
        let cases = cases.ensure(testcase_path).await?;
        Ok((dataset, cases))
    }
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Serialised handle: only the coordinates needed to reopen the store.
#[derive(Serialize, Deserialize)]
struct SavedStore {
    name: String,
    cache_dir: PathBuf,
    #[serde(default)]
    compression: Compression,
}

impl Serialize for RagStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        SavedStore {
            name: self.name.clone(),
            cache_dir: self.cache_dir.clone(),
            compression: self.compression,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RagStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let saved = SavedStore::deserialize(deserializer)?;
        Ok(RagStore::with_compression(
            &saved.name,
            saved.cache_dir,
            saved.compression,
        ))
    }
}
