//! Timestamped query logging over a [`RagStore`].
//!
//! The logger is the thin front door used by interactive tools: every
//! query is recorded as a case against the fingerprint of the chunks it
//! ran over, and [`IndexLogger::get_logs`] reads them all back as one
//! flat, time-ordered list with date and question filters.
//!
//! Construction is free of side effects; the underlying store is
//! materialised on first use.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::chunk::Chunk;
use crate::error::Result;
use crate::store::RagStore;
use crate::testcase::Case;

/// One flattened log entry: a recorded case plus the fingerprint of the
/// index it was recorded against.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub index_id: String,
    #[serde(flatten)]
    pub case: Case,
}

/// Question filter for [`IndexLogger::get_logs`].
#[derive(Default)]
pub enum QuestionFilter {
    /// Accept every entry.
    #[default]
    Any,
    /// Accept entries whose question contains the substring.
    Contains(String),
    /// Accept entries whose question satisfies the predicate.
    Predicate(Box<dyn Fn(&str) -> bool + Send + Sync>),
}

impl QuestionFilter {
    fn accepts(&self, question: Option<&str>) -> bool {
        match self {
            QuestionFilter::Any => true,
            QuestionFilter::Contains(needle) => {
                question.is_some_and(|q| q.contains(needle.as_str()))
            }
            QuestionFilter::Predicate(pred) => question.is_some_and(|q| pred(q)),
        }
    }
}

impl fmt::Debug for QuestionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionFilter::Any => f.write_str("Any"),
            QuestionFilter::Contains(needle) => f.debug_tuple("Contains").field(needle).finish(),
            QuestionFilter::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Lazy, path-addressed front-end over a [`RagStore`].
///
/// The path's file stem is the store base name (any extension is
/// dropped); its parent is the cache directory. Both
/// `IndexLogger::new("cache/bench")` and
/// `IndexLogger::new("cache/bench.log")` log into
/// `cache/bench_dataset.json` and `cache/bench_testcase.json`.
///
/// When embedded in a caller's serialised structures only the path is
/// written; the store is rebuilt from its own files on first use after
/// deserialisation.
pub struct IndexLogger {
    path: PathBuf,
    store: OnceCell<RagStore>,
}

impl IndexLogger {
    /// Remember the path. No files are touched and no store is opened.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        IndexLogger {
            path: path.into(),
            store: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a query against the index formed by `chunks`.
    ///
    /// An empty `chunks` is a silent no-op: a question with no chunks
    /// has no index to be recorded against.
    pub async fn log(&self, chunks: Vec<Chunk>, question: &str, answer: Option<&str>) -> Result<()> {
        if chunks.is_empty() {
            debug!(question, "no chunks supplied, nothing to log");
            return Ok(());
        }
        let mut case = Case::new(question);
        case.set_timestamp(Utc::now().timestamp());
        if let Some(answer) = answer {
            case.set_returned_answer(answer);
        }
        self.store().await.append(chunks, case).await?;
        Ok(())
    }

    /// Every recorded case across every index, sorted by timestamp,
    /// restricted to `[start, end]` (defaults: epoch, now) and to
    /// questions accepted by `filter`.
    pub async fn get_logs(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        filter: QuestionFilter,
    ) -> Result<Vec<LogEntry>> {
        let start = start.map(|t| t.timestamp()).unwrap_or(0);
        let end = end
            .map(|t| t.timestamp())
            .unwrap_or_else(|| Utc::now().timestamp());

        let mut entries: Vec<LogEntry> = self
            .store()
            .await
            .snapshot_cases()
            .await?
            .into_iter()
            .flat_map(|(index_id, cases)| {
                cases.into_iter().map(move |case| LogEntry {
                    index_id: index_id.clone(),
                    case,
                })
            })
            .filter(|entry| {
                // Entries without a timestamp predate timestamp
                // injection (foreign files); they pass the range check.
                let in_range = entry
                    .case
                    .timestamp()
                    .map_or(true, |ts| ts >= start && ts <= end);
                in_range && filter.accepts(entry.case.question())
            })
            .collect();

        entries.sort_by_key(|entry| entry.case.timestamp());
        Ok(entries)
    }

    /// Wait for in-flight writes. No-op when the store was never used.
    pub async fn ensure_saved(&self) {
        if let Some(store) = self.store.get() {
            store.ensure_saved().await;
        }
    }

    async fn store(&self) -> &RagStore {
        self.store
            .get_or_init(|| async {
                let name = self
                    .path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "log".to_string());
                let cache_dir = self.path.parent().unwrap_or(Path::new(".")).to_path_buf();
                RagStore::new(&name, cache_dir)
            })
            .await
    }
}

/// Serialised handle: the path alone.
#[derive(Serialize, Deserialize)]
struct SavedLogger {
    path: PathBuf,
}

impl Serialize for IndexLogger {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        SavedLogger {
            path: self.path.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for IndexLogger {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let saved = SavedLogger::deserialize(deserializer)?;
        Ok(IndexLogger::new(saved.path))
    }
}
