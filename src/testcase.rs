//! Test-case records and the per-index case store.
//!
//! Every stored index accumulates an ordered list of [`Case`]s: the
//! queries recorded against it. A case is an open bag of named fields;
//! the engine only interprets a handful of them and preserves everything
//! else verbatim, so callers can attach whatever bookkeeping they need.
//!
//! # Recognized fields
//!
//! | Field | Type | Notes |
//! |-------|------|-------|
//! | `question` | string | required on persisted records |
//! | `timestamp` | integer (epoch seconds) | injected by the façade when absent |
//! | `answer` | string | reference answer |
//! | `returned_answer` | string | what the system actually answered |
//! | `true_answers` | list of strings | accepted answers |
//! | `wrong_answers` | list of strings | known-bad answers |

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::persist;

pub const FIELD_QUESTION: &str = "question";
pub const FIELD_TIMESTAMP: &str = "timestamp";
pub const FIELD_ANSWER: &str = "answer";
pub const FIELD_RETURNED_ANSWER: &str = "returned_answer";
pub const FIELD_TRUE_ANSWERS: &str = "true_answers";
pub const FIELD_WRONG_ANSWERS: &str = "wrong_answers";

/// One recorded query: an unordered bag of named fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Case(Map<String, Value>);

impl Case {
    /// A case carrying only the question.
    pub fn new(question: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert(FIELD_QUESTION.to_string(), Value::String(question.into()));
        Case(fields)
    }

    pub fn question(&self) -> Option<&str> {
        self.0.get(FIELD_QUESTION).and_then(Value::as_str)
    }

    /// Epoch seconds. Tolerates a float in the field (files imported
    /// from elsewhere sometimes carry fractional timestamps).
    pub fn timestamp(&self) -> Option<i64> {
        let value = self.0.get(FIELD_TIMESTAMP)?;
        value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
    }

    pub fn set_timestamp(&mut self, epoch_seconds: i64) {
        self.0
            .insert(FIELD_TIMESTAMP.to_string(), Value::from(epoch_seconds));
    }

    pub fn answer(&self) -> Option<&str> {
        self.0.get(FIELD_ANSWER).and_then(Value::as_str)
    }

    pub fn set_answer(&mut self, answer: impl Into<String>) {
        self.0
            .insert(FIELD_ANSWER.to_string(), Value::String(answer.into()));
    }

    pub fn returned_answer(&self) -> Option<&str> {
        self.0.get(FIELD_RETURNED_ANSWER).and_then(Value::as_str)
    }

    pub fn set_returned_answer(&mut self, answer: impl Into<String>) {
        self.0.insert(
            FIELD_RETURNED_ANSWER.to_string(),
            Value::String(answer.into()),
        );
    }

    /// Read any field, recognized or caller-defined.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Set any field, recognized or caller-defined.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }
}

/// Serialised shape of the test-case file: a single top-level mapping.
/// The legacy key `questions` is accepted on read; `index_to_cases` is
/// always emitted on write.
#[derive(Deserialize)]
struct TestcaseFile {
    #[serde(alias = "questions")]
    index_to_cases: BTreeMap<String, Vec<Case>>,
}

#[derive(Serialize)]
struct TestcaseFileRef<'a> {
    index_to_cases: &'a BTreeMap<String, Vec<Case>>,
}

/// Mapping from index fingerprint to the ordered list of cases recorded
/// against it. Appends here perform no de-duplication; that policy
/// belongs to the façade.
#[derive(Debug)]
pub struct TestcaseStore {
    path: PathBuf,
    cases: BTreeMap<String, Vec<Case>>,
}

impl TestcaseStore {
    /// Empty store that will persist to `path`.
    pub fn create(path: impl Into<PathBuf>) -> Self {
        TestcaseStore {
            path: path.into(),
            cases: BTreeMap::new(),
        }
    }

    /// Load a previously saved store from `path`.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file: TestcaseFile = persist::load_json(&path)?;
        Ok(TestcaseStore {
            path,
            cases: file.index_to_cases,
        })
    }

    /// Append `case` to the list under `id`, creating the list if this
    /// is the first case for that index, then save.
    pub fn append(&mut self, id: &str, case: Case) -> Result<()> {
        self.cases.entry(id.to_string()).or_default().push(case);
        self.save()
    }

    /// Cases recorded against `id`. Missing ids yield an empty slice.
    pub fn get(&self, id: &str) -> &[Case] {
        self.cases.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the most recent case under `id`, then save. Silent no-op
    /// when the id is absent or its list is empty.
    pub fn update_last(&mut self, id: &str, case: Case) -> Result<()> {
        match self.cases.get_mut(id).and_then(|list| list.last_mut()) {
            Some(last) => {
                *last = case;
                self.save()
            }
            None => Ok(()),
        }
    }

    /// Iterate `(fingerprint, cases)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Case>)> {
        self.cases.iter()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total number of recorded cases across all indices.
    pub fn len(&self) -> usize {
        self.cases.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.values().all(Vec::is_empty)
    }

    /// Persist the mapping to the store file atomically.
    pub fn save(&self) -> Result<()> {
        persist::save_json(
            &self.path,
            &TestcaseFileRef {
                index_to_cases: &self.cases,
            },
        )
    }
}
