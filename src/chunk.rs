//! The chunk model: raw payloads, opaque external values, and the two
//! reference forms emitted by compression.
//!
//! A stored index is an ordered `Vec<Chunk>`. Raw and external chunks
//! carry their payload inline; reference chunks carry the coordinates of
//! an equal chunk inside an earlier-stored collection and are produced
//! only by the compression engine: callers may pass them in, but the
//! engine writes them through untouched and never dereferences them
//! during compression.
//!
//! # Identity
//!
//! Three projections of a chunk matter to the engine:
//!
//! | Projection | Used by | `Raw` | `External` | `RefBySource` | `RefByIndex` |
//! |------------|---------|-------|------------|---------------|--------------|
//! | [`identity`](Chunk::identity) | fingerprinting | text | projection | `coll::source` | `coll::pos` |
//! | [`dedup_key`](Chunk::dedup_key) | compression matching | text | — | — | — |
//! | [`source_key`](Chunk::source_key) | by-source resolution | text | projection | source | — |
//!
//! Only `Raw` chunks are ever replaced by references or targeted by new
//! ones; `External` values participate in equality and persistence but
//! stay opaque to compression.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// One element of a stored index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Chunk {
    /// Inline text payload.
    Raw { text: String },

    /// Caller-defined opaque value.
    ///
    /// `projection` is the caller-stable identity string used for
    /// equality and fingerprinting; `payload` is persisted and restored
    /// verbatim but never interpreted by the core.
    External {
        projection: String,
        payload: serde_json::Value,
    },

    /// Pointer into the sequence stored under `collection`, resolved by
    /// entry name (see [`Chunk::source_key`]).
    RefBySource { collection: String, source: String },

    /// Pointer into the sequence stored under `collection`, resolved by
    /// zero-based position.
    RefByIndex { collection: String, position: usize },
}

impl Chunk {
    /// Inline text chunk.
    pub fn raw(text: impl Into<String>) -> Self {
        Chunk::Raw { text: text.into() }
    }

    /// Opaque external chunk with a stable projection string.
    pub fn external(projection: impl Into<String>, payload: serde_json::Value) -> Self {
        Chunk::External {
            projection: projection.into(),
            payload,
        }
    }

    /// Canonical projection hashed by the fingerprint.
    ///
    /// References get a composite form so a reference never collides
    /// with the raw text it points at.
    pub fn identity(&self) -> Cow<'_, str> {
        match self {
            Chunk::Raw { text } => Cow::Borrowed(text),
            Chunk::External { projection, .. } => Cow::Borrowed(projection),
            Chunk::RefBySource { collection, source } => {
                Cow::Owned(format!("{collection}::{source}"))
            }
            Chunk::RefByIndex {
                collection,
                position,
            } => Cow::Owned(format!("{collection}::{position}")),
        }
    }

    /// The key compression deduplicates on. `Raw` only: references are
    /// the output of compression, not input, and external values are
    /// never materialised as reference targets.
    pub fn dedup_key(&self) -> Option<&str> {
        match self {
            Chunk::Raw { text } => Some(text),
            _ => None,
        }
    }

    /// The name this chunk answers to during by-source resolution.
    ///
    /// A `RefBySource` keeps the name it points at, so a chunk imported
    /// across stores stays findable under its original name and chains
    /// resolve through it. Positional references have no name.
    pub fn source_key(&self) -> Option<&str> {
        match self {
            Chunk::Raw { text } => Some(text),
            Chunk::External { projection, .. } => Some(projection),
            Chunk::RefBySource { source, .. } => Some(source),
            Chunk::RefByIndex { .. } => None,
        }
    }

    /// True for both reference variants.
    pub fn is_reference(&self) -> bool {
        matches!(self, Chunk::RefBySource { .. } | Chunk::RefByIndex { .. })
    }
}

/// Equality as the compression engine sees it: `Raw` by text, `External`
/// by projection (the payload is deliberately excluded), references by
/// coordinates. Variants never compare equal across tags.
impl PartialEq for Chunk {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Chunk::Raw { text: a }, Chunk::Raw { text: b }) => a == b,
            (Chunk::External { projection: a, .. }, Chunk::External { projection: b, .. }) => {
                a == b
            }
            (
                Chunk::RefBySource {
                    collection: ca,
                    source: sa,
                },
                Chunk::RefBySource {
                    collection: cb,
                    source: sb,
                },
            ) => ca == cb && sa == sb,
            (
                Chunk::RefByIndex {
                    collection: ca,
                    position: pa,
                },
                Chunk::RefByIndex {
                    collection: cb,
                    position: pb,
                },
            ) => ca == cb && pa == pb,
            _ => false,
        }
    }
}

impl Eq for Chunk {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_external_equality_ignores_payload() {
        let a = Chunk::external("doc-1", json!({"lang": "rust"}));
        let b = Chunk::external("doc-1", json!({"lang": "python"}));
        let c = Chunk::external("doc-2", json!({"lang": "rust"}));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_raw_never_equals_reference_with_same_text() {
        let raw = Chunk::raw("alpha");
        let by_source = Chunk::RefBySource {
            collection: "c".into(),
            source: "alpha".into(),
        };
        assert_ne!(raw, by_source);
    }

    #[test]
    fn test_identity_separates_reference_variants_by_tag_only() {
        let by_source = Chunk::RefBySource {
            collection: "c".into(),
            source: "0".into(),
        };
        let by_index = Chunk::RefByIndex {
            collection: "c".into(),
            position: 0,
        };
        // Same composite string is acceptable for fingerprinting;
        // equality still distinguishes them by tag.
        assert_eq!(by_source.identity(), by_index.identity());
        assert_ne!(by_source, by_index);
    }

    #[test]
    fn test_serde_tags() {
        let raw = serde_json::to_value(Chunk::raw("A")).unwrap();
        assert_eq!(raw, json!({"kind": "raw", "text": "A"}));

        let by_index = serde_json::to_value(Chunk::RefByIndex {
            collection: "abc".into(),
            position: 2,
        })
        .unwrap();
        assert_eq!(
            by_index,
            json!({"kind": "ref_by_index", "collection": "abc", "position": 2})
        );
    }

    #[test]
    fn test_serde_round_trip_all_variants() {
        let chunks = vec![
            Chunk::raw("hello"),
            Chunk::external("ext-1", json!({"bytes": [1, 2, 3]})),
            Chunk::RefBySource {
                collection: "00ff".into(),
                source: "hello".into(),
            },
            Chunk::RefByIndex {
                collection: "00ff".into(),
                position: 7,
            },
        ];
        let encoded = serde_json::to_string(&chunks).unwrap();
        let decoded: Vec<Chunk> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(chunks, decoded);
    }

    #[test]
    fn test_source_key_of_reference_is_transparent() {
        let re = Chunk::RefBySource {
            collection: "c".into(),
            source: "alpha".into(),
        };
        assert_eq!(re.source_key(), Some("alpha"));
        assert_eq!(Chunk::raw("alpha").source_key(), Some("alpha"));
        assert_eq!(
            Chunk::RefByIndex {
                collection: "c".into(),
                position: 0
            }
            .source_key(),
            None
        );
    }
}
