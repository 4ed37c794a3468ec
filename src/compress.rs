//! Cross-index compression and decompression.
//!
//! Compression replaces raw chunks that already exist somewhere in the
//! pool of stored sequences with reference chunks pointing at the first
//! stored occurrence; total on-disk size then grows with *novel* content
//! only. Decompression transparently resolves references back through
//! the pool.
//!
//! # Strategies
//!
//! | Strategy | Emits | Resolution |
//! |----------|-------|------------|
//! | [`Compression::None`] | nothing | identity |
//! | [`Compression::BySource`] | [`Chunk::RefBySource`] | by entry name, recursive with cycle detection |
//! | [`Compression::ByIndex`] | [`Chunk::RefByIndex`] | by position, exactly one hop |
//!
//! Writers only emit references whose target is a raw chunk, so the pool
//! forms a DAG and the one-hop rule of the positional strategy holds for
//! everything this engine wrote itself. By-source resolution still
//! follows chains (sequences imported across stores can legitimately
//! re-export a name) and treats a revisited `(collection, source)` pair
//! as corruption.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;
use crate::error::{Result, StoreError};

/// All stored sequences, keyed by fingerprint. An `IndexMap` so every
/// scan over the pool happens in append order, which is what biases
/// references toward earlier-stored collections.
pub type Pool = IndexMap<String, Vec<Chunk>>;

/// Compression strategy, chosen per dataset store at construction and
/// recorded in the dataset file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    /// Store sequences verbatim.
    None,
    /// Replace repeated raw chunks with name-based references.
    #[serde(rename = "ref_by_source")]
    BySource,
    /// Replace repeated raw chunks with position-based references.
    #[default]
    #[serde(rename = "ref_by_index")]
    ByIndex,
}

/// Compress `sequence` against the already-stored pool.
///
/// The caller has already ruled out a fingerprint hit (an incoming
/// sequence whose key is present in the pool is kept as stored and never
/// recompressed), so `sequence` is always novel content here and cannot
/// end up referencing itself.
///
/// Reference and external chunks in the input pass through unchanged;
/// only raw chunks are candidates for replacement.
pub fn compress(compression: Compression, pool: &Pool, sequence: Vec<Chunk>) -> Vec<Chunk> {
    match compression {
        Compression::None => sequence,
        Compression::ByIndex => compress_by_index(pool, sequence),
        Compression::BySource => compress_by_source(pool, sequence),
    }
}

/// Positional strategy: one pass over the pool builds a
/// `text → (collection, position)` lookup keeping the first occurrence
/// of each key, which biases references toward the earliest-stored
/// collection. Stored entries that are themselves references or
/// external values are skipped; they are never reference targets.
fn compress_by_index(pool: &Pool, sequence: Vec<Chunk>) -> Vec<Chunk> {
    let mut lookup: HashMap<&str, (&str, usize)> = HashMap::new();
    for (collection, stored) in pool {
        for (position, chunk) in stored.iter().enumerate() {
            if let Some(key) = chunk.dedup_key() {
                lookup
                    .entry(key)
                    .or_insert((collection.as_str(), position));
            }
        }
    }

    sequence
        .into_iter()
        .map(|chunk| match chunk.dedup_key().and_then(|k| lookup.get(k)) {
            Some(&(collection, position)) => Chunk::RefByIndex {
                collection: collection.to_string(),
                position,
            },
            None => chunk,
        })
        .collect()
}

/// Name-based strategy: for each incoming raw chunk, scan pool sequences
/// in append order and entries in sequence order; the first stored raw
/// chunk with equal text becomes the reference target.
fn compress_by_source(pool: &Pool, sequence: Vec<Chunk>) -> Vec<Chunk> {
    sequence
        .into_iter()
        .map(|chunk| {
            let Some(text) = chunk.dedup_key() else {
                return chunk;
            };
            for (collection, stored) in pool {
                if stored.iter().any(|c| c.dedup_key() == Some(text)) {
                    return Chunk::RefBySource {
                        collection: collection.clone(),
                        source: text.to_string(),
                    };
                }
            }
            chunk
        })
        .collect()
}

/// Resolve every reference in `stored`, returning the fully materialised
/// sequence. Works for sequences written under any strategy: resolution
/// is driven by the reference variant, not the store's configured
/// compression.
pub fn decompress(pool: &Pool, stored: &[Chunk]) -> Result<Vec<Chunk>> {
    stored
        .iter()
        .map(|chunk| match chunk {
            Chunk::RefByIndex {
                collection,
                position,
            } => resolve_by_index(pool, collection, *position),
            Chunk::RefBySource { collection, source } => {
                let mut visited = HashSet::new();
                resolve_by_source(pool, collection, source, &mut visited)
            }
            other => Ok(other.clone()),
        })
        .collect()
}

/// One-hop positional resolution. The target is returned as-is even if
/// it is itself a reference: writers never emit a reference whose target
/// is a reference, so anything else in that slot came from a foreign
/// writer and is surfaced untouched.
fn resolve_by_index(pool: &Pool, collection: &str, position: usize) -> Result<Chunk> {
    let stored = pool
        .get(collection)
        .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
    stored
        .get(position)
        .cloned()
        .ok_or_else(|| StoreError::IndexOutOfRange {
            collection: collection.to_string(),
            position,
        })
}

/// Recursive name resolution. Follows chains of by-source references so
/// collections imported across stores still decompress; terminates in
/// O(pool size) because every hop consumes an unvisited
/// `(collection, source)` pair.
fn resolve_by_source(
    pool: &Pool,
    collection: &str,
    source: &str,
    visited: &mut HashSet<(String, String)>,
) -> Result<Chunk> {
    if !visited.insert((collection.to_string(), source.to_string())) {
        return Err(StoreError::CorruptReference {
            collection: collection.to_string(),
            source_name: source.to_string(),
        });
    }
    let stored = pool
        .get(collection)
        .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
    let entry = stored
        .iter()
        .find(|c| c.source_key() == Some(source))
        .ok_or_else(|| StoreError::UnknownSource {
            collection: collection.to_string(),
            source_name: source.to_string(),
        })?;
    match entry {
        Chunk::RefBySource {
            collection: next_collection,
            source: next_source,
        } => resolve_by_source(pool, next_collection, next_source, visited),
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raws(texts: &[&str]) -> Vec<Chunk> {
        texts.iter().copied().map(Chunk::raw).collect()
    }

    fn pool_with(entries: &[(&str, Vec<Chunk>)]) -> Pool {
        entries
            .iter()
            .map(|(id, seq)| (id.to_string(), seq.clone()))
            .collect()
    }

    #[test]
    fn test_none_is_identity() {
        let pool = pool_with(&[("id1", raws(&["a", "b"]))]);
        let seq = raws(&["a", "c"]);
        let compressed = compress(Compression::None, &pool, seq.clone());
        assert_eq!(compressed, seq);
        assert_eq!(decompress(&pool, &compressed).unwrap(), seq);
    }

    #[test]
    fn test_by_index_replaces_known_raw_chunks() {
        let pool = pool_with(&[("id1", raws(&["a", "b"]))]);
        let compressed = compress(Compression::ByIndex, &pool, raws(&["a", "b", "c"]));
        assert_eq!(
            compressed,
            vec![
                Chunk::RefByIndex {
                    collection: "id1".into(),
                    position: 0
                },
                Chunk::RefByIndex {
                    collection: "id1".into(),
                    position: 1
                },
                Chunk::raw("c"),
            ]
        );
    }

    #[test]
    fn test_by_index_round_trip() {
        let mut pool = pool_with(&[("id1", raws(&["a", "b"]))]);
        let original = raws(&["b", "a", "x"]);
        let compressed = compress(Compression::ByIndex, &pool, original.clone());
        pool.insert("id2".into(), compressed);
        assert_eq!(decompress(&pool, &pool["id2"]).unwrap(), original);
    }

    #[test]
    fn test_by_index_prefers_earlier_stored_collection() {
        // "a" appears in both stored sequences; the lookup keeps the
        // entry from the collection stored first, even though its id
        // sorts last lexically.
        let pool = pool_with(&[("zz", raws(&["a"])), ("aa", raws(&["a"]))]);
        let compressed = compress(Compression::ByIndex, &pool, raws(&["a"]));
        assert_eq!(
            compressed,
            vec![Chunk::RefByIndex {
                collection: "zz".into(),
                position: 0
            }]
        );
    }

    #[test]
    fn test_by_index_skips_stored_references_and_externals() {
        let stored = vec![
            Chunk::RefByIndex {
                collection: "id0".into(),
                position: 0,
            },
            Chunk::external("a", json!(null)),
            Chunk::raw("a"),
        ];
        let pool = pool_with(&[("id0", raws(&["z"])), ("id1", stored)]);
        let compressed = compress(Compression::ByIndex, &pool, raws(&["a"]));
        // Matches the raw entry at position 2, not the external at 1.
        assert_eq!(
            compressed,
            vec![Chunk::RefByIndex {
                collection: "id1".into(),
                position: 2
            }]
        );
    }

    #[test]
    fn test_input_references_and_externals_pass_through() {
        let pool = pool_with(&[("id1", raws(&["a"]))]);
        let passthrough = vec![
            Chunk::external("a", json!({"opaque": true})),
            Chunk::RefBySource {
                collection: "id1".into(),
                source: "a".into(),
            },
        ];
        let compressed = compress(Compression::ByIndex, &pool, passthrough.clone());
        assert_eq!(compressed, passthrough);
    }

    #[test]
    fn test_by_source_emits_named_references() {
        let pool = pool_with(&[("id1", raws(&["a", "b"]))]);
        let compressed = compress(Compression::BySource, &pool, raws(&["b", "c"]));
        assert_eq!(
            compressed,
            vec![
                Chunk::RefBySource {
                    collection: "id1".into(),
                    source: "b".into()
                },
                Chunk::raw("c"),
            ]
        );
        let mut pool = pool;
        pool.insert("id2".into(), compressed);
        assert_eq!(decompress(&pool, &pool["id2"]).unwrap(), raws(&["b", "c"]));
    }

    #[test]
    fn test_by_source_resolves_chains() {
        // id3 references id2, which re-exports the name from id1.
        let pool = pool_with(&[
            ("id1", raws(&["alpha"])),
            (
                "id2",
                vec![Chunk::RefBySource {
                    collection: "id1".into(),
                    source: "alpha".into(),
                }],
            ),
            (
                "id3",
                vec![Chunk::RefBySource {
                    collection: "id2".into(),
                    source: "alpha".into(),
                }],
            ),
        ]);
        assert_eq!(decompress(&pool, &pool["id3"]).unwrap(), raws(&["alpha"]));
    }

    #[test]
    fn test_by_source_cycle_is_corrupt() {
        let pool = pool_with(&[
            (
                "id1",
                vec![Chunk::RefBySource {
                    collection: "id2".into(),
                    source: "x".into(),
                }],
            ),
            (
                "id2",
                vec![Chunk::RefBySource {
                    collection: "id1".into(),
                    source: "x".into(),
                }],
            ),
        ]);
        let err = decompress(&pool, &pool["id1"]).unwrap_err();
        assert!(matches!(err, StoreError::CorruptReference { .. }));
    }

    #[test]
    fn test_by_index_is_one_hop_even_onto_a_reference() {
        // A foreign writer left a reference in the target slot; the
        // positional strategy surfaces it untouched.
        let inner = Chunk::RefBySource {
            collection: "elsewhere".into(),
            source: "x".into(),
        };
        let pool = pool_with(&[("id1", vec![inner.clone()])]);
        let stored = vec![Chunk::RefByIndex {
            collection: "id1".into(),
            position: 0,
        }];
        assert_eq!(decompress(&pool, &stored).unwrap(), vec![inner]);
    }

    #[test]
    fn test_missing_targets_error() {
        let pool = pool_with(&[("id1", raws(&["a"]))]);

        let unknown_collection = vec![Chunk::RefByIndex {
            collection: "nope".into(),
            position: 0,
        }];
        assert!(matches!(
            decompress(&pool, &unknown_collection).unwrap_err(),
            StoreError::UnknownCollection(_)
        ));

        let out_of_range = vec![Chunk::RefByIndex {
            collection: "id1".into(),
            position: 5,
        }];
        assert!(matches!(
            decompress(&pool, &out_of_range).unwrap_err(),
            StoreError::IndexOutOfRange { .. }
        ));

        let unknown_source = vec![Chunk::RefBySource {
            collection: "id1".into(),
            source: "missing".into(),
        }];
        assert!(matches!(
            decompress(&pool, &unknown_source).unwrap_err(),
            StoreError::UnknownSource { .. }
        ));
    }
}
