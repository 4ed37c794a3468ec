//! Order-independent content fingerprint.
//!
//! Each stored index is keyed by a 64-bit hash of its contents: every
//! element's [`identity`](crate::chunk::Chunk::identity) is hashed with
//! XxHash64 (fixed seed, so the value is stable across runs and
//! processes) and the per-element hashes are XOR-combined. XOR makes the
//! fingerprint insensitive to element order, which is what lets repeated
//! submissions of equivalent data land on the same key.
//!
//! Duplicate elements cancel in pairs under XOR. That collision mode is
//! accepted: a false positive on the fingerprint resolves to a key
//! collision in the store mapping, and the entries it equates are ones
//! the deduplication use case treats as equivalent anyway.

use std::hash::Hasher;

use twox_hash::XxHash64;

use crate::chunk::Chunk;

/// Fingerprint of the empty sequence.
pub const EMPTY: &str = "0";

/// Compute the content fingerprint of a chunk sequence.
///
/// Returns 16 lower-case hex digits, or the literal `"0"` for an empty
/// sequence. Deterministic across runs; independent of element order.
pub fn fingerprint(chunks: &[Chunk]) -> String {
    if chunks.is_empty() {
        return EMPTY.to_string();
    }
    let mut acc: u64 = 0;
    for chunk in chunks {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(chunk.identity().as_bytes());
        acc ^= hasher.finish();
    }
    format!("{acc:016x}")
}
