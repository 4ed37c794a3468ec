//! # RAG Store
//!
//! **A content-addressed, cross-collection-deduplicating store for RAG
//! datasets and the queries recorded against them.**
//!
//! RAG Store keeps many *indices* (ordered sequences of textual chunks)
//! under fingerprints derived from their contents, together with the
//! test cases run against each index. Chunks already present in any
//! previously stored index are replaced by references into those earlier
//! indices, so disk usage grows with novel content only.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ IndexLogger │──▶│   RagStore   │──▶│ DatasetStore   │──▶ <name>_dataset.json
//! │ (lazy)      │   │ (one lock)   │   │ TestcaseStore  │──▶ <name>_testcase.json
//! └─────────────┘   └──────────────┘   └───────────────┘
//!                        │                    │
//!                   background load      compress / decompress
//!                   (spawn_blocking)     against the pool
//! ```
//!
//! ## Data Flow
//!
//! 1. A caller submits `(chunks, case)` to [`store::RagStore::append`].
//! 2. The façade ensures both sub-stores are loaded (awaiting the
//!    background load started at construction, if any).
//! 3. The sequence's order-independent [`fingerprint`] becomes its id;
//!    the [`compress`] engine replaces chunks already stored elsewhere
//!    with reference chunks and the result lands in the
//!    [`dataset::DatasetStore`].
//! 4. The case (timestamped if needed) is appended to the
//!    [`testcase::TestcaseStore`] unless an equal question is already
//!    recorded for that id.
//! 5. Both files are rewritten with the atomic temp-then-rename
//!    protocol inside the same critical section.
//!
//! Retrieval reverses step 3: [`store::RagStore::get_index`] walks the
//! stored sequence and resolves every reference through the pool.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rag_store::chunk::Chunk;
//! use rag_store::store::RagStore;
//! use rag_store::testcase::Case;
//!
//! # async fn demo() -> rag_store::error::Result<()> {
//! let store = RagStore::new("bench", "./cache");
//! let id = store
//!     .append(
//!         vec![Chunk::raw("chunk A"), Chunk::raw("chunk B")],
//!         Case::new("what does chunk A say?"),
//!     )
//!     .await?;
//! let chunks = store.get_index(&id).await?;
//! assert_eq!(chunks.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`chunk`] | Tagged chunk variants: raw, external, and the two reference forms |
//! | [`fingerprint`] | Order-independent 64-bit content hash rendered as 16 hex digits |
//! | [`compress`] | The three compression strategies and reference resolution |
//! | [`dataset`] | Fingerprint → compressed-sequence mapping, idempotent append |
//! | [`testcase`] | Case records and the fingerprint → cases mapping |
//! | [`store`] | The façade: both sub-stores behind one lock, lazy async load |
//! | [`logger`] | Timestamped query logging with date/text filters |
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | Typed error kinds for every failure the API surfaces |

pub mod chunk;
pub mod compress;
pub mod config;
pub mod dataset;
pub mod error;
pub mod fingerprint;
pub mod logger;
mod persist;
pub mod store;
pub mod testcase;
