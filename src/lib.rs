//! kindred: k-nearest-neighbor interest matching over sparse vectors.
//!
//! Finds the top-k most similar user profiles by cosine similarity over
//! unit-normalized tag vectors, using the L2AP pruning scheme ("Fast Cosine
//! Similarity Search With Prefix L-2 Norm Bounds", Anastasiu & Karypis,
//! ICDE 2014) instead of brute force:
//!
//! - `vector`: sparse tag vectors and the normalization codec
//! - `index`: inverted index with per-posting prefix-norm bounds
//! - `search`: dynamic-threshold top-k query
//! - `matcher`: index lifecycle (rebuilds, upserts, TTL staleness)
//! - `store`: the backing profile store boundary
//! - `error`: error taxonomy
//!
//! # Why prefix-norm bounds work
//!
//! Split both query and document at a shared descending-weight position.
//! By Cauchy–Schwarz, the dot product of the unseen remainder is at most
//! the query's *suffix norm* times the document's *prefix norm* at that
//! position. Both factors are precomputable — the suffix norms once per
//! query, the prefix norms once per indexed posting — so candidates whose
//! best case cannot reach the current top-k threshold are skipped without
//! ever finishing their score. Pruning never changes the ranked output;
//! it only avoids work that provably cannot matter.
//!
//! # Consistency model
//!
//! The index is a rebuildable cache over the profile store. Incremental
//! updates are best-effort: every upsert marks the index stale, and any
//! query against a stale index rebuilds it read-through from the store
//! before running. Rebuilds swap a single reference, so concurrent queries
//! always observe one whole index generation.
//!
//! ```
//! use kindred::{InMemoryProfileStore, Matcher, Profile};
//!
//! let store = InMemoryProfileStore::new();
//! store.put("alice", Profile::new(["hiking", "camping"]));
//! store.put("bob", Profile::new(["camping", "hiking", "photography"]));
//!
//! let matcher = Matcher::new(store);
//! let matches = matcher.find_matches("alice", 10, 0.0, true)?;
//! assert_eq!(matches[0].doc_id, "bob");
//! # Ok::<(), kindred::MatchError>(())
//! ```

pub mod error;
pub mod index;
pub mod matcher;
pub mod search;
pub mod store;
pub mod vector;

pub use error::{MatchError, Result};
pub use index::{DocId, DocumentBound, Posting, SimilarityIndex};
pub use matcher::{
    Matcher, MatcherConfig, MatcherStats, DEFAULT_INDEX_TTL, DEFAULT_K, DEFAULT_MIN_SIMILARITY,
};
pub use search::{knn, Match};
pub use store::{InMemoryProfileStore, Profile, ProfileStore};
pub use vector::SparseVector;
