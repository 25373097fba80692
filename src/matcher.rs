//! Index lifecycle management.
//!
//! [`Matcher`] owns the only mutable shared state in the crate: a reference
//! to the current [`SimilarityIndex`] generation. It runs a two-state
//! machine, **Stale** (no usable index, or explicitly invalidated, or older
//! than the TTL) and **Fresh** (usable, timestamped at last build):
//!
//! - `Stale → Fresh` through a full rebuild from the profile store;
//! - `Fresh → Stale` on explicit invalidation, after any upsert, or once
//!   the TTL elapses.
//!
//! Queries are read-through: a query issued while Stale rebuilds first, so
//! callers never observe a stale-and-unrepaired index. Rebuilds construct
//! the new index entirely off to the side and swap a single `Arc`, so a
//! concurrent query always sees one whole generation — never a mix.
//!
//! Incremental upserts are a best-effort optimization, not a correctness
//! mechanism: `upsert` copy-on-writes the live index when Fresh, then marks
//! Stale unconditionally so the next query re-reads the store.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use parking_lot::RwLock;
use rustc_hash::FxHashSet;

use crate::error::{MatchError, Result};
use crate::index::SimilarityIndex;
use crate::search::{knn, Match};
use crate::store::ProfileStore;
use crate::vector::SparseVector;

/// Default maximum index age before queries force a rebuild.
pub const DEFAULT_INDEX_TTL: Duration = Duration::from_secs(30);

/// Default number of matches returned by the API layer.
pub const DEFAULT_K: usize = 10;

/// Default similarity floor.
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.0;

/// Tunables for the lifecycle manager.
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// Maximum age of a Fresh index. The TTL is a fallback that catches
    /// store writes which never went through [`Matcher::upsert`].
    pub index_ttl: Duration,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            index_ttl: DEFAULT_INDEX_TTL,
        }
    }
}

/// Point-in-time view of the manager, for operational visibility.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatcherStats {
    /// Documents in the current index generation.
    pub indexed_documents: usize,
    /// Whether the current generation is Fresh.
    pub fresh: bool,
    /// Age of the current generation, if one was ever built.
    pub index_age: Option<Duration>,
}

/// Current index generation plus its freshness timestamp.
struct IndexState {
    index: Arc<SimilarityIndex>,
    /// `None` means Stale (never built, or explicitly invalidated).
    built_at: Option<Instant>,
}

impl IndexState {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.built_at.is_some_and(|t| t.elapsed() <= ttl)
    }
}

/// Owns a [`SimilarityIndex`] and coordinates rebuilds, incremental
/// updates, staleness, and the query entry points used by the API layer.
///
/// All operations are synchronous; the type is `Sync` and safe under
/// concurrent query and invalidation without spawning anything itself.
/// Construct one per process and thread it through explicitly.
pub struct Matcher<S> {
    store: S,
    config: MatcherConfig,
    state: RwLock<IndexState>,
}

impl<S: ProfileStore> Matcher<S> {
    /// Create a matcher over a profile store with default tunables.
    pub fn new(store: S) -> Self {
        Self::with_config(store, MatcherConfig::default())
    }

    /// Create with explicit tunables.
    pub fn with_config(store: S, config: MatcherConfig) -> Self {
        Self {
            store,
            config,
            state: RwLock::new(IndexState {
                index: Arc::new(SimilarityIndex::new()),
                built_at: None,
            }),
        }
    }

    /// Find the top-k matches for a stored profile.
    ///
    /// An unknown id or an interest-less profile returns an empty list:
    /// "no searchable signal" is a normal outcome, not an error.
    pub fn find_matches(
        &self,
        query_id: &str,
        k: usize,
        min_similarity: f64,
        exclude_self: bool,
    ) -> Result<Vec<Match>> {
        self.find_matches_filtered(query_id, k, min_similarity, exclude_self, &FxHashSet::default())
    }

    /// [`Matcher::find_matches`] with an additional opaque exclusion set
    /// (e.g. candidates the caller has already evaluated).
    pub fn find_matches_filtered(
        &self,
        query_id: &str,
        k: usize,
        min_similarity: f64,
        exclude_self: bool,
        exclude: &FxHashSet<String>,
    ) -> Result<Vec<Match>> {
        validate_k(k)?;
        let Some(profile) = self.store.get_profile(query_id)? else {
            return Ok(Vec::new());
        };
        let query = SparseVector::from_tags(&profile.interests);
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let index = self.fresh_snapshot()?;
        // Only self-exclusion needs an owned set; otherwise borrow the
        // caller's.
        let exclude = if exclude_self {
            let mut with_self = exclude.clone();
            with_self.insert(query_id.to_owned());
            Cow::Owned(with_self)
        } else {
            Cow::Borrowed(exclude)
        };
        knn(&index, &query, k, min_similarity, &exclude)
    }

    /// Find the top-k matches for a caller-supplied vector. No identity, so
    /// no self-exclusion; used for queries with no persisted profile.
    pub fn find_matches_by_vector(
        &self,
        query: &SparseVector,
        k: usize,
        min_similarity: f64,
    ) -> Result<Vec<Match>> {
        validate_k(k)?;
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let index = self.fresh_snapshot()?;
        knn(&index, query, k, min_similarity, &FxHashSet::default())
    }

    /// Find matches for a raw interest list (normalized here).
    pub fn find_matches_by_interests(
        &self,
        interests: &[String],
        k: usize,
        min_similarity: f64,
    ) -> Result<Vec<Match>> {
        self.find_matches_by_vector(&SparseVector::from_tags(interests), k, min_similarity)
    }

    /// Incrementally apply one document's new interests to the live index,
    /// then mark the index Stale.
    ///
    /// The in-place update is visible to concurrent queries only until the
    /// Stale marker lands; correctness is guaranteed solely by the next
    /// rebuild picking up the store's contents. Called while already Stale
    /// this is a no-op beyond keeping the Stale marker — the next query
    /// rebuilds and sees the new data anyway. An empty interest list removes
    /// the document from the live index.
    pub fn upsert(&self, id: &str, interests: &[String]) -> Result<()> {
        let vector = SparseVector::from_tags(interests);
        let mut state = self.state.write();
        if state.is_fresh(self.config.index_ttl) {
            // Copy-on-write: readers holding the old Arc keep a consistent
            // snapshot while this generation is edited.
            Arc::make_mut(&mut state.index).update_document(id, &vector);
            debug!("applied incremental update for document {id}");
        }
        state.built_at = None;
        debug!("index marked stale after upsert of {id}");
        Ok(())
    }

    /// Force a full `Stale → Fresh` rebuild from the store's current
    /// contents. Idempotent; safe to call at any time (recovery, bulk
    /// import, initial warm-up).
    pub fn rebuild(&self) -> Result<()> {
        let built = self.build_from_store()?;
        let mut state = self.state.write();
        state.index = Arc::new(built);
        state.built_at = Some(Instant::now());
        Ok(())
    }

    /// Explicitly mark the index Stale; the next query rebuilds.
    pub fn invalidate(&self) {
        self.state.write().built_at = None;
        debug!("index invalidated; next query rebuilds");
    }

    /// Operational snapshot.
    pub fn stats(&self) -> MatcherStats {
        let state = self.state.read();
        MatcherStats {
            indexed_documents: state.index.len(),
            fresh: state.is_fresh(self.config.index_ttl),
            index_age: state.built_at.map(|t| t.elapsed()),
        }
    }

    /// Return a Fresh index generation, rebuilding read-through if Stale.
    fn fresh_snapshot(&self) -> Result<Arc<SimilarityIndex>> {
        {
            let state = self.state.read();
            if state.is_fresh(self.config.index_ttl) {
                return Ok(Arc::clone(&state.index));
            }
        }

        // Build off to the side, then swap under the write lock. Two racing
        // rebuilders may both do the work; each swap installs a complete
        // generation built from a then-current store snapshot, so either
        // outcome is a valid Fresh state.
        let built = self.build_from_store()?;
        let mut state = self.state.write();
        if !state.is_fresh(self.config.index_ttl) {
            state.index = Arc::new(built);
            state.built_at = Some(Instant::now());
        }
        Ok(Arc::clone(&state.index))
    }

    fn build_from_store(&self) -> Result<SimilarityIndex> {
        let profiles = self.store.all_profiles()?;
        let total = profiles.len();
        let mut index = SimilarityIndex::new();
        index.build(
            profiles
                .into_iter()
                .map(|(id, p)| (id, SparseVector::from_tags(&p.interests))),
        );
        info!(
            "similarity index rebuilt: {} of {} profiles indexed",
            index.len(),
            total
        );
        Ok(index)
    }
}

fn validate_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(MatchError::InvalidParameter(
            "k must be at least 1".to_owned(),
        ));
    }
    Ok(())
}
