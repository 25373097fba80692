//! L2AP top-k cosine-similarity query.
//!
//! Implements the query side of L2AP ("Fast Cosine Similarity Search With
//! Prefix L-2 Norm Bounds", Anastasiu & Karypis, ICDE 2014) against a
//! [`SimilarityIndex`]. Three independent pruning rules keep the search from
//! degenerating into brute force, all derived from Cauchy–Schwarz
//! (`dot(x, y) ≤ ‖x‖·‖y‖` applied to vector suffixes/prefixes):
//!
//! 1. walk the query's features in descending weight order and stop outright
//!    once the query's remaining suffix norm drops below the threshold θ —
//!    no unseen document can reach θ through the remaining features;
//! 2. admit a new candidate only if `suffix_norm × prefix_norm ≥ θ`, and
//!    drop an accumulating candidate as soon as its partial score plus that
//!    bound falls below θ;
//! 3. at verification, discard any candidate whose partial score plus its
//!    per-document `pscore` bound cannot reach θ.
//!
//! Pruning is purely a performance device: the ranked output must always
//! equal the brute-force cosine ranking.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::{MatchError, Result};
use crate::index::SimilarityIndex;
use crate::vector::SparseVector;

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// Matched document id.
    pub doc_id: String,
    /// Cosine similarity in `[0, 1]` for binary tag vectors.
    pub similarity: f64,
}

/// Heap entry during verification. Natural order is ascending similarity so
/// `Reverse` turns the max-heap into the bounded min-heap we need.
#[derive(Debug, Clone, PartialEq)]
struct Scored<'a> {
    similarity: f64,
    doc_id: &'a str,
}

impl Eq for Scored<'_> {}

impl Ord for Scored<'_> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // total_cmp for IEEE 754 total ordering; doc id tie-break keeps the
        // heap (and therefore the output) fully deterministic.
        self.similarity
            .total_cmp(&other.similarity)
            .then_with(|| self.doc_id.cmp(other.doc_id))
    }
}

impl PartialOrd for Scored<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Bounded min-heap of the current top-k, carrying the dynamic threshold θ.
///
/// θ starts at the caller's minimum similarity and tightens monotonically:
/// once the heap holds k entries it is raised to the heap minimum, and every
/// replacement raises it again. A candidate equal to θ on a full heap is
/// rejected (strict `>`).
struct TopK<'a> {
    k: usize,
    threshold: f64,
    heap: BinaryHeap<Reverse<Scored<'a>>>,
}

/// Upper bound on upfront heap allocation; k is caller-controlled.
const TOPK_PREALLOC_CAP: usize = 1024;

impl<'a> TopK<'a> {
    fn new(k: usize, min_similarity: f64) -> Self {
        Self {
            k,
            threshold: min_similarity,
            heap: BinaryHeap::with_capacity(k.min(TOPK_PREALLOC_CAP)),
        }
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn offer(&mut self, doc_id: &'a str, similarity: f64) {
        if self.heap.len() < self.k {
            self.heap.push(Reverse(Scored { similarity, doc_id }));
            if self.heap.len() == self.k {
                if let Some(Reverse(min)) = self.heap.peek() {
                    self.threshold = self.threshold.max(min.similarity);
                }
            }
            return;
        }
        if let Some(Reverse(min)) = self.heap.peek() {
            if similarity > min.similarity {
                self.heap.pop();
                self.heap.push(Reverse(Scored { similarity, doc_id }));
                if let Some(Reverse(min)) = self.heap.peek() {
                    self.threshold = min.similarity;
                }
            }
        }
    }

    fn into_ranked(self) -> Vec<Match> {
        // Ascending over `Reverse` is descending over similarity.
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(s)| Match {
                doc_id: s.doc_id.to_owned(),
                similarity: s.similarity,
            })
            .collect()
    }
}

/// Find the top-k most similar documents above `min_similarity`.
///
/// `exclude` is an opaque id set (the query's own id, already-evaluated
/// candidates, ...) filtered out before any accumulation. An empty query
/// returns an empty result. `k == 0` is an input error, rejected before the
/// index is touched. `min_similarity = 0.0` is legitimate: it disables the
/// suffix-norm early exit but not the pscore verification filter.
pub fn knn(
    index: &SimilarityIndex,
    query: &SparseVector,
    k: usize,
    min_similarity: f64,
    exclude: &FxHashSet<String>,
) -> Result<Vec<Match>> {
    if k == 0 {
        return Err(MatchError::InvalidParameter(
            "k must be at least 1".to_owned(),
        ));
    }
    if query.is_empty() {
        return Ok(Vec::new());
    }

    // Same ordering rule as index construction.
    let ordered = query.ordered_features();

    // suffix_norms[i] = ‖query weights from position i to the end‖₂: the
    // tightest upper bound on similarity still contributable once i features
    // have been consumed.
    let mut suffix_norms = vec![0.0_f64; ordered.len()];
    let mut running_sq = 0.0;
    for i in (0..ordered.len()).rev() {
        let w = ordered[i].1;
        running_sq += w * w;
        suffix_norms[i] = running_sq.sqrt();
    }

    let mut topk = TopK::new(k, min_similarity);
    let theta = topk.threshold();

    // Candidate generation. θ is not raised during the walk — the heap only
    // fills during verification — so the walk prunes against the caller's
    // floor while per-candidate bounds do the finer work.
    let mut accumulator: FxHashMap<&str, f64> = FxHashMap::default();
    for (i, &(feature, query_weight)) in ordered.iter().enumerate() {
        let suffix_norm = suffix_norms[i];
        if suffix_norm < theta {
            // Principal early exit: no remaining feature, however
            // favorable, can push any new candidate above threshold.
            break;
        }
        let Some(postings) = index.postings(feature) else {
            continue;
        };
        for posting in postings {
            if exclude.contains(posting.doc_id.as_str()) {
                continue;
            }
            let remaining_bound = suffix_norm * posting.prefix_norm;
            let partial = accumulator.entry(posting.doc_id.as_str()).or_insert(0.0);
            // A zeroed accumulator counts as unseen: a previously dropped
            // document must re-qualify through the admission bound.
            if *partial == 0.0 && remaining_bound < theta {
                continue;
            }
            *partial += query_weight * posting.weight;
            if *partial + remaining_bound < theta {
                // Cannot recover; exclude from verification.
                *partial = 0.0;
            }
        }
    }

    // Verification. Both vectors are unit-normalized, so the accumulated dot
    // product is the cosine similarity exactly — no further normalization.
    for (doc_id, &partial) in &accumulator {
        if partial == 0.0 {
            continue;
        }
        // The generation bounds are loose while a document still has unseen
        // features, so a below-floor candidate can survive the walk; the
        // exact score still has to clear the caller's floor.
        if partial < min_similarity {
            continue;
        }
        let Some(bound) = index.bound(doc_id) else {
            continue;
        };
        if partial + bound.pscore < topk.threshold() {
            continue;
        }
        topk.offer(doc_id, partial);
    }

    Ok(topk.into_ranked())
}
