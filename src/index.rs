//! Inverted index with L2AP prefix-norm bounds.
//!
//! For every feature the index keeps a posting list sorted by descending
//! weight; each posting carries the L2 norm of the document's weight prefix
//! at that position. Per document it keeps a [`DocumentBound`] used for
//! late-stage pruning. Both are derived data: the index is a rebuildable
//! cache over the profile store, keyed by document id, and owns nothing.

use rustc_hash::FxHashMap;

use crate::vector::SparseVector;

/// Document identifier (profile UID).
pub type DocId = String;

/// One entry in a feature's posting list.
#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
    /// Owning document.
    pub doc_id: DocId,
    /// The document's weight for this feature.
    pub weight: f64,
    /// L2 norm of all of the document's weights at or above this one in
    /// descending-sorted order (the "norm of the processed prefix").
    pub prefix_norm: f64,
}

/// Per-document pruning bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DocumentBound {
    /// `max_i(weight_i × prefix_norm_i)`: upper-bounds what any single
    /// remaining feature can contribute combined with everything already
    /// accumulated for this document.
    pub pscore: f64,
    /// Largest single weight in the document.
    pub max_weight: f64,
    /// Full vector norm. Always 1.0 for a normalized vector; retained for
    /// defensive bound checks.
    pub norm: f64,
}

/// Inverted index over documents' sparse vectors.
///
/// Invariants:
/// - every posting list is sorted by descending weight whenever queried;
/// - the set of doc ids with at least one posting equals the set of doc ids
///   with a [`DocumentBound`].
///
/// `add_document` appends lazily and leaves lists unsorted; [`Self::build`]
/// sorts once at the end and [`Self::update_document`] re-sorts only the
/// feature lists its insertion touched.
#[derive(Debug, Clone, Default)]
pub struct SimilarityIndex {
    /// feature → postings, descending by weight once sorted.
    postings: FxHashMap<String, Vec<Posting>>,
    /// doc id → pruning bounds.
    bounds: FxHashMap<DocId, DocumentBound>,
    /// doc id → features it posted to. Makes removal O(features of doc)
    /// instead of a scan over every posting list.
    features_by_doc: FxHashMap<DocId, Vec<String>>,
}

impl SimilarityIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    /// Whether no documents are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Whether `id` is indexed.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.bounds.contains_key(id)
    }

    /// Number of distinct features.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.postings.len()
    }

    /// Posting list for a feature, if any document carries it.
    #[must_use]
    pub fn postings(&self, feature: &str) -> Option<&[Posting]> {
        self.postings.get(feature).map(Vec::as_slice)
    }

    /// Pruning bounds for a document.
    #[must_use]
    pub fn bound(&self, id: &str) -> Option<&DocumentBound> {
        self.bounds.get(id)
    }

    /// Iterate over indexed document ids in arbitrary order.
    pub fn doc_ids(&self) -> impl Iterator<Item = &str> {
        self.bounds.keys().map(String::as_str)
    }

    /// Add a document's vector. A zero-norm (empty) vector is a no-op.
    ///
    /// Postings are appended without re-sorting the touched lists; callers
    /// must restore descending order before the index is queried. `id` must
    /// not already be indexed — [`Self::update_document`] handles
    /// replacement.
    pub fn add_document(&mut self, id: &str, vector: &SparseVector) {
        debug_assert!(!self.contains(id), "duplicate add for document {id}");
        let ordered = vector.ordered_features();
        if ordered.is_empty() {
            return;
        }
        let norm = vector.norm();
        if norm == 0.0 {
            return;
        }
        let max_weight = ordered[0].1;

        let mut running_sq = 0.0;
        let mut pscore = 0.0_f64;
        let mut touched = Vec::with_capacity(ordered.len());
        for (feature, weight) in ordered {
            running_sq += weight * weight;
            let prefix_norm = running_sq.sqrt();
            pscore = pscore.max(weight * prefix_norm);
            self.postings.entry(feature.to_owned()).or_default().push(Posting {
                doc_id: id.to_owned(),
                weight,
                prefix_norm,
            });
            touched.push(feature.to_owned());
        }

        self.bounds.insert(
            id.to_owned(),
            DocumentBound {
                pscore,
                max_weight,
                norm,
            },
        );
        self.features_by_doc.insert(id.to_owned(), touched);
    }

    /// Replace the entire index contents from a document batch.
    ///
    /// The only operation that guarantees global consistency from a cold
    /// start: clears all state, adds every document, then sorts every
    /// posting list once.
    pub fn build<I>(&mut self, documents: I)
    where
        I: IntoIterator<Item = (DocId, SparseVector)>,
    {
        self.postings.clear();
        self.bounds.clear();
        self.features_by_doc.clear();

        for (id, vector) in documents {
            self.add_document(&id, &vector);
        }

        for list in self.postings.values_mut() {
            sort_descending(list);
        }
    }

    /// Replace a single document's postings and bound.
    ///
    /// Removal preserves posting-list order; only the re-insertion can break
    /// it, so only the new vector's feature lists are re-sorted. An empty
    /// vector removes the document.
    pub fn update_document(&mut self, id: &str, vector: &SparseVector) {
        self.remove_document(id);
        self.add_document(id, vector);
        for (feature, _) in vector.iter() {
            if let Some(list) = self.postings.get_mut(feature) {
                sort_descending(list);
            }
        }
    }

    /// Remove a document entirely. Returns whether it was present.
    pub fn remove_document(&mut self, id: &str) -> bool {
        let Some(features) = self.features_by_doc.remove(id) else {
            return false;
        };
        for feature in features {
            if let Some(list) = self.postings.get_mut(&feature) {
                list.retain(|p| p.doc_id != id);
                if list.is_empty() {
                    self.postings.remove(&feature);
                }
            }
        }
        self.bounds.remove(id).is_some()
    }
}

/// Descending by weight, ties by doc id so ordering is fully deterministic.
fn sort_descending(list: &mut [Posting]) {
    list.sort_unstable_by(|a, b| {
        b.weight
            .total_cmp(&a.weight)
            .then_with(|| a.doc_id.cmp(&b.doc_id))
    });
}
