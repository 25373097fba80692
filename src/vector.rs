//! Sparse interest vectors.
//!
//! Profiles and queries are both represented as sparse feature→weight maps
//! over lower-cased tag strings, unit-normalized so that a dot product *is*
//! the cosine similarity. [`SparseVector::from_tags`] is the single codec:
//! it must be applied identically at index-build time and at query time,
//! otherwise stored and query vectors are not comparable.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// A sparse, L2-unit-normalized weight vector over string features.
///
/// Invariant: whenever the vector is non-empty, the sum of squared weights
/// is 1.0 within floating tolerance. The empty vector is a valid value and
/// represents "no signal", never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    weights: FxHashMap<String, f64>,
}

impl SparseVector {
    /// Build a normalized vector from a raw tag list.
    ///
    /// Tags are trimmed, lower-cased, and deduplicated (set semantics:
    /// repeating a tag does not increase its weight). Each surviving tag
    /// gets binary weight 1.0 and the whole vector is divided by its L2
    /// norm. Input that normalizes to nothing yields the empty vector.
    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut weights = FxHashMap::default();
        for tag in tags {
            let tag = tag.as_ref().trim().to_lowercase();
            if !tag.is_empty() {
                weights.insert(tag, 1.0);
            }
        }

        let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for w in weights.values_mut() {
                *w /= norm;
            }
        }

        SparseVector { weights }
    }

    /// Number of non-zero features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether the vector carries no signal.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Weight of a feature, 0.0 if absent.
    #[must_use]
    pub fn weight(&self, feature: &str) -> f64 {
        self.weights.get(feature).copied().unwrap_or(0.0)
    }

    /// L2 norm. 1.0 (within tolerance) for any non-empty vector produced by
    /// [`SparseVector::from_tags`]; recomputed here rather than assumed.
    #[must_use]
    pub fn norm(&self) -> f64 {
        self.weights.values().map(|w| w * w).sum::<f64>().sqrt()
    }

    /// Dot product. Equals cosine similarity for unit-normalized inputs.
    #[must_use]
    pub fn dot(&self, other: &SparseVector) -> f64 {
        // Walk the smaller map.
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .weights
            .iter()
            .map(|(feature, w)| w * large.weight(feature))
            .sum()
    }

    /// Iterate over (feature, weight) pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(f, &w)| (f.as_str(), w))
    }

    /// Features ordered by descending weight, ties broken by feature name.
    ///
    /// Index construction and query traversal must share this ordering: the
    /// prefix/suffix norm bounds are only valid under a common order.
    #[must_use]
    pub fn ordered_features(&self) -> Vec<(&str, f64)> {
        let mut ordered: Vec<(&str, f64)> =
            self.weights.iter().map(|(f, &w)| (f.as_str(), w)).collect();
        ordered.sort_unstable_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ordered
    }
}
