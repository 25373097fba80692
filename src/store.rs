//! The backing profile store boundary.
//!
//! The index is a derived cache; the store owns the data. Only two lookups
//! are required of it: a single-profile get (query time) and a full snapshot
//! (rebuild time). Implementations map their own failures through
//! [`MatchError::store`](crate::MatchError::store) so outages propagate
//! instead of reading as an empty index.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A stored user profile. Only the interest list feeds the index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Raw interest tags, as entered. Normalization happens at index time.
    pub interests: Vec<String>,
}

impl Profile {
    /// Convenience constructor from anything string-like.
    pub fn new<I, S>(interests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Profile {
            interests: interests.into_iter().map(Into::into).collect(),
        }
    }
}

/// Read access to the profile document store.
pub trait ProfileStore: Send + Sync {
    /// Look up a single profile. `Ok(None)` when the id is unknown — an
    /// unknown id is a normal outcome, not an error.
    fn get_profile(&self, id: &str) -> Result<Option<Profile>>;

    /// Snapshot every stored profile, used by full index rebuilds.
    fn all_profiles(&self) -> Result<Vec<(String, Profile)>>;
}

impl<S: ProfileStore + ?Sized> ProfileStore for Arc<S> {
    fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        (**self).get_profile(id)
    }

    fn all_profiles(&self) -> Result<Vec<(String, Profile)>> {
        (**self).all_profiles()
    }
}

/// Map-backed store for tests, demos, and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<FxHashMap<String, Profile>>,
}

impl InMemoryProfileStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a profile.
    pub fn put(&self, id: impl Into<String>, profile: Profile) {
        self.profiles.write().insert(id.into(), profile);
    }

    /// Remove a profile. Returns whether it was present.
    pub fn remove(&self, id: &str) -> bool {
        self.profiles.write().remove(id).is_some()
    }

    /// Number of stored profiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    /// Whether the store holds no profiles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        Ok(self.profiles.read().get(id).cloned())
    }

    fn all_profiles(&self) -> Result<Vec<(String, Profile)>> {
        Ok(self
            .profiles
            .read()
            .iter()
            .map(|(id, p)| (id.clone(), p.clone()))
            .collect())
    }
}
