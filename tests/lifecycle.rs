//! Lifecycle tests: the Stale/Fresh protocol, store failures, and
//! concurrent query/update traffic.

use std::sync::Arc;
use std::time::Duration;

use kindred::{
    InMemoryProfileStore, MatchError, Matcher, MatcherConfig, Profile, ProfileStore, Result,
};

fn seeded_store() -> Arc<InMemoryProfileStore> {
    let store = InMemoryProfileStore::new();
    store.put("alice", Profile::new(["hiking", "camping"]));
    store.put("bob", Profile::new(["hiking", "camping", "photography"]));
    store.put("carol", Profile::new(["chess", "go"]));
    Arc::new(store)
}

// =============================================================================
// Staleness protocol
// =============================================================================

#[test]
fn rebuild_is_idempotent() {
    let matcher = Matcher::new(seeded_store());
    matcher.rebuild().unwrap();
    let first = matcher.find_matches("alice", 10, 0.0, true).unwrap();
    matcher.rebuild().unwrap();
    let second = matcher.find_matches("alice", 10, 0.0, true).unwrap();
    assert_eq!(first, second);
    assert_eq!(matcher.stats().indexed_documents, 3);
}

#[test]
fn query_after_rebuild_reflects_upsert() {
    let store = seeded_store();
    let matcher = Matcher::new(Arc::clone(&store));
    matcher.rebuild().unwrap();

    // Carol pivots to overlap with Alice. Store first, then upsert.
    let interests = vec!["hiking".to_owned(), "camping".to_owned()];
    store.put("carol", Profile::new(interests.clone()));
    matcher.upsert("carol", &interests).unwrap();

    matcher.rebuild().unwrap();
    let results = matcher.find_matches("alice", 10, 0.0, true).unwrap();
    assert!(results.iter().any(|m| m.doc_id == "carol"));
    assert_eq!(results[0].doc_id, "carol"); // exact interest match wins
}

#[test]
fn upsert_while_stale_defers_to_next_rebuild() {
    let store = seeded_store();
    let matcher = Matcher::new(Arc::clone(&store));
    assert!(!matcher.stats().fresh);

    let interests = vec!["hiking".to_owned()];
    store.put("dave", Profile::new(interests.clone()));
    matcher.upsert("dave", &interests).unwrap();
    assert!(!matcher.stats().fresh);
    // Nothing was indexed eagerly...
    assert_eq!(matcher.stats().indexed_documents, 0);

    // ...but the read-through rebuild picks dave up.
    let results = matcher.find_matches("alice", 10, 0.0, true).unwrap();
    assert!(results.iter().any(|m| m.doc_id == "dave"));
}

#[test]
fn invalidate_forces_read_through_rebuild() {
    let store = seeded_store();
    let matcher = Matcher::new(Arc::clone(&store));
    matcher.rebuild().unwrap();

    // A write that bypasses upsert entirely.
    store.put("erin", Profile::new(["camping"]));
    matcher.invalidate();
    assert!(!matcher.stats().fresh);

    let results = matcher.find_matches("alice", 10, 0.0, true).unwrap();
    assert!(results.iter().any(|m| m.doc_id == "erin"));
    assert!(matcher.stats().fresh);
}

#[test]
fn zero_ttl_treats_every_query_as_stale() {
    let matcher = Matcher::with_config(
        seeded_store(),
        MatcherConfig {
            index_ttl: Duration::ZERO,
        },
    );
    matcher.rebuild().unwrap();
    std::thread::sleep(Duration::from_millis(2));
    assert!(!matcher.stats().fresh);
    // Queries still succeed; each one rebuilds read-through.
    for _ in 0..3 {
        let results = matcher.find_matches("alice", 10, 0.0, true).unwrap();
        assert!(!results.is_empty());
    }
}

// =============================================================================
// Backing store failures
// =============================================================================

/// A store whose backend is unreachable.
struct FailingStore;

impl ProfileStore for FailingStore {
    fn get_profile(&self, _id: &str) -> Result<Option<Profile>> {
        Err(MatchError::store("profile backend unreachable"))
    }

    fn all_profiles(&self) -> Result<Vec<(String, Profile)>> {
        Err(MatchError::store("profile backend unreachable"))
    }
}

#[test]
fn store_failure_propagates_from_rebuild() {
    let matcher = Matcher::new(FailingStore);
    let err = matcher.rebuild().unwrap_err();
    assert!(matches!(err, MatchError::Store(_)));
    // The failure must not have produced a bogus Fresh empty index.
    assert!(!matcher.stats().fresh);
}

#[test]
fn store_failure_propagates_from_query() {
    let matcher = Matcher::new(FailingStore);
    let err = matcher.find_matches("alice", 10, 0.0, true).unwrap_err();
    assert!(matches!(err, MatchError::Store(_)));
}

/// Lookup works but the bulk scan fails: queries needing a rebuild error out
/// rather than searching a stale or empty generation.
struct HalfBrokenStore {
    inner: InMemoryProfileStore,
}

impl ProfileStore for HalfBrokenStore {
    fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        self.inner.get_profile(id)
    }

    fn all_profiles(&self) -> Result<Vec<(String, Profile)>> {
        Err(MatchError::store("bulk scan timed out"))
    }
}

#[test]
fn rebuild_failure_never_masquerades_as_empty_results() {
    let inner = InMemoryProfileStore::new();
    inner.put("alice", Profile::new(["hiking"]));
    let matcher = Matcher::new(HalfBrokenStore { inner });
    let err = matcher.find_matches("alice", 10, 0.0, true).unwrap_err();
    assert!(matches!(err, MatchError::Store(_)));
}

// =============================================================================
// Concurrency smoke
// =============================================================================

#[test]
fn concurrent_queries_and_updates() {
    let store = seeded_store();
    for i in 0..50 {
        store.put(
            format!("user{i}"),
            Profile::new(["hiking", "camping", "cycling"]),
        );
    }
    let matcher = Arc::new(Matcher::new(Arc::clone(&store)));
    matcher.rebuild().unwrap();

    let mut handles = Vec::new();

    // Query threads.
    for _ in 0..4 {
        let matcher = Arc::clone(&matcher);
        handles.push(std::thread::spawn(move || {
            for _ in 0..200 {
                let results = matcher.find_matches("alice", 10, 0.0, true).unwrap();
                assert!(results.len() <= 10);
                for pair in results.windows(2) {
                    assert!(pair[0].similarity >= pair[1].similarity);
                }
            }
        }));
    }

    // Writer thread: upserts and periodic explicit rebuilds.
    {
        let matcher = Arc::clone(&matcher);
        let store = Arc::clone(&store);
        handles.push(std::thread::spawn(move || {
            for i in 0..100 {
                let id = format!("user{}", i % 50);
                let interests = vec!["hiking".to_owned(), format!("tag{i}")];
                store.put(&id, Profile::new(interests.clone()));
                matcher.upsert(&id, &interests).unwrap();
                if i % 25 == 0 {
                    matcher.rebuild().unwrap();
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    // Settle and verify a consistent final state.
    matcher.rebuild().unwrap();
    assert_eq!(matcher.stats().indexed_documents, 53);
    assert!(matcher.stats().fresh);
}
