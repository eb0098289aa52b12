//! The shared registry of in-flight candidates.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::candidate::model::{Candidate, CandidateId};
use crate::error::StoreError;

/// Registry of tracked candidates keyed by id.
///
/// Clone it cheaply; all clones share the same registry. Writers are
/// serialized by the lock and readers always copy out whole candidates, so
/// a snapshot is never partially mutated. The store knows nothing about
/// tracking, anchors or verification.
#[derive(Debug, Clone, Default)]
pub struct CandidateStore {
    entries: Arc<RwLock<BTreeMap<CandidateId, Candidate>>>,
    next_id: Arc<AtomicU64>,
}

impl CandidateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out a fresh id. Ids are never reused by the same store.
    pub fn allocate_id(&self) -> CandidateId {
        CandidateId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Point-in-time copy ordered by id (creation order).
    pub fn snapshot(&self) -> Vec<Candidate> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.values().cloned().collect()
    }

    pub fn get(&self, id: CandidateId) -> Option<Candidate> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(&id).cloned()
    }

    pub fn contains(&self, id: CandidateId) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(&id)
    }

    /// Apply `mutator` to one candidate atomically.
    ///
    /// Returns `false` (and does nothing) when the candidate is gone. Async
    /// completions must check this before acting on their result.
    pub fn update<F>(&self, id: CandidateId, mutator: F) -> bool
    where
        F: FnOnce(&mut Candidate),
    {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get_mut(&id) {
            Some(candidate) => {
                mutator(candidate);
                true
            }
            None => false,
        }
    }

    pub fn insert(&self, candidate: Candidate) -> Result<(), StoreError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&candidate.id) {
            return Err(StoreError::DuplicateId(candidate.id));
        }
        entries.insert(candidate.id, candidate);
        Ok(())
    }

    pub fn remove(&self, id: CandidateId) -> Option<Candidate> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::candidate::MatchStatus;
    use crate::geometry::Rect;

    fn candidate(store: &CandidateStore) -> Candidate {
        Candidate::new(
            store.allocate_id(),
            "car",
            Rect::new(0.1, 0.1, 0.2, 0.2),
            0.8,
            Instant::now(),
        )
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let store = CandidateStore::new();
        let a = store.allocate_id();
        let b = store.allocate_id();
        assert!(b > a);
    }

    #[test]
    fn insert_rejects_duplicates() {
        let store = CandidateStore::new();
        let c = candidate(&store);
        store.insert(c.clone()).unwrap();
        assert_eq!(store.insert(c.clone()), Err(StoreError::DuplicateId(c.id)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn update_reports_presence() {
        let store = CandidateStore::new();
        let c = candidate(&store);
        let id = c.id;
        store.insert(c).unwrap();

        assert!(store.update(id, |c| c.ocr_text = Some("ABC1234".into())));
        assert_eq!(store.get(id).unwrap().ocr_text.as_deref(), Some("ABC1234"));

        store.remove(id);
        let mut called = false;
        assert!(!store.update(id, |_| called = true));
        assert!(!called);
    }

    #[test]
    fn snapshot_is_detached_and_ordered() {
        let store = CandidateStore::new();
        let first = candidate(&store);
        let second = candidate(&store);
        let (a, b) = (first.id, second.id);
        store.insert(second).unwrap();
        store.insert(first).unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.iter().map(|c| c.id).collect::<Vec<_>>(), vec![a, b]);

        store.update(a, |c| c.status = MatchStatus::Waiting);
        assert_eq!(snapshot[0].status, MatchStatus::Unknown);
    }

    #[test]
    fn concurrent_updates_are_serialized() {
        let store = CandidateStore::new();
        let c = candidate(&store);
        let id = c.id;
        store.insert(c).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        store.update(id, |c| c.confidence += 1.0);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!((store.get(id).unwrap().confidence - 800.8).abs() < 1e-2);
    }
}
