//! Visited set for HNSW graph traversal.
//!
//! Node ids are opaque `u64` vector ids rather than dense array indices, so the
//! set is hash-based. `clear()` keeps the allocation so the set can be reused
//! across the layers of one insert or search.

use std::collections::HashSet;

/// Set of node ids already scored during a layer search.
#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: HashSet<u64>,
}

impl VisitedSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: HashSet::with_capacity(capacity),
        }
    }

    /// Reset the set, keeping its allocation.
    pub fn clear(&mut self) {
        self.seen.clear();
    }

    /// Mark `id` as visited. Returns `true` if it was NOT previously visited (i.e. newly inserted).
    #[inline]
    pub fn insert(&mut self, id: u64) -> bool {
        self.seen.insert(id)
    }

    #[inline]
    pub fn contains(&self, id: u64) -> bool {
        self.seen.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_clear() {
        let mut vs = VisitedSet::with_capacity(16);
        assert!(vs.insert(0));
        assert!(!vs.insert(0)); // already visited
        assert!(vs.insert(u64::MAX));
        assert_eq!(vs.len(), 2);

        vs.clear();
        assert!(vs.is_empty());
        assert!(vs.insert(0)); // fresh after clear
        assert!(vs.contains(0));
        assert!(!vs.contains(u64::MAX));
    }
}
