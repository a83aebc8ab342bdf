//! Bounded, always-sorted candidate list used by construction and search.
//!
//! A [`CandidateList`] holds at most `capacity` candidates in ascending distance
//! order. Offering a candidate worse than the current worst to a full list is a
//! no-op; offering an id already present keeps the smaller of the two distances.

/// A node under consideration during a layer search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub node_id: u64,
    pub distance: u64,
    /// Set once the candidate's neighbors have been expanded.
    pub visited: bool,
}

/// Capacity-bounded sequence of candidates kept in ascending distance order.
#[derive(Debug, Clone)]
pub struct CandidateList {
    capacity: usize,
    items: Vec<Candidate>,
}

impl CandidateList {
    /// Creates an empty list that will hold at most `capacity` candidates.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            items: Vec::with_capacity(capacity.min(1024)),
        }
    }

    /// Offer a candidate. Returns whether the list changed.
    pub fn add(&mut self, node_id: u64, distance: u64) -> bool {
        if self.capacity == 0 {
            return false;
        }

        if let Some(pos) = self.items.iter().position(|c| c.node_id == node_id) {
            if distance >= self.items[pos].distance {
                return false;
            }
            let existing = self.items.remove(pos);
            let at = self.insertion_point(distance);
            self.items.insert(
                at,
                Candidate {
                    distance,
                    ..existing
                },
            );
            return true;
        }

        let at = self.insertion_point(distance);
        if self.items.len() >= self.capacity {
            // Only strictly better than the worst gets in
            if at >= self.items.len() {
                return false;
            }
            self.items.pop();
        }
        self.items.insert(
            at,
            Candidate {
                node_id,
                distance,
                visited: false,
            },
        );
        true
    }

    /// Equal distances keep arrival order.
    #[inline]
    fn insertion_point(&self, distance: u64) -> usize {
        self.items.partition_point(|c| c.distance <= distance)
    }

    /// Return the closest candidate not yet expanded, marking it visited.
    pub fn next_unvisited(&mut self) -> Option<Candidate> {
        let next = self.items.iter_mut().find(|c| !c.visited)?;
        next.visited = true;
        Some(*next)
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.items.first()
    }

    pub fn worst_distance(&self) -> Option<u64> {
        self.items.last().map(|c| c.distance)
    }

    pub fn contains(&self, node_id: u64) -> bool {
        self.items.iter().any(|c| c.node_id == node_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Candidate] {
        &self.items
    }

    /// Keep only the best `len` candidates.
    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    pub fn into_vec(self) -> Vec<Candidate> {
        self.items
    }
}

impl<'a> IntoIterator for &'a CandidateList {
    type Item = &'a Candidate;
    type IntoIter = std::slice::Iter<'a, Candidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
