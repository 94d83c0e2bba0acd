//! Generation-based visited set for graph traversal.
//!
//! Replaces `HashSet<u32>` with O(1) array indexing. `clear()` bumps a
//! generation counter instead of zeroing the array, so repeated searches
//! only pay a full memset every 65534 clears.

#[derive(Debug)]
pub struct VisitedSet {
    data: Vec<u16>,
    generation: u16,
}

impl VisitedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u16; capacity],
            generation: 1,
        }
    }

    /// Reset the set. O(1) amortized.
    pub fn clear(&mut self) {
        if self.generation == u16::MAX {
            self.data.fill(0);
            self.generation = 1;
        } else {
            self.generation += 1;
        }
    }

    /// Grow to cover at least `cap` elements.
    pub fn ensure_capacity(&mut self, cap: usize) {
        if cap > self.data.len() {
            self.data.resize(cap, 0);
        }
    }

    /// Mark `id` as visited. Returns `true` if it was newly inserted.
    #[inline]
    pub fn insert(&mut self, id: u32) -> bool {
        let idx = id as usize;
        if self.data[idx] == self.generation {
            false
        } else {
            self.data[idx] = self.generation;
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_clear() {
        let mut vs = VisitedSet::new(16);
        assert!(vs.insert(3));
        assert!(!vs.insert(3));
        vs.clear();
        assert!(vs.insert(3));
    }

    #[test]
    fn test_generation_wraparound() {
        let mut vs = VisitedSet::new(4);
        for _ in 0..65534 {
            vs.clear();
        }
        vs.insert(1);
        vs.clear();
        assert!(vs.insert(1));
    }
}
